//! OAuth error responses raised by the grant handlers
//!
//! Every variant maps to an HTTP status and a token endpoint error body
//! (`{error, error_description, error_uri?}`). Internal detail such as raw
//! upstream bodies or key errors is logged at the point of failure and never
//! placed in the body.

use idjag_client::{ExchangeError, OAuthError};
use serde::Serialize;

/// Rejection of a grant request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    /// Missing or malformed request parameter
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Assertion or subject token failed a validation gate
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Assertion signature could not be verified against the issuer's keys
    #[error("invalid_signature: {0}")]
    InvalidSignature(String),

    /// No handler registered for the requested `grant_type`
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// OAuth error returned by a partner token endpoint, relayed verbatim
    #[error("{error}: {}", .description.as_deref().unwrap_or_default())]
    Upstream {
        /// Upstream error code
        error: String,
        /// Upstream description
        description: Option<String>,
        /// Upstream documentation link
        uri: Option<String>,
    },

    /// Partner token endpoint failed at the transport level
    #[error("provider error ({}): {message}", .status.map_or_else(|| "no response".to_string(), |s| s.to_string()))]
    Provider {
        /// Upstream HTTP status; `None` if no response was received
        status: Option<u16>,
        /// Summary safe to return to the caller
        message: String,
    },

    /// Local failure unrelated to the request's validity
    #[error("server_error: {0}")]
    Server(String),
}

/// Token endpoint error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error code
    pub error: String,
    /// Human readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Documentation link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl GrantError {
    /// Shorthand for [`GrantError::InvalidGrant`]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    /// Shorthand for [`GrantError::InvalidRequest`]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// OAuth error code for the response body
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::Upstream { error, .. } => error,
            Self::Provider { .. } | Self::Server(_) => "server_error",
        }
    }

    /// HTTP status of the error response
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::InvalidSignature(_)
            | Self::UnsupportedGrantType(_)
            | Self::Upstream { .. } => 400,
            Self::Provider { status, .. } => match status {
                Some(status) if *status >= 400 => *status,
                _ => 502,
            },
            Self::Server(_) => 500,
        }
    }

    /// Error body returned to the caller
    pub fn body(&self) -> ErrorBody {
        let (description, uri) = match self {
            Self::InvalidRequest(message)
            | Self::InvalidGrant(message)
            | Self::InvalidSignature(message)
            | Self::UnsupportedGrantType(message) => (Some(message.clone()), None),
            Self::Upstream {
                description, uri, ..
            } => (description.clone(), uri.clone()),
            Self::Provider { message, .. } => (Some(message.clone()), None),
            Self::Server(_) => (Some("internal server error".to_string()), None),
        };

        ErrorBody {
            error: self.code().to_string(),
            error_description: description,
            error_uri: uri,
        }
    }
}

impl From<OAuthError> for GrantError {
    fn from(error: OAuthError) -> Self {
        Self::Upstream {
            error: error.error.as_str().to_string(),
            description: error.error_description,
            uri: error.error_uri,
        }
    }
}

impl From<ExchangeError> for GrantError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::OAuth(error) => error.into(),
            ExchangeError::Http(response) => Self::Provider {
                status: Some(response.status),
                message: format!(
                    "partner token endpoint responded with {} {}",
                    response.status, response.status_text
                ),
            },
            ExchangeError::Network(failure) if failure.timed_out => Self::Provider {
                status: None,
                message: "partner token endpoint timed out".to_string(),
            },
            ExchangeError::Network(_) => Self::Provider {
                status: None,
                message: "partner token endpoint unreachable".to_string(),
            },
        }
    }
}

/// Result alias for grant handling
pub type GrantResult<T> = Result<T, GrantError>;
