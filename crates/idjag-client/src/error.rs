//! Error taxonomy for token endpoint calls
//!
//! Two layers:
//!
//! - [`ClientError`] is returned as `Err` and means the call could not be
//!   meaningfully completed: bad local input ([`ClientError::InvalidArgument`],
//!   never sent over the wire) or a response that breaks the RFC contract
//!   ([`ClientError::InvalidPayload`], not fixable by retrying).
//! - [`ExchangeError`] is the expected-failure branch of [`ExchangeOutcome`]:
//!   an OAuth error from an HTTP 400, any other error status, or a network
//!   failure / timeout.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard failures of a client call
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Required input missing or malformed; nothing was sent
    #[error("Invalid argument {argument}. {message}")]
    InvalidArgument {
        /// Name of the offending argument
        argument: &'static str,
        /// What was expected
        message: String,
    },

    /// The token endpoint answered with a body that violates the RFC contract
    #[error("Invalid payload. {message}")]
    InvalidPayload {
        /// Which field was wrong and why
        message: String,
        /// The offending payload, for diagnostics only
        payload: Option<Value>,
    },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ClientError {
    pub(crate) fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_payload(message: impl Into<String>, payload: Option<&Value>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            payload: payload.cloned(),
        }
    }
}

/// Error codes a token endpoint may return (RFC 6749 Section 5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// Missing or malformed request parameter
    InvalidRequest,
    /// Client authentication failed
    InvalidClient,
    /// Grant or assertion invalid, expired or revoked
    InvalidGrant,
    /// Client may not use this grant type
    UnauthorizedClient,
    /// Grant type not supported by the server
    UnsupportedGrantType,
    /// Requested scope invalid or exceeds what was granted
    InvalidScope,
}

impl OAuthErrorCode {
    /// Every recognized code
    pub const ALL: [Self; 6] = [
        Self::InvalidRequest,
        Self::InvalidClient,
        Self::InvalidGrant,
        Self::UnauthorizedClient,
        Self::UnsupportedGrantType,
        Self::InvalidScope,
    ];

    /// Wire value
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
        }
    }

    /// Parse a wire value
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == value)
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth error response body from an HTTP 400
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    /// Error code
    pub error: OAuthErrorCode,
    /// Human readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Link to documentation about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    /// Validate an HTTP 400 body against RFC 6749 Section 5.2
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPayload`] if `error` is missing or not a
    /// recognized code, or if `error_description` / `error_uri` are present but
    /// not strings.
    pub fn from_payload(payload: &Value) -> Result<Self, ClientError> {
        let invalid = |field: &str, requirement: &str| {
            ClientError::invalid_payload(
                format!(
                    "The field '{field}' {requirement} per RFC6749. See https://datatracker.ietf.org/doc/html/rfc6749#section-5.2."
                ),
                Some(payload),
            )
        };

        let error = payload
            .get("error")
            .and_then(Value::as_str)
            .and_then(OAuthErrorCode::parse)
            .ok_or_else(|| invalid("error", "must be present and a valid value"))?;

        let optional_string = |field: &str| -> Result<Option<String>, ClientError> {
            match payload.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) if s.is_empty() => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(invalid(field, "must be a valid string")),
            }
        };

        Ok(Self {
            error,
            error_description: optional_string("error_description")?,
            error_uri: optional_string("error_uri")?,
        })
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

/// Non-400 error response from the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    /// Final request URL
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub status_text: String,
    /// Raw response body, for diagnostics
    pub body: String,
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} from {}", self.status, self.status_text, self.url)
    }
}

/// The request never produced an HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkFailure {
    /// Request URL
    pub url: String,
    /// Underlying error message
    pub message: String,
    /// Whether the bounded request timeout elapsed
    pub timed_out: bool,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "request to {} timed out", self.url)
        } else {
            write!(f, "request to {} failed: {}", self.url, self.message)
        }
    }
}

/// Expected failure of a token endpoint call
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    /// HTTP 400 with a valid OAuth error body
    #[error("OAuth error response: {0}")]
    OAuth(OAuthError),
    /// Any other error status
    #[error("Unexpected HTTP response: {0}")]
    Http(HttpResponse),
    /// Connection failure or timeout
    #[error("Transport failure: {0}")]
    Network(NetworkFailure),
}

impl ExchangeError {
    /// HTTP status of the failure, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::OAuth(_) => Some(400),
            Self::Http(response) => Some(response.status),
            Self::Network(_) => None,
        }
    }
}

/// Result of a token endpoint call that reached the remote server
///
/// Callers must branch on the variant; a payload is never implied.
#[derive(Debug)]
#[must_use]
pub enum ExchangeOutcome<T> {
    /// Validated token response
    Payload(T),
    /// OAuth or transport level failure
    Error(ExchangeError),
}

impl<T> ExchangeOutcome<T> {
    /// True for the error branch
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The payload, discarding any error
    pub fn payload(self) -> Option<T> {
        match self {
            Self::Payload(payload) => Some(payload),
            Self::Error(_) => None,
        }
    }

    /// The error, discarding any payload
    pub fn error(self) -> Option<ExchangeError> {
        match self {
            Self::Payload(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Convert into a standard `Result`
    ///
    /// # Errors
    ///
    /// Returns the [`ExchangeError`] of the error branch.
    pub fn into_result(self) -> Result<T, ExchangeError> {
        match self {
            Self::Payload(payload) => Ok(payload),
            Self::Error(error) => Err(error),
        }
    }
}
