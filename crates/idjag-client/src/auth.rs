//! Client authentication at the token endpoint
//!
//! A client authenticates either with its `client_id` (plus an optional
//! `client_secret`, both sent as form fields) or with a signed client assertion
//! (RFC 7523 Section 2.2). Exactly one of the two must be supplied.

use secrecy::{ExposeSecret, SecretString};

use crate::error::ClientError;
use crate::types::CLIENT_ASSERTION_TYPE_JWT_BEARER;

/// How the calling client authenticates to the token endpoint
#[derive(Clone)]
pub enum ClientAuth {
    /// `client_id` with an optional `client_secret` in the request body
    ClientSecret {
        /// Client identifier
        client_id: String,
        /// Client secret, omitted from the request when `None` or empty
        client_secret: Option<SecretString>,
    },
    /// Signed JWT client assertion
    ClientAssertion {
        /// The assertion JWT
        assertion: String,
    },
}

impl ClientAuth {
    /// Authenticate with client id and optional secret
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] if `client_id` is empty.
    pub fn client_secret(
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
    ) -> Result<Self, ClientError> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ClientError::invalid_argument(
                "client_id",
                "A non-empty client id is required.",
            ));
        }
        Ok(Self::ClientSecret {
            client_id,
            client_secret,
        })
    }

    /// Authenticate with a client assertion JWT
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] if `assertion` is empty.
    pub fn client_assertion(assertion: impl Into<String>) -> Result<Self, ClientError> {
        let assertion = assertion.into();
        if assertion.is_empty() {
            return Err(ClientError::invalid_argument(
                "client_assertion",
                "A non-empty client assertion is required.",
            ));
        }
        Ok(Self::ClientAssertion { assertion })
    }

    /// Build from loosely typed parts, e.g. configuration values
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when neither a client id nor an
    /// assertion is given, or when both are.
    pub fn from_parts(
        client_id: Option<String>,
        client_secret: Option<SecretString>,
        client_assertion: Option<String>,
    ) -> Result<Self, ClientError> {
        match (client_id, client_assertion) {
            (Some(id), None) => Self::client_secret(id, client_secret),
            (None, Some(assertion)) => Self::client_assertion(assertion),
            (Some(_), Some(_)) => Err(ClientError::invalid_argument(
                "client_assertion",
                "Expected either a client assertion jwt or a client id and secret, not both.",
            )),
            (None, None) => Err(ClientError::invalid_argument(
                "client_assertion",
                "Expected a valid client assertion jwt or client id and secret.",
            )),
        }
    }

    /// Client identifier, if authenticating by id
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::ClientSecret { client_id, .. } => Some(client_id),
            Self::ClientAssertion { .. } => None,
        }
    }

    pub(crate) fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ClientSecret {
                client_id,
                client_secret,
            } => {
                let mut fields = vec![("client_id", client_id.clone())];
                if let Some(secret) = client_secret
                    && !secret.expose_secret().is_empty()
                {
                    fields.push(("client_secret", secret.expose_secret().clone()));
                }
                fields
            }
            Self::ClientAssertion { assertion } => vec![
                (
                    "client_assertion_type",
                    CLIENT_ASSERTION_TYPE_JWT_BEARER.to_string(),
                ),
                ("client_assertion", assertion.clone()),
            ],
        }
    }
}

// Manual Debug impl to keep secrets and assertions out of logs
impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientSecret {
                client_id,
                client_secret,
            } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("client_secret", &client_secret.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Self::ClientAssertion { .. } => f
                .debug_struct("ClientAssertion")
                .field("assertion", &"[REDACTED]")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_secret_fields() {
        let auth =
            ClientAuth::client_secret("client-1", Some(SecretString::new("hunter2".into()))).unwrap();
        assert_eq!(
            auth.form_fields(),
            vec![
                ("client_id", "client-1".to_string()),
                ("client_secret", "hunter2".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_secret_is_omitted() {
        let auth = ClientAuth::client_secret("client-1", Some(SecretString::new(String::new())))
            .unwrap();
        assert_eq!(auth.form_fields(), vec![("client_id", "client-1".to_string())]);
    }

    #[test]
    fn test_client_assertion_fields() {
        let auth = ClientAuth::client_assertion("eyJ.assertion.sig").unwrap();
        let fields = auth.form_fields();
        assert_eq!(fields[0].1, CLIENT_ASSERTION_TYPE_JWT_BEARER);
        assert_eq!(fields[1], ("client_assertion", "eyJ.assertion.sig".to_string()));
        assert_eq!(auth.client_id(), None);
    }

    #[test]
    fn test_from_parts_requires_exactly_one() {
        assert!(matches!(
            ClientAuth::from_parts(None, None, None),
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ClientAuth::from_parts(Some("id".into()), None, Some("jwt".into())),
            Err(ClientError::InvalidArgument { .. })
        ));
        assert!(ClientAuth::from_parts(Some("id".into()), None, None).is_ok());
        assert!(ClientAuth::from_parts(None, None, Some("jwt".into())).is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth =
            ClientAuth::client_secret("client-1", Some(SecretString::new("hunter2".into()))).unwrap();
        let debug = format!("{auth:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
