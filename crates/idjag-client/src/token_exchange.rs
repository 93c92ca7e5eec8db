//! RFC 8693 token exchange: identity assertion → ID-JAG
//!
//! The request is a form POST with the fixed fields
//! `grant_type=urn:ietf:params:oauth:grant-type:token-exchange` and
//! `requested_token_type=urn:ietf:params:oauth:token-type:id-jag`.

use tracing::{debug, error};

use crate::auth::ClientAuth;
use crate::client::{IdJagClient, parse_token_url, require_non_empty};
use crate::error::{ClientError, ExchangeOutcome};
use crate::response::{JwtAuthorizationGrant, OAuthTokenExchangeResponse};
use crate::scope::{Scopes, normalize_scopes};
use crate::types::{GrantType, SubjectTokenType, TokenType};

/// Token exchange request for an ID-JAG
#[derive(Clone)]
pub struct TokenExchangeRequest {
    /// Token endpoint of the user's home authorization server
    pub token_url: String,
    /// Issuer of the authorization server the JAG is meant for
    pub audience: String,
    /// Optional resource indicator (RFC 8707)
    pub resource: Option<String>,
    /// The identity assertion being exchanged
    pub subject_token: String,
    /// What kind of assertion `subject_token` is
    pub subject_token_type: SubjectTokenType,
    /// Requested scopes; absent is sent as an empty `scope`
    pub scopes: Option<Scopes>,
    /// Client authentication at the token endpoint
    pub client_auth: ClientAuth,
}

impl TokenExchangeRequest {
    /// Create a request without resource or scopes
    pub fn new(
        token_url: impl Into<String>,
        audience: impl Into<String>,
        subject_token: impl Into<String>,
        subject_token_type: SubjectTokenType,
        client_auth: ClientAuth,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            audience: audience.into(),
            resource: None,
            subject_token: subject_token.into(),
            subject_token_type,
            scopes: None,
            client_auth,
        }
    }

    /// Set the resource indicator
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the requested scopes
    pub fn with_scopes(mut self, scopes: impl Into<Scopes>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("grant_type", GrantType::TokenExchange.as_urn().to_string()),
            ("requested_token_type", TokenType::IdJag.as_urn().to_string()),
            ("audience", self.audience.clone()),
        ];
        if let Some(resource) = &self.resource {
            fields.push(("resource", resource.clone()));
        }
        fields.push(("scope", normalize_scopes(self.scopes.as_ref())));
        fields.push(("subject_token", self.subject_token.clone()));
        fields.push((
            "subject_token_type",
            self.subject_token_type.token_type().as_urn().to_string(),
        ));
        fields.extend(self.client_auth.form_fields());
        fields
    }
}

// Manual Debug impl to prevent subject token exposure in logs
impl std::fmt::Debug for TokenExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeRequest")
            .field("token_url", &self.token_url)
            .field("audience", &self.audience)
            .field("resource", &self.resource)
            .field("subject_token", &"[REDACTED]")
            .field("subject_token_type", &self.subject_token_type)
            .field("scopes", &self.scopes)
            .field("client_auth", &self.client_auth)
            .finish()
    }
}

impl IdJagClient {
    /// Exchange an identity assertion for an ID-JAG
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArgument`] if `token_url` is not a URL, or
    ///   `audience` / `subject_token` is empty. Nothing is sent.
    /// - [`ClientError::InvalidPayload`] if a 200 response is not a valid token
    ///   exchange response, is not an `id-jag`, or its `token_type` is not `N_A`;
    ///   also if a 400 body is not a valid OAuth error.
    ///
    /// OAuth errors and transport failures are returned as
    /// [`ExchangeOutcome::Error`].
    pub async fn request_id_jag(
        &self,
        request: &TokenExchangeRequest,
    ) -> Result<ExchangeOutcome<JwtAuthorizationGrant>, ClientError> {
        let token_url = parse_token_url(&request.token_url)?;
        require_non_empty("audience", &request.audience, "A valid string is required.")?;
        require_non_empty(
            "subject_token",
            &request.subject_token,
            "A non-empty subject token is required.",
        )?;

        let outcome = self.post_form(&token_url, &request.form_fields()).await?;
        let payload = match outcome {
            ExchangeOutcome::Payload(payload) => payload,
            ExchangeOutcome::Error(error) => return Ok(ExchangeOutcome::Error(error)),
        };

        let grant = OAuthTokenExchangeResponse::from_payload(&payload)
            .and_then(JwtAuthorizationGrant::try_from)
            .inspect_err(|e| {
                error!(token_url = %token_url, error = %e, "Token exchange response violates the ID-JAG contract");
            })?;

        debug!(
            token_url = %token_url,
            audience = %request.audience,
            scope = ?grant.scope,
            expires_in = ?grant.expires_in,
            "Obtained identity assertion authorization grant"
        );

        Ok(ExchangeOutcome::Payload(grant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TokenExchangeRequest {
        TokenExchangeRequest::new(
            "https://idp.example.com/token",
            "https://as.example.com",
            "id-token",
            SubjectTokenType::Saml,
            ClientAuth::client_secret("client-1", None).unwrap(),
        )
    }

    #[test]
    fn test_form_fields_without_resource() {
        let fields = request().form_fields();
        let names: Vec<_> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "grant_type",
                "requested_token_type",
                "audience",
                "scope",
                "subject_token",
                "subject_token_type",
                "client_id",
            ]
        );
        assert!(fields.contains(&("scope", String::new())));
        assert!(fields.contains(&(
            "subject_token_type",
            "urn:ietf:params:oauth:token-type:saml2".to_string()
        )));
    }

    #[test]
    fn test_form_fields_with_resource_and_scopes() {
        let fields = request()
            .with_resource("https://api.example.com")
            .with_scopes(vec!["read", "write"])
            .form_fields();
        assert!(fields.contains(&("resource", "https://api.example.com".to_string())));
        assert!(fields.contains(&("scope", "read write".to_string())));
    }

    #[tokio::test]
    async fn test_empty_audience_is_argument_error() {
        let client = IdJagClient::new().unwrap();
        let mut req = request();
        req.audience = String::new();
        let err = client.request_id_jag(&req).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { argument: "audience", .. }));
    }

    #[tokio::test]
    async fn test_empty_subject_token_is_argument_error() {
        let client = IdJagClient::new().unwrap();
        let mut req = request();
        req.subject_token = String::new();
        let err = client.request_id_jag(&req).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { argument: "subject_token", .. }));
    }

    #[test]
    fn test_debug_redacts_subject_token() {
        let debug = format!("{:?}", request());
        assert!(!debug.contains("id-token"));
    }
}
