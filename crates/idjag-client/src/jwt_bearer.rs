//! RFC 7523 jwt-bearer grant: ID-JAG → access token
//!
//! Sent to the resource's authorization server with
//! `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer` and the JAG as
//! `assertion`. No `audience`, `resource` or `subject_token_type` fields.

use tracing::{debug, error};

use crate::auth::ClientAuth;
use crate::client::{IdJagClient, parse_token_url, require_non_empty};
use crate::error::{ClientError, ExchangeOutcome};
use crate::response::OAuthAccessTokenResponse;
use crate::scope::{Scopes, normalize_scopes};
use crate::types::GrantType;

/// Request to redeem an ID-JAG for an access token
#[derive(Clone)]
pub struct JwtBearerRequest {
    /// Token endpoint of the resource's authorization server
    pub token_url: String,
    /// The ID-JAG obtained from the token exchange
    pub authorization_grant: String,
    /// Requested scopes; absent is sent as an empty `scope`
    pub scopes: Option<Scopes>,
    /// Client authentication at the token endpoint
    pub client_auth: ClientAuth,
}

impl JwtBearerRequest {
    /// Create a request without scopes
    pub fn new(
        token_url: impl Into<String>,
        authorization_grant: impl Into<String>,
        client_auth: ClientAuth,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            authorization_grant: authorization_grant.into(),
            scopes: None,
            client_auth,
        }
    }

    /// Set the requested scopes
    pub fn with_scopes(mut self, scopes: impl Into<Scopes>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("grant_type", GrantType::JwtBearer.as_urn().to_string()),
            ("assertion", self.authorization_grant.clone()),
            ("scope", normalize_scopes(self.scopes.as_ref())),
        ];
        fields.extend(self.client_auth.form_fields());
        fields
    }
}

impl std::fmt::Debug for JwtBearerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtBearerRequest")
            .field("token_url", &self.token_url)
            .field("authorization_grant", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("client_auth", &self.client_auth)
            .finish()
    }
}

impl IdJagClient {
    /// Redeem an ID-JAG for an access token
    ///
    /// ```rust,no_run
    /// use idjag_client::{ClientAuth, IdJagClient, JwtBearerRequest};
    ///
    /// # tokio_test::block_on(async {
    /// let client = IdJagClient::new()?;
    /// let request = JwtBearerRequest::new(
    ///     "https://auth.wiki.example.com/oauth2/token",
    ///     "eyJ0eXAiOiJvYXV0aC1pZC1qYWcrand0In0...",
    ///     ClientAuth::client_assertion("eyJhbGciOiJSUzI1NiJ9...")?,
    /// )
    /// .with_scopes("read write");
    ///
    /// let token = client.exchange_id_jag(&request).await?.into_result()?;
    /// println!("access token valid for {:?}s", token.expires_in);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArgument`] if `token_url` is not a URL or
    ///   `authorization_grant` is empty. Nothing is sent.
    /// - [`ClientError::InvalidPayload`] if a 200 response lacks `access_token`
    ///   or its `token_type` is not `bearer`, or a 400 body is not a valid OAuth
    ///   error.
    pub async fn exchange_id_jag(
        &self,
        request: &JwtBearerRequest,
    ) -> Result<ExchangeOutcome<OAuthAccessTokenResponse>, ClientError> {
        let token_url = parse_token_url(&request.token_url)?;
        require_non_empty(
            "authorization_grant",
            &request.authorization_grant,
            "A valid authorization grant is required.",
        )?;

        let outcome = self.post_form(&token_url, &request.form_fields()).await?;
        let payload = match outcome {
            ExchangeOutcome::Payload(payload) => payload,
            ExchangeOutcome::Error(error) => return Ok(ExchangeOutcome::Error(error)),
        };

        let token = OAuthAccessTokenResponse::from_payload(&payload).inspect_err(|e| {
            error!(token_url = %token_url, error = %e, "Access token response violates RFC 6749");
        })?;

        debug!(
            token_url = %token_url,
            scope = ?token.scope,
            expires_in = ?token.expires_in,
            has_refresh_token = token.refresh_token.is_some(),
            "Redeemed authorization grant for access token"
        );

        Ok(ExchangeOutcome::Payload(token))
    }
}
