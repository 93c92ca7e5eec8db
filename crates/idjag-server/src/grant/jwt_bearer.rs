//! JAG issuance: jwt-bearer grant presenting an ID-JAG
//!
//! Gates run in order and the first failure rejects the request. Gates 1-3
//! read the assertion WITHOUT verifying it, only to pick the provider whose
//! keys verify it in gate 4. Every later gate reads the verified claims.
//!
//! 1. `assertion` present
//! 2. header `typ` is `oauth-id-jag+jwt`
//! 3. `iss` belongs to a configured provider
//! 4. signature verifies against that provider's JWKS (`invalid_signature`)
//! 5. `iat` no older than the tolerance, `exp` in the future
//! 6. `client_id` is the authenticated client
//! 7. `aud` is this server's issuer
//! 8. scope = requested ∩ IdP-authorized
//! 9. mint the access token for `provider:sub`

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use idjag_client::GrantType;
use idjag_client::types::ID_JAG_JWT_TYP;
use tracing::{debug, info, warn};

use super::{AccessTokenResponse, GrantContext, GrantHandler, TokenResponse};
use crate::config::ServerConfig;
use crate::error::{GrantError, GrantResult};
use crate::issuer::{AccessTokenIssuer, AccessTokenRequest};
use crate::jwt::{SignatureVerifier, peek_claims, peek_header};
use crate::resource::ResourceIndicators;
use crate::scope::intersect_scopes;

/// Handler for `urn:ietf:params:oauth:grant-type:jwt-bearer` with ID-JAG assertions
#[derive(Debug)]
pub struct JagIssuanceHandler {
    config: Arc<ServerConfig>,
    verifier: Arc<dyn SignatureVerifier>,
    resources: Arc<dyn ResourceIndicators>,
    tokens: Arc<dyn AccessTokenIssuer>,
}

impl JagIssuanceHandler {
    /// Create the handler
    pub fn new(
        config: Arc<ServerConfig>,
        verifier: Arc<dyn SignatureVerifier>,
        resources: Arc<dyn ResourceIndicators>,
        tokens: Arc<dyn AccessTokenIssuer>,
    ) -> Self {
        Self {
            config,
            verifier,
            resources,
            tokens,
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl GrantHandler for JagIssuanceHandler {
    fn grant_type(&self) -> GrantType {
        GrantType::JwtBearer
    }

    fn parameters(&self) -> &'static [&'static str] {
        &["assertion", "scope"]
    }

    async fn handle(&self, ctx: &GrantContext) -> GrantResult<TokenResponse> {
        let assertion = ctx.require("assertion")?;

        // Unverified from here until the signature check
        let header = peek_header(assertion)
            .map_err(|e| GrantError::invalid_grant(format!("assertion is not a valid JWT: {e}")))?;
        if header.typ.as_deref() != Some(ID_JAG_JWT_TYP) {
            return Err(GrantError::invalid_grant(format!(
                "invalid JWT type, expected typ: {ID_JAG_JWT_TYP}"
            )));
        }

        let unverified = peek_claims(assertion)
            .map_err(|e| GrantError::invalid_grant(format!("assertion is not a valid JWT: {e}")))?;
        let issuer = unverified.iss.as_deref().unwrap_or_default();
        let (tenant, provider) = self.config.provider_by_issuer(issuer).ok_or_else(|| {
            GrantError::invalid_grant("Issuer of this JWT does not match a configured OIDC provider")
        })?;

        let claims = self.verifier.verify(issuer, assertion).await.map_err(|e| {
            warn!(issuer, tenant, error = %e, "ID-JAG signature rejected");
            GrantError::InvalidSignature("JWT signature is invalid".to_string())
        })?;
        // Verified

        let now = unix_now();
        let tolerance = self.config.validation.iat_tolerance_secs as i64;
        let (Some(iat), Some(exp)) = (claims.iat, claims.exp) else {
            return Err(GrantError::invalid_grant("JWT must contain iat and exp claims"));
        };
        if iat < now - tolerance {
            return Err(GrantError::invalid_grant(format!(
                "JWT (iat={iat}) is not yet valid (now={now}, now-{tolerance}={})",
                now - tolerance
            )));
        }
        if now >= exp {
            return Err(GrantError::invalid_grant("JWT has expired"));
        }

        if claims.client_id.as_deref() != Some(ctx.client_id.as_str()) {
            return Err(GrantError::invalid_grant(
                "The authorized party (client_id) in this JWT does not match the client authentication of this request",
            ));
        }

        if claims.audience() != Some(self.config.issuer.as_str()) {
            return Err(GrantError::invalid_grant(
                "The audience does not match this server's issuer URL",
            ));
        }

        let subject = claims
            .sub
            .as_deref()
            .ok_or_else(|| GrantError::invalid_grant("JWT must contain a sub claim"))?;

        let scope = intersect_scopes(ctx.param("scope"), claims.scope.as_deref()).join(" ");
        debug!(
            requested = ?ctx.param("scope"),
            authorized = ?claims.scope,
            issued = %scope,
            "Computed scope intersection"
        );

        let resource = self
            .resources
            .default_resource(&ctx.client_id)
            .ok_or_else(|| {
                warn!(client_id = %ctx.client_id, "No resource configured for client");
                GrantError::Server(format!("no resource configured for client '{}'", ctx.client_id))
            })?;
        let resource = self.resources.resource_server_info(&ctx.client_id, &resource);

        let account_id = format!("{}:{subject}", provider.name);
        let issued = self
            .tokens
            .issue(AccessTokenRequest {
                account_id: account_id.clone(),
                client_id: ctx.client_id.clone(),
                scope,
                resource,
            })
            .await?;

        info!(
            account_id = %account_id,
            client_id = %ctx.client_id,
            tenant,
            scope = %issued.scope,
            "Issued access token for ID-JAG"
        );

        Ok(TokenResponse::AccessToken(AccessTokenResponse {
            access_token: issued.token,
            expires_in: issued.expires_in,
            scope: issued.scope,
            token_type: issued.token_type,
        }))
    }
}
