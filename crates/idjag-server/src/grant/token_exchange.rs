//! Token exchange: local subject token → ID-JAG from the user's home IdP
//!
//! The caller presents an ID token issued by this server. Its `sub` has the
//! form `tenant:idp-subject`; the tenant selects the partner provider, and the
//! identity assertion cached at login for `(sub, provider client_id)` is
//! exchanged at that provider's token endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use idjag_client::{
    ClientAuth, ClientError, ExchangeOutcome, GrantType, IdJagClient, SubjectTokenType,
    TokenExchangeRequest, TokenType,
};
use tracing::{debug, error, info, warn};

use super::{GrantContext, GrantHandler, TokenResponse};
use crate::cache::AssertionStore;
use crate::config::{ProviderConfig, ServerConfig};
use crate::error::{GrantError, GrantResult};
use crate::jwt::LocalTokenVerifier;

/// Separates the tenant key from the IdP subject in local `sub` values
pub const TENANT_DELIMITER: char = ':';

/// Handler for `urn:ietf:params:oauth:grant-type:token-exchange`
#[derive(Debug)]
pub struct TokenExchangeHandler {
    config: Arc<ServerConfig>,
    subject_verifier: LocalTokenVerifier,
    assertions: Arc<dyn AssertionStore>,
    client: IdJagClient,
}

impl TokenExchangeHandler {
    /// Create the handler
    pub fn new(
        config: Arc<ServerConfig>,
        subject_verifier: LocalTokenVerifier,
        assertions: Arc<dyn AssertionStore>,
        client: IdJagClient,
    ) -> Self {
        Self {
            config,
            subject_verifier,
            assertions,
            client,
        }
    }

    async fn exchange_for_id_jag(&self, ctx: &GrantContext) -> GrantResult<TokenResponse> {
        let resource = ctx.param("resource");
        let audience = ctx.param("audience").or(resource).ok_or_else(|| {
            GrantError::invalid_request("missing required parameter 'audience' or 'resource'")
        })?;
        let subject_token = ctx.require("subject_token")?;
        // Presence only; the provider's SSO mode decides the upstream type
        ctx.require("subject_token_type")?;

        let claims = self.subject_verifier.verify(subject_token).map_err(|e| {
            warn!(error = %e, "Subject token rejected");
            GrantError::invalid_grant(format!("subject_token is invalid: {e}"))
        })?;
        let subject = claims
            .sub
            .as_deref()
            .ok_or_else(|| GrantError::invalid_grant("subject_token has no sub claim"))?;

        let tenant = subject.split(TENANT_DELIMITER).next().unwrap_or_default();
        let provider = self.config.provider_by_tenant(tenant).ok_or_else(|| {
            GrantError::invalid_grant("Subject of this JWT does not match a configured OIDC provider.")
        })?;

        let assertion = self.assertions.get(subject, &provider.client_id).await;
        if assertion.is_none() {
            warn!(
                subject,
                tenant,
                client_id = %provider.client_id,
                "No cached identity assertion; the partner will reject the exchange"
            );
        }

        let mut request = TokenExchangeRequest::new(
            &provider.token_endpoint,
            audience,
            assertion.map(|a| a.token).unwrap_or_default(),
            subject_token_type(provider),
            provider_auth(provider)?,
        );
        if let Some(resource) = resource {
            request = request.with_resource(resource);
        }
        if let Some(scope) = ctx.param("scope") {
            request = request.with_scopes(scope);
        }

        debug!(tenant, token_endpoint = %provider.token_endpoint, ?request, "Requesting ID-JAG from provider");

        let outcome = self.client.request_id_jag(&request).await.map_err(|e| match e {
            ClientError::InvalidArgument { argument, message } => {
                error!(tenant, argument, %message, "Token exchange request could not be built");
                GrantError::Server(format!("invalid token exchange argument {argument}"))
            }
            other => {
                error!(tenant, error = %other, "Provider token exchange response violates the contract");
                GrantError::Provider {
                    status: None,
                    message: "partner token endpoint returned an invalid response".to_string(),
                }
            }
        })?;

        match outcome {
            ExchangeOutcome::Payload(grant) => {
                info!(
                    subject,
                    tenant,
                    audience,
                    scope = ?grant.scope,
                    "Obtained ID-JAG from provider"
                );
                Ok(TokenResponse::AuthorizationGrant(grant))
            }
            ExchangeOutcome::Error(error) => {
                warn!(tenant, status = ?error.status(), error = %error, "Provider rejected token exchange");
                Err(error.into())
            }
        }
    }
}

fn subject_token_type(provider: &ProviderConfig) -> SubjectTokenType {
    if provider.use_saml_sso {
        SubjectTokenType::Saml
    } else {
        SubjectTokenType::Oidc
    }
}

fn provider_auth(provider: &ProviderConfig) -> GrantResult<ClientAuth> {
    ClientAuth::client_secret(&provider.client_id, provider.client_secret.clone()).map_err(|e| {
        error!(provider = %provider.name, error = %e, "Provider client credentials are unusable");
        GrantError::Server(format!("provider '{}' has unusable client credentials", provider.name))
    })
}

#[async_trait]
impl GrantHandler for TokenExchangeHandler {
    fn grant_type(&self) -> GrantType {
        GrantType::TokenExchange
    }

    fn parameters(&self) -> &'static [&'static str] {
        &[
            "requested_token_type",
            "resource",
            "audience",
            "scope",
            "subject_token",
            "subject_token_type",
        ]
    }

    async fn handle(&self, ctx: &GrantContext) -> GrantResult<TokenResponse> {
        let requested = ctx.param("requested_token_type");
        match requested.and_then(TokenType::from_urn) {
            Some(TokenType::IdJag | TokenType::JwtAuthorizationGrant) => {
                self.exchange_for_id_jag(ctx).await
            }
            _ => Err(GrantError::invalid_grant(format!(
                "requested_token_type '{}' is an unknown or unsupported token type.",
                requested.unwrap_or_default()
            ))),
        }
    }
}
