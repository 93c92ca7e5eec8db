//! Grant-type registry and handler contract
//!
//! Each handler declares its grant type URN and the request parameters it
//! reads. The registry dispatches a token request on `grant_type` and hands the
//! handler only the parameters it declared.

pub mod jwt_bearer;
pub mod token_exchange;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use idjag_client::{GrantType, JwtAuthorizationGrant};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GrantError, GrantResult};

pub use jwt_bearer::JagIssuanceHandler;
pub use token_exchange::TokenExchangeHandler;

/// A parsed token request
#[derive(Clone, Default)]
pub struct GrantContext {
    /// Client authenticated for this request
    pub client_id: String,
    params: HashMap<String, String>,
}

impl GrantContext {
    /// Create a context; empty parameter values are treated as absent
    pub fn new<K, V>(client_id: impl Into<String>, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        }
    }

    /// Parameter value, if present
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parameter value, or `invalid_request` naming the missing parameter
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::InvalidRequest`] if the parameter is absent.
    pub fn require(&self, name: &str) -> GrantResult<&str> {
        self.param(name)
            .ok_or_else(|| GrantError::invalid_request(format!("missing required parameter '{name}'")))
    }

    fn retain_params(&mut self, allowed: &[&str]) {
        self.params.retain(|name, _| allowed.contains(&name.as_str()));
    }
}

// Parameter values include assertions and subject tokens
impl fmt::Debug for GrantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.params.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("GrantContext")
            .field("client_id", &self.client_id)
            .field("params", &names)
            .finish()
    }
}

/// Access token response of the jwt-bearer grant
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenResponse {
    /// Issued access token
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Granted scopes; empty if none intersected
    pub scope: String,
    /// Always `Bearer`
    pub token_type: String,
}

impl fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Successful token endpoint response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenResponse {
    /// Access token minted by this server
    AccessToken(AccessTokenResponse),
    /// ID-JAG obtained from a partner authorization server
    AuthorizationGrant(JwtAuthorizationGrant),
}

/// Handler for one grant type
#[async_trait]
pub trait GrantHandler: Send + Sync + fmt::Debug {
    /// Grant type served
    fn grant_type(&self) -> GrantType;

    /// Request parameters the handler reads
    fn parameters(&self) -> &'static [&'static str];

    /// Process a request, returning the response body or an OAuth error
    async fn handle(&self, ctx: &GrantContext) -> GrantResult<TokenResponse>;
}

/// Grant handlers keyed by grant type
#[derive(Debug, Default, Clone)]
pub struct GrantRegistry {
    handlers: HashMap<GrantType, Arc<dyn GrantHandler>>,
}

impl GrantRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler for the same grant type
    pub fn register(&mut self, handler: Arc<dyn GrantHandler>) -> &mut Self {
        debug!(
            grant_type = handler.grant_type().as_urn(),
            parameters = ?handler.parameters(),
            "Registered grant type"
        );
        self.handlers.insert(handler.grant_type(), handler);
        self
    }

    /// Whether a handler serves `grant_type`
    pub fn supports(&self, grant_type: GrantType) -> bool {
        self.handlers.contains_key(&grant_type)
    }

    /// Dispatch a token request on its `grant_type` parameter
    ///
    /// # Errors
    ///
    /// - `invalid_request` if `grant_type` is missing
    /// - `unsupported_grant_type` if no handler is registered for it
    /// - whatever the handler returns
    pub async fn dispatch(&self, mut ctx: GrantContext) -> GrantResult<TokenResponse> {
        let grant_type = ctx.require("grant_type")?.to_string();

        let handler = GrantType::from_urn(&grant_type)
            .and_then(|g| self.handlers.get(&g))
            .ok_or_else(|| {
                warn!(grant_type = %grant_type, client_id = %ctx.client_id, "Unsupported grant type");
                GrantError::UnsupportedGrantType(format!(
                    "grant_type '{grant_type}' is not supported"
                ))
            })?;

        ctx.retain_params(handler.parameters());
        debug!(grant_type = %grant_type, ctx = ?ctx, "Dispatching grant");

        handler.handle(&ctx).await.inspect_err(|e| {
            warn!(
                grant_type = %grant_type,
                client_id = %ctx.client_id,
                error = e.code(),
                description = %e,
                "Grant rejected"
            );
        })
    }
}
