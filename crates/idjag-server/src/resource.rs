//! Resource indicators (RFC 8707)
//!
//! Resolves which resource server an access token is minted for, and that
//! resource server's token policy.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ServerConfig;

/// Access token lifetime granted to every resource server by default
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 2 * 60 * 60;

/// Scopes a resource server accepts by default
pub const DEFAULT_RESOURCE_SCOPE: &str = "read write";

/// Access token encoding for a resource server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTokenFormat {
    /// Self-contained signed JWT
    Jwt,
}

/// Token policy of a resource server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceServerInfo {
    /// Scopes the resource server accepts
    pub scope: String,
    /// `aud` of tokens for this resource server
    pub audience: String,
    /// Access token lifetime in seconds
    #[serde(rename = "accessTokenTTL")]
    pub access_token_ttl: u64,
    /// Access token encoding
    pub access_token_format: AccessTokenFormat,
}

/// Resolves resource indicators for clients
pub trait ResourceIndicators: Send + Sync + std::fmt::Debug {
    /// Resource to use when the client did not name one
    fn default_resource(&self, client_id: &str) -> Option<String>;

    /// Token policy for `resource`
    fn resource_server_info(&self, client_id: &str, resource: &str) -> ResourceServerInfo;
}

/// [`ResourceIndicators`] backed by static configuration
///
/// Every resource gets [`DEFAULT_RESOURCE_SCOPE`], a two hour JWT access token
/// and itself as audience.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceIndicators {
    client_resources: BTreeMap<String, String>,
    fallback: Option<String>,
}

impl StaticResourceIndicators {
    /// Build from each client's configured resource and the server default
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            client_resources: config
                .clients
                .iter()
                .filter_map(|(client_id, client)| {
                    client.resource.clone().map(|resource| (client_id.clone(), resource))
                })
                .collect(),
            fallback: config.default_resource.clone(),
        }
    }

    /// Set the resource for one client
    pub fn with_client_resource(mut self, client_id: impl Into<String>, resource: impl Into<String>) -> Self {
        self.client_resources.insert(client_id.into(), resource.into());
        self
    }

    /// Set the resource for clients without one
    pub fn with_fallback(mut self, resource: impl Into<String>) -> Self {
        self.fallback = Some(resource.into());
        self
    }
}

impl ResourceIndicators for StaticResourceIndicators {
    fn default_resource(&self, client_id: &str) -> Option<String> {
        self.client_resources
            .get(client_id)
            .cloned()
            .or_else(|| self.fallback.clone())
    }

    fn resource_server_info(&self, _client_id: &str, resource: &str) -> ResourceServerInfo {
        ResourceServerInfo {
            scope: DEFAULT_RESOURCE_SCOPE.to_string(),
            audience: resource.to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            access_token_format: AccessTokenFormat::Jwt,
        }
    }
}
