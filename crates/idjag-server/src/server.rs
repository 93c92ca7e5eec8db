//! Wiring of the grant handlers from configuration

use std::path::Path;
use std::sync::Arc;

use idjag_client::IdJagClient;
use tracing::info;

use crate::cache::{AssertionStore, CachedAssertion, InMemoryAssertionStore};
use crate::config::{ConfigError, ServerConfig};
use crate::error::GrantResult;
use crate::grant::{GrantContext, GrantRegistry, JagIssuanceHandler, TokenExchangeHandler, TokenResponse};
use crate::issuer::JwtAccessTokenIssuer;
use crate::jwt::{JwksVerifier, LocalTokenVerifier};
use crate::resource::StaticResourceIndicators;

/// Token endpoint grant engine
///
/// Serves the jwt-bearer (ID-JAG redemption) and token-exchange (ID-JAG
/// request) grants. The surrounding authorization server authenticates the
/// client, parses the form body and renders the returned body or error.
#[derive(Debug, Clone)]
pub struct IdJagServer {
    config: Arc<ServerConfig>,
    registry: GrantRegistry,
    assertions: Arc<dyn AssertionStore>,
}

impl IdJagServer {
    /// Build with an in-memory assertion store
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid, has no signing
    /// keys, or the keys cannot be loaded.
    pub fn from_config(config: ServerConfig) -> Result<Self, ConfigError> {
        Self::with_store(config, Arc::new(InMemoryAssertionStore::new()))
    }

    /// Build with a custom assertion store
    ///
    /// # Errors
    ///
    /// Same as [`IdJagServer::from_config`].
    pub fn with_store(
        config: ServerConfig,
        assertions: Arc<dyn AssertionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let signing = config
            .signing
            .clone()
            .ok_or_else(|| ConfigError::Invalid("signing keys are not configured".to_string()))?;

        let private_pem = read_key(&signing.private_key_path)?;
        let public_pem = read_key(&signing.public_key_path)?;

        let tokens = JwtAccessTokenIssuer::from_rsa_pem(&config.issuer, &private_pem, signing.key_id.clone())
            .map_err(|e| ConfigError::Key {
                path: signing.private_key_path.clone(),
                message: e.to_string(),
            })?;
        let subject_verifier = LocalTokenVerifier::from_rsa_pem(&config.issuer, &public_pem).map_err(|e| {
            ConfigError::Key {
                path: signing.public_key_path.clone(),
                message: e.to_string(),
            }
        })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.http.timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        let verifier = JwksVerifier::new(http.clone(), config.jwks.clone());
        let client = IdJagClient::from_client(http).with_max_response_size(config.http.max_response_size);
        let resources = StaticResourceIndicators::from_config(&config);

        let config = Arc::new(config);
        let mut registry = GrantRegistry::new();
        registry
            .register(Arc::new(JagIssuanceHandler::new(
                Arc::clone(&config),
                Arc::new(verifier),
                Arc::new(resources),
                Arc::new(tokens),
            )))
            .register(Arc::new(TokenExchangeHandler::new(
                Arc::clone(&config),
                subject_verifier,
                Arc::clone(&assertions),
                client,
            )));

        info!(
            issuer = %config.issuer,
            providers = config.providers.len(),
            clients = config.clients.len(),
            "ID-JAG grant engine ready"
        );

        Ok(Self {
            config,
            registry,
            assertions,
        })
    }

    /// Handle a token request for an authenticated client
    ///
    /// # Errors
    ///
    /// Returns the [`GrantError`](crate::GrantError) to render as the OAuth
    /// error response.
    pub async fn token<K, V>(
        &self,
        client_id: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> GrantResult<TokenResponse>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.registry.dispatch(GrantContext::new(client_id, params)).await
    }

    /// Record the identity assertion obtained at SSO login
    pub async fn cache_assertion(&self, subject: &str, client_id: &str, assertion: CachedAssertion) {
        self.assertions.put(subject, client_id, assertion).await;
    }

    /// Loaded configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered grant handlers
    pub fn registry(&self) -> &GrantRegistry {
        &self.registry
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| ConfigError::Key {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
