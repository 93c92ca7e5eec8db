//! JWKS fetching, caching and issuer-keyed signature verification
//!
//! - **Discovery**: `{issuer}/.well-known/openid-configuration` → `jwks_uri`,
//!   done once per issuer
//! - **TTL cache**: a key set is reused until its TTL elapses
//! - **Key rotation**: an unknown `kid` forces one refresh, rate limited so a
//!   stream of forged `kid`s cannot hammer the provider
//! - **Transport**: HTTPS only, except for loopback hosts; documents larger
//!   than `max_response_size` are refused

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{SignatureVerifier, TokenClaims, VerificationError, check_algorithm, peek_header};
use crate::config::JwksConfig;

/// Subset of the OpenID Provider metadata we need
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        match SystemTime::now().duration_since(self.cached_at) {
            Ok(age) => age < self.ttl,
            Err(_) => false, // Clock went backwards
        }
    }
}

/// Fetches and caches one JWKS endpoint
#[derive(Debug)]
pub struct JwksClient {
    jwks_uri: String,
    cache: RwLock<Option<CachedJwks>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    max_response_size: usize,
    last_refresh: RwLock<Option<SystemTime>>,
}

impl JwksClient {
    /// Create a client for `jwks_uri`
    pub fn new(jwks_uri: String, http_client: reqwest::Client, config: &JwksConfig) -> Self {
        Self {
            jwks_uri,
            cache: RwLock::new(None),
            http_client,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            min_refresh_interval: Duration::from_secs(config.min_refresh_interval_secs),
            max_response_size: config.max_response_size,
            last_refresh: RwLock::new(None),
        }
    }

    /// JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Key set from cache, fetching when missing or expired
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::KeyRetrieval`] if the endpoint is not HTTPS,
    /// unreachable, or does not return a JWK set.
    pub async fn get_jwks(&self) -> Result<JwkSet, VerificationError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_valid()
            {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// Fetch the key set ignoring the cache, unless the last fetch was too recent
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::get_jwks`].
    pub async fn refresh(&self) -> Result<JwkSet, VerificationError> {
        {
            let last_refresh = self.last_refresh.read().await;
            if let Some(last) = *last_refresh
                && let Ok(since_last) = SystemTime::now().duration_since(last)
                && since_last < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = since_last.as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return self.get_jwks().await;
            }
        }

        self.fetch_and_cache().await
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, VerificationError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let jwks: JwkSet =
            fetch_json(&self.http_client, &self.jwks_uri, self.max_response_size).await?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Successfully fetched JWKS"
        );

        let now = SystemTime::now();
        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            cached_at: now,
            ttl: self.cache_ttl,
        });
        *self.last_refresh.write().await = Some(now);

        Ok(jwks)
    }

    /// Drop the cached key set
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }
}

/// [`SignatureVerifier`] resolving keys through each issuer's JWKS
///
/// One [`JwksClient`] per issuer, created on first use via discovery or
/// registered up front with [`JwksVerifier::register`].
#[derive(Debug)]
pub struct JwksVerifier {
    clients: RwLock<HashMap<String, Arc<JwksClient>>>,
    http_client: reqwest::Client,
    config: JwksConfig,
}

impl JwksVerifier {
    /// Create a verifier sharing `http_client` for discovery and JWKS fetches
    pub fn new(http_client: reqwest::Client, config: JwksConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            http_client,
            config,
        }
    }

    /// Register a known JWKS URI for `issuer`, skipping discovery
    pub async fn register(&self, issuer: impl Into<String>, jwks_uri: impl Into<String>) {
        let client = Arc::new(JwksClient::new(
            jwks_uri.into(),
            self.http_client.clone(),
            &self.config,
        ));
        self.clients.write().await.insert(issuer.into(), client);
    }

    /// JWKS client for `issuer`, discovering its `jwks_uri` on first use
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::KeyRetrieval`] if discovery fails.
    pub async fn client_for_issuer(&self, issuer: &str) -> Result<Arc<JwksClient>, VerificationError> {
        if let Some(client) = self.clients.read().await.get(issuer) {
            return Ok(Arc::clone(client));
        }

        let jwks_uri = self.discover_jwks_uri(issuer).await?;
        let client = Arc::new(JwksClient::new(jwks_uri, self.http_client.clone(), &self.config));

        let mut clients = self.clients.write().await;
        Ok(Arc::clone(clients.entry(issuer.to_string()).or_insert(client)))
    }

    async fn discover_jwks_uri(&self, issuer: &str) -> Result<String, VerificationError> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        debug!(issuer, discovery_url = %discovery_url, "Performing OIDC discovery");

        let document: DiscoveryDocument =
            fetch_json(&self.http_client, &discovery_url, self.config.max_response_size).await?;

        info!(issuer, jwks_uri = %document.jwks_uri, "Discovered JWKS URI");
        Ok(document.jwks_uri)
    }

    async fn find_key(
        &self,
        client: &JwksClient,
        kid: Option<&str>,
    ) -> Result<Jwk, VerificationError> {
        let jwks = client.get_jwks().await?;
        if let Some(jwk) = select_key(&jwks, kid) {
            return Ok(jwk.clone());
        }

        // Possibly rotated since we cached
        let jwks = client.refresh().await?;
        select_key(&jwks, kid).cloned().ok_or_else(|| {
            error!(jwks_uri = %client.jwks_uri(), kid = ?kid, "No matching key in JWKS");
            VerificationError::KeyNotFound(match kid {
                Some(kid) => format!("key id '{kid}' not found"),
                None => "token has no kid and the key set is ambiguous".to_string(),
            })
        })
    }
}

#[async_trait]
impl SignatureVerifier for JwksVerifier {
    async fn verify(&self, issuer: &str, token: &str) -> Result<TokenClaims, VerificationError> {
        let header = peek_header(token)?;
        check_algorithm(&header)?;

        let client = self.client_for_issuer(issuer).await?;
        let jwk = self.find_key(&client, header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| VerificationError::KeyNotFound(format!("unusable JWK: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
            warn!(issuer, kid = ?header.kid, error = %e, "JWT signature verification failed");
            VerificationError::Invalid(e.to_string())
        })?;

        debug!(issuer, kid = ?header.kid, algorithm = ?header.alg, "JWT signature verified");
        Ok(data.claims)
    }
}

/// Key matching `kid`, or the only key when the token carries none
fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
}

/// HTTPS, or plain HTTP to a loopback host
fn is_allowed_endpoint(url: &Url) -> bool {
    match url.scheme() {
        "https" => true,
        "http" => matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]")
        ),
        _ => false,
    }
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    http_client: &reqwest::Client,
    url: &str,
    max_response_size: usize,
) -> Result<T, VerificationError> {
    let parsed = Url::parse(url)
        .map_err(|e| VerificationError::KeyRetrieval(format!("invalid URL '{url}': {e}")))?;
    if !is_allowed_endpoint(&parsed) {
        return Err(VerificationError::KeyRetrieval(format!(
            "'{url}' must use HTTPS (HTTP only allowed for loopback)"
        )));
    }

    let mut response = http_client.get(parsed).send().await.map_err(|e| {
        error!(url, error = %e, "Key endpoint request failed");
        VerificationError::KeyRetrieval(format!("request to '{url}' failed: {e}"))
    })?;

    if !response.status().is_success() {
        error!(url, status = %response.status(), "Key endpoint returned error status");
        return Err(VerificationError::KeyRetrieval(format!(
            "'{url}' returned status {}",
            response.status()
        )));
    }

    let too_large = || {
        error!(url, limit = max_response_size, "Key endpoint response too large");
        VerificationError::KeyRetrieval(format!(
            "document from '{url}' exceeds {max_response_size} bytes"
        ))
    };

    if let Some(length) = response.content_length()
        && length > max_response_size as u64
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        error!(url, error = %e, "Failed to read key endpoint response");
        VerificationError::KeyRetrieval(format!("reading '{url}' failed: {e}"))
    })? {
        if body.len() + chunk.len() > max_response_size {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    serde_json::from_slice::<T>(&body).map_err(|e| {
        error!(url, error = %e, "Key endpoint returned invalid JSON");
        VerificationError::KeyRetrieval(format!("invalid document from '{url}': {e}"))
    })
}
