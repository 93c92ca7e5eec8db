//! Access token minting

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{GrantError, GrantResult};
use crate::resource::ResourceServerInfo;

/// What an access token is minted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRequest {
    /// Account the token acts for, `provider:sub`
    pub account_id: String,
    /// Client the token is issued to
    pub client_id: String,
    /// Granted scopes, space-delimited; may be empty
    pub scope: String,
    /// Resource server the token is for
    pub resource: ResourceServerInfo,
}

/// A minted access token
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedAccessToken {
    /// The token value
    pub token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Always `Bearer`
    pub token_type: String,
    /// Granted scopes
    pub scope: String,
}

impl std::fmt::Debug for IssuedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedAccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Mints (and, if the backend needs it, persists) access tokens
#[async_trait]
pub trait AccessTokenIssuer: Send + Sync + std::fmt::Debug {
    /// Mint a token for `request`
    async fn issue(&self, request: AccessTokenRequest) -> GrantResult<IssuedAccessToken>;
}

/// Claims of a JWT access token (RFC 9068 profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// This server
    pub iss: String,
    /// Account id
    pub sub: String,
    /// Resource server
    pub aud: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Granted scopes
    pub scope: String,
    /// Issued at
    pub iat: u64,
    /// Expiration
    pub exp: u64,
    /// Token id
    pub jti: String,
}

/// [`AccessTokenIssuer`] producing self-contained RS256 JWTs
pub struct JwtAccessTokenIssuer {
    issuer: String,
    encoding_key: EncodingKey,
    key_id: Option<String>,
}

impl JwtAccessTokenIssuer {
    /// Issuer signing with an RSA private key in PEM form
    ///
    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error if the PEM is not an RSA private key.
    pub fn from_rsa_pem(
        issuer: impl Into<String>,
        pem: &[u8],
        key_id: Option<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_rsa_pem(pem)?,
            key_id,
        })
    }
}

impl std::fmt::Debug for JwtAccessTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAccessTokenIssuer")
            .field("issuer", &self.issuer)
            .field("encoding_key", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .finish()
    }
}

#[async_trait]
impl AccessTokenIssuer for JwtAccessTokenIssuer {
    async fn issue(&self, request: AccessTokenRequest) -> GrantResult<IssuedAccessToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let ttl = request.resource.access_token_ttl;

        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: request.account_id,
            aud: request.resource.audience,
            client_id: request.client_id,
            scope: request.scope,
            iat: now,
            exp: now + ttl,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("at+jwt".to_string());
        header.kid.clone_from(&self.key_id);

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            GrantError::Server(format!("failed to sign access token: {e}"))
        })?;

        debug!(
            sub = %claims.sub,
            aud = %claims.aud,
            client_id = %claims.client_id,
            jti = %claims.jti,
            exp = claims.exp,
            "Issued access token"
        );

        Ok(IssuedAccessToken {
            token,
            expires_in: ttl,
            token_type: "Bearer".to_string(),
            scope: claims.scope,
        })
    }
}
