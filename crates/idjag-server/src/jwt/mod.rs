//! JWT inspection and signature verification
//!
//! Assertions are inspected in two phases. [`peek_header`] and [`peek_claims`]
//! read a token WITHOUT verifying it, only to decide which keys to verify
//! with. Nothing read that way may be trusted until a [`SignatureVerifier`]
//! has returned the verified claims.

pub mod jwks;
pub mod local;

use std::fmt;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Header, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use jwks::{JwksClient, JwksVerifier};
pub use local::LocalTokenVerifier;

/// Only asymmetric algorithms are accepted for inbound tokens
pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Claims read from an assertion or subject token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience, a string or an array of strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,
    /// Client the grant was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Space-delimited scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Issued at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Token id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Any other claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// `aud` when it is a single string
    pub fn audience(&self) -> Option<&str> {
        self.aud.as_ref().and_then(Value::as_str)
    }
}

/// Why a token could not be verified
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    /// Not a compact JWS, or header/claims do not decode
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Algorithm outside [`ALLOWED_ALGORITHMS`]
    #[error("algorithm {0:?} not allowed")]
    UnsupportedAlgorithm(Algorithm),

    /// No key in the issuer's set matches the token
    #[error("no matching key: {0}")]
    KeyNotFound(String),

    /// Discovery or JWKS endpoint failed
    #[error("key retrieval failed: {0}")]
    KeyRetrieval(String),

    /// Signature or registered-claim check failed
    #[error("verification failed: {0}")]
    Invalid(String),
}

/// Verifies a token's signature against the published keys of its issuer
#[async_trait]
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Verify `token` as issued by `issuer` and return its claims
    ///
    /// Only the signature, algorithm and `iss` are checked; time and audience
    /// checks are the caller's.
    async fn verify(&self, issuer: &str, token: &str) -> Result<TokenClaims, VerificationError>;
}

/// Decode the JOSE header without verifying anything
///
/// # Errors
///
/// Returns [`VerificationError::Malformed`] if the header does not decode.
pub fn peek_header(token: &str) -> Result<Header, VerificationError> {
    decode_header(token).map_err(|e| VerificationError::Malformed(format!("invalid header: {e}")))
}

/// Decode the claims without verifying the signature
///
/// # Errors
///
/// Returns [`VerificationError::Malformed`] if the token is not three
/// dot-separated parts or the payload is not a JSON object of claims.
pub fn peek_claims(token: &str) -> Result<TokenClaims, VerificationError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(VerificationError::Malformed("expected three parts".to_string())),
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| VerificationError::Malformed(format!("invalid payload encoding: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| VerificationError::Malformed(format!("invalid claims: {e}")))
}

/// Reject algorithms outside [`ALLOWED_ALGORITHMS`]
pub(crate) fn check_algorithm(header: &Header) -> Result<(), VerificationError> {
    if ALLOWED_ALGORITHMS.contains(&header.alg) {
        Ok(())
    } else {
        Err(VerificationError::UnsupportedAlgorithm(header.alg))
    }
}
