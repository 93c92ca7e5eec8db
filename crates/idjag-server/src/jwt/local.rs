//! Verification of tokens issued by this server

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::{debug, warn};

use super::{TokenClaims, VerificationError, check_algorithm, peek_header};

/// Verifies ID tokens signed with this server's own key
///
/// Checks signature, `iss` and `exp`. Audience is not checked: subject
/// tokens are presented by any of this server's clients.
#[derive(Clone)]
pub struct LocalTokenVerifier {
    issuer: String,
    key: DecodingKey,
    algorithm: Algorithm,
}

impl LocalTokenVerifier {
    /// Verifier for RS256 tokens from an RSA public key in PEM form
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::KeyNotFound`] if the PEM does not hold an
    /// RSA public key.
    pub fn from_rsa_pem(issuer: impl Into<String>, pem: &[u8]) -> Result<Self, VerificationError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| VerificationError::KeyNotFound(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            issuer: issuer.into(),
            key,
            algorithm: Algorithm::RS256,
        })
    }

    /// Expected issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a locally issued token
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] if the token is malformed, uses another
    /// algorithm, has a bad signature, is expired, or has a different issuer.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerificationError> {
        let header = peek_header(token)?;
        check_algorithm(&header)?;
        if header.alg != self.algorithm {
            return Err(VerificationError::UnsupportedAlgorithm(header.alg));
        }

        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;

        let data = decode::<TokenClaims>(token, &self.key, &validation).map_err(|e| {
            warn!(issuer = %self.issuer, error = %e, "Local token verification failed");
            VerificationError::Invalid(e.to_string())
        })?;

        debug!(issuer = %self.issuer, subject = ?data.claims.sub, "Local token verified");
        Ok(data.claims)
    }
}

impl std::fmt::Debug for LocalTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTokenVerifier")
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
