//! Grant types, token types and other registered URNs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// `client_assertion_type` for JWT client authentication (RFC 7523 Section 2.2)
pub const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// JOSE `typ` header value carried by every ID-JAG
pub const ID_JAG_JWT_TYP: &str = "oauth-id-jag+jwt";

/// OAuth grant types handled by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    /// RFC 7523 JWT bearer assertion grant
    #[serde(rename = "urn:ietf:params:oauth:grant-type:jwt-bearer")]
    JwtBearer,
    /// RFC 8693 token exchange
    #[serde(rename = "urn:ietf:params:oauth:grant-type:token-exchange")]
    TokenExchange,
}

impl GrantType {
    /// Registered URN of this grant type
    pub const fn as_urn(self) -> &'static str {
        match self {
            Self::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
            Self::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
        }
    }

    /// Parse a grant type URN
    pub fn from_urn(urn: &str) -> Option<Self> {
        match urn {
            "urn:ietf:params:oauth:grant-type:jwt-bearer" => Some(Self::JwtBearer),
            "urn:ietf:params:oauth:grant-type:token-exchange" => Some(Self::TokenExchange),
            _ => None,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}

/// Token type identifiers (RFC 8693 Section 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// OAuth 2.0 access token
    #[serde(rename = "urn:ietf:params:oauth:token-type:access_token")]
    AccessToken,
    /// OIDC ID Token
    #[serde(rename = "urn:ietf:params:oauth:token-type:id_token")]
    IdToken,
    /// SAML 2.0 assertion
    #[serde(rename = "urn:ietf:params:oauth:token-type:saml2")]
    Saml2,
    /// Earlier name of the identity assertion authorization grant
    #[serde(rename = "urn:ietf:params:oauth:token-type:jwt-authorization-grant")]
    JwtAuthorizationGrant,
    /// Identity Assertion Authorization Grant
    #[serde(rename = "urn:ietf:params:oauth:token-type:id-jag")]
    IdJag,
    /// `token_type` value for tokens that are not access tokens
    #[serde(rename = "N_A")]
    NotApplicable,
}

impl TokenType {
    /// Wire value of this token type
    pub const fn as_urn(self) -> &'static str {
        match self {
            Self::AccessToken => "urn:ietf:params:oauth:token-type:access_token",
            Self::IdToken => "urn:ietf:params:oauth:token-type:id_token",
            Self::Saml2 => "urn:ietf:params:oauth:token-type:saml2",
            Self::JwtAuthorizationGrant => "urn:ietf:params:oauth:token-type:jwt-authorization-grant",
            Self::IdJag => "urn:ietf:params:oauth:token-type:id-jag",
            Self::NotApplicable => "N_A",
        }
    }

    /// Parse a token type from its wire value
    pub fn from_urn(urn: &str) -> Option<Self> {
        [
            Self::AccessToken,
            Self::IdToken,
            Self::Saml2,
            Self::JwtAuthorizationGrant,
            Self::IdJag,
            Self::NotApplicable,
        ]
        .into_iter()
        .find(|t| t.as_urn() == urn)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}

/// Kind of identity assertion presented as the token exchange `subject_token`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectTokenType {
    /// OIDC ID Token, sent as `...:token-type:id_token`
    Oidc,
    /// SAML assertion, sent as `...:token-type:saml2`
    Saml,
}

impl SubjectTokenType {
    /// Token type URN sent as `subject_token_type`
    pub const fn token_type(self) -> TokenType {
        match self {
            Self::Oidc => TokenType::IdToken,
            Self::Saml => TokenType::Saml2,
        }
    }
}

impl FromStr for SubjectTokenType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oidc" => Ok(Self::Oidc),
            "saml" => Ok(Self::Saml),
            _ => Err(ClientError::invalid_argument(
                "subject_token_type",
                "A valid subject token type ('oidc' or 'saml') is required.",
            )),
        }
    }
}
