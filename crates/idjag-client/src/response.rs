//! Token endpoint success responses
//!
//! Each type is validated as it is constructed from the JSON body. A body that
//! does not satisfy the RFC is a [`ClientError::InvalidPayload`]; there is no
//! partially valid value.

use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;
use crate::types::TokenType;

/// Which document a payload violation is reported against
#[derive(Debug, Clone, Copy)]
enum Reference {
    Rfc6749,
    Rfc7523,
    Rfc8693,
    IdJagDraft,
}

impl Reference {
    fn violation(self, field: &str, requirement: &str, payload: &Value) -> ClientError {
        let message = match self {
            Self::Rfc6749 => format!(
                "The field '{field}' {requirement} per RFC6749. See https://datatracker.ietf.org/doc/html/rfc6749#section-5.1."
            ),
            Self::Rfc7523 => format!(
                "The field '{field}' {requirement} per RFC7523. See https://datatracker.ietf.org/doc/html/rfc7523#section-2.1."
            ),
            Self::Rfc8693 => format!(
                "The field '{field}' {requirement} per RFC8693. See https://datatracker.ietf.org/doc/html/rfc8693#section-2.2.1."
            ),
            Self::IdJagDraft => format!(
                "The field '{field}' {requirement} per the Identity Assertion Authorization Grant draft, Section 5.2."
            ),
        };
        ClientError::invalid_payload(message, Some(payload))
    }
}

fn required_string(payload: &Value, field: &str, reference: Reference) -> Result<String, ClientError> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(reference.violation(field, "must be present and a valid value", payload)),
    }
}

/// Optional string that is dropped rather than rejected when malformed
fn lenient_string(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Optional positive lifetime that is dropped rather than rejected when malformed
fn lenient_expires_in(payload: &Value) -> Option<u64> {
    payload
        .get("expires_in")
        .and_then(whole_seconds)
        .filter(|secs| *secs > 0)
}

/// Non-negative whole number of seconds, written as an integer or as `3600.0`
fn whole_seconds(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| *secs >= 0.0 && secs.fract() == 0.0)
            .map(|secs| secs as u64)
    })
}

fn ensure_object(payload: &Value, reference: Reference) -> Result<(), ClientError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(reference.violation("access_token", "must be present and a valid value", payload))
    }
}

/// Generic RFC 8693 token exchange response (Section 2.2.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthTokenExchangeResponse {
    /// Issued token
    pub access_token: String,
    /// Token type URN of the issued token
    pub issued_token_type: String,
    /// How the token may be used (`Bearer`, `N_A`, ...)
    pub token_type: String,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl OAuthTokenExchangeResponse {
    /// Validate a token exchange success body
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPayload`] if `access_token`,
    /// `issued_token_type` or `token_type` is missing or not a string.
    pub fn from_payload(payload: &Value) -> Result<Self, ClientError> {
        ensure_object(payload, Reference::Rfc8693)?;
        Ok(Self {
            access_token: required_string(payload, "access_token", Reference::Rfc8693)?,
            issued_token_type: required_string(payload, "issued_token_type", Reference::Rfc8693)?,
            token_type: required_string(payload, "token_type", Reference::Rfc8693)?,
            scope: lenient_string(payload, "scope"),
            expires_in: lenient_expires_in(payload),
            refresh_token: lenient_string(payload, "refresh_token"),
        })
    }
}

/// Identity Assertion Authorization Grant as returned by a token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtAuthorizationGrant {
    /// The grant JWT itself
    pub access_token: String,
    /// `id-jag`, or the older `jwt-authorization-grant`
    pub issued_token_type: TokenType,
    /// Always `N_A`; a JAG is not an access token
    pub token_type: TokenType,
    /// Scope carried by the grant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl JwtAuthorizationGrant {
    /// Validate a JAG body directly
    ///
    /// Accepts either grant token type URN. `scope` and `expires_in` are checked
    /// strictly: when present they must be a string and a non-negative number.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPayload`] on any field violation.
    pub fn from_payload(payload: &Value) -> Result<Self, ClientError> {
        ensure_object(payload, Reference::Rfc8693)?;
        let access_token = required_string(payload, "access_token", Reference::Rfc8693)?;

        let issued_token_type = match payload
            .get("issued_token_type")
            .and_then(Value::as_str)
            .and_then(TokenType::from_urn)
        {
            Some(t @ (TokenType::IdJag | TokenType::JwtAuthorizationGrant)) => t,
            _ => {
                return Err(Reference::Rfc8693.violation(
                    "issued_token_type",
                    &format!("must be present and have the value '{}'", TokenType::IdJag),
                    payload,
                ));
            }
        };

        if payload.get("token_type").and_then(Value::as_str) != Some(TokenType::NotApplicable.as_urn()) {
            return Err(Reference::Rfc8693.violation(
                "token_type",
                &format!("must be present and have the value '{}'", TokenType::NotApplicable),
                payload,
            ));
        }

        let scope = match payload.get("scope") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(Reference::Rfc8693.violation("scope", "must be a valid string", payload));
            }
        };

        let expires_in = match payload.get("expires_in") {
            None | Some(Value::Null) => None,
            Some(value) => match whole_seconds(value) {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => {
                    return Err(Reference::Rfc8693.violation(
                        "expires_in",
                        "must be a valid positive number",
                        payload,
                    ));
                }
            },
        };

        Ok(Self {
            access_token,
            issued_token_type,
            token_type: TokenType::NotApplicable,
            scope,
            expires_in,
        })
    }
}

impl TryFrom<OAuthTokenExchangeResponse> for JwtAuthorizationGrant {
    type Error = ClientError;

    /// Narrow a generic token exchange response to a JAG
    ///
    /// `issued_token_type` must be `id-jag` and `token_type` must be `N_A`
    /// (compared case-insensitively).
    fn try_from(response: OAuthTokenExchangeResponse) -> Result<Self, Self::Error> {
        if TokenType::from_urn(&response.issued_token_type) != Some(TokenType::IdJag) {
            let payload = serde_json::to_value(&response).unwrap_or(Value::Null);
            return Err(Reference::IdJagDraft.violation(
                "issued_token_type",
                &format!("must have the value '{}'", TokenType::IdJag),
                &payload,
            ));
        }

        if !response
            .token_type
            .eq_ignore_ascii_case(TokenType::NotApplicable.as_urn())
        {
            let payload = serde_json::to_value(&response).unwrap_or(Value::Null);
            return Err(Reference::IdJagDraft.violation(
                "token_type",
                &format!("must have the value '{}'", TokenType::NotApplicable),
                &payload,
            ));
        }

        Ok(Self {
            access_token: response.access_token,
            issued_token_type: TokenType::IdJag,
            token_type: TokenType::NotApplicable,
            scope: response.scope,
            expires_in: response.expires_in,
        })
    }
}

/// Access token response of the jwt-bearer grant (RFC 6749 Section 5.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthAccessTokenResponse {
    /// Issued access token
    pub access_token: String,
    /// Token type as sent by the server; always some casing of `bearer`
    pub token_type: String,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl OAuthAccessTokenResponse {
    /// Validate a jwt-bearer success body
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPayload`] if `access_token` is missing or
    /// `token_type` is not `bearer` (case-insensitive).
    pub fn from_payload(payload: &Value) -> Result<Self, ClientError> {
        ensure_object(payload, Reference::Rfc6749)?;
        let access_token = required_string(payload, "access_token", Reference::Rfc6749)?;

        let token_type = payload
            .get("token_type")
            .and_then(Value::as_str)
            .filter(|t| t.eq_ignore_ascii_case("bearer"))
            .map(String::from)
            .ok_or_else(|| {
                Reference::Rfc7523.violation("token_type", "must have the value 'bearer'", payload)
            })?;

        Ok(Self {
            access_token,
            token_type,
            scope: lenient_string(payload, "scope"),
            expires_in: lenient_expires_in(payload),
            refresh_token: lenient_string(payload, "refresh_token"),
        })
    }
}
