//! HTTP execution against a token endpoint
//!
//! ## Security Configuration
//!
//! The underlying reqwest client:
//! - does NOT follow redirects (a token endpoint redirect is never legitimate)
//! - applies a bounded request timeout; an elapsed timeout is reported as a
//!   [`NetworkFailure`] with `timed_out = true`
//! - reads at most `max_response_size` bytes of a response body; a larger
//!   body, announced or streamed, is a [`NetworkFailure`]

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, ExchangeError, ExchangeOutcome, HttpResponse, NetworkFailure, OAuthError};

/// Default bound on a single token endpoint call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a token endpoint response body
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Bytes of an unexpected response body kept in [`HttpResponse::body`]
pub const MAX_DIAGNOSTIC_BODY: usize = 4 * 1024;

/// Client for the two ID-JAG token endpoint exchanges
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct IdJagClient {
    http: reqwest::Client,
    max_response_size: usize,
}

impl IdJagClient {
    /// Create a client with redirects disabled and [`DEFAULT_TIMEOUT`]
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::HttpClient`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::HttpClient`] if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self::from_client(http))
    }

    /// Wrap an existing reqwest client
    ///
    /// # Warning
    /// Ensure the client is configured with `redirect::Policy::none()` and a timeout.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self {
            http,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Set the largest response body accepted, in bytes
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// POST a form body and classify the response by status
    ///
    /// - 400: body must be a valid OAuth error, returned as the error branch
    /// - 200: body returned as JSON for the caller to validate
    /// - anything else, or no response at all: transport error branch
    pub(crate) async fn post_form(
        &self,
        token_url: &Url,
        fields: &[(&'static str, String)],
    ) -> Result<ExchangeOutcome<Value>, ClientError> {
        debug!(
            token_url = %token_url,
            fields = ?fields.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            "Sending token endpoint request"
        );

        let response = match self.http.post(token_url.clone()).form(fields).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(token_url = %token_url, error = %e, timed_out = e.is_timeout(), "Token endpoint unreachable");
                return Ok(ExchangeOutcome::Error(ExchangeError::Network(network_failure(
                    token_url, &e,
                ))));
            }
        };

        let status = response.status();
        let url = response.url().to_string();

        if let Some(length) = response.content_length()
            && length > self.max_response_size as u64
        {
            warn!(token_url = %token_url, length, limit = self.max_response_size, "Token endpoint response too large");
            return Ok(ExchangeOutcome::Error(ExchangeError::Network(oversized(
                token_url,
                self.max_response_size,
            ))));
        }

        let body = match read_capped(response, self.max_response_size).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!(token_url = %token_url, limit = self.max_response_size, "Token endpoint response too large");
                return Ok(ExchangeOutcome::Error(ExchangeError::Network(oversized(
                    token_url,
                    self.max_response_size,
                ))));
            }
            Err(e) => {
                warn!(token_url = %token_url, error = %e, "Failed to read token endpoint response");
                return Ok(ExchangeOutcome::Error(ExchangeError::Network(network_failure(
                    token_url, &e,
                ))));
            }
        };

        match status.as_u16() {
            400 => {
                let payload: Value = serde_json::from_slice(&body).map_err(|e| {
                    ClientError::invalid_payload(
                        format!("HTTP 400 response body is not valid JSON: {e}"),
                        None,
                    )
                })?;
                let error = OAuthError::from_payload(&payload)?;
                debug!(token_url = %token_url, error = %error.error, "Token endpoint returned OAuth error");
                Ok(ExchangeOutcome::Error(ExchangeError::OAuth(error)))
            }
            200 => {
                let payload: Value = serde_json::from_slice(&body).map_err(|e| {
                    ClientError::invalid_payload(format!("Response body is not valid JSON: {e}"), None)
                })?;
                Ok(ExchangeOutcome::Payload(payload))
            }
            code => {
                warn!(token_url = %token_url, status = code, "Token endpoint returned unexpected status");
                Ok(ExchangeOutcome::Error(ExchangeError::Http(HttpResponse {
                    url,
                    status: code,
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    body: diagnostic_body(&body),
                })))
            }
        }
    }
}

/// Body bytes up to `limit`, or `None` once the body grows past it
async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body))
}

fn diagnostic_body(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(MAX_DIAGNOSTIC_BODY)]).into_owned()
}

fn oversized(token_url: &Url, limit: usize) -> NetworkFailure {
    NetworkFailure {
        url: token_url.to_string(),
        message: format!("response body exceeds {limit} bytes"),
        timed_out: false,
    }
}

fn network_failure(token_url: &Url, error: &reqwest::Error) -> NetworkFailure {
    NetworkFailure {
        url: token_url.to_string(),
        message: error.to_string(),
        timed_out: error.is_timeout(),
    }
}

/// Validate a caller-supplied token endpoint URL
pub(crate) fn parse_token_url(token_url: &str) -> Result<Url, ClientError> {
    if token_url.is_empty() {
        return Err(ClientError::invalid_argument("token_url", "A valid url is required."));
    }
    Url::parse(token_url)
        .map_err(|e| ClientError::invalid_argument("token_url", format!("A valid url is required. {e}")))
}

pub(crate) fn require_non_empty(
    argument: &'static str,
    value: &str,
    message: &str,
) -> Result<(), ClientError> {
    if value.is_empty() {
        Err(ClientError::invalid_argument(argument, message))
    } else {
        Ok(())
    }
}

impl std::fmt::Debug for IdJagClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdJagClient")
            .field("http", &"<reqwest::Client>")
            .field("max_response_size", &self.max_response_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(IdJagClient::new().is_ok());
        assert!(IdJagClient::with_timeout(Duration::from_millis(250)).is_ok());
    }

    #[test]
    fn test_parse_token_url() {
        assert!(parse_token_url("https://as.example.com/token").is_ok());
        assert!(matches!(
            parse_token_url(""),
            Err(ClientError::InvalidArgument { argument: "token_url", .. })
        ));
        assert!(matches!(
            parse_token_url("not a url"),
            Err(ClientError::InvalidArgument { argument: "token_url", .. })
        ));
    }

    #[test]
    fn test_debug_hides_inner_client() {
        let client = IdJagClient::new().unwrap();
        assert!(format!("{client:?}").contains("<reqwest::Client>"));
    }

    #[test]
    fn test_diagnostic_body_is_capped() {
        let body = vec![b'x'; MAX_DIAGNOSTIC_BODY * 3];
        assert_eq!(diagnostic_body(&body).len(), MAX_DIAGNOSTIC_BODY);
        assert_eq!(diagnostic_body(b"<html>oops</html>"), "<html>oops</html>");
    }

    #[test]
    fn test_max_response_size_override() {
        let client = IdJagClient::new().unwrap().with_max_response_size(1024);
        assert_eq!(client.max_response_size, 1024);
    }
}
