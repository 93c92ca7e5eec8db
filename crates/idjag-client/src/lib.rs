//! # idjag-client - Identity Assertion Authorization Grant client
//!
//! Client side of the cross-domain identity delegation chain:
//!
//! 1. [`IdJagClient::request_id_jag`] exchanges an IdP identity assertion (OIDC ID
//!    Token or SAML assertion) for an Identity Assertion Authorization Grant (JAG)
//!    at the user's home authorization server (RFC 8693 token exchange).
//! 2. [`IdJagClient::exchange_id_jag`] presents that JAG to the resource's
//!    authorization server and receives an access token (RFC 7523 jwt-bearer).
//!
//! ## Outcomes
//!
//! Both calls return `Result<ExchangeOutcome<T>, ClientError>`:
//!
//! - `Err(ClientError::InvalidArgument)` - bad input, nothing was sent
//! - `Err(ClientError::InvalidPayload)` - the remote server broke the RFC contract
//! - `Ok(ExchangeOutcome::Error(..))` - an OAuth 400 error or a transport failure
//! - `Ok(ExchangeOutcome::Payload(..))` - the validated token response
//!
//! ```rust,no_run
//! use idjag_client::{
//!     ClientAuth, ExchangeOutcome, IdJagClient, SecretString, SubjectTokenType, TokenExchangeRequest,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IdJagClient::new()?;
//! let request = TokenExchangeRequest::new(
//!     "https://idp.example.com/oauth2/v1/token",
//!     "https://auth.wiki.example.com",
//!     "eyJhbGciOiJSUzI1NiJ9...",
//!     SubjectTokenType::Oidc,
//!     ClientAuth::client_secret("wiki-client", Some(SecretString::new("s3cr3t".to_string())))?,
//! )
//! .with_scopes(vec!["read", "write"]);
//!
//! match client.request_id_jag(&request).await? {
//!     ExchangeOutcome::Payload(grant) => println!("JAG expires in {:?}", grant.expires_in),
//!     ExchangeOutcome::Error(error) => println!("exchange rejected: {error}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards
//!
//! - **RFC 6749** - OAuth 2.0 error responses (Section 5.2)
//! - **RFC 7523** - JWT bearer assertion grant
//! - **RFC 8693** - OAuth 2.0 Token Exchange
//! - **draft-ietf-oauth-identity-assertion-authz-grant** - `id-jag` token type

pub mod auth;
pub mod client;
pub mod error;
pub mod jwt_bearer;
pub mod response;
pub mod scope;
pub mod token_exchange;
pub mod types;

#[doc(inline)]
pub use auth::ClientAuth;
#[doc(inline)]
pub use client::{DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_TIMEOUT, IdJagClient, MAX_DIAGNOSTIC_BODY};
#[doc(inline)]
pub use error::{
    ClientError, ExchangeError, ExchangeOutcome, HttpResponse, NetworkFailure, OAuthError,
    OAuthErrorCode,
};
#[doc(inline)]
pub use jwt_bearer::JwtBearerRequest;
#[doc(inline)]
pub use response::{JwtAuthorizationGrant, OAuthAccessTokenResponse, OAuthTokenExchangeResponse};
#[doc(inline)]
pub use scope::{Scopes, normalize_scopes};
#[doc(inline)]
pub use token_exchange::TokenExchangeRequest;
#[doc(inline)]
pub use types::{GrantType, SubjectTokenType, TokenType};

pub use secrecy::SecretString;
