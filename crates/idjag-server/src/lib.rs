//! # idjag-server - Identity Assertion Authorization Grant engine
//!
//! Server side of cross-domain identity delegation:
//!
//! - **JAG issuance** ([`JagIssuanceHandler`]): the jwt-bearer grant redeems an
//!   ID-JAG (`typ: oauth-id-jag+jwt`) issued by a partner IdP for an access
//!   token of this server, scoped to what both the client requested and the
//!   IdP authorized.
//! - **Token exchange** ([`TokenExchangeHandler`]): the token-exchange grant
//!   takes an ID token of this server, finds the user's home IdP and exchanges
//!   the identity assertion cached at login for an ID-JAG there.
//!
//! HTTP routing, client authentication and persistence belong to the
//! surrounding authorization server; [`IdJagServer::token`] takes an
//! authenticated client id plus the form parameters and returns either the
//! response body or a [`GrantError`] that knows its status and error body.
//!
//! ```rust,no_run
//! use idjag_server::{IdJagServer, ServerConfig, telemetry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_file("idjag.toml")?;
//! telemetry::init_tracing(&config.logging)?;
//! let server = IdJagServer::from_config(config)?;
//!
//! match server
//!     .token("wiki-client", [
//!         ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
//!         ("assertion", "eyJ0eXAiOiJvYXV0aC1pZC1qYWcrand0Ii..."),
//!         ("scope", "read write"),
//!     ])
//!     .await
//! {
//!     Ok(body) => println!("{}", serde_json::to_string(&body)?),
//!     Err(e) => println!("{} {}", e.status(), serde_json::to_string(&e.body())?),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod grant;
pub mod issuer;
pub mod jwt;
pub mod resource;
pub mod scope;
pub mod server;
pub mod telemetry;

pub use cache::{AssertionStore, CachedAssertion, InMemoryAssertionStore};
pub use config::{
    ClientConfig, ConfigError, HttpConfig, JwksConfig, LoggingConfig, ProviderConfig, ServerConfig,
    SigningConfig, ValidationConfig,
};
pub use error::{ErrorBody, GrantError, GrantResult};
pub use grant::{
    AccessTokenResponse, GrantContext, GrantHandler, GrantRegistry, JagIssuanceHandler,
    TokenExchangeHandler, TokenResponse,
};
pub use issuer::{AccessTokenIssuer, AccessTokenRequest, IssuedAccessToken, JwtAccessTokenIssuer};
pub use jwt::{JwksVerifier, LocalTokenVerifier, SignatureVerifier, TokenClaims, VerificationError};
pub use resource::{ResourceIndicators, ResourceServerInfo, StaticResourceIndicators};
pub use scope::intersect_scopes;
pub use server::IdJagServer;
