//! Server configuration
//!
//! Loaded once at startup and read-only afterwards. Files may be TOML, YAML
//! or JSON; environment variables override file values:
//!
//! ```text
//! IDJAG__ISSUER=https://auth.wiki.example.com
//! IDJAG__PROVIDERS__CUSTOMER1__USE_SAML_SSO=true
//! IDJAG__HTTP__TIMEOUT_SECS=10
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Key material could not be read or parsed
    #[error("Failed to load key {path}: {message}")]
    Key {
        /// Key file path
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// This server's issuer identifier; expected `aud` of inbound JAGs and
    /// `iss` of locally issued subject tokens
    pub issuer: String,
    /// Resource used when a client has none configured
    #[serde(default)]
    pub default_resource: Option<String>,
    /// Partner identity providers keyed by tenant
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Registered clients keyed by `client_id`
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,
    /// Signing material of this server
    #[serde(default)]
    pub signing: Option<SigningConfig>,
    /// Assertion validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Partner JWKS caching
    #[serde(default)]
    pub jwks: JwksConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A partner identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, used as the account id prefix
    pub name: String,
    /// Issuer identifier of the provider
    pub issuer: String,
    /// Token endpoint used for token exchange
    pub token_endpoint: String,
    /// Client id registered at the provider
    pub client_id: String,
    /// Client secret registered at the provider
    #[serde(
        default,
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub client_secret: Option<SecretString>,
    /// Whether users of this provider sign in with SAML
    #[serde(default)]
    pub use_saml_sso: bool,
    /// Email domains routed to this provider at login
    #[serde(default)]
    pub email_domains: Vec<String>,
    /// Scopes requested at login
    #[serde(default)]
    pub scope: Option<String>,
}

/// A client registered at this server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default resource indicator for the client's access tokens
    #[serde(default)]
    pub resource: Option<String>,
}

/// Paths to this server's RSA signing key pair (PEM)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// PKCS#8 or PKCS#1 private key
    pub private_key_path: PathBuf,
    /// SPKI public key
    pub public_key_path: PathBuf,
    /// `kid` header of minted tokens
    #[serde(default)]
    pub key_id: Option<String>,
}

/// Assertion validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum age of an assertion's `iat`, in seconds
    #[serde(default = "default_iat_tolerance_secs")]
    pub iat_tolerance_secs: u64,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bound on each outbound call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest token endpoint response body accepted, in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

/// Partner JWKS caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksConfig {
    /// How long a fetched key set is trusted, in seconds
    #[serde(default = "default_jwks_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Minimum interval between forced refreshes, in seconds
    #[serde(default = "default_jwks_min_refresh_secs")]
    pub min_refresh_interval_secs: u64,
    /// Largest discovery or JWKS document accepted, in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of pretty output
    #[serde(default)]
    pub json: bool,
    /// Write to stderr instead of stdout
    #[serde(default = "default_true")]
    pub stderr: bool,
}

fn default_iat_tolerance_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_response_size() -> usize {
    64 * 1024
}

fn default_jwks_ttl_secs() -> u64 {
    600
}

fn default_jwks_min_refresh_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.map(SecretString::new))
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            iat_tolerance_secs: default_iat_tolerance_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_response_size: default_max_response_size(),
        }
    }
}

impl HttpConfig {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_jwks_ttl_secs(),
            min_refresh_interval_secs: default_jwks_min_refresh_secs(),
            max_response_size: default_max_response_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            stderr: true,
        }
    }
}

impl ProviderConfig {
    /// Check required fields
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the issuer, token endpoint or client id
    /// is empty, or a URL does not parse.
    pub fn validate(&self, tenant: &str) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid(format!("provider '{tenant}': name is empty")));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "provider '{tenant}': client_id is empty"
            )));
        }
        for (field, value) in [("issuer", &self.issuer), ("token_endpoint", &self.token_endpoint)] {
            Url::parse(value).map_err(|e| {
                ConfigError::Invalid(format!("provider '{tenant}': {field} '{value}' is not a URL: {e}"))
            })?;
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Minimal configuration for `issuer` with no providers or clients
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            default_resource: None,
            providers: BTreeMap::new(),
            clients: BTreeMap::new(),
            signing: None,
            validation: ValidationConfig::default(),
            http: HttpConfig::default(),
            jwks: JwksConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `IDJAG__` prefix override file settings.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use idjag_server::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("idjag.toml")?;
    /// # Ok::<(), idjag_server::ConfigError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported extension,
    /// does not parse, or fails [`ServerConfig::validate`].
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, "IDJAG")
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<std::path::Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the issuer is not a URL, a provider
    /// is invalid, or two providers share an issuer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.issuer).map_err(|e| {
            ConfigError::Invalid(format!("issuer '{}' is not a URL: {e}", self.issuer))
        })?;

        for (tenant, provider) in &self.providers {
            provider.validate(tenant)?;
            if let Some((other, _)) = self.provider_by_issuer(&provider.issuer)
                && other != tenant
            {
                return Err(ConfigError::Invalid(format!(
                    "providers '{other}' and '{tenant}' share issuer '{}'",
                    provider.issuer
                )));
            }
        }
        Ok(())
    }

    /// Provider for a tenant key
    pub fn provider_by_tenant(&self, tenant: &str) -> Option<&ProviderConfig> {
        self.providers.get(tenant)
    }

    /// Tenant key and provider whose issuer equals `issuer`
    pub fn provider_by_issuer(&self, issuer: &str) -> Option<(&str, &ProviderConfig)> {
        self.providers
            .iter()
            .find(|(_, provider)| provider.issuer == issuer)
            .map(|(tenant, provider)| (tenant.as_str(), provider))
    }

    /// Provider whose email domains include the domain of `email`
    pub fn provider_by_email(&self, email: &str) -> Option<(&str, &ProviderConfig)> {
        let (_, domain) = email.rsplit_once('@')?;
        self.providers
            .iter()
            .find(|(_, provider)| {
                provider
                    .email_domains
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(domain))
            })
            .map(|(tenant, provider)| (tenant.as_str(), provider))
    }
}
