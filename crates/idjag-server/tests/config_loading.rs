//! Loading `ServerConfig` from files

use std::io::Write;

use idjag_server::{ConfigError, ServerConfig};
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use tempfile::NamedTempFile;

fn write(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const TOML: &str = r#"
issuer = "https://auth.wiki.example.com"
default_resource = "https://wiki.example.com/api"

[providers.customer1]
name = "customer1"
issuer = "https://customer1.idp.example"
token_endpoint = "https://customer1.idp.example/oauth2/v1/token"
client_id = "wiki-at-customer1"
client_secret = "s3cr3t"
use_saml_sso = true
email_domains = ["customer1.example"]

[clients.wiki-client]
resource = "https://wiki.example.com/api"

[signing]
private_key_path = "/etc/idjag/server.key.pem"
public_key_path = "/etc/idjag/server.pub.pem"
key_id = "server-key-1"

[validation]
iat_tolerance_secs = 60

[logging]
level = "debug"
json = true
"#;

#[test]
fn test_loads_toml() {
    let file = write(".toml", TOML);
    let config = ServerConfig::from_file(file.path()).unwrap();

    assert_eq!(config.issuer, "https://auth.wiki.example.com");
    assert_eq!(config.validation.iat_tolerance_secs, 60);
    assert_eq!(config.http.timeout_secs, 30);
    assert_eq!(config.http.max_response_size, 64 * 1024);
    assert_eq!(config.jwks.max_response_size, 64 * 1024);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);

    let provider = config.provider_by_tenant("customer1").unwrap();
    assert!(provider.use_saml_sso);
    assert_eq!(
        provider.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
        Some("s3cr3t")
    );
    assert_eq!(
        config.provider_by_email("alice@Customer1.example").map(|(t, _)| t),
        Some("customer1")
    );
    assert_eq!(
        config.clients["wiki-client"].resource.as_deref(),
        Some("https://wiki.example.com/api")
    );
    assert_eq!(
        config.signing.as_ref().and_then(|s| s.key_id.as_deref()),
        Some("server-key-1")
    );
}

#[test]
fn test_loads_yaml() {
    let file = write(
        ".yaml",
        r#"
issuer: https://auth.wiki.example.com
providers:
  customer1:
    name: customer1
    issuer: https://customer1.idp.example
    token_endpoint: https://customer1.idp.example/oauth2/v1/token
    client_id: wiki-at-customer1
"#,
    );
    let config = ServerConfig::from_file(file.path()).unwrap();

    let (tenant, provider) = config
        .provider_by_issuer("https://customer1.idp.example")
        .unwrap();
    assert_eq!(tenant, "customer1");
    assert!(!provider.use_saml_sso);
    assert!(provider.client_secret.is_none());
    assert_eq!(config.validation.iat_tolerance_secs, 30);
}

#[test]
fn test_loads_json() {
    let file = write(
        ".json",
        r#"{ "issuer": "https://auth.wiki.example.com", "http": { "timeout_secs": 5 } }"#,
    );
    let config = ServerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.http.timeout(), std::time::Duration::from_secs(5));
    assert!(config.providers.is_empty());
}

#[test]
fn test_missing_file() {
    let err = ServerConfig::from_file("/nonexistent/idjag.toml").unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn test_unsupported_extension() {
    let file = write(".ini", "issuer = https://auth.wiki.example.com");
    let err = ServerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat));
}

#[test]
fn test_invalid_issuer_rejected() {
    let file = write(".toml", r#"issuer = "not a url""#);
    let err = ServerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_shared_provider_issuer_rejected() {
    let file = write(
        ".toml",
        r#"
issuer = "https://auth.wiki.example.com"

[providers.a]
name = "a"
issuer = "https://shared.idp.example"
token_endpoint = "https://shared.idp.example/token"
client_id = "one"

[providers.b]
name = "b"
issuer = "https://shared.idp.example"
token_endpoint = "https://shared.idp.example/token"
client_id = "two"
"#,
    );
    let err = ServerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
