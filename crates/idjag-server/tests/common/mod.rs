//! Shared fixtures for grant handler integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use idjag_server::{
    ClientConfig, IdJagServer, ProviderConfig, ServerConfig, SigningConfig,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const ISSUER: &str = "https://auth.wiki.example.com";
pub const CLIENT_ID: &str = "wiki-client";
pub const CLIENT_RESOURCE: &str = "https://wiki.example.com/api";
pub const TENANT: &str = "customer1";
pub const PROVIDER_CLIENT_ID: &str = "wiki-at-customer1";

pub const IDP_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/idp.key.pem");
pub const SERVER_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/server.key.pem");
const IDP_JWK: &str = include_str!("../fixtures/idp.jwk.json");
/// Public half of `SERVER_PRIVATE_PEM`, published by the IdP as `idp-key-2`
const ROTATED_JWK: &str = include_str!("../fixtures/idp-rotated.jwk.json");
pub const ROTATED_KID: &str = "idp-key-2";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn sign(claims: &Value, pem: &[u8], kid: &str, typ: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some(typ.to_string());
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

/// ID-JAG signed by the partner IdP
pub fn sign_jag(claims: &Value) -> String {
    sign(claims, IDP_PRIVATE_PEM, "idp-key-1", "oauth-id-jag+jwt")
}

/// JWT signed by the partner IdP with an arbitrary `typ`
pub fn sign_idp_jwt(claims: &Value, typ: &str) -> String {
    sign(claims, IDP_PRIVATE_PEM, "idp-key-1", typ)
}

/// Same claims, signed by a key the IdP never published
pub fn sign_jag_with_foreign_key(claims: &Value) -> String {
    sign(claims, SERVER_PRIVATE_PEM, "idp-key-1", "oauth-id-jag+jwt")
}

/// ID-JAG signed by the IdP key published after rotation
pub fn sign_jag_with_rotated_key(claims: &Value) -> String {
    sign(claims, SERVER_PRIVATE_PEM, ROTATED_KID, "oauth-id-jag+jwt")
}

/// ID-JAG whose header names `kid`, signed by the original IdP key
pub fn sign_jag_with_kid(claims: &Value, kid: &str) -> String {
    sign(claims, IDP_PRIVATE_PEM, kid, "oauth-id-jag+jwt")
}

/// ID token issued by this server
pub fn sign_id_token(claims: &Value) -> String {
    sign(claims, SERVER_PRIVATE_PEM, "server-key-1", "JWT")
}

/// Valid ID-JAG claims for `issuer`
pub fn jag_claims(issuer: &str, scope: &str) -> Value {
    let now = now();
    json!({
        "iss": issuer,
        "sub": "00u1abcd",
        "aud": ISSUER,
        "client_id": CLIENT_ID,
        "scope": scope,
        "jti": "jag-1",
        "iat": now,
        "exp": now + 300,
    })
}

/// Valid local ID token claims for `tenant:user`
pub fn id_token_claims(subject: &str) -> Value {
    let now = now();
    json!({
        "iss": ISSUER,
        "sub": subject,
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 300,
    })
}

/// Partner authorization server: OIDC discovery, JWKS and token endpoint
pub struct MockPartner {
    pub server: MockServer,
}

impl MockPartner {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwk: Value = serde_json::from_str(IDP_JWK).unwrap();

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "jwks_uri": format!("{}/jwks", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [jwk] })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.server.uri())
    }

    /// Publish the rotated key next to the original one
    pub async fn rotate_keys(&self) {
        let original: Value = serde_json::from_str(IDP_JWK).unwrap();
        let rotated: Value = serde_json::from_str(ROTATED_JWK).unwrap();
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [original, rotated] })),
            )
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// GET requests received for `path`
    pub async fn fetches(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "GET" && r.url.path() == path)
            .count()
    }

    pub async fn respond_token(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Forms posted to the token endpoint
    pub async fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/token")
            .map(|r| {
                url::form_urlencoded::parse(&r.body)
                    .into_owned()
                    .collect()
            })
            .collect()
    }
}

pub fn provider(partner: &MockPartner, use_saml_sso: bool) -> ProviderConfig {
    ProviderConfig {
        name: TENANT.to_string(),
        issuer: partner.issuer(),
        token_endpoint: partner.token_endpoint(),
        client_id: PROVIDER_CLIENT_ID.to_string(),
        client_secret: Some(SecretString::new("partner-secret".into())),
        use_saml_sso,
        email_domains: vec!["customer1.example".to_string()],
        scope: None,
    }
}

pub fn server_config(partner: &MockPartner, use_saml_sso: bool) -> ServerConfig {
    let mut config = ServerConfig::new(ISSUER);
    config.providers = BTreeMap::from([(TENANT.to_string(), provider(partner, use_saml_sso))]);
    config.clients = BTreeMap::from([(
        CLIENT_ID.to_string(),
        ClientConfig {
            resource: Some(CLIENT_RESOURCE.to_string()),
        },
    )]);
    config.signing = Some(SigningConfig {
        private_key_path: fixture("server.key.pem"),
        public_key_path: fixture("server.pub.pem"),
        key_id: Some("server-key-1".to_string()),
    });
    config
}

pub fn server(partner: &MockPartner) -> IdJagServer {
    IdJagServer::from_config(server_config(partner, false)).unwrap()
}

/// Unverified payload of a compact JWT
pub fn payload(token: &str) -> Value {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    let segment = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
}
