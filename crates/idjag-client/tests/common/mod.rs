//! Shared infrastructure for token endpoint integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Mock token endpoint of an authorization server
pub struct MockTokenEndpoint {
    pub server: MockServer,
    pub token_endpoint: String,
}

impl MockTokenEndpoint {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let token_endpoint = format!("{}/token", server.uri());
        Self {
            server,
            token_endpoint,
        }
    }

    /// Respond to every POST /token with `status` and a JSON body
    pub async fn respond_json(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Respond with a raw body, e.g. an HTML error page
    pub async fn respond_raw(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Respond with a valid ID-JAG after `delay`
    pub async fn respond_delayed(&self, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(id_jag_response("jag", Some("read")))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Form bodies of every request received so far
    pub async fn received_forms(&self) -> Vec<Vec<(String, String)>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| parse_form(&request.body))
            .collect()
    }

    /// Form body of the only request received
    pub async fn single_form(&self) -> HashMap<String, String> {
        let forms = self.received_forms().await;
        assert_eq!(forms.len(), 1, "expected exactly one request");
        forms.into_iter().next().unwrap_or_default().into_iter().collect()
    }
}

pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Well-formed ID-JAG token exchange response
pub fn id_jag_response(jag: &str, scope: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": jag,
        "issued_token_type": "urn:ietf:params:oauth:token-type:id-jag",
        "token_type": "N_A",
        "expires_in": 300,
    });
    if let Some(scope) = scope {
        body["scope"] = json!(scope);
    }
    body
}

/// Well-formed jwt-bearer access token response
pub fn access_token_response(token: &str) -> Value {
    json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": 7200,
        "scope": "read write",
    })
}
