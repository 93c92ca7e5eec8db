//! token-exchange grant obtaining ID-JAGs from the user's home IdP

mod common;

use common::*;
use idjag_client::SubjectTokenType;
use idjag_server::{CachedAssertion, GrantError, IdJagServer, TokenResponse};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ID_JAG: &str = "urn:ietf:params:oauth:token-type:id-jag";
const ID_TOKEN: &str = "urn:ietf:params:oauth:token-type:id_token";
const AUDIENCE: &str = "https://auth.partner-app.example.com";
const SUBJECT: &str = "customer1:00u1abcd";
const IDP_ID_TOKEN: &str = "idp.id.token";

fn jag_body() -> Value {
    json!({
        "access_token": "partner.issued.jag",
        "issued_token_type": ID_JAG,
        "token_type": "N_A",
        "scope": "read",
        "expires_in": 300,
    })
}

async fn login(server: &IdJagServer, kind: SubjectTokenType) {
    server
        .cache_assertion(SUBJECT, PROVIDER_CLIENT_ID, CachedAssertion::new(IDP_ID_TOKEN, kind))
        .await;
}

async fn exchange(
    server: &IdJagServer,
    subject_token: &str,
    extra: &[(&str, &str)],
) -> Result<TokenResponse, GrantError> {
    let mut params = vec![
        ("grant_type", TOKEN_EXCHANGE),
        ("requested_token_type", ID_JAG),
        ("audience", AUDIENCE),
        ("subject_token", subject_token),
        ("subject_token_type", ID_TOKEN),
    ];
    for &(name, value) in extra {
        params.retain(|&(n, _)| n != name);
        params.push((name, value));
    }
    server.token(CLIENT_ID, params).await
}

#[tokio::test]
async fn test_returns_partner_jag() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let response = exchange(&server, &id_token, &[("scope", "read")]).await.unwrap();

    assert!(matches!(response, TokenResponse::AuthorizationGrant(_)));
    assert_eq!(serde_json::to_value(&response).unwrap(), jag_body());
}

#[tokio::test]
async fn test_forwards_cached_assertion_and_provider_credentials() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    exchange(
        &server,
        &id_token,
        &[("scope", "read write"), ("resource", "https://partner-app.example.com/api")],
    )
    .await
    .unwrap();

    let forms = partner.token_forms().await;
    assert_eq!(forms.len(), 1);
    let form = &forms[0];
    assert_eq!(form["grant_type"], TOKEN_EXCHANGE);
    assert_eq!(form["requested_token_type"], ID_JAG);
    assert_eq!(form["audience"], AUDIENCE);
    assert_eq!(form["resource"], "https://partner-app.example.com/api");
    assert_eq!(form["scope"], "read write");
    assert_eq!(form["subject_token"], IDP_ID_TOKEN);
    assert_eq!(form["subject_token_type"], ID_TOKEN);
    assert_eq!(form["client_id"], PROVIDER_CLIENT_ID);
    assert_eq!(form["client_secret"], "partner-secret");
}

#[tokio::test]
async fn test_saml_provider_sends_saml2_type() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = IdJagServer::from_config(server_config(&partner, true)).unwrap();
    login(&server, SubjectTokenType::Saml).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    exchange(&server, &id_token, &[]).await.unwrap();

    let forms = partner.token_forms().await;
    assert_eq!(
        forms[0]["subject_token_type"],
        "urn:ietf:params:oauth:token-type:saml2"
    );
}

#[tokio::test]
async fn test_resource_stands_in_for_audience() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let params = [
        ("grant_type", TOKEN_EXCHANGE),
        ("requested_token_type", ID_JAG),
        ("resource", AUDIENCE),
        ("subject_token", id_token.as_str()),
        ("subject_token_type", ID_TOKEN),
    ];
    server.token(CLIENT_ID, params).await.unwrap();

    let forms = partner.token_forms().await;
    assert_eq!(forms[0]["audience"], AUDIENCE);
    assert_eq!(forms[0]["resource"], AUDIENCE);
}

#[tokio::test]
async fn test_partner_oauth_error_relayed() {
    let partner = MockPartner::start().await;
    partner
        .respond_token(
            400,
            json!({
                "error": "invalid_grant",
                "error_description": "assertion expired",
                "error_uri": "https://partner.example/errors#expired",
            }),
        )
        .await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let err = exchange(&server, &id_token, &[]).await.unwrap_err();

    assert_eq!(err.status(), 400);
    let body = serde_json::to_value(err.body()).unwrap();
    assert_eq!(
        body,
        json!({
            "error": "invalid_grant",
            "error_description": "assertion expired",
            "error_uri": "https://partner.example/errors#expired",
        })
    );
}

#[tokio::test]
async fn test_partner_server_error_is_provider_failure() {
    let partner = MockPartner::start().await;
    partner.respond_token(503, json!({ "message": "maintenance" })).await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let err = exchange(&server, &id_token, &[]).await.unwrap_err();

    assert!(matches!(err, GrantError::Provider { status: Some(503), .. }));
    assert_eq!(err.code(), "server_error");
    assert_eq!(err.status(), 503);
    assert!(!err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_partner_contract_violation() {
    let partner = MockPartner::start().await;
    partner
        .respond_token(200, json!({ "access_token": "at", "token_type": "Bearer" }))
        .await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let err = exchange(&server, &id_token, &[]).await.unwrap_err();

    assert!(matches!(err, GrantError::Provider { status: None, .. }));
    assert_eq!(err.status(), 502);
}

#[tokio::test]
async fn test_unsupported_requested_token_type() {
    let partner = MockPartner::start().await;
    let server = server(&partner);

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let access_token = "urn:ietf:params:oauth:token-type:access_token";
    let err = exchange(&server, &id_token, &[("requested_token_type", access_token)])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GrantError::InvalidGrant(format!(
            "requested_token_type '{access_token}' is an unknown or unsupported token type."
        ))
    );
    assert!(partner.token_forms().await.is_empty());
}

#[tokio::test]
async fn test_legacy_requested_token_type_accepted() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = server(&partner);
    login(&server, SubjectTokenType::Oidc).await;

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let legacy = "urn:ietf:params:oauth:token-type:jwt-authorization-grant";
    exchange(&server, &id_token, &[("requested_token_type", legacy)])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_tenant_rejected() {
    let partner = MockPartner::start().await;
    let server = server(&partner);

    let id_token = sign_id_token(&id_token_claims("customer9:00u1abcd"));
    let err = exchange(&server, &id_token, &[]).await.unwrap_err();

    assert_eq!(
        err,
        GrantError::InvalidGrant(
            "Subject of this JWT does not match a configured OIDC provider.".to_string()
        )
    );
    assert!(partner.token_forms().await.is_empty());
}

#[tokio::test]
async fn test_foreign_subject_token_rejected() {
    let partner = MockPartner::start().await;
    let server = server(&partner);

    // Signed by the IdP key, not this server's
    let forged = sign_idp_jwt(&id_token_claims(SUBJECT), "JWT");
    let err = exchange(&server, &forged, &[]).await.unwrap_err();

    assert_eq!(err.code(), "invalid_grant");
    assert!(partner.token_forms().await.is_empty());
}

#[tokio::test]
async fn test_missing_subject_token_is_invalid_request() {
    let partner = MockPartner::start().await;
    let server = server(&partner);

    let err = exchange(&server, "", &[]).await.unwrap_err();
    assert_eq!(err.code(), "invalid_request");
}

#[tokio::test]
async fn test_missing_cached_assertion_is_server_error() {
    let partner = MockPartner::start().await;
    partner.respond_token(200, jag_body()).await;
    let server = server(&partner);

    let id_token = sign_id_token(&id_token_claims(SUBJECT));
    let err = exchange(&server, &id_token, &[]).await.unwrap_err();

    assert_eq!(err.status(), 500);
    assert!(partner.token_forms().await.is_empty());
}
