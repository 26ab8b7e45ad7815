use autoshop_rust_auth::{
    AuthError, AuthorizedClient, ServiceAccountSource, TokenSource, DRIVE_SCOPE, SHEETS_SCOPE,
};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/service_account_key.pem");

fn key_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "client_email": "autoshop@test-project.iam.gserviceaccount.com",
        "private_key": TEST_KEY,
        "token_uri": token_uri,
    })
    .to_string()
}

#[tokio::test]
async fn test_service_account_exchange() {
    let mock_server = MockServer::start().await;
    let token_uri = format!("{}/token", mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "svc-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let source =
        ServiceAccountSource::from_json(&key_json(&token_uri), &[SHEETS_SCOPE, DRIVE_SCOPE], Client::new())
            .unwrap();

    assert_eq!(source.access_token().await.unwrap(), "svc-token");
    assert_eq!(source.access_token().await.unwrap(), "svc-token");
}

#[tokio::test]
async fn test_service_account_signs_requests_and_refreshes_on_401() {
    let mock_server = MockServer::start().await;
    let token_uri = format!("{}/token", mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "svc-token",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    // first attempt rejected, retry accepted
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1"))
        .and(header("authorization", "Bearer svc-token"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1"))
        .and(header("authorization", "Bearer svc-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": [] })))
        .mount(&mock_server)
        .await;

    let source =
        ServiceAccountSource::from_json(&key_json(&token_uri), &[SHEETS_SCOPE], Client::new()).unwrap();
    let client = AuthorizedClient::new(Client::new(), Arc::new(source));
    let url = format!("{}/v4/spreadsheets/sheet-1", mock_server.uri());

    let response = client.send(|http| http.get(&url)).await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_service_account_rejected() {
    let mock_server = MockServer::start().await;
    let token_uri = format!("{}/token", mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "The OAuth client was not found."
        })))
        .mount(&mock_server)
        .await;

    let source =
        ServiceAccountSource::from_json(&key_json(&token_uri), &[SHEETS_SCOPE], Client::new()).unwrap();

    match source.access_token().await {
        Err(AuthError::ApiError(msg)) => assert!(msg.contains("invalid_client")),
        other => panic!("Expected ApiError, got {:?}", other),
    }
}
