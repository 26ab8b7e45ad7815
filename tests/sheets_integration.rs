use autoshop_rust::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn users_sheet() -> serde_json::Value {
    json!({
        "range": "Users!A1:H3",
        "majorDimension": "ROWS",
        "values": [
            ["id", "username", "name", "role", "active", "permissions", "authId", "createdAt"],
            ["u1", "ali", "Ali", "admin", "TRUE", "", "", "2024-05-01T09:00:00+00:00"],
            ["u2", "sara", "Sara", "technician", "TRUE", "", "", "2024-05-01T10:00:00+00:00"]
        ]
    })
}

#[tokio::test]
async fn test_load_update_and_offline_fallback_over_sheets() {
    let mock_server = MockServer::start().await;
    let cache_dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Users!A:ZZ"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_sheet()))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v4/spreadsheets/sheet-1/values/Users!A3:H3"))
        .and(body_json(json!({
            "range": "Users!A3:H3",
            "majorDimension": "ROWS",
            "values": [[
                "u2", "sara", "Sara Ahmadi", "technician", "true", "{}", "",
                "2024-05-01T10:00:00+00:00"
            ]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedRange": "Users!A3:H3",
            "updatedRows": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ShopConfig::new("sheet-1", Credentials::AccessToken("tok".into()))
        .with_sheets_base_url(&mock_server.uri())
        .with_cache_dir(cache_dir.path());
    let shop = Shopfront::connect(config).unwrap();

    assert_eq!(shop.users.load().await.unwrap(), LoadSource::Remote);
    let users = shop.users.items().await;
    assert_eq!(users.len(), 2);
    // newest first
    assert_eq!(users[0].username, "sara");
    assert!(users[1].active);
    assert_eq!(users[1].role, Role::Admin);

    let outcome = shop
        .users
        .update(
            "u2",
            UserPatch {
                name: Some("Sara Ahmadi".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.is_done());
    assert_eq!(shop.users.get("u2").await.unwrap().name, "Sara Ahmadi");

    // the spreadsheet goes away: the last-good snapshot is shown
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&mock_server)
        .await;

    assert_eq!(shop.users.load().await.unwrap(), LoadSource::Cache);
    let state = shop.users.state().await;
    assert!(state.stale.is_some());
    assert_eq!(state.items.len(), 2);
    assert_eq!(state.items[0].name, "Sara");
    assert!(cache_dir.path().join("snapshot_Users.json").exists());
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_once() {
    let mock_server = MockServer::start().await;
    let cache_dir = tempfile::tempdir().unwrap();

    // one exchange on first use, one after the 401
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Users!A:ZZ"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED" }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1/values/Users!A:ZZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_sheet()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ShopConfig::new(
        "sheet-1",
        Credentials::RefreshToken {
            client_id: "client".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        },
    )
    .with_sheets_base_url(&mock_server.uri())
    .with_token_url(&format!("{}/token", mock_server.uri()))
    .with_cache_dir(cache_dir.path());
    let shop = Shopfront::connect(config).unwrap();

    assert_eq!(shop.users.load().await.unwrap(), LoadSource::Remote);
    assert_eq!(shop.users.items().await.len(), 2);
}

#[tokio::test]
async fn test_static_token_rejected_requires_sign_in() {
    let mock_server = MockServer::start().await;
    let cache_dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mock_server)
        .await;

    let config = ShopConfig::new("sheet-1", Credentials::AccessToken("old".into()))
        .with_sheets_base_url(&mock_server.uri())
        .with_cache_dir(cache_dir.path());
    let shop = Shopfront::connect(config).unwrap();

    let err = shop.users.load().await.unwrap_err();
    assert!(err.is_auth(), "expected a sign-in error, got {:?}", err);
    assert!(shop.users.state().await.error.is_some());
}

/// Runs against a real spreadsheet when AUTOSHOP_SPREADSHEET_ID and a
/// credential are set (see `ShopConfig::from_env`).
#[tokio::test]
async fn test_live_spreadsheet() {
    dotenv::dotenv().ok();
    if std::env::var("AUTOSHOP_SPREADSHEET_ID").is_err() {
        println!("Skipping live test: AUTOSHOP_SPREADSHEET_ID not set");
        return;
    }

    let cache_dir = tempfile::tempdir().unwrap();
    let config = match ShopConfig::from_env() {
        Ok(config) => config.with_cache_dir(cache_dir.path()),
        Err(e) => {
            println!("Skipping live test: {}", e);
            return;
        }
    };
    let shop = Shopfront::connect(config).unwrap();
    shop.initialize().await.unwrap();
    assert!(shop.ping().await);

    let mut message = Message {
        from_id: "live-test".into(),
        to_id: "live-test".into(),
        subject: "live test".into(),
        content: "created by the integration test".into(),
        ..Default::default()
    };
    message = shop.messages.add(message).await.unwrap().value().unwrap();

    shop.messages.load().await.unwrap();
    assert_eq!(shop.messages.items().await[0].id, message.id);
    assert!(shop.messages.mark_read(&message.id).await.unwrap().is_done());
    assert!(shop.messages.delete(&message.id).await.unwrap().is_done());
}
