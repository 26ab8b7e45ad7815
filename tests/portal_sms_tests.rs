use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::result::Result;

use async_trait::async_trait;
use autoshop_rust::prelude::*;
use autoshop_rust_sms::{SendResult, SmsError, SmsGateway};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn shop() -> (Shopfront, MemoryTables) {
    let tables = MemoryTables::new();
    let shop = Shopfront::with_backends(
        ShopConfig::new("test", Credentials::AccessToken("tok".into())),
        Arc::new(tables.clone()),
        Arc::new(MemoryFiles::new()),
        Arc::new(MemoryStorage::new()),
    );
    shop.initialize().await.unwrap();
    (shop, tables)
}

fn added<T>(outcome: Outcome<T>) -> T {
    match outcome {
        Outcome::Done(value) => value,
        _ => panic!("Expected Outcome::Done"),
    }
}

#[tokio::test]
async fn test_staff_login() {
    let (shop, _) = shop().await;
    let mut technician = User::new("Reza", "Reza Karimi", Role::Technician);
    technician.permissions = Permissions::default().grant("tasks.edit");
    added(shop.users.add(technician).await.unwrap());

    let mut former = User::new("hamid", "Hamid", Role::Receptionist);
    former.active = false;
    added(shop.users.add(former).await.unwrap());

    let mut admin = User::new("owner", "Owner", Role::Admin);
    admin.auth_id = Some("google-123".into());
    added(shop.users.add(admin).await.unwrap());

    let portal = shop.portal();

    let session = portal.login_staff(" reza ").await.unwrap();
    assert_eq!(session.username, "Reza");
    assert!(session.can("tasks.edit"));
    assert!(!session.can("users.manage"));

    assert!(matches!(
        portal.login_staff("hamid").await,
        Err(Error::AccountDisabled(_))
    ));
    assert!(matches!(
        portal.login_staff("nobody").await,
        Err(Error::InvalidCredentials)
    ));

    let owner = portal.login_staff_external("google-123").await.unwrap();
    assert_eq!(owner.role, Role::Admin);
    assert!(owner.can("users.manage"));
    assert!(matches!(
        portal.login_staff_external("").await,
        Err(Error::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_customer_portal() {
    let (shop, _) = shop().await;
    let customer = added(
        shop.customers
            .add(Customer::new("Ali Rezaei", "۰۹۱۲۱۲۳۴۵۶۷"))
            .await
            .unwrap(),
    );
    assert_eq!(customer.mobile, "09121234567");

    let mut blocked = Customer::new("Sara", "09351112233");
    blocked.can_login = false;
    let blocked = added(shop.customers.add(blocked).await.unwrap());

    let mut own = Reception::new(
        CustomerInfo {
            customer_id: Some(customer.id.clone()),
            name: customer.name.clone(),
            mobile: customer.mobile.clone(),
            ..Default::default()
        },
        VehicleInfo {
            plate_number: "12B345".into(),
            ..Default::default()
        },
        "desk",
    );
    own = added(shop.receptions.add(own).await.unwrap());
    let other = Reception::new(
        CustomerInfo {
            name: "Someone".into(),
            mobile: "09129998877".into(),
            ..Default::default()
        },
        VehicleInfo {
            plate_number: "99C111".into(),
            ..Default::default()
        },
        "desk",
    );
    added(shop.receptions.add(other).await.unwrap());

    let portal = shop.portal();

    let session = portal
        .login_customer("+989121234567", &customer.customer_code)
        .await
        .unwrap();
    assert_eq!(session.customer_id, customer.id);
    assert_eq!(session.mobile, "09121234567");

    let receptions = portal.customer_receptions(&session).await.unwrap();
    assert_eq!(receptions.len(), 1);
    assert_eq!(receptions[0].id, own.id);

    assert!(matches!(
        portal.login_customer("09121234567", "000000").await,
        Err(Error::InvalidCredentials)
    ));
    assert!(matches!(
        portal.login_customer("09351112233", &blocked.customer_code).await,
        Err(Error::AccountDisabled(_))
    ));
}

/// Accepts every number except those in `reject`; `down` numbers fail in
/// transport.
struct FakeGateway {
    reject: Vec<&'static str>,
    down: Vec<&'static str>,
    sent: AtomicUsize,
}

impl FakeGateway {
    fn new(reject: Vec<&'static str>, down: Vec<&'static str>) -> Self {
        Self {
            reject,
            down,
            sent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send(&self, to: &str, _from: &str, _text: &str) -> Result<SendResult, SmsError> {
        if self.down.contains(&to) {
            return Err(SmsError::ApiError("503: gateway down".into()));
        }
        if self.reject.contains(&to) {
            return Ok(SendResult::failed("blacklisted"));
        }
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(SendResult {
            success: true,
            message_id: Some(format!("m-{}", n)),
            cost: 100.0,
            error: None,
        })
    }

    async fn balance(&self) -> Result<f64, SmsError> {
        Ok(5000.0)
    }
}

async fn enable_sms(shop: &Shopfront) {
    shop.sms
        .save_settings(&SmsSettings {
            api_key: "key-1".into(),
            line_number: "3000".into(),
            base_url: String::new(),
            enabled: true,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sms_disabled_by_default() {
    let (shop, tables) = shop().await;
    assert!(!shop.sms.settings().await.unwrap().enabled);
    assert!(matches!(
        shop.sms.send("09121234567", "hello").await,
        Err(Error::SmsDisabled)
    ));
    assert_eq!(tables.raw_rows("SmsLogs").await.len(), 1);
}

#[tokio::test]
async fn test_send_template_and_bulk() {
    let (shop, tables) = shop().await;
    enable_sms(&shop).await;
    let gateway = Arc::new(FakeGateway::new(vec!["09350000000"], vec!["09120000000"]));
    let sms = shop.sms.clone().with_gateway(gateway.clone());

    let template = added(
        sms.templates()
            .add(SmsTemplate::new("ready", "Dear {name}, your car {plate} is ready"))
            .await
            .unwrap(),
    );
    assert_eq!(template.variables, vec!["name", "plate"]);

    let mut vars = HashMap::new();
    vars.insert("name".to_string(), "Ali".to_string());
    vars.insert("plate".to_string(), "12B345".to_string());
    let log = sms
        .send_template(&template.id, "+989121234567", &vars)
        .await
        .unwrap();
    assert_eq!(log.status, SmsSendStatus::Sent);
    assert_eq!(log.to, "09121234567");
    assert_eq!(log.text, "Dear Ali, your car 12B345 is ready");
    assert_eq!(log.message_id.as_deref(), Some("m-0"));

    let recipients = vec![
        Recipient::new("09121111111").var("name", "Sara").var("plate", "22C333"),
        Recipient::new("09350000000").var("name", "Hamid"),
        Recipient::new("09120000000").var("name", "Reza"),
        Recipient::new("12345"),
    ];
    let report = sms.send_bulk(&template.id, &recipients).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 3);
    assert_eq!(report.results[0].text, "Dear Sara, your car 22C333 is ready");
    assert_eq!(report.results[1].error.as_deref(), Some("blacklisted"));
    assert!(report.results[2].error.as_deref().unwrap().contains("gateway down"));
    assert!(report.results[3].error.as_deref().unwrap().contains("invalid mobile"));

    // the invalid number never reached the vendor
    assert_eq!(gateway.sent.load(Ordering::SeqCst), 2);
    // header plus one log per attempt
    assert_eq!(tables.raw_rows("SmsLogs").await.len(), 6);
    assert_eq!(sms.logs().items().await.len(), 5);

    assert!(matches!(
        sms.send_template("missing", "09121234567", &vars).await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(sms.balance().await.unwrap(), 5000.0);
}

#[tokio::test]
async fn test_send_through_vendor_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("x-api-key", "key-1"))
        .and(body_json(json!({ "to": "09121234567", "from": "3000", "text": "Your car is ready" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "messageId": "vendor-7",
            "cost": 150.0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid receiver"))
        .mount(&mock_server)
        .await;

    let (shop, _) = shop().await;
    shop.sms
        .save_settings(&SmsSettings {
            api_key: "key-1".into(),
            line_number: "3000".into(),
            base_url: mock_server.uri(),
            enabled: true,
        })
        .await
        .unwrap();

    let log = shop.sms.send("0912 123 4567", "Your car is ready").await.unwrap();
    assert_eq!(log.status, SmsSendStatus::Sent);
    assert_eq!(log.message_id.as_deref(), Some("vendor-7"));
    assert_eq!(log.cost, 150.0);

    let log = shop.sms.send("09359876543", "Your car is ready").await.unwrap();
    assert_eq!(log.status, SmsSendStatus::Failed);
    assert_eq!(log.error.as_deref(), Some("invalid receiver"));
}

#[tokio::test]
async fn test_missing_vendor_url_is_a_config_error() {
    let (shop, _) = shop().await;
    enable_sms(&shop).await;
    assert!(matches!(
        shop.sms.send("09121234567", "hello").await,
        Err(Error::Config(_))
    ));
}
