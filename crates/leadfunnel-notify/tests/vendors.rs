//! Wiremock-backed tests for the Pushover and Twilio clients.

use leadfunnel_core::LeadId;
use leadfunnel_notify::{LeadSummary, NotifyError, PushoverClient, StaffNotifier, TwilioClient};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SID: &str = "AC0123456789";

fn twilio(server: &MockServer) -> TwilioClient {
    TwilioClient::with_base_url(SID, "auth-token", "+15550000000", 5, &server.uri())
        .expect("build twilio client")
}

fn pushover(server: &MockServer) -> PushoverClient {
    PushoverClient::with_base_url("app-token", "user-key", 5, &server.uri())
        .expect("build pushover client")
}

fn summary() -> LeadSummary {
    LeadSummary {
        lead_id: LeadId::new(),
        name: "Jane Doe".to_string(),
        phone: "5551234567".to_string(),
        email: None,
        address: Some("123 Main St, Austin, TX 78701".to_string()),
        estimated_value: None,
    }
}

#[tokio::test]
async fn pushover_posts_form_encoded_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages.json"))
        .and(body_string_contains("token=app-token"))
        .and(body_string_contains("user=user-key"))
        .and(body_string_contains("title=New+lead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1, "request": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    pushover(&server)
        .send("New lead", "Name: Jane Doe", None)
        .await
        .expect("pushover send");
}

#[tokio::test]
async fn pushover_status_zero_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": 0, "errors": ["user identifier is invalid"]})),
        )
        .mount(&server)
        .await;

    let err = pushover(&server)
        .send("t", "m", None)
        .await
        .expect_err("status 0 must fail");
    assert!(matches!(err, NotifyError::Rejected { .. }), "{err:?}");
}

#[tokio::test]
async fn twilio_sms_uses_basic_auth_and_e164_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Messages.json")))
        .and(header_exists("authorization"))
        .and(body_string_contains("To=%2B15551234567"))
        .and(body_string_contains("From=%2B15550000000"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM123"})))
        .expect(1)
        .mount(&server)
        .await;

    let sid = twilio(&server)
        .send_sms("(555) 123-4567", "hello")
        .await
        .expect("sms send");
    assert_eq!(sid, "SM123");
}

#[tokio::test]
async fn twilio_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Messages.json")))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"code": 21211, "message": "The 'To' number is not valid."})),
        )
        .mount(&server)
        .await;

    let err = twilio(&server)
        .send_sms("5551234567", "hello")
        .await
        .expect_err("400 must fail");
    match err {
        NotifyError::UnexpectedStatus { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "The 'To' number is not valid.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_staff_number_fails_without_request() {
    let server = MockServer::start().await;
    let err = twilio(&server)
        .send_sms("12", "hello")
        .await
        .expect_err("short number must fail");
    assert!(matches!(err, NotifyError::InvalidPhone(_)));
}

#[tokio::test]
async fn lead_submitted_reaches_every_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Messages.json")))
        .and(body_string_contains("To=%2B15557654321"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Messages.json")))
        .and(body_string_contains("To=whatsapp%3A%2B15557654321"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Calls.json")))
        .and(body_string_contains("Twiml="))
        .and(body_string_contains("Jane+Doe"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "CA1"})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = StaffNotifier::new(
        Some(pushover(&server)),
        Some(twilio(&server)),
        vec!["555-765-4321".to_string()],
    )
    .with_whatsapp_from("+15550000001");

    let outcomes = notifier.lead_submitted(&summary()).await;
    let channels: Vec<&str> = outcomes.iter().map(|o| o.channel).collect();
    assert_eq!(channels, vec!["pushover", "sms", "whatsapp", "call"]);
    assert!(outcomes.iter().all(|o| o.succeeded()), "{outcomes:?}");
}

#[tokio::test]
async fn one_failing_channel_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Messages.json")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/Accounts/{SID}/Calls.json")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "CA1"})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = StaffNotifier::new(
        Some(pushover(&server)),
        Some(twilio(&server)),
        vec!["5557654321".to_string()],
    );
    let outcomes = notifier.lead_submitted(&summary()).await;

    assert!(!outcomes[0].succeeded());
    assert!(outcomes[1..].iter().all(|o| o.succeeded()));
}
