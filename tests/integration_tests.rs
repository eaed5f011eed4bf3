//! End-to-end tests for the contact form relay.
//!
//! Each test starts the full router on an ephemeral port, served with
//! `ConnectInfo` exactly as in production, and drives it over real HTTP with
//! reqwest. Mail goes to an in-memory transport so tests can assert on what
//! would have been sent.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contact_relay::error::{INTERNAL_ERROR_MESSAGE, TransportError};
use contact_relay::mailer::SendFuture;
use contact_relay::template::Template;
use contact_relay::{AppState, Config, MailTransport, OutgoingMail, build_router};
use reqwest::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, RETRY_AFTER,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const ORIGIN: &str = "https://katzentrainer.example";
const TEMPLATE: &str = "<h1>Anfrage</h1>\
    <p>%FIRSTNAME% %LASTNAME%</p>\
    <p>Tel: %PHONE% / Mail: %EMAIL%</p>\
    <blockquote>%MESSAGE%</blockquote>";

// ============================================================================
// Test Transports
// ============================================================================

/// Records messages instead of sending them.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        })
    }
}

/// Relay refuses everything.
struct RefusingTransport;

impl MailTransport for RefusingTransport {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn send<'a>(&'a self, _mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(async {
            Err(TransportError::Send(
                "535 authentication failed for relay@internal.example".to_string(),
            ))
        })
    }
}

/// Relay never answers.
struct HangingTransport;

impl MailTransport for HangingTransport {
    fn name(&self) -> &'static str {
        "hanging"
    }

    fn send<'a>(&'a self, _mail: &'a OutgoingMail) -> SendFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
    }
}

// ============================================================================
// Fixture
// ============================================================================

struct TestFixture {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestFixture {
    fn config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: vec![ORIGIN.to_string(), "https://www.katzentrainer.example".to_string()],
            mail_from: "Kontaktformular <noreply@katzentrainer.example>".to_string(),
            mail_to: "info@katzentrainer.example".to_string(),
            mail_timeout: Duration::from_millis(200),
            metrics_port: 0,
            log_level: "warn".to_string(),
            ..Config::default()
        }
    }

    async fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self::with_config(Self::config(), transport).await
    }

    async fn with_config(config: Config, transport: Arc<dyn MailTransport>) -> Self {
        let state = AppState::new(config, Template::from_string(TEMPLATE), transport)
            .expect("Failed to build application state");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn submit(&self, payload: &Value) -> reqwest::Response {
        self.submit_raw(serde_json::to_string(payload).unwrap()).await
    }

    async fn submit_raw(&self, body: String) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/formsubmit"))
            .header("origin", ORIGIN)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("Request failed")
    }

    async fn preflight(&self) -> reqwest::Response {
        self.client
            .request(Method::OPTIONS, self.url("/api/v1/formsubmit"))
            .header("origin", ORIGIN)
            .header("access-control-request-method", "POST")
            .send()
            .await
            .expect("Request failed")
    }
}

fn valid_payload() -> Value {
    json!({
        "firstname": "Ada",
        "lastname": "Lovelace",
        "phone": "+49 170 1234567",
        "email": "ada@example.com",
        "message": "Meine Katze kratzt <überall> & immer!"
    })
}

// ============================================================================
// Successful Submissions
// ============================================================================

#[tokio::test]
async fn test_valid_submission_is_relayed() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let response = fixture.submit(&valid_payload()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        ORIGIN
    );
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "Success"}));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);

    let mail = &sent[0];
    assert_eq!(mail.to.email.to_string(), "info@katzentrainer.example");
    assert_eq!(
        mail.subject,
        "Neue Kundenanfrage über das Kontaktformular"
    );
    assert_eq!(
        mail.reply_to.as_ref().unwrap().email.to_string(),
        "ada@example.com"
    );
    assert_eq!(
        mail.html_body,
        "<h1>Anfrage</h1>\
         <p>Ada Lovelace</p>\
         <p>Tel: +49 170 1234567 / Mail: ada@example.com</p>\
         <blockquote>Meine Katze kratzt &lt;überall&gt; &amp; immer!</blockquote>"
    );
    assert!(!mail.html_body.contains('%'));
}

#[tokio::test]
async fn test_second_allowed_origin_is_echoed() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    let response = fixture
        .client
        .post(fixture.url("/api/v1/formsubmit"))
        .header("origin", "https://www.katzentrainer.example")
        .header(CONTENT_TYPE, "application/json")
        .body(valid_payload().to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://www.katzentrainer.example"
    );
}

#[tokio::test]
async fn test_placeholder_in_value_is_not_expanded() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let mut payload = valid_payload();
    payload["message"] = json!("Bitte an %EMAIL% antworten");
    fixture.submit(&payload).await;

    let body = &transport.sent()[0].html_body;
    assert!(body.contains("<blockquote>Bitte an %EMAIL% antworten</blockquote>"));
}

// ============================================================================
// CORS Preflight
// ============================================================================

#[tokio::test]
async fn test_preflight() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let response = fixture.preflight().await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        ORIGIN
    );
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST"
    );
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type"
    );
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_preflight_from_unknown_origin() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    let response = fixture
        .client
        .request(Method::OPTIONS, fixture.url("/api/v1/formsubmit"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
}

// ============================================================================
// Admission Rejections
// ============================================================================

#[tokio::test]
async fn test_disallowed_origin() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let response = fixture
        .client
        .post(fixture.url("/api/v1/formsubmit"))
        .header("origin", "https://evil.example")
        .header(CONTENT_TYPE, "application/json")
        .body(valid_payload().to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text().await.unwrap(), "Origin not allowed");
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_missing_origin() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    let response = fixture
        .client
        .post(fixture.url("/api/v1/formsubmit"))
        .header(CONTENT_TYPE, "application/json")
        .body(valid_payload().to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_other_methods_forbidden() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let response = fixture
            .client
            .request(method.clone(), fixture.url("/api/v1/formsubmit"))
            .header("origin", ORIGIN)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method}");
    }
}

#[tokio::test]
async fn test_wrong_content_type() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let response = fixture
        .client
        .post(fixture.url("/api/v1/formsubmit"))
        .header("origin", ORIGIN)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("firstname=Ada")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_oversized_body_rejected_before_dispatch() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let mut payload = valid_payload();
    payload["message"] = json!("x".repeat(2000));

    let response = fixture.submit(&payload).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(transport.sent().is_empty());
}

// ============================================================================
// Payload Validation
// ============================================================================

#[tokio::test]
async fn test_missing_field_gives_empty_ok() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let mut payload = valid_payload();
    payload.as_object_mut().unwrap().remove("phone");

    let response = fixture.submit(&payload).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_invalid_email_gives_empty_ok() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let mut payload = valid_payload();
    payload["email"] = json!("not-an-email");

    let response = fixture.submit(&payload).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_json_gives_empty_ok() {
    let transport = Arc::new(RecordingTransport::default());
    let fixture = TestFixture::new(transport.clone()).await;

    let response = fixture.submit_raw("{\"firstname\": \"Ada\",".to_string()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_validation_failures_are_indistinguishable() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    let mut empty_value = valid_payload();
    empty_value["lastname"] = json!("");
    let mut wrong_type = valid_payload();
    wrong_type["phone"] = json!(1701234567);

    let mut bodies = Vec::new();
    for payload in [empty_value, wrong_type, json!([1, 2, 3])] {
        let response = fixture.submit(&payload).await;
        bodies.push((response.status(), response.bytes().await.unwrap()));
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

// ============================================================================
// Dispatch Failures
// ============================================================================

#[tokio::test]
async fn test_transport_failure_does_not_leak() {
    let fixture = TestFixture::new(Arc::new(RefusingTransport)).await;

    let response = fixture.submit(&valid_payload()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text().await.unwrap();
    assert_eq!(text, INTERNAL_ERROR_MESSAGE);
    assert!(!text.contains("internal.example"));
}

#[tokio::test]
async fn test_transport_timeout() {
    let fixture = TestFixture::new(Arc::new(HangingTransport)).await;

    let response = fixture.submit(&valid_payload()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), INTERNAL_ERROR_MESSAGE);
}

// ============================================================================
// Rate Limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit_applies_to_submissions_and_preflights() {
    let transport = Arc::new(RecordingTransport::default());
    let config = Config {
        rate_limit_max_requests: 3,
        ..TestFixture::config()
    };
    let fixture = TestFixture::with_config(config, transport.clone()).await;

    assert_eq!(fixture.preflight().await.status(), StatusCode::NO_CONTENT);
    assert_eq!(fixture.submit(&valid_payload()).await.status(), StatusCode::OK);
    assert_eq!(fixture.submit(&valid_payload()).await.status(), StatusCode::OK);

    let response = fixture.submit(&valid_payload()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(response.text().await.unwrap(), "Too Many Requests");

    // Preflight is not exempt
    assert_eq!(
        fixture.preflight().await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(fixture.state.limiter.tracked_clients().await, 1);
}

#[tokio::test]
async fn test_rate_limit_window_resets() {
    let config = Config {
        rate_limit_max_requests: 1,
        rate_limit_window: Duration::from_millis(300),
        ..TestFixture::config()
    };
    let fixture = TestFixture::with_config(config, Arc::new(RecordingTransport::default())).await;

    assert_eq!(fixture.preflight().await.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        fixture.preflight().await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(fixture.preflight().await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let config = Config {
        rate_limit_max_requests: 0,
        ..TestFixture::config()
    };
    let fixture = TestFixture::with_config(config, Arc::new(RecordingTransport::default())).await;

    for _ in 0..30 {
        assert_eq!(fixture.preflight().await.status(), StatusCode::NO_CONTENT);
    }
}

// ============================================================================
// Health & Status
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    fixture.preflight().await;

    let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["tracked_clients"], 1);
    assert_eq!(body["rate_limiting_enabled"], true);
    assert_eq!(body["mail_transport"], "recording");
}

#[tokio::test]
async fn test_readiness_endpoint() {
    let fixture = TestFixture::new(Arc::new(RecordingTransport::default())).await;

    let response = fixture.client.get(fixture.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    fixture.state.shutdown().await;

    let response = fixture.client.get(fixture.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_does_not_consume_rate_limit() {
    let config = Config {
        rate_limit_max_requests: 1,
        ..TestFixture::config()
    };
    let fixture = TestFixture::with_config(config, Arc::new(RecordingTransport::default())).await;

    for _ in 0..5 {
        let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(fixture.preflight().await.status(), StatusCode::NO_CONTENT);
}
