//! API endpoint integration tests
//!
//! A single `MockServer` stands in for the Gemini, Telegram and `WhatsApp`
//! HTTP APIs; their paths don't overlap.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use intake_gateway::channels::{TelegramChannel, WhatsAppChannel};
use intake_gateway::config::{ModelConfig, PipelineConfig};
use intake_gateway::db::{ActivityRepo, MessageLogRepo, ProfileRepo};
use intake_gateway::extraction::{ExtractionSchema, GeminiClient};
use intake_gateway::gate::{
    IdentityStrategy, NAME_NOT_FOUND_TEXT, PHONE_NOT_FOUND_TEXT, PROMPT_TEXT, SessionGate,
};
use intake_gateway::persist::{PersistMode, Persister};
use intake_gateway::pipeline::{ANALYZING_PHOTO_TEXT, FAILURE_TEXT, Pipeline, THINKING_TEXT};
use intake_gateway::session::{MemorySessionStore, SessionStore};
use intake_gateway::{ApiServer, DbPool};
use secrecy::SecretString;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{create_profile, setup_test_db};

const BOT_TOKEN: &str = "TEST:TOKEN";
const TELEGRAM_SECRET: &str = "tg-secret";
const WHATSAPP_TOKEN: &str = "wa-token";
const WHATSAPP_PHONE_ID: &str = "PHONE";
const VERIFY_TOKEN: &str = "verify-me";
const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

const FENCED_RECORD: &str = "```json\n{\"category\":\"transport\",\
    \"description\":\"Drove 10km by car\",\"value\":10,\"unit\":\"km\",\
    \"carbon_footprint_kg\":1.92,\"reply_to_user\":\"Logged your 10km drive 🚗\"}\n```";

/// Router wired to a mock upstream
struct TestGateway {
    server: MockServer,
    db: DbPool,
    sessions: Arc<MemorySessionStore>,
    router: Router,
}

impl TestGateway {
    /// Gateway with both platforms enabled and the given pipeline variant
    async fn start(settings: PipelineConfig) -> Self {
        let server = MockServer::start().await;
        Self::mount_platform_defaults(&server).await;

        let db = setup_test_db();
        let sessions = Arc::new(MemorySessionStore::new());

        let model = GeminiClient::new(&ModelConfig {
            api_key: SecretString::from("gem-key"),
            model: "gemini-test".to_string(),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .expect("failed to build model client");

        let profiles = ProfileRepo::new(db.clone());
        let gate = SessionGate::new(settings.identity, profiles, sessions.clone());
        let persister = Persister::new(settings.persist, settings.schema, db.clone());
        let pipeline = Pipeline::new(gate, Arc::new(model), persister, settings.schema);

        let telegram =
            TelegramChannel::new(SecretString::from(BOT_TOKEN)).with_api_base(server.uri());
        let whatsapp =
            WhatsAppChannel::new(SecretString::from(WHATSAPP_TOKEN), WHATSAPP_PHONE_ID, "v18.0")
                .with_graph_base(server.uri());

        let router = ApiServer::builder(pipeline)
            .telegram(Arc::new(telegram), Some(TELEGRAM_SECRET.to_string()))
            .whatsapp(Arc::new(whatsapp), VERIFY_TOKEN)
            .build()
            .router();

        Self {
            server,
            db,
            sessions,
            router,
        }
    }

    async fn mount_platform_defaults(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("/bot{BOT_TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v18.0/{WHATSAPP_PHONE_ID}/messages")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"messages": []})),
            )
            .mount(server)
            .await;
    }

    /// Mount a model reply, expecting exactly `calls` model requests
    async fn model_replies(&self, text: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })))
            .expect(calls)
            .named("gemini")
            .mount(&self.server)
            .await;
    }

    /// Establish a session directly
    async fn identify(&self, conversation_key: &str, user_id: &str) {
        self.sessions
            .set(conversation_key, user_id)
            .await
            .expect("failed to set session");
    }

    /// Texts sent through the Telegram Bot API, in order
    async fn telegram_texts(&self) -> Vec<String> {
        self.sent_bodies(&format!("/bot{BOT_TOKEN}/sendMessage"))
            .await
            .into_iter()
            .filter_map(|body| body["text"].as_str().map(String::from))
            .collect()
    }

    /// Texts sent through the `WhatsApp` Cloud API, in order
    async fn whatsapp_texts(&self) -> Vec<String> {
        self.sent_bodies(&format!("/v18.0/{WHATSAPP_PHONE_ID}/messages"))
            .await
            .into_iter()
            .filter_map(|body| body["text"]["body"].as_str().map(String::from))
            .collect()
    }

    async fn model_calls(&self) -> usize {
        self.sent_bodies(MODEL_PATH).await.len()
    }

    async fn sent_bodies(&self, request_path: &str) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn post_json(
        &self,
        uri: &str,
        body: &serde_json::Value,
        secret: Option<&str>,
    ) -> StatusCode {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(secret) = secret {
            request = request.header("X-Telegram-Bot-Api-Secret-Token", secret);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn post_telegram(&self, update: &serde_json::Value) -> StatusCode {
        self.post_json("/telegram-webhook", update, Some(TELEGRAM_SECRET))
            .await
    }

    async fn post_whatsapp(&self, payload: &serde_json::Value) -> StatusCode {
        self.post_json("/webhook", payload, None).await
    }
}

/// `WhatsApp` webhook payload carrying one text message
fn whatsapp_text(from: &str, id: &str, body: &str) -> serde_json::Value {
    let message = serde_json::json!({
        "from": from, "id": id, "timestamp": "1700000000",
        "type": "text", "text": {"body": body}
    });

    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{"wa_id": from, "profile": {"name": "Alice"}}],
                    "messages": [message]
                }
            }]
        }]
    })
}

/// Telegram update from user 42 in chat 42
fn telegram_update(update_id: i64, fields: serde_json::Value) -> serde_json::Value {
    let mut message = serde_json::json!({
        "message_id": update_id,
        "date": 1_700_000_000,
        "chat": {"id": 42, "type": "private"},
        "from": {"id": 42, "is_bot": false, "first_name": "Alice"}
    });
    if let (Some(message), Some(fields)) = (message.as_object_mut(), fields.as_object()) {
        message.extend(fields.clone());
    }

    serde_json::json!({"update_id": update_id, "message": message})
}

fn telegram_text(update_id: i64, text: &str) -> serde_json::Value {
    telegram_update(update_id, serde_json::json!({"text": text}))
}

#[tokio::test]
async fn test_health_endpoint() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;

    let (status, body) = gateway.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_root_banner() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;

    let (status, body) = gateway.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Intake Gateway Active 🌍");
}

#[tokio::test]
async fn test_whatsapp_verification() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;

    let (status, body) = gateway
        .get(&format!(
            "/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1158201444");

    let (status, _) = gateway
        .get("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = gateway
        .get(&format!(
            "/webhook?hub.mode=unsubscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1"
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = gateway.get("/webhook?hub.mode=subscribe&hub.challenge=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = gateway.get("/webhook").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_sender_is_rejected_without_model_call() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    gateway.model_replies(FENCED_RECORD, 0).await;

    let payload = whatsapp_text("15550001", "wamid.A1", "I drove 10km");
    assert_eq!(gateway.post_whatsapp(&payload).await, StatusCode::OK);

    assert_eq!(
        gateway.whatsapp_texts().await,
        vec![PHONE_NOT_FOUND_TEXT.to_string()]
    );
    assert_eq!(gateway.model_calls().await, 0);
    assert_eq!(ActivityRepo::new(gateway.db.clone()).count().unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_display_name_is_rejected_without_model_call() {
    let gateway = TestGateway::start(PipelineConfig {
        identity: IdentityStrategy::DisplayName,
        ..PipelineConfig::default()
    })
    .await;
    gateway.model_replies(FENCED_RECORD, 0).await;

    let status = gateway.post_telegram(&telegram_text(1, "I drove 10km")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        gateway.telegram_texts().await,
        vec![NAME_NOT_FOUND_TEXT.to_string()]
    );
    assert_eq!(ActivityRepo::new(gateway.db.clone()).count().unwrap(), 0);
}

#[tokio::test]
async fn test_verified_whatsapp_sender_is_logged() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    let profile = create_profile(&gateway.db, "Alice", Some("+15550001"), None);
    gateway.model_replies(FENCED_RECORD, 1).await;

    let payload = whatsapp_text("15550001", "wamid.B1", "I drove 10km");
    assert_eq!(gateway.post_whatsapp(&payload).await, StatusCode::OK);

    assert_eq!(
        gateway.whatsapp_texts().await,
        vec![
            THINKING_TEXT.to_string(),
            "Logged your 10km drive 🚗\n\n✅ Successfully logged to database!".to_string(),
        ]
    );

    let rows = ActivityRepo::new(gateway.db.clone())
        .list_for_user(&profile.id)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.category.as_deref(), Some("transport"));
    assert_eq!(rows[0].record.value, Some(10.0));
    assert_eq!(rows[0].record.carbon_footprint_kg, Some(1.92));
    assert_eq!(rows[0].record.source, "chatbot_pending");
}

#[tokio::test]
async fn test_redelivered_message_processed_once() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    create_profile(&gateway.db, "Alice", Some("15550001"), None);
    gateway.model_replies(FENCED_RECORD, 1).await;

    let payload = whatsapp_text("15550001", "wamid.C1", "I drove 10km");
    assert_eq!(gateway.post_whatsapp(&payload).await, StatusCode::OK);
    assert_eq!(gateway.post_whatsapp(&payload).await, StatusCode::OK);

    assert_eq!(ActivityRepo::new(gateway.db.clone()).count().unwrap(), 1);
}

#[tokio::test]
async fn test_telegram_contact_login_then_log() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    let profile = create_profile(&gateway.db, "Alice", Some("+919876543210"), None);
    gateway.model_replies(FENCED_RECORD, 1).await;

    // Not yet identified: prompted, nothing analyzed
    gateway.post_telegram(&telegram_text(1, "I drove 10km")).await;

    let contact = telegram_update(
        2,
        serde_json::json!({
            "contact": {"phone_number": "919876543210", "first_name": "Alice", "user_id": 42}
        }),
    );
    assert_eq!(gateway.post_telegram(&contact).await, StatusCode::OK);

    gateway.post_telegram(&telegram_text(3, "I drove 10km")).await;

    let texts = gateway.telegram_texts().await;
    assert_eq!(texts[0], PROMPT_TEXT);
    assert!(texts[1].starts_with("Verified! ✅ Welcome back, Alice."));
    assert_eq!(texts[2], THINKING_TEXT);
    assert!(texts[3].ends_with("✅ Successfully logged to database!"));

    let rows = ActivityRepo::new(gateway.db.clone())
        .list_for_user(&profile.id)
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_media_download_failure_still_answers_ok() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    gateway.identify("telegram:42", "user-1").await;
    gateway.model_replies(FENCED_RECORD, 0).await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/getFile")))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "description": "Bad Request: wrong file_id"
        })))
        .mount(&gateway.server)
        .await;

    let photo = telegram_update(
        4,
        serde_json::json!({
            "photo": [
                {"file_id": "small", "file_unique_id": "a", "width": 90, "height": 90},
                {"file_id": "large", "file_unique_id": "b", "width": 1280, "height": 960}
            ]
        }),
    );

    assert_eq!(gateway.post_telegram(&photo).await, StatusCode::OK);
    assert_eq!(
        gateway.telegram_texts().await,
        vec![ANALYZING_PHOTO_TEXT.to_string(), FAILURE_TEXT.to_string()]
    );
    assert_eq!(ActivityRepo::new(gateway.db.clone()).count().unwrap(), 0);
}

#[tokio::test]
async fn test_summary_schema_in_log_mode() {
    let gateway = TestGateway::start(PipelineConfig {
        schema: ExtractionSchema::Summary,
        persist: PersistMode::Log,
        ..PipelineConfig::default()
    })
    .await;
    gateway.identify("telegram:42", "user-1").await;
    gateway
        .model_replies(
            r#"{"summary":"Asks about recycling","intent":"question","reply_to_user":"Good question ♻️"}"#,
            1,
        )
        .await;

    gateway
        .post_telegram(&telegram_text(5, "Can I recycle pizza boxes?"))
        .await;

    assert_eq!(
        gateway.telegram_texts().await[1],
        "Good question ♻️\n\n📝 Logged."
    );
    let logs = MessageLogRepo::new(gateway.db.clone())
        .list_for_user("user-1")
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_telegram_secret_mismatch_is_forbidden() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;
    gateway.model_replies(FENCED_RECORD, 0).await;

    let update = telegram_text(6, "hello");
    assert_eq!(
        gateway
            .post_json("/telegram-webhook", &update, Some("wrong"))
            .await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        gateway.post_json("/telegram-webhook", &update, None).await,
        StatusCode::FORBIDDEN
    );
    assert!(gateway.telegram_texts().await.is_empty());
}

#[tokio::test]
async fn test_malformed_payloads_answer_ok() {
    let gateway = TestGateway::start(PipelineConfig::default()).await;

    let garbage = serde_json::json!({"unexpected": [1, 2, 3]});
    assert_eq!(gateway.post_telegram(&garbage).await, StatusCode::OK);
    assert_eq!(gateway.post_whatsapp(&garbage).await, StatusCode::OK);
}
