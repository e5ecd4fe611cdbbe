use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use intake::config::AppConfig;
use intake::db;
use intake::handlers;
use intake::models::default_questions;
use intake::services::ai::assistant::LlmAssistant;
use intake::services::ai::{ChatReply, LlmProvider, Message, ToolCall, ToolDefinition};
use intake::services::conversation::ConversationMachine;
use intake::services::driver::ChatDriver;
use intake::services::sessions::SessionRegistry;
use intake::services::storage::{BookingSink, FanoutSink, JsonlLog, SqliteStore};
use intake::state::AppState;

const ALICE: [&str; 5] = ["Alice", "alice@x.com", "+15551234567", "221B Baker St", "cough"];

// ── Mock Provider ──

/// Deterministic stand-in for the hosted model. Records every prompt it sees.
struct MockLlm {
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(last.clone());

        if system_prompt.contains("moderation") {
            return Ok(if last.contains("idiot") { "Yes" } else { "No" }.to_string());
        }

        // "The user just entered their <field>: <value>. Respond ..."
        let value = last
            .split_once(": ")
            .and_then(|(_, rest)| rest.split_once(". Respond"))
            .map(|(value, _)| value)
            .unwrap_or("that");
        Ok(format!("Thanks, {value} is noted!"))
    }

    async fn chat_with_tools(
        &self,
        _system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatReply> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(last.clone());

        let args: serde_json::Map<String, Value> = last
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(label, value)| (label.to_lowercase(), Value::from(value)))
            .collect();

        Ok(ChatReply {
            content: None,
            tool_calls: vec![ToolCall {
                name: tools[0].name.clone(),
                arguments: Value::Object(args).to_string(),
            }],
        })
    }
}

// ── Helpers ──

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    prompts: Arc<Mutex<Vec<String>>>,
    log_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        appointments_log: "unused.jsonl".to_string(),
        admin_token: "test-token".to_string(),
        llm_provider: "mock".to_string(),
        groq_api_key: "".to_string(),
        groq_model: "llama3-8b-8192".to_string(),
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3.2".to_string(),
        llm_timeout_secs: None,
        session_ttl_minutes: 30,
    }
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("data").join("appointments.jsonl");
    let db = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
    let prompts = Arc::new(Mutex::new(vec![]));

    let sink: Arc<dyn BookingSink> = Arc::new(FanoutSink::new(vec![
        Box::new(JsonlLog::new(&log_path)),
        Box::new(SqliteStore::new(Arc::clone(&db))),
    ]));
    let machine = ConversationMachine::new(
        default_questions(),
        Arc::new(LlmAssistant::new(Box::new(MockLlm {
            prompts: Arc::clone(&prompts),
        }))),
        sink,
    );

    let state = Arc::new(AppState {
        db,
        config: test_config(),
        chat: ChatDriver::new(machine, SessionRegistry::new(chrono::Duration::minutes(30))),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/sessions", post(handlers::chat::create_session))
        .route("/api/sessions/:id", get(handlers::chat::get_session))
        .route("/api/sessions/:id/messages", post(handlers::chat::send_message))
        .route("/api/sessions/:id/consent", post(handlers::chat::give_consent))
        .route("/api/sessions/:id/reset", post(handlers::chat::reset_session))
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/appointments", get(handlers::admin::get_appointments))
        .with_state(Arc::clone(&state));

    TestApp {
        app,
        state,
        prompts,
        log_path,
        _dir: dir,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let res = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn admin_get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let res = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn start_session(app: &Router) -> String {
    let (status, view) = send(app, "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    view["session_id"].as_str().unwrap().to_string()
}

async fn say(app: &Router, id: &str, message: &str) -> Value {
    let (status, outcome) = send(
        app,
        "POST",
        &format!("/api/sessions/{id}/messages"),
        Some(json!({ "message": message })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    outcome
}

async fn consent(app: &Router, id: &str, consent: bool) -> Value {
    let (status, outcome) = send(
        app,
        "POST",
        &format!("/api/sessions/{id}/consent"),
        Some(json!({ "consent": consent })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    outcome
}

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_new_session_asks_first_question() {
    let t = test_app();
    let (_, view) = send(&t.app, "POST", "/api/sessions", None).await;

    assert_eq!(view["phase"]["state"], "asking");
    assert_eq!(view["phase"]["index"], 0);
    assert_eq!(view["current_field"], "name");
    assert_eq!(view["transcript"].as_array().unwrap().len(), 1);
    assert_eq!(view["transcript"][0]["speaker"], "assistant");
    assert_eq!(view["transcript"][0]["text"], "What is your full name?");
}

#[tokio::test]
async fn test_end_to_end_booking() {
    let t = test_app();
    let id = start_session(&t.app).await;

    for value in ALICE {
        let outcome = say(&t.app, &id, value).await;
        assert_eq!(outcome["success"], true, "{value}: {outcome}");
    }

    let outcome = say(&t.app, &id, "Alice").await;
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["view"]["awaiting_consent"], true);

    let outcome = consent(&t.app, &id, true).await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["view"]["completed"], true);
    assert_eq!(
        outcome["view"]["notice"],
        "Alice, your appointment has already been submitted!"
    );
    let summary = outcome["view"]["transcript"]
        .as_array()
        .unwrap()
        .last()
        .unwrap()["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(summary.contains("Appointment booked for Alice at 221B Baker St."));
    assert!(!summary.contains("[REDACTED_"));

    // JSON-lines log holds exactly one record with the raw answers.
    let log = std::fs::read_to_string(&t.log_path).unwrap();
    let lines: Vec<Value> = log.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["raw_input"]["name"], "Alice");
    assert_eq!(lines[0]["raw_input"]["address"], "221B Baker St");
    assert_eq!(lines[0]["llm_summary"], summary.as_str());
    assert_eq!(lines[0]["session_id"], id.as_str());

    // No raw PII in anything sent to the model.
    for prompt in t.prompts.lock().unwrap().iter() {
        for raw in &ALICE[..4] {
            assert!(!prompt.contains(raw), "leaked {raw:?} in {prompt:?}");
        }
    }
}

#[tokio::test]
async fn test_acknowledgment_shows_restored_value() {
    let t = test_app();
    let id = start_session(&t.app).await;

    let outcome = say(&t.app, &id, "Alice").await;
    let transcript = outcome["view"]["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1]["speaker"], "user");
    let ack = transcript[2]["text"].as_str().unwrap();
    assert!(ack.starts_with("Thanks, Alice is noted!"));
    assert!(ack.ends_with("Thank you please provide your email address?"));
    assert!(transcript[2]["latency_ms"].is_u64());
}

#[tokio::test]
async fn test_consent_gate_and_single_submission() {
    let t = test_app();
    let id = start_session(&t.app).await;
    for value in ALICE {
        say(&t.app, &id, value).await;
    }

    let outcome = consent(&t.app, &id, false).await;
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["warning"], "We need your consent to proceed.");
    assert_eq!(outcome["view"]["completed"], false);

    consent(&t.app, &id, true).await;
    let outcome = consent(&t.app, &id, true).await;
    assert_eq!(outcome["success"], true);
    let (_, view) = send(&t.app, "GET", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(view["completed"], true);

    let log = std::fs::read_to_string(&t.log_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    let (_, appointments) = admin_get(&t.app, "/api/admin/appointments", Some("test-token")).await;
    assert_eq!(appointments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_abusive_symptoms_rejected() {
    let t = test_app();
    let id = start_session(&t.app).await;
    for value in &ALICE[..4] {
        say(&t.app, &id, value).await;
    }

    let (_, before) = send(&t.app, "GET", &format!("/api/sessions/{id}"), None).await;
    let outcome = say(&t.app, &id, "you idiot").await;

    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["warning"], "Message blocked: abusive content detected.");
    assert_eq!(outcome["view"]["phase"]["index"], 4);
    assert_eq!(outcome["view"]["transcript"], before["transcript"]);
}

#[tokio::test]
async fn test_invalid_email_rejected() {
    let t = test_app();
    let id = start_session(&t.app).await;
    say(&t.app, &id, "Alice").await;

    let outcome = say(&t.app, &id, "not-an-email").await;
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["warning"], "Invalid email. Try again.");
    assert_eq!(outcome["view"]["current_field"], "email");
    assert_eq!(outcome["view"]["transcript"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_reset_after_completion() {
    let t = test_app();
    let id = start_session(&t.app).await;
    for value in ALICE {
        say(&t.app, &id, value).await;
    }
    consent(&t.app, &id, true).await;

    let (status, outcome) = send(&t.app, "POST", &format!("/api/sessions/{id}/reset"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["view"]["phase"]["state"], "asking");
    assert_eq!(outcome["view"]["completed"], false);
    assert_eq!(outcome["view"]["transcript"].as_array().unwrap().len(), 1);
    assert!(outcome["view"].get("notice").is_none());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let t = test_app();
    let first = start_session(&t.app).await;
    let second = start_session(&t.app).await;

    say(&t.app, &first, "Alice").await;
    say(&t.app, &first, "alice@x.com").await;

    let (_, view) = send(&t.app, "GET", &format!("/api/sessions/{second}"), None).await;
    assert_eq!(view["current_field"], "name");
    assert_eq!(view["transcript"].as_array().unwrap().len(), 1);
    assert_eq!(t.state.chat.sessions().len(), 2);
}

#[tokio::test]
async fn test_unknown_session_not_found() {
    let t = test_app();
    let (status, body) = send(
        &t.app,
        "GET",
        "/api/sessions/00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_admin_requires_auth() {
    let t = test_app();
    let (status, _) = admin_get(&t.app, "/api/admin/appointments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = admin_get(&t.app, "/api/admin/status", Some("wrong-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = admin_get(&t.app, "/api/admin/status", Some("test-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointments"], 0);
}
