use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use intake::config::AppConfig;
use intake::db;
use intake::handlers;
use intake::models::default_questions;
use intake::services::ai::assistant::LlmAssistant;
use intake::services::ai::groq::GroqProvider;
use intake::services::ai::ollama::OllamaProvider;
use intake::services::ai::LlmProvider;
use intake::services::conversation::ConversationMachine;
use intake::services::driver::ChatDriver;
use intake::services::sessions::SessionRegistry;
use intake::services::storage::{BookingSink, FanoutSink, JsonlLog, SqliteStore};
use intake::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
                config.llm_timeout(),
            )?)
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
                config.llm_timeout(),
            )?)
        }
    };

    let sink: Arc<dyn BookingSink> = Arc::new(FanoutSink::new(vec![
        Box::new(JsonlLog::new(&config.appointments_log)),
        Box::new(SqliteStore::new(Arc::clone(&db))),
    ]));
    tracing::info!(log = %config.appointments_log, database = %config.database_url, "appointment sinks ready");

    let machine = ConversationMachine::new(
        default_questions(),
        Arc::new(LlmAssistant::new(llm)),
        sink,
    );
    let sessions = SessionRegistry::new(chrono::Duration::minutes(config.session_ttl_minutes));

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        chat: ChatDriver::new(machine, sessions),
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
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
