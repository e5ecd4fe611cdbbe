use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub appointments_log: String,
    pub admin_token: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub llm_timeout_secs: Option<u64>,
    pub session_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "appointments.db".to_string()),
            appointments_log: env::var("APPOINTMENTS_LOG")
                .unwrap_or_else(|_| "data/appointments.jsonl".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "groq".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL").unwrap_or_else(|_| "llama3-8b-8192".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            session_ttl_minutes: env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Client-side timeout for language model calls; `None` waits indefinitely.
    pub fn llm_timeout(&self) -> Option<Duration> {
        self.llm_timeout_secs.map(Duration::from_secs)
    }
}
