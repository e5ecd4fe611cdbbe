pub mod assistant;
pub mod groq;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A function the model may call instead of answering in text.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    /// Raw JSON arguments as returned by the provider.
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;

    /// Chat completion that may answer with tool calls. Providers without tool
    /// support fall back to a plain text reply.
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatReply> {
        let content = self.chat(system_prompt, messages).await?;
        Ok(ChatReply {
            content: Some(content),
            tool_calls: Vec::new(),
        })
    }
}

pub(crate) fn build_client(timeout: Option<std::time::Duration>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
