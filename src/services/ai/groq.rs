use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{build_client, ChatReply, LlmProvider, Message, ToolCall, ToolDefinition};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String, timeout: Option<Duration>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            model,
            client: build_client(timeout).context("failed to build Groq HTTP client")?,
        })
    }

    async fn complete(&self, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Groq API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Groq response")?;

        if !status.is_success() {
            anyhow::bail!("Groq API error ({}): {}", status, data);
        }

        Ok(data)
    }
}

fn chat_messages(system_prompt: &str, messages: &[Message]) -> Vec<serde_json::Value> {
    let mut chat_messages = vec![json!({
        "role": "system",
        "content": system_prompt,
    })];

    for msg in messages {
        chat_messages.push(json!({
            "role": msg.role,
            "content": msg.content,
        }));
    }
    chat_messages
}

/// Reads the first choice of an OpenAI-style completion.
fn parse_chat_reply(data: &serde_json::Value) -> anyhow::Result<ChatReply> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| anyhow::anyhow!("missing choices in Groq response"))?;

    let tool_calls = if choice["finish_reason"] == "tool_calls" {
        choice["message"]["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        Some(ToolCall {
                            name: call["function"]["name"].as_str()?.to_string(),
                            arguments: call["function"]["arguments"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let content = choice["message"]["content"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string());

    Ok(ChatReply {
        content,
        tool_calls,
    })
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, messages),
            "temperature": 0.7,
        });

        let data = self.complete(body).await?;

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in Groq response"))
    }

    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatReply> {
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, messages),
            "tools": tools.iter().map(ToolDefinition::to_json).collect::<Vec<_>>(),
            "tool_choice": "auto",
        });

        let data = self.complete(body).await?;
        parse_chat_reply(&data)
    }
}
