use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use crate::models::{AnswerSet, BookingExtraction, FieldName};
use crate::services::ai::{ChatReply, LlmProvider, Message, ToolDefinition};

const ACK_SYSTEM_PROMPT: &str = "You are a polite assistant.";

const ABUSE_SYSTEM_PROMPT: &str = "You are a content moderation filter.";

const BOOKING_SYSTEM_PROMPT: &str =
    "You are a hospital assistant. Confirm the appointment booking from user's details.";

const STORE_APPOINTMENT_TOOL: &str = "store_appointment";

/// The three language-model questions the intake flow asks. Every value passed
/// in has already been redacted by the caller.
#[async_trait]
pub trait IntakeAssistant: Send + Sync {
    async fn classify_abuse(&self, text: &str) -> anyhow::Result<bool>;

    async fn acknowledge(&self, field: FieldName, value: &str) -> anyhow::Result<String>;

    async fn extract_booking(&self, redacted: &AnswerSet) -> anyhow::Result<BookingExtraction>;
}

pub struct LlmAssistant {
    llm: Box<dyn LlmProvider>,
}

impl LlmAssistant {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl IntakeAssistant for LlmAssistant {
    async fn classify_abuse(&self, text: &str) -> anyhow::Result<bool> {
        let prompt = format!(
            "Is the following message abusive or offensive? Respond with ONLY 'Yes' or 'No'. Message: \"{text}\""
        );
        let reply = self
            .llm
            .chat(ABUSE_SYSTEM_PROMPT, &[Message::user(prompt)])
            .await?;
        Ok(parse_abuse_reply(&reply))
    }

    async fn acknowledge(&self, field: FieldName, value: &str) -> anyhow::Result<String> {
        let prompt = format!(
            "The user just entered their {field}: {value}. Respond with a friendly short acknowledgment."
        );
        tracing::debug!(%field, prompt = %prompt, "acknowledgment prompt");
        let reply = self
            .llm
            .chat(ACK_SYSTEM_PROMPT, &[Message::user(prompt)])
            .await?;
        Ok(reply.trim().to_string())
    }

    async fn extract_booking(&self, redacted: &AnswerSet) -> anyhow::Result<BookingExtraction> {
        let prompt = redacted.to_prompt();
        tracing::debug!(prompt = %prompt, "booking extraction prompt");
        let reply = self
            .llm
            .chat_with_tools(
                BOOKING_SYSTEM_PROMPT,
                &[Message::user(prompt)],
                &[store_appointment_tool()],
            )
            .await?;
        parse_extraction(reply)
    }
}

fn store_appointment_tool() -> ToolDefinition {
    let properties: serde_json::Map<String, serde_json::Value> = FieldName::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), json!({"type": "string"})))
        .collect();
    let required: Vec<&str> = FieldName::ALL.iter().map(FieldName::as_str).collect();

    ToolDefinition {
        name: STORE_APPOINTMENT_TOOL.to_string(),
        description: "Store appointment info in DB".to_string(),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

fn parse_abuse_reply(reply: &str) -> bool {
    reply
        .trim()
        .trim_start_matches(['"', '\''])
        .to_lowercase()
        .starts_with("yes")
}

fn parse_extraction(reply: ChatReply) -> anyhow::Result<BookingExtraction> {
    if let Some(call) = reply
        .tool_calls
        .iter()
        .find(|c| c.name == STORE_APPOINTMENT_TOOL)
    {
        match parse_tool_arguments(&call.arguments) {
            Some(fields) => return Ok(BookingExtraction::Structured(fields)),
            None => tracing::warn!("tool call arguments incomplete, using text reply"),
        }
    }

    match reply.content {
        Some(text) if !text.trim().is_empty() => Ok(BookingExtraction::FreeText(text)),
        _ => anyhow::bail!("language model returned neither a tool call nor text"),
    }
}

/// All required fields, each a string, or nothing.
fn parse_tool_arguments(arguments: &str) -> Option<HashMap<FieldName, String>> {
    let args: serde_json::Value = serde_json::from_str(arguments).ok()?;
    FieldName::ALL
        .iter()
        .map(|f| Some((*f, args.get(f.as_str())?.as_str()?.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ai::ToolCall;

    const FULL_ARGS: &str = r#"{"name":"N","email":"E","phone":"P","address":"A","symptoms":"cough"}"#;

    #[test]
    fn test_abuse_reply() {
        assert!(parse_abuse_reply("Yes"));
        assert!(parse_abuse_reply("  yes, it is offensive"));
        assert!(parse_abuse_reply("'Yes'"));
        assert!(!parse_abuse_reply("No"));
        assert!(!parse_abuse_reply("I'd say no, yes is wrong"));
    }

    #[test]
    fn test_extraction_prefers_tool_call() {
        let reply = ChatReply {
            content: Some("ignored".to_string()),
            tool_calls: vec![ToolCall {
                name: "store_appointment".to_string(),
                arguments: FULL_ARGS.to_string(),
            }],
        };
        match parse_extraction(reply).unwrap() {
            BookingExtraction::Structured(fields) => {
                assert_eq!(fields.len(), 5);
                assert_eq!(fields[&FieldName::Symptoms], "cough");
            }
            other => panic!("expected structured extraction, got {other:?}"),
        }
    }

    #[test]
    fn test_extraction_incomplete_arguments_falls_back_to_text() {
        let reply = ChatReply {
            content: Some("Booked, see you soon.".to_string()),
            tool_calls: vec![ToolCall {
                name: "store_appointment".to_string(),
                arguments: r#"{"name":"N"}"#.to_string(),
            }],
        };
        assert_eq!(
            parse_extraction(reply).unwrap(),
            BookingExtraction::FreeText("Booked, see you soon.".to_string())
        );
    }

    #[test]
    fn test_extraction_empty_reply_is_error() {
        let reply = ChatReply {
            content: Some("   ".to_string()),
            tool_calls: vec![],
        };
        assert!(parse_extraction(reply).is_err());
    }

    #[test]
    fn test_tool_schema_requires_every_field() {
        let tool = store_appointment_tool();
        let required = tool.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(tool.parameters["properties"]["email"]["type"], "string");
    }

    struct Echo;

    #[async_trait]
    impl LlmProvider for Echo {
        async fn chat(&self, _system: &str, messages: &[Message]) -> anyhow::Result<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_text_only_provider_yields_free_text() {
        let assistant = LlmAssistant::new(Box::new(Echo));
        let answers: AnswerSet = [(FieldName::Symptoms, "cough".to_string())]
            .into_iter()
            .collect();
        let extraction = assistant.extract_booking(&answers).await.unwrap();
        assert_eq!(
            extraction,
            BookingExtraction::FreeText("Symptoms: cough".to_string())
        );
    }
}
