//! services/api/src/adapters/dream_llm.rs
//!
//! This module contains the adapter for the dream-interpretation LLM.
//! It implements the `GenerativeModelService` port from the `core` crate on top of
//! any OpenAI-compatible chat-completions endpoint (Gemini's included).
//!
//! The endpoint is stateless, so every send replays the session's system
//! instruction and full turn history.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use dream_weaver_core::{
    domain::ChatRole,
    ports::{
        GenerativeModelService, OutputMode, PortError, PortResult, SessionConfig, SessionHandle,
    },
};
use tracing::debug;

const REPORT_SCHEMA_NAME: &str = "dream_report";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiDreamAdapter {
    /// `None` when no API key was configured.
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiDreamAdapter {
    /// Creates a new `OpenAiDreamAdapter`.
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }

    /// Creates the adapter and its client from raw settings.
    pub fn from_settings(api_key: Option<&str>, api_base: &str, model: String) -> Self {
        let client = api_key.map(|key| {
            Client::with_config(
                OpenAIConfig::new()
                    .with_api_base(api_base)
                    .with_api_key(key),
            )
        });
        Self::new(client, model)
    }

    fn build_messages(
        session: &SessionHandle,
        message: &str,
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(session.history().len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(session.config.system_instruction.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        for turn in session.history() {
            let prior: ChatCompletionRequestMessage = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            };
            messages.push(prior);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        Ok(messages)
    }

    fn response_format(mode: OutputMode<'_>) -> ResponseFormat {
        match mode {
            OutputMode::Json(schema) => ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: Some("A dual-core dream interpretation report.".to_string()),
                    name: REPORT_SCHEMA_NAME.to_string(),
                    schema: Some(schema.to_json_schema()),
                    strict: Some(true),
                },
            },
            OutputMode::PlainText => ResponseFormat::Text,
        }
    }
}

//=========================================================================================
// `GenerativeModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeModelService for OpenAiDreamAdapter {
    fn create_session(&self, config: SessionConfig) -> PortResult<SessionHandle> {
        if self.client.is_none() {
            return Err(PortError::MissingCredential);
        }
        Ok(SessionHandle::new(config))
    }

    /// Sends one message with the whole conversation so far and records the
    /// exchange on success.
    async fn send(
        &self,
        session: &mut SessionHandle,
        message: &str,
        mode: OutputMode<'_>,
    ) -> PortResult<String> {
        let client = self.client.as_ref().ok_or(PortError::MissingCredential)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::build_messages(session, message)?)
            .temperature(session.config.temperature)
            .response_format(Self::response_format(mode))
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(
            "Sending turn {} of session {} to model {}.",
            session.history().len() / 2 + 1,
            session.id,
            self.model
        );

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // A missing choice or missing content is reported as empty text; the
        // core decides whether that is an error.
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        session.record_exchange(message, &text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dream_weaver_core::schema::dream_report_schema;

    fn session() -> SessionHandle {
        let mut handle = SessionHandle::new(SessionConfig {
            system_instruction: "You are Tai Xu.".to_string(),
            temperature: 0.4,
        });
        handle.record_exchange("Analyze this dream", "{}");
        handle
    }

    #[test]
    fn messages_replay_system_history_and_new_message() {
        let messages = OpenAiDreamAdapter::build_messages(&session(), "此梦主吉还是主凶？").unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn json_mode_carries_the_translated_schema() {
        let schema = dream_report_schema();
        match OpenAiDreamAdapter::response_format(OutputMode::Json(&schema)) {
            ResponseFormat::JsonSchema { json_schema } => {
                assert_eq!(json_schema.name, REPORT_SCHEMA_NAME);
                assert_eq!(json_schema.schema, Some(schema.to_json_schema()));
            }
            other => panic!("unexpected format {:?}", other),
        }
        assert!(matches!(
            OpenAiDreamAdapter::response_format(OutputMode::PlainText),
            ResponseFormat::Text
        ));
    }

    #[test]
    fn missing_key_fails_session_creation() {
        let adapter = OpenAiDreamAdapter::from_settings(None, "http://unused", "m".to_string());
        let err = adapter
            .create_session(SessionConfig {
                system_instruction: String::new(),
                temperature: 0.4,
            })
            .unwrap_err();
        assert!(matches!(err, PortError::MissingCredential));
    }
}
