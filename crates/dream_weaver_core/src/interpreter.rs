//! crates/dream_weaver_core/src/interpreter.rs
//!
//! The dream-analysis client. It opens a conversation with the generative model,
//! asks for a schema-constrained report, and continues the conversation in plain
//! text for follow-up questions.
//!
//! Sessions are returned to the caller and owned by it. The interpreter itself
//! holds no per-conversation state, so one instance can serve any number of users.

use crate::domain::DreamReport;
use crate::ports::{
    GenerativeModelService, OutputMode, PortError, SessionConfig, SessionHandle, Turn,
};
use crate::prompt::{
    analysis_request, system_instruction, ANALYSIS_ERROR_MESSAGE, ANALYSIS_TEMPERATURE,
    CHAT_SILENCE_FALLBACK,
};
use crate::schema::{dream_report_schema, SchemaNode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//=========================================================================================
// Error Type
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("Input text is empty")]
    EmptyInput,
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("No active session. Please analyze a dream first.")]
    NoActiveSession,
    #[error("An analysis is already in progress")]
    AnalysisInProgress,
    #[error("A chat reply is already in progress")]
    ChatInProgress,
    #[error("The model returned an empty response")]
    EmptyResponse,
    #[error("The model response did not match the report schema: {0}")]
    MalformedResponse(String),
    #[error("Upstream model error: {0}")]
    Upstream(#[source] PortError),
    #[error("The model did not answer within {0:?}")]
    Timeout(Duration),
    #[error("The request was cancelled")]
    Cancelled,
}

impl InterpretError {
    /// The message a front end should show for a failed analysis. Upstream
    /// problems are not distinguished from each other.
    pub fn user_message(&self) -> String {
        match self {
            InterpretError::Configuration(_)
            | InterpretError::EmptyInput
            | InterpretError::NoActiveSession
            | InterpretError::AnalysisInProgress
            | InterpretError::ChatInProgress => self.to_string(),
            _ => ANALYSIS_ERROR_MESSAGE.to_string(),
        }
    }
}

//=========================================================================================
// Session and Result Types
//=========================================================================================

/// A live follow-up context for one analysed dream.
#[derive(Debug)]
pub struct DreamSession {
    handle: SessionHandle,
    dream_text: String,
}

impl DreamSession {
    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.handle.created_at
    }

    pub fn dream_text(&self) -> &str {
        &self.dream_text
    }

    pub fn history(&self) -> &[Turn] {
        self.handle.history()
    }

    /// Ends the conversation. Taking `self` by value is the invalidation: the
    /// handle and its history are dropped here, so the session can never be
    /// sent on again. Nothing upstream needs releasing because the endpoint
    /// keeps no conversation state.
    pub fn close(self) {
        info!(
            "Closing dream session {} after {} turns.",
            self.handle.id,
            self.handle.history().len()
        );
    }
}

/// The outcome of a successful analysis.
#[derive(Debug)]
pub struct Analysis {
    pub report: DreamReport,
    pub session: DreamSession,
}

//=========================================================================================
// The Interpreter
//=========================================================================================

pub struct DreamInterpreter {
    model: Arc<dyn GenerativeModelService>,
    request_timeout: Duration,
    report_schema: SchemaNode,
}

impl DreamInterpreter {
    pub fn new(model: Arc<dyn GenerativeModelService>, request_timeout: Duration) -> Self {
        Self {
            model,
            request_timeout,
            report_schema: dream_report_schema(),
        }
    }

    pub async fn analyze(&self, dream_text: &str) -> Result<Analysis, InterpretError> {
        self.analyze_with_cancel(dream_text, &CancellationToken::new())
            .await
    }

    /// Analyses a dream on a brand new session. Any failure aborts the whole
    /// analysis; no partial report is ever returned.
    pub async fn analyze_with_cancel(
        &self,
        dream_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Analysis, InterpretError> {
        if dream_text.trim().is_empty() {
            return Err(InterpretError::EmptyInput);
        }

        let config = SessionConfig {
            system_instruction: system_instruction(),
            temperature: ANALYSIS_TEMPERATURE,
        };
        let mut handle = self.model.create_session(config).map_err(|e| match e {
            PortError::MissingCredential => InterpretError::Configuration(e.to_string()),
            other => InterpretError::Upstream(other),
        })?;
        info!("Opened dream session {}.", handle.id);

        let request = analysis_request(dream_text);
        let text = self
            .round_trip(
                &mut handle,
                &request,
                OutputMode::Json(&self.report_schema),
                cancel,
            )
            .await
            .inspect_err(|e| error!("Dream analysis failed on session {}: {}", handle.id, e))?;

        if text.trim().is_empty() {
            error!("Model returned no text for session {}.", handle.id);
            return Err(InterpretError::EmptyResponse);
        }

        let report = self.parse_report(&text).inspect_err(|e| {
            error!("Rejected model output for session {}: {}", handle.id, e)
        })?;
        info!(
            "Dream analysed on session {} with {} sources.",
            handle.id,
            report.sources.len()
        );

        Ok(Analysis {
            report,
            session: DreamSession {
                handle,
                dream_text: dream_text.to_string(),
            },
        })
    }

    pub async fn chat(
        &self,
        session: &mut DreamSession,
        message: &str,
    ) -> Result<String, InterpretError> {
        self.chat_with_cancel(session, message, &CancellationToken::new())
            .await
    }

    /// Continues the conversation in plain text. An empty reply is not an
    /// error; it becomes the fixed silence phrase.
    pub async fn chat_with_cancel(
        &self,
        session: &mut DreamSession,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String, InterpretError> {
        if message.trim().is_empty() {
            return Err(InterpretError::EmptyInput);
        }

        let text = self
            .round_trip(&mut session.handle, message, OutputMode::PlainText, cancel)
            .await
            .inspect_err(|e| warn!("Chat turn failed on session {}: {}", session.id(), e))?;

        if text.trim().is_empty() {
            return Ok(CHAT_SILENCE_FALLBACK.to_string());
        }
        Ok(text)
    }

    pub fn close_session(&self, session: DreamSession) {
        session.close();
    }

    /// One bounded, cancellable request to the model.
    async fn round_trip(
        &self,
        handle: &mut SessionHandle,
        message: &str,
        mode: OutputMode<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, InterpretError> {
        let request_timeout = self.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InterpretError::Cancelled),
            result = tokio::time::timeout(request_timeout, self.model.send(handle, message, mode)) => {
                match result {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => Err(InterpretError::Upstream(e)),
                    Err(_) => Err(InterpretError::Timeout(request_timeout)),
                }
            }
        }
    }

    fn parse_report(&self, text: &str) -> Result<DreamReport, InterpretError> {
        let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| InterpretError::MalformedResponse(e.to_string()))?;
        self.report_schema
            .validate(&value)
            .map_err(InterpretError::MalformedResponse)?;
        let report: DreamReport = serde_json::from_value(value)
            .map_err(|e| InterpretError::MalformedResponse(e.to_string()))?;
        report
            .check_invariants()
            .map_err(InterpretError::MalformedResponse)?;
        Ok(report)
    }
}

/// Some models wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
    {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatRole;
    use crate::knowledge_base::DEMO_DREAM;
    use crate::test_support::{demo_report_json, ScriptedModel};

    fn interpreter(model: &Arc<ScriptedModel>) -> DreamInterpreter {
        DreamInterpreter::new(model.clone(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn analyze_returns_the_report_unmodified() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(demo_report_json().to_string()));

        let analysis = interpreter(&model).analyze(DEMO_DREAM).await.unwrap();

        let expected: DreamReport = serde_json::from_value(demo_report_json()).unwrap();
        assert_eq!(analysis.report, expected);
        assert_eq!(analysis.report.sources.len(), 3);
        assert_eq!(analysis.session.dream_text(), DEMO_DREAM);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].json_mode);
        assert_eq!(calls[0].temperature, ANALYSIS_TEMPERATURE);
        assert!(calls[0].system_instruction.contains("Tai Xu"));
        assert!(calls[0].message.contains(DEMO_DREAM));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_send() {
        let model = Arc::new(ScriptedModel::without_credential());
        let err = interpreter(&model).analyze(DEMO_DREAM).await.unwrap_err();
        assert!(matches!(err, InterpretError::Configuration(_)));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_dream_is_rejected_locally() {
        let model = Arc::new(ScriptedModel::new());
        let err = interpreter(&model).analyze("   ").await.unwrap_err();
        assert!(matches!(err, InterpretError::EmptyInput));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_analysis_reply_is_an_error() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(String::new()));
        let err = interpreter(&model).analyze(DEMO_DREAM).await.unwrap_err();
        assert!(matches!(err, InterpretError::EmptyResponse));
    }

    #[tokio::test]
    async fn unparseable_or_nonconforming_reply_is_malformed() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok("not json at all".to_string()));
        let mut missing = demo_report_json();
        missing.as_object_mut().unwrap().remove("sources");
        model.push_reply(Ok(missing.to_string()));
        let mut unsourced = demo_report_json();
        unsourced["sources"] = serde_json::json!([]);
        model.push_reply(Ok(unsourced.to_string()));

        let interpreter = interpreter(&model);
        for _ in 0..3 {
            let err = interpreter.analyze(DEMO_DREAM).await.unwrap_err();
            assert!(matches!(err, InterpretError::MalformedResponse(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(format!("```json\n{}\n```", demo_report_json())));
        assert!(interpreter(&model).analyze(DEMO_DREAM).await.is_ok());
    }

    #[tokio::test]
    async fn upstream_failure_is_propagated() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Err(PortError::Unexpected("503 from provider".to_string())));
        let err = interpreter(&model).analyze(DEMO_DREAM).await.unwrap_err();
        match err {
            InterpretError::Upstream(PortError::Unexpected(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_continues_the_same_session_in_plain_text() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(demo_report_json().to_string()));
        model.push_reply(Ok("中性".to_string()));
        let interpreter = interpreter(&model);

        let mut session = interpreter.analyze(DEMO_DREAM).await.unwrap().session;
        let reply = interpreter.chat(&mut session, "此梦主吉还是主凶？").await.unwrap();

        assert_eq!(reply, "中性");
        let calls = model.calls();
        assert_eq!(calls[1].session_id, session.id());
        assert!(!calls[1].json_mode);
        // The model saw the analysis exchange as prior context.
        assert_eq!(calls[1].history_len, 2);
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[3].role, ChatRole::Model);
    }

    #[tokio::test]
    async fn empty_chat_reply_becomes_the_silence_phrase() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(demo_report_json().to_string()));
        model.push_reply(Ok("  ".to_string()));
        let interpreter = interpreter(&model);

        let mut session = interpreter.analyze(DEMO_DREAM).await.unwrap().session;
        let reply = interpreter.chat(&mut session, "还有吗？").await.unwrap();
        assert_eq!(reply, CHAT_SILENCE_FALLBACK);
    }

    #[tokio::test]
    async fn each_analysis_gets_a_fresh_session() {
        let model = Arc::new(ScriptedModel::new());
        model.push_reply(Ok(demo_report_json().to_string()));
        model.push_reply(Ok(demo_report_json().to_string()));
        model.push_reply(Ok("second".to_string()));
        let interpreter = interpreter(&model);

        let first = interpreter.analyze(DEMO_DREAM).await.unwrap().session;
        let mut second = interpreter.analyze("我梦见自己在飞").await.unwrap().session;
        assert_ne!(first.id(), second.id());

        interpreter.chat(&mut second, "为什么？").await.unwrap();
        assert_eq!(model.calls()[2].session_id, second.id());
        assert_eq!(first.history().len(), 2);
        interpreter.close_session(first);
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let model = Arc::new(ScriptedModel::new().with_delay(Duration::from_millis(200)));
        model.push_reply(Ok(demo_report_json().to_string()));
        let interpreter = DreamInterpreter::new(model.clone(), Duration::from_millis(20));
        let err = interpreter.analyze(DEMO_DREAM).await.unwrap_err();
        assert!(matches!(err, InterpretError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_request() {
        let model = Arc::new(ScriptedModel::new().with_delay(Duration::from_secs(5)));
        model.push_reply(Ok(demo_report_json().to_string()));
        let interpreter = interpreter(&model);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = interpreter
            .analyze_with_cancel(DEMO_DREAM, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, InterpretError::Cancelled));
    }

    #[test]
    fn user_message_hides_upstream_detail() {
        let err = InterpretError::Upstream(PortError::Unexpected("socket closed".to_string()));
        assert_eq!(err.user_message(), ANALYSIS_ERROR_MESSAGE);
        assert_eq!(
            InterpretError::MalformedResponse("x".to_string()).user_message(),
            ANALYSIS_ERROR_MESSAGE
        );
    }
}
