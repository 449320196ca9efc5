//! In-memory generative model used by the unit tests.

use crate::ports::{
    GenerativeModelService, OutputMode, PortError, PortResult, SessionConfig, SessionHandle,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub session_id: Uuid,
    pub system_instruction: String,
    pub temperature: f32,
    pub message: String,
    pub json_mode: bool,
    pub history_len: usize,
}

/// Replays queued replies in order and records every send.
pub(crate) struct ScriptedModel {
    has_credential: bool,
    delay: Option<Duration>,
    replies: Mutex<VecDeque<PortResult<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            has_credential: true,
            delay: None,
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_credential() -> Self {
        Self {
            has_credential: false,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: PortResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModelService for ScriptedModel {
    fn create_session(&self, config: SessionConfig) -> PortResult<SessionHandle> {
        if !self.has_credential {
            return Err(PortError::MissingCredential);
        }
        Ok(SessionHandle::new(config))
    }

    async fn send(
        &self,
        session: &mut SessionHandle,
        message: &str,
        mode: OutputMode<'_>,
    ) -> PortResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            session_id: session.id,
            system_instruction: session.config.system_instruction.clone(),
            temperature: session.config.temperature,
            message: message.to_string(),
            json_mode: matches!(mode, OutputMode::Json(_)),
            history_len: session.history().len(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("no scripted reply".to_string())))?;
        session.record_exchange(message, &reply);
        Ok(reply)
    }
}

/// The canned analysis of the demo dream.
pub(crate) fn demo_report_json() -> Value {
    json!({
        "introduction": "迷宫者，心之所困也；追者，影之所随也。",
        "psychological_decode": {
            "content": "追逐梦境常是回避焦虑的投射，追逐者象征被压抑的自我部分。",
            "key_concepts": ["阴影 (Shadow)", "回避 (Avoidance)"]
        },
        "traditional_divination": {
            "content": "迷路主前途迷惘，宜守不宜进，静待时机。",
            "cultural_context": "《易经》蹇卦：险在前也，见险而能止。"
        },
        "sources": [
            { "id": "Psych-1", "text": "Carl Jung, 'Man and His Symbols'" },
            { "id": "Trad-1", "text": "周公解梦 (Zhou Gong Jie Meng)" },
            { "id": "Trad-2", "text": "易经 (I Ching), 蹇卦 (Hexagram 39 Jian)" }
        ]
    })
}
