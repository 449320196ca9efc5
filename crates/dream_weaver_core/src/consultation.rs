//! crates/dream_weaver_core/src/consultation.rs
//!
//! One visitor's consultation: the analysis lifecycle, the live session and the
//! chat transcript.
//!
//! Every network call is split into a `begin_*` step, which validates and
//! updates state, and a `finish_*` step, which records the outcome. Callers that
//! share a consultation behind a lock only hold that lock for the two short
//! steps, never across the request itself.

use crate::domain::{ChatMessage, DreamReport};
use crate::interpreter::{Analysis, DreamInterpreter, DreamSession, InterpretError};
use crate::prompt::CHAT_ERROR_MESSAGE;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Top-level state of a consultation. Chat turns happen inside `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Analyzing,
    Complete,
    Error,
}

/// An analysis that has been started and must be passed back to
/// `finish_analysis`.
#[derive(Debug)]
pub struct AnalysisTicket {
    generation: u64,
    pub dream_text: String,
    pub cancel: CancellationToken,
}

/// A chat turn in flight. The session travels with the turn and is put back by
/// `finish_chat`.
#[derive(Debug)]
pub struct ChatTurn {
    generation: u64,
    pub session: DreamSession,
    pub message: String,
    pub cancel: CancellationToken,
}

/// A serializable view of a consultation.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: AnalysisState,
    pub report: Option<DreamReport>,
    pub transcript: Vec<ChatMessage>,
    pub error_message: Option<String>,
    pub session_id: Option<Uuid>,
    pub chat_in_flight: bool,
}

#[derive(Debug)]
pub struct Consultation {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: AnalysisState,
    report: Option<DreamReport>,
    session: Option<DreamSession>,
    transcript: Vec<ChatMessage>,
    error_message: Option<String>,
    chat_in_flight: bool,
    /// Bumped by `reset`; results from an older generation are discarded.
    generation: u64,
    cancel: CancellationToken,
}

impl Default for Consultation {
    fn default() -> Self {
        Self::new()
    }
}

impl Consultation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: AnalysisState::Idle,
            report: None,
            session: None,
            transcript: Vec::new(),
            error_message: None,
            chat_in_flight: false,
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn report(&self) -> Option<&DreamReport> {
        self.report.as_ref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn snapshot(&self) -> ConsultationSnapshot {
        ConsultationSnapshot {
            id: self.id,
            created_at: self.created_at,
            state: self.state,
            report: self.report.clone(),
            transcript: self.transcript.clone(),
            error_message: self.error_message.clone(),
            session_id: self.session.as_ref().map(DreamSession::id),
            chat_in_flight: self.chat_in_flight,
        }
    }

    //=====================================================================================
    // Analysis
    //=====================================================================================

    /// Starts a new analysis. A previous report, session and transcript are
    /// discarded. A second analysis while one is running is rejected.
    pub fn begin_analysis(&mut self, dream_text: &str) -> Result<AnalysisTicket, InterpretError> {
        if self.state == AnalysisState::Analyzing {
            return Err(InterpretError::AnalysisInProgress);
        }
        if self.chat_in_flight {
            return Err(InterpretError::ChatInProgress);
        }
        if dream_text.trim().is_empty() {
            return Err(InterpretError::EmptyInput);
        }

        if let Some(old) = self.session.take() {
            old.close();
        }
        self.report = None;
        self.transcript.clear();
        self.error_message = None;
        self.state = AnalysisState::Analyzing;

        Ok(AnalysisTicket {
            generation: self.generation,
            dream_text: dream_text.to_string(),
            cancel: self.cancel.child_token(),
        })
    }

    pub fn finish_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: Result<Analysis, InterpretError>,
    ) -> Result<DreamReport, InterpretError> {
        if ticket.generation != self.generation {
            if let Ok(stale) = result {
                stale.session.close();
            }
            return Err(InterpretError::Cancelled);
        }

        match result {
            Ok(Analysis { report, session }) => {
                info!(
                    "Consultation {} complete on session {}.",
                    self.id,
                    session.id()
                );
                self.session = Some(session);
                self.report = Some(report.clone());
                self.state = AnalysisState::Complete;
                Ok(report)
            }
            Err(InterpretError::Cancelled) => {
                info!("Consultation {} analysis abandoned.", self.id);
                self.state = AnalysisState::Idle;
                Err(InterpretError::Cancelled)
            }
            Err(e) => {
                warn!("Consultation {} analysis failed: {}", self.id, e);
                self.error_message = Some(e.user_message());
                self.state = AnalysisState::Error;
                Err(e)
            }
        }
    }

    /// Runs a full analysis when the caller owns the consultation outright.
    pub async fn submit_dream(
        &mut self,
        interpreter: &DreamInterpreter,
        dream_text: &str,
    ) -> Result<DreamReport, InterpretError> {
        let ticket = self.begin_analysis(dream_text)?;
        let result = interpreter
            .analyze_with_cancel(&ticket.dream_text, &ticket.cancel)
            .await;
        self.finish_analysis(ticket, result)
    }

    //=====================================================================================
    // Chat
    //=====================================================================================

    /// Starts a chat turn and records the user's message in the transcript.
    /// Fails with `NoActiveSession` when no analysis has completed.
    pub fn begin_chat(&mut self, message: &str) -> Result<ChatTurn, InterpretError> {
        if self.chat_in_flight {
            return Err(InterpretError::ChatInProgress);
        }
        if message.trim().is_empty() {
            return Err(InterpretError::EmptyInput);
        }
        let session = self.session.take().ok_or(InterpretError::NoActiveSession)?;

        self.transcript.push(ChatMessage::user(message));
        self.chat_in_flight = true;

        Ok(ChatTurn {
            generation: self.generation,
            session,
            message: message.to_string(),
            cancel: self.cancel.child_token(),
        })
    }

    /// Records the outcome of a chat turn. A failed turn becomes a flagged error
    /// message in the transcript; the conversation itself carries on.
    pub fn finish_chat(
        &mut self,
        turn: ChatTurn,
        result: Result<String, InterpretError>,
    ) -> Result<ChatMessage, InterpretError> {
        if turn.generation != self.generation {
            turn.session.close();
            return Err(InterpretError::Cancelled);
        }

        self.session = Some(turn.session);
        self.chat_in_flight = false;

        let message = match result {
            Ok(text) => ChatMessage::model(text),
            // The question was never answered; drop it so the transcript matches the session.
            Err(InterpretError::Cancelled) => {
                info!("Consultation {} chat turn abandoned.", self.id);
                self.transcript.pop();
                return Err(InterpretError::Cancelled);
            }
            Err(e) => {
                warn!("Consultation {} chat turn failed: {}", self.id, e);
                ChatMessage::model_error(CHAT_ERROR_MESSAGE)
            }
        };
        self.transcript.push(message.clone());
        Ok(message)
    }

    /// Runs a full chat turn when the caller owns the consultation outright.
    pub async fn ask(
        &mut self,
        interpreter: &DreamInterpreter,
        message: &str,
    ) -> Result<ChatMessage, InterpretError> {
        let mut turn = self.begin_chat(message)?;
        let result = interpreter
            .chat_with_cancel(&mut turn.session, &turn.message, &turn.cancel)
            .await;
        self.finish_chat(turn, result)
    }

    //=====================================================================================
    // Reset
    //=====================================================================================

    /// Returns to `Idle`: cancels anything in flight, closes the session and
    /// clears the report, transcript and error.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;

        if let Some(session) = self.session.take() {
            session.close();
        }
        self.report = None;
        self.transcript.clear();
        self.error_message = None;
        self.chat_in_flight = false;
        self.state = AnalysisState::Idle;
        info!("Consultation {} reset.", self.id);
    }
}
