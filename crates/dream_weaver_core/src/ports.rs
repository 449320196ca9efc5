//! crates/dream_weaver_core/src/ports.rs
//!
//! Defines the service contract (trait) between the core and the hosted
//! generative model. This trait forms the boundary of the hexagonal
//! architecture: the core never sees the provider's SDK or wire format.

use crate::domain::ChatRole;
use crate::schema::SchemaNode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, API).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("No credential is configured for the generative model")]
    MissingCredential,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Session Types
//=========================================================================================

/// Parameters fixed for the lifetime of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub system_instruction: String,
    pub temperature: f32,
}

/// One completed turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

/// A conversation with the model. Owned by the caller, never by the adapter;
/// the adapter replays `history` on every request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config: SessionConfig,
    history: Vec<Turn>,
}

impl SessionHandle {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Appends a successful request/reply pair. Failed sends record nothing.
    pub fn record_exchange(&mut self, user_text: &str, model_text: &str) {
        self.history.push(Turn {
            role: ChatRole::User,
            text: user_text.to_string(),
        });
        self.history.push(Turn {
            role: ChatRole::Model,
            text: model_text.to_string(),
        });
    }
}

/// How the model should format its reply to a single message.
#[derive(Debug, Clone, Copy)]
pub enum OutputMode<'a> {
    /// Reply must be JSON matching the given schema.
    Json(&'a SchemaNode),
    /// Free-form natural text.
    PlainText,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait GenerativeModelService: Send + Sync {
    /// Opens a conversation. Must fail with `MissingCredential` before any
    /// network activity when the adapter has no credential.
    fn create_session(&self, config: SessionConfig) -> PortResult<SessionHandle>;

    /// Sends one message on the session and returns the reply text, which may
    /// be empty. On success the exchange is appended to the session history.
    async fn send(
        &self,
        session: &mut SessionHandle,
        message: &str,
        mode: OutputMode<'_>,
    ) -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_handles_are_distinct_and_empty() {
        let config = SessionConfig {
            system_instruction: "sys".to_string(),
            temperature: 0.4,
        };
        let a = SessionHandle::new(config.clone());
        let b = SessionHandle::new(config);
        assert_ne!(a.id, b.id);
        assert!(a.history().is_empty());
    }

    #[test]
    fn record_exchange_appends_user_then_model() {
        let mut handle = SessionHandle::new(SessionConfig {
            system_instruction: String::new(),
            temperature: 0.4,
        });
        handle.record_exchange("q", "a");
        assert_eq!(handle.history().len(), 2);
        assert_eq!(handle.history()[0].role, ChatRole::User);
        assert_eq!(handle.history()[1].text, "a");
    }
}
