//! Caller-supplied conversation history.
//!
//! History travels in the request and response bodies; the server keeps no
//! conversation state between requests. Turns are validated at the HTTP
//! boundary rather than passed through untyped.

use serde::{Deserialize, Serialize};

/// The role of a conversation turn.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona instructions. Injected internally, never accepted from callers.
    System,
    /// A visitor message.
    User,
    /// A reply from the completion service.
    Assistant,
    /// A tool invocation result. Only appears inside the completion loop.
    Tool,
}

/// One message in the conversation sequence.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// The turn's text content.
    pub content: String,
}

impl Turn {
    /// A visitor turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Error type for history validation.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Callers must not supply a system turn; it is injected internally.
    #[error("history must not contain a system turn (position {0})")]
    SystemTurn(usize),
    /// Tool turns only exist inside the completion loop and are never
    /// round-tripped to callers.
    #[error("history must not contain a tool turn (position {0})")]
    ToolTurn(usize),
}

/// Validate caller-supplied history before it reaches the responder.
pub fn validate_history(history: &[Turn]) -> Result<(), HistoryError> {
    for (i, turn) in history.iter().enumerate() {
        match turn.role {
            Role::System => return Err(HistoryError::SystemTurn(i)),
            Role::Tool => return Err(HistoryError::ToolTurn(i)),
            Role::User | Role::Assistant => {}
        }
    }
    Ok(())
}
