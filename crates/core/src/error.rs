use crate::Intent;
use crate::session::Status;
use serde::Serialize;

/// Unrecoverable conditions that end a session in `Status::FatalError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum SessionError {
    #[error("No questions available for this application.")]
    NoQuestionsAvailable,
    #[error("{0}")]
    SessionStartFailed(String),
    #[error("{0}")]
    CapabilityUnsupported(String),
}

/// Returned when an intent arrives in a state that does not accept it.
/// The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("cannot {intent} while the session is {status:?}")]
    NotAllowed { intent: Intent, status: Status },
}
