use crate::error::SessionError;
use serde::Serialize;

/// Text stored as feedback when the remote scorer could not be reached.
pub const SENTINEL_FEEDBACK: &str = "<evaluation failed>";

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Initializing,
    Presenting,
    AwaitingCapture,
    Evaluating,
    Reviewing,
    Completed,
    Closed,
    FatalError,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Closed | Status::FatalError)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub score: f64,
    pub feedback_text: String,
}

impl Feedback {
    /// Builds feedback with the score clamped into `[0, 10]`.
    pub fn new(score: f64, feedback_text: impl Into<String>) -> Self {
        let clamped = if score.is_nan() {
            MIN_SCORE
        } else {
            score.clamp(MIN_SCORE, MAX_SCORE)
        };
        if clamped != score {
            tracing::warn!("Score {} is outside 0..=10, using {}", score, clamped);
        }
        Self {
            score: clamped,
            feedback_text: feedback_text.into(),
        }
    }

    /// The zero-score placeholder used when evaluation fails.
    pub fn sentinel() -> Self {
        Self {
            score: MIN_SCORE,
            feedback_text: SENTINEL_FEEDBACK.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.score == MIN_SCORE && self.feedback_text == SENTINEL_FEEDBACK
    }
}

/// One rehearsal run. Only `SessionController` mutates it.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) application_id: String,
    pub(crate) questions: Vec<String>,
    pub(crate) current_index: usize,
    pub(crate) transcript: Option<String>,
    pub(crate) feedback: Option<Feedback>,
    pub(crate) status: Status,
    pub(crate) capturing: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) fatal: Option<SessionError>,
}

impl Session {
    pub(crate) fn new(application_id: String) -> Self {
        Self {
            application_id,
            questions: Vec::new(),
            current_index: 0,
            transcript: None,
            feedback: None,
            status: Status::Initializing,
            capturing: false,
            last_error: None,
            fatal: None,
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&str> {
        self.questions.get(self.current_index).map(String::as_str)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn fatal(&self) -> Option<&SessionError> {
        self.fatal.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            application_id: self.application_id.clone(),
            status: self.status,
            current_index: self.current_index,
            question_count: self.questions.len(),
            current_question: self.current_question().map(str::to_string),
            transcript: self.transcript.clone(),
            feedback: self.feedback.clone(),
            last_error: self.last_error.clone(),
            capturing: self.capturing,
            fatal: self.fatal.clone(),
        }
    }
}

/// Read-only view of a `Session` handed to the presentation layer after
/// every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub application_id: String,
    pub status: Status,
    pub current_index: usize,
    pub question_count: usize,
    pub current_question: Option<String>,
    pub transcript: Option<String>,
    pub feedback: Option<Feedback>,
    pub last_error: Option<String>,
    pub capturing: bool,
    pub fatal: Option<SessionError>,
}
