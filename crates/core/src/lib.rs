pub mod controller;
pub mod error;
pub mod evaluator;
pub mod interview_api;
pub mod ports;
pub mod question_source;
pub mod runner;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use crate::evaluator::{Evaluation, EvaluationError};
use crate::ports::CaptureError;

/// Identifies one outstanding port request issued by the controller.
///
/// Completions are matched against the ticket of the single pending
/// operation; anything else is a stale callback and gets dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

/// What the spoken text is for. Only used for logging and by adapters that
/// want to voice questions and feedback differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utterance {
    Question,
    Feedback,
}

/// Represents commands that the core logic (`SessionController`) issues to the runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (speaking, recording, scoring).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Speak the given text and report `PortEvent::SpeechFinished` when done.
    Speak {
        ticket: Ticket,
        text: String,
        utterance: Utterance,
    },
    /// Start recording an answer and report `PortEvent::CaptureFinished`.
    StartCapture { ticket: Ticket },
    /// Abort the in-flight capture without reporting back.
    StopCapture,
    /// Silence any speech in progress without reporting back.
    StopSpeech,
    /// Send the answer to the remote scorer and report `PortEvent::EvaluationFinished`.
    Evaluate {
        ticket: Ticket,
        application_id: String,
        question: String,
        transcript: String,
    },
    /// The session reached a terminal status; release every port.
    Release,
}

/// Completions reported by the runtime back into the controller.
#[derive(Debug, Clone)]
pub enum PortEvent {
    SpeechFinished {
        ticket: Ticket,
    },
    CaptureFinished {
        ticket: Ticket,
        result: Result<String, CaptureError>,
    },
    EvaluationFinished {
        ticket: Ticket,
        result: Result<Evaluation, EvaluationError>,
    },
}

impl PortEvent {
    pub fn ticket(&self) -> Ticket {
        match self {
            PortEvent::SpeechFinished { ticket }
            | PortEvent::CaptureFinished { ticket, .. }
            | PortEvent::EvaluationFinished { ticket, .. } => *ticket,
        }
    }
}

/// User intents forwarded by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Advance,
    RetryCapture,
    StopCapture,
    ReplayQuestion,
    Close,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::Advance => "advance",
            Intent::RetryCapture => "retry capture",
            Intent::StopCapture => "stop capture",
            Intent::ReplayQuestion => "replay the question",
            Intent::Close => "close",
        };
        f.write_str(name)
    }
}
