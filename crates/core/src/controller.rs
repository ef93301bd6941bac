use crate::error::{IntentError, SessionError};
use crate::ports::CaptureError;
use crate::session::{Feedback, Session, SessionSnapshot, Status};
use crate::{Command, Intent, PortEvent, Ticket, Utterance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Speech(Utterance),
    Capture,
    Evaluation,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: Ticket,
    operation: Operation,
}

/// The rehearsal state machine.
///
/// Every operation mutates the owned `Session` and returns the side effects
/// the runtime has to carry out. Nothing in here awaits; port completions
/// come back through `handle`, and only the completion for the single
/// outstanding ticket is applied.
pub struct SessionController {
    session: Session,
    pending: Option<Pending>,
    next_ticket: u64,
}

impl SessionController {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            session: Session::new(application_id.into()),
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> Status {
        self.session.status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Applies the outcome of question resolution. Only meaningful while
    /// `Initializing`.
    pub fn start(&mut self, resolution: Result<Vec<String>, SessionError>) -> Vec<Command> {
        if self.session.status != Status::Initializing {
            tracing::warn!(
                "Ignoring question resolution while {:?}",
                self.session.status
            );
            return vec![];
        }
        match resolution {
            Ok(questions) if questions.is_empty() => self.fail(SessionError::NoQuestionsAvailable),
            Ok(questions) => {
                tracing::info!(
                    "Starting rehearsal for application {} with {} questions",
                    self.session.application_id,
                    questions.len()
                );
                self.session.questions = questions;
                self.session.current_index = 0;
                self.present_current()
            }
            Err(e) => self.fail(e),
        }
    }

    /// Ends the session with an unrecoverable error.
    pub fn fail(&mut self, error: SessionError) -> Vec<Command> {
        if self.session.status.is_terminal() {
            return vec![];
        }
        tracing::error!("Rehearsal failed: {}", error);
        self.pending = None;
        self.session.status = Status::FatalError;
        self.session.capturing = false;
        self.session.last_error = Some(error.to_string());
        self.session.fatal = Some(error);
        vec![Command::Release]
    }

    /// Applies a port completion. Completions that do not belong to the
    /// outstanding operation are discarded without touching the session.
    pub fn handle(&mut self, event: PortEvent) -> Vec<Command> {
        let ticket = event.ticket();
        let pending = match self.pending {
            Some(pending) if pending.ticket == ticket => pending,
            _ => {
                tracing::debug!(
                    "Discarding stale completion {:?} while {:?}",
                    ticket,
                    self.session.status
                );
                return vec![];
            }
        };

        match (pending.operation, self.session.status, event) {
            (
                Operation::Speech(Utterance::Question),
                Status::Presenting,
                PortEvent::SpeechFinished { .. },
            ) => {
                self.pending = None;
                self.session.status = Status::AwaitingCapture;
                self.begin_capture()
            }
            (
                Operation::Speech(Utterance::Question),
                Status::AwaitingCapture,
                PortEvent::SpeechFinished { .. },
            ) => {
                // Replayed while capture was idle.
                self.pending = None;
                self.begin_capture()
            }
            (
                Operation::Speech(_),
                Status::Reviewing,
                PortEvent::SpeechFinished { .. },
            ) => {
                self.pending = None;
                tracing::debug!("Speech for question {} finished during review", self.session.current_index + 1);
                vec![]
            }
            (
                Operation::Capture,
                Status::AwaitingCapture,
                PortEvent::CaptureFinished { result, .. },
            ) => {
                self.pending = None;
                self.session.capturing = false;
                match result {
                    Ok(transcript) if !transcript.trim().is_empty() => {
                        self.evaluate(transcript.trim().to_string())
                    }
                    Ok(_) => self.capture_failed(CaptureError::NoSpeech),
                    Err(e) => self.capture_failed(e),
                }
            }
            (
                Operation::Evaluation,
                Status::Evaluating,
                PortEvent::EvaluationFinished { result, .. },
            ) => {
                self.pending = None;
                self.session.status = Status::Reviewing;
                match result {
                    Ok(evaluation) => {
                        let feedback = Feedback::from(evaluation);
                        tracing::info!(
                            "Question {} scored {}/10",
                            self.session.current_index + 1,
                            feedback.score
                        );
                        let text = feedback.feedback_text.clone();
                        self.session.feedback = Some(feedback);
                        self.session.last_error = None;
                        self.speak(text, Utterance::Feedback)
                    }
                    Err(e) => {
                        tracing::warn!("Evaluation failed, using placeholder feedback: {:?}", e);
                        self.session.feedback = Some(Feedback::sentinel());
                        self.session.last_error = Some(e.to_string());
                        vec![]
                    }
                }
            }
            (operation, status, event) => {
                tracing::warn!(
                    "Completion {:?} does not match pending {:?} while {:?}",
                    event,
                    operation,
                    status
                );
                vec![]
            }
        }
    }

    pub fn apply(&mut self, intent: Intent) -> Result<Vec<Command>, IntentError> {
        match intent {
            Intent::Advance => self.advance(),
            Intent::RetryCapture => self.retry_capture(),
            Intent::StopCapture => self.stop_capture(),
            Intent::ReplayQuestion => self.replay_question(),
            Intent::Close => Ok(self.close()),
        }
    }

    /// Moves past the reviewed question, or completes the session after the
    /// last one.
    pub fn advance(&mut self) -> Result<Vec<Command>, IntentError> {
        if self.session.status != Status::Reviewing || self.session.feedback.is_none() {
            return Err(self.not_allowed(Intent::Advance));
        }

        let mut commands = vec![];
        if self.pending.take().is_some() {
            // Feedback is still being spoken.
            commands.push(Command::StopSpeech);
        }

        if self.session.is_last_question() {
            tracing::info!("Rehearsal for application {} completed", self.session.application_id);
            self.session.status = Status::Completed;
            self.session.last_error = None;
            commands.push(Command::Release);
            return Ok(commands);
        }

        self.session.current_index += 1;
        self.session.last_error = None;
        commands.extend(self.present_current());
        Ok(commands)
    }

    /// Re-arms capture after a failed or stopped recording.
    pub fn retry_capture(&mut self) -> Result<Vec<Command>, IntentError> {
        if self.session.status != Status::AwaitingCapture || self.session.capturing {
            return Err(self.not_allowed(Intent::RetryCapture));
        }
        let mut commands = vec![];
        if self.pending.take().is_some() {
            // A replayed question is still being spoken.
            commands.push(Command::StopSpeech);
        }
        self.session.last_error = None;
        commands.extend(self.begin_capture());
        Ok(commands)
    }

    /// Speaks the current question again. While capture is idle the
    /// recording is re-armed once it has been spoken; during review the
    /// transcript and feedback stay as they are.
    pub fn replay_question(&mut self) -> Result<Vec<Command>, IntentError> {
        let capture_idle =
            self.session.status == Status::AwaitingCapture && !self.session.capturing;
        if !capture_idle && self.session.status != Status::Reviewing {
            return Err(self.not_allowed(Intent::ReplayQuestion));
        }

        let mut commands = vec![];
        if self.pending.take().is_some() {
            commands.push(Command::StopSpeech);
        }
        if capture_idle {
            self.session.last_error = None;
        }
        tracing::info!("Replaying question {}", self.session.current_index + 1);
        let question = self.session.questions[self.session.current_index].clone();
        commands.extend(self.speak(question, Utterance::Question));
        Ok(commands)
    }

    /// Abandons the recording in progress; the session stays on the same
    /// question with capture idle.
    pub fn stop_capture(&mut self) -> Result<Vec<Command>, IntentError> {
        if self.session.status != Status::AwaitingCapture || !self.session.capturing {
            return Err(self.not_allowed(Intent::StopCapture));
        }
        tracing::info!("Capture stopped for question {}", self.session.current_index + 1);
        self.pending = None;
        self.session.capturing = false;
        Ok(vec![Command::StopCapture])
    }

    /// Closes the session from any state. Closing a finished session is a no-op.
    pub fn close(&mut self) -> Vec<Command> {
        if self.session.status.is_terminal() {
            return vec![];
        }
        tracing::info!(
            "Rehearsal closed while {:?} at question {}",
            self.session.status,
            self.session.current_index + 1
        );
        self.pending = None;
        self.session.status = Status::Closed;
        self.session.capturing = false;
        vec![Command::Release]
    }

    fn present_current(&mut self) -> Vec<Command> {
        self.session.status = Status::Presenting;
        self.session.capturing = false;
        self.session.transcript = None;
        self.session.feedback = None;
        let question = self.session.questions[self.session.current_index].clone();
        tracing::info!(
            "Presenting question {} of {}",
            self.session.current_index + 1,
            self.session.questions.len()
        );
        self.speak(question, Utterance::Question)
    }

    fn speak(&mut self, text: String, utterance: Utterance) -> Vec<Command> {
        let ticket = self.issue(Operation::Speech(utterance));
        vec![Command::Speak {
            ticket,
            text,
            utterance,
        }]
    }

    fn begin_capture(&mut self) -> Vec<Command> {
        self.session.capturing = true;
        let ticket = self.issue(Operation::Capture);
        vec![Command::StartCapture { ticket }]
    }

    fn evaluate(&mut self, transcript: String) -> Vec<Command> {
        tracing::info!("Captured answer: \"{}\"", transcript);
        self.session.status = Status::Evaluating;
        self.session.transcript = Some(transcript.clone());
        self.session.feedback = None;
        self.session.last_error = None;
        let question = self.session.questions[self.session.current_index].clone();
        let ticket = self.issue(Operation::Evaluation);
        vec![Command::Evaluate {
            ticket,
            application_id: self.session.application_id.clone(),
            question,
            transcript,
        }]
    }

    fn capture_failed(&mut self, error: CaptureError) -> Vec<Command> {
        tracing::warn!(
            "Capture failed for question {}: {}",
            self.session.current_index + 1,
            error
        );
        self.session.last_error = Some(error.to_string());
        vec![]
    }

    fn issue(&mut self, operation: Operation) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending = Some(Pending { ticket, operation });
        ticket
    }

    fn not_allowed(&self, intent: Intent) -> IntentError {
        tracing::debug!("Rejected {} while {:?}", intent, self.session.status);
        IntentError::NotAllowed {
            intent,
            status: self.session.status,
        }
    }
}
