//! Terminal stand-ins for the speech ports, plus the line router and the
//! snapshot renderer that make up the console front end.

use async_trait::async_trait;
use rehearsal_core::Intent;
use rehearsal_core::ports::{CaptureError, SpeechError, SpeechInput, SpeechOutput};
use rehearsal_core::session::{SessionSnapshot, Status};
use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};

/// "Speaks" by printing the utterance and holding for a per-word delay.
pub struct ConsoleSpeechOutput {
    word_delay: Duration,
    interrupt: Notify,
}

impl ConsoleSpeechOutput {
    pub fn new(word_delay: Duration) -> Self {
        Self {
            word_delay,
            interrupt: Notify::new(),
        }
    }

    fn speaking_time(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u32;
        self.word_delay * words
    }
}

#[async_trait]
impl SpeechOutput for ConsoleSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let interrupted = self.interrupt.notified();
        tokio::pin!(interrupted);
        // Registered before printing, so a cancel from here on is not missed.
        interrupted.as_mut().enable();

        println!("  > {}", text);
        tokio::select! {
            _ = tokio::time::sleep(self.speaking_time(text)) => Ok(()),
            _ = &mut interrupted => Err(SpeechError::Interrupted),
        }
    }

    async fn cancel(&self) {
        self.interrupt.notify_waiters();
    }
}

/// Takes the next typed line as the transcript of the outstanding capture.
#[derive(Default)]
pub struct ConsoleSpeechInput {
    armed: Mutex<Option<oneshot::Sender<String>>>,
}

impl ConsoleSpeechInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Hands `line` to the armed capture. Gives the line back when nothing
    /// is listening.
    pub fn deliver(&self, line: String) -> Result<(), String> {
        let sender = match self.armed.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(sender) => sender.send(line),
            None => Err(line),
        }
    }

    fn arm(&self) -> Result<oneshot::Receiver<String>, CaptureError> {
        let (tx, rx) = oneshot::channel();
        let mut slot = self
            .armed
            .lock()
            .map_err(|_| CaptureError::Failed("input slot poisoned".to_string()))?;
        *slot = Some(tx);
        Ok(rx)
    }
}

#[async_trait]
impl SpeechInput for ConsoleSpeechInput {
    async fn capture(&self) -> Result<String, CaptureError> {
        let rx = self.arm()?;
        rx.await
            .map_err(|_| CaptureError::Failed("recording stopped".to_string()))
    }

    async fn stop(&self) {
        if let Ok(mut slot) = self.armed.lock() {
            slot.take();
        }
    }
}

pub fn parse_intent(line: &str) -> Option<Intent> {
    match line.trim().to_lowercase().as_str() {
        "n" | "next" => Some(Intent::Advance),
        "r" | "retry" => Some(Intent::RetryCapture),
        "s" | "stop" => Some(Intent::StopCapture),
        "l" | "listen" => Some(Intent::ReplayQuestion),
        "q" | "quit" => Some(Intent::Close),
        _ => None,
    }
}

/// Reads stdin on a plain thread so a pending read never holds up shutdown.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Routes typed lines: while a capture is armed every line is the answer,
/// except the stop and quit words; otherwise lines are commands. Returning
/// drops `intents`, which closes the session.
pub async fn route_lines(
    mut lines: mpsc::UnboundedReceiver<String>,
    input: Arc<ConsoleSpeechInput>,
    intents: mpsc::Sender<Intent>,
) {
    while let Some(line) = lines.recv().await {
        let intent = parse_intent(&line);
        let control = matches!(intent, Some(Intent::StopCapture | Intent::Close));

        let line = if control || line.trim().is_empty() {
            line
        } else {
            match input.deliver(line) {
                Ok(()) => continue,
                Err(line) => line,
            }
        };

        match intent {
            Some(intent) => {
                if intents.send(intent).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => println!("Unknown command '{}'. Use n, r, s, l or q.", line.trim()),
        }
    }
    tracing::debug!("Input closed");
}

pub fn render(snapshot: &SessionSnapshot) -> String {
    let position = format!(
        "Question {} of {}",
        snapshot.current_index + 1,
        snapshot.question_count
    );
    let is_last = snapshot.current_index + 1 >= snapshot.question_count;

    match snapshot.status {
        Status::Initializing => format!(
            "Preparing a rehearsal for application {}...",
            snapshot.application_id
        ),
        Status::Presenting => format!("{}:", position),
        Status::AwaitingCapture if snapshot.capturing => {
            "Listening. Type your answer and press Enter (s to stop, q to quit).".to_string()
        }
        Status::AwaitingCapture => match &snapshot.last_error {
            Some(error) => format!("{} Press r to try again.", error),
            None => "Recording stopped. Press r to record again.".to_string(),
        },
        Status::Evaluating => format!(
            "You said: {}\nEvaluating your answer...",
            snapshot.transcript.as_deref().unwrap_or_default()
        ),
        Status::Reviewing => {
            let verdict = match (&snapshot.feedback, &snapshot.last_error) {
                (Some(feedback), None) if !feedback.is_sentinel() => {
                    format!("Score: {}/10", feedback.score)
                }
                (_, Some(error)) => format!("Feedback unavailable. {}", error),
                _ => "Feedback unavailable.".to_string(),
            };
            let next = if is_last {
                "Press n to finish."
            } else {
                "Press n for the next question."
            };
            format!("{}\n{}", verdict, next)
        }
        Status::Completed => "Rehearsal complete. Well done!".to_string(),
        Status::Closed => "Rehearsal closed.".to_string(),
        Status::FatalError => format!(
            "Error: {}",
            snapshot.last_error.as_deref().unwrap_or("the session failed.")
        ),
    }
}

/// Prints the rendering of every transition, starting from `initial`, until
/// the session reaches a terminal status or the runner goes away.
pub async fn present(
    initial: SessionSnapshot,
    mut transitions: broadcast::Receiver<SessionSnapshot>,
) {
    let mut last = render(&initial);
    println!("{}", last);
    loop {
        let snapshot = match transitions.recv().await {
            Ok(snapshot) => snapshot,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Presenter fell behind, skipped {} updates", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let text = render(&snapshot);
        if text != last {
            println!("{}", text);
            last = text;
        }
        if snapshot.status.is_terminal() {
            break;
        }
    }
}
