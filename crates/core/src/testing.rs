//! Scripted port fakes shared by the runner tests.

use crate::evaluator::{Evaluation, EvaluationError, Evaluator};
use crate::ports::{CaptureError, SpeechError, SpeechInput, SpeechOutput};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Records every utterance and finishes it immediately.
pub(crate) struct RecordingSpeechOutput {
    pub spoken: Mutex<Vec<String>>,
    pub cancels: AtomicUsize,
    pub supported: bool,
}

impl RecordingSpeechOutput {
    pub fn new() -> Self {
        Self {
            spoken: Mutex::new(vec![]),
            cancels: AtomicUsize::new(0),
            supported: true,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechOutput for RecordingSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}

/// Every utterance fails with a synthesis error.
pub(crate) struct FailingSpeechOutput {
    pub attempts: AtomicUsize,
}

impl FailingSpeechOutput {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechOutput for FailingSpeechOutput {
    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SpeechError::Failed("voice engine crashed".to_string()))
    }

    async fn cancel(&self) {}
}

/// Utterances never finish on their own; counts how many were started and
/// how many were dropped before finishing.
pub(crate) struct EndlessSpeechOutput {
    pub started: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicUsize>,
}

impl EndlessSpeechOutput {
    pub fn new() -> Self {
        Self {
            started: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechOutput for EndlessSpeechOutput {
    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _guard = DropCounter(self.dropped.clone());
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn cancel(&self) {}
}

/// Hands out scripted capture results in order. A `None` entry, or running
/// out of script, means that capture never finishes.
pub(crate) struct ScriptedSpeechInput {
    script: Mutex<VecDeque<Option<Result<String, CaptureError>>>>,
    pub captures: AtomicUsize,
    pub stops: AtomicUsize,
    pub supported: bool,
}

impl ScriptedSpeechInput {
    pub fn new(script: Vec<Result<String, CaptureError>>) -> Self {
        Self::with_hangs(script.into_iter().map(Some).collect())
    }

    pub fn with_hangs(script: Vec<Option<Result<String, CaptureError>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            captures: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            supported: true,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl SpeechInput for ScriptedSpeechInput {
    async fn capture(&self) -> Result<String, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(result)) => result,
            Some(None) | None => std::future::pending().await,
        }
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}

/// An evaluator that holds every response until `release()` is called.
pub(crate) struct GatedEvaluator {
    gate: Notify,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
}

impl GatedEvaluator {
    pub fn new() -> Self {
        Self {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Evaluator for GatedEvaluator {
    async fn evaluate(
        &self,
        _application_id: &str,
        _question: &str,
        _transcript: &str,
    ) -> Result<Evaluation, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(Evaluation {
            score: 9.0,
            feedback: "Late but excellent.".to_string(),
        })
    }
}
