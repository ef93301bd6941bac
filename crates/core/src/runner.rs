use crate::controller::SessionController;
use crate::error::SessionError;
use crate::evaluator::SharedEvaluator;
use crate::ports::{CaptureError, SharedSpeechInput, SharedSpeechOutput, SpeechError};
use crate::question_source::{QuestionSource, SharedSessionStarter};
use crate::session::SessionSnapshot;
use crate::{Command, Intent, PortEvent};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// The capability collaborators bound to one session.
#[derive(Clone)]
pub struct Ports {
    pub speech_output: SharedSpeechOutput,
    pub speech_input: SharedSpeechInput,
    pub evaluator: SharedEvaluator,
    pub starter: SharedSessionStarter,
}

/// Drives a `SessionController` against real ports.
///
/// Port calls run on spawned tasks and report back over a channel, so the
/// loop below only ever waits on two things: a completion or an intent.
/// Each utterance gets its own task, which is aborted when speech is
/// stopped, so an utterance cancelled before it started never plays.
pub struct SessionRunner {
    controller: SessionController,
    blob: Option<String>,
    ports: Ports,
    snapshots: watch::Sender<SessionSnapshot>,
    transitions: broadcast::Sender<SessionSnapshot>,
    speech: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<PortEvent>,
    events_rx: mpsc::Receiver<PortEvent>,
}

impl SessionRunner {
    pub fn new(application_id: impl Into<String>, blob: Option<String>, ports: Ports) -> Self {
        let controller = SessionController::new(application_id);
        let (snapshots, _) = watch::channel(controller.snapshot());
        let (transitions, _) = broadcast::channel(64);
        let (events_tx, events_rx) = mpsc::channel(32);
        Self {
            controller,
            blob,
            ports,
            snapshots,
            transitions,
            speech: None,
            events_tx,
            events_rx,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    /// The latest state of the session. Intermediate states may be skipped
    /// by a slow reader; use `subscribe_transitions` to see every one.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Every published snapshot, in order. A reader that falls more than 64
    /// transitions behind gets `RecvError::Lagged`.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.transitions.subscribe()
    }

    /// Runs the session until it completes, fails or is closed, and returns
    /// the final snapshot. Dropping the intent sender closes the session.
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) -> SessionSnapshot {
        if let Some(error) = self.unsupported_capability() {
            let commands = self.controller.fail(error);
            self.dispatch(commands).await;
            self.publish();
            return self.controller.snapshot();
        }

        let source = QuestionSource::new(self.ports.starter.clone());
        let blob = self.blob.take();
        let application_id = self.controller.session().application_id().to_string();
        let resolve = async move { source.resolve(blob.as_deref(), &application_id).await };
        tokio::pin!(resolve);

        while !self.controller.status().is_terminal() {
            tokio::select! {
                resolution = &mut resolve => {
                    let commands = self.controller.start(resolution);
                    self.dispatch(commands).await;
                    break;
                }
                intent = intents.recv() => {
                    self.on_intent(intent.unwrap_or(Intent::Close)).await;
                }
            }
            self.publish();
        }
        self.publish();

        while !self.controller.status().is_terminal() {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    let commands = self.controller.handle(event);
                    self.dispatch(commands).await;
                }
                intent = intents.recv() => {
                    self.on_intent(intent.unwrap_or(Intent::Close)).await;
                }
            }
            self.publish();
        }

        tracing::info!("Session ended as {:?}", self.controller.status());
        self.controller.snapshot()
    }

    fn unsupported_capability(&self) -> Option<SessionError> {
        if !self.ports.speech_input.is_supported() {
            return Some(SessionError::CapabilityUnsupported(
                CaptureError::Unsupported.to_string(),
            ));
        }
        if !self.ports.speech_output.is_supported() {
            return Some(SessionError::CapabilityUnsupported(
                "Speech synthesis is not supported in this environment.".to_string(),
            ));
        }
        None
    }

    async fn on_intent(&mut self, intent: Intent) {
        match self.controller.apply(intent) {
            Ok(commands) => self.dispatch(commands).await,
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        let changed = self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot.clone();
            true
        });
        if changed {
            // No subscribers is fine.
            let _ = self.transitions.send(snapshot);
        }
    }

    async fn stop_speech(&mut self) {
        if let Some(speech) = self.speech.take() {
            speech.abort();
        }
        self.ports.speech_output.cancel().await;
    }

    async fn dispatch(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Speak {
                    ticket,
                    text,
                    utterance,
                } => {
                    let output = self.ports.speech_output.clone();
                    let events = self.events_tx.clone();
                    self.speech = Some(tokio::spawn(async move {
                        match output.speak(&text).await {
                            Ok(()) => {}
                            Err(SpeechError::Interrupted) => {
                                tracing::debug!("{:?} speech interrupted", utterance);
                                return;
                            }
                            Err(e) => {
                                tracing::warn!("{:?} speech failed, continuing: {}", utterance, e)
                            }
                        }
                        if events.send(PortEvent::SpeechFinished { ticket }).await.is_err() {
                            tracing::debug!("Session ended before speech finished");
                        }
                    }));
                }
                Command::StartCapture { ticket } => {
                    let input = self.ports.speech_input.clone();
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let result = input.capture().await;
                        if events
                            .send(PortEvent::CaptureFinished { ticket, result })
                            .await
                            .is_err()
                        {
                            tracing::debug!("Session ended before capture finished");
                        }
                    });
                }
                Command::Evaluate {
                    ticket,
                    application_id,
                    question,
                    transcript,
                } => {
                    let evaluator = self.ports.evaluator.clone();
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let result = evaluator
                            .evaluate(&application_id, &question, &transcript)
                            .await;
                        if events
                            .send(PortEvent::EvaluationFinished { ticket, result })
                            .await
                            .is_err()
                        {
                            tracing::debug!("Session ended before evaluation finished, dropping result");
                        }
                    });
                }
                Command::StopSpeech => self.stop_speech().await,
                Command::StopCapture => self.ports.speech_input.stop().await,
                Command::Release => {
                    self.stop_speech().await;
                    self.ports.speech_input.stop().await;
                }
            }
        }
    }
}
