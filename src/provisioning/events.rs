use serde::Serialize;
use tokio::sync::mpsc;

use super::pipeline::ArtifactKind;
use super::progress::Progress;
use super::step::{StepError, StepKind};

/// Observable session activity, rendered by the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// All simulators and results were cleared for a new run
    Cleared { run: u64 },
    StepStarted { step: StepKind },
    StepProgress { step: StepKind, progress: Progress },
    StepSucceeded { step: StepKind },
    StepFailed { step: StepKind, error: StepError },
    ArtifactCreated { kind: ArtifactKind, id: String },
    ArtifactOrphaned { kind: ArtifactKind, id: String },
    RollbackStarted { artifacts: usize },
    RollbackFinished { failures: usize },
    Committed,
    Closed,
}

/// Fan-out point for session events; silent until someone subscribes
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sender = Some(tx);
        rx
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is watching anymore
            let _ = sender.send(event);
        }
    }
}
