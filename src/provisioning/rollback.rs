use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::events::SessionEvent;
use super::executor::StepExecutor;
use super::pipeline::{ArtifactKind, ArtifactSpec};
use super::progress::Progress;
use super::step::{StepError, StepKind, StepOutcome};
use crate::api::{CallScope, RemoteCall};
use crate::observability::provisioning_metrics;

/// Test artifact created on the provider during a session
#[derive(Debug, Clone, Serialize)]
pub struct ExternalResourceHandle {
    pub kind: ArtifactKind,
    pub id: String,
    pub created_by: StepKind,
    /// Run (Test press) that created it
    pub run: u64,
    #[serde(skip)]
    pub spec: ArtifactSpec,
    /// Delete request body, built from the inputs of the run that created
    /// the artifact. Later edits to the session do not retarget it.
    #[serde(skip)]
    pub delete_payload: Value,
}

impl PartialEq for ExternalResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && self.created_by == other.created_by
            && self.run == other.run
    }
}

/// Artifacts created so far, in creation order
#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    live: Vec<ExternalResourceHandle>,
    orphaned: Vec<ExternalResourceHandle>,
}

impl ArtifactLedger {
    pub fn record(&mut self, handle: ExternalResourceHandle) {
        self.live.push(handle);
    }

    /// Forget artifacts that the successful `step` already removed
    pub fn release_by(&mut self, step: StepKind) -> Vec<ExternalResourceHandle> {
        let (released, kept): (Vec<_>, Vec<_>) = self
            .live
            .drain(..)
            .partition(|h| h.spec.released_by == Some(step));
        self.live = kept;
        released
    }

    /// Artifacts still standing, creation order
    pub fn outstanding(&self) -> &[ExternalResourceHandle] {
        &self.live
    }

    pub fn orphaned(&self) -> &[ExternalResourceHandle] {
        &self.orphaned
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Give up on every live artifact. Ids from an abandoned run are never
    /// used as rollback targets again.
    pub fn abandon_run(&mut self) -> Vec<ExternalResourceHandle> {
        let abandoned: Vec<_> = self.live.drain(..).collect();
        for handle in &abandoned {
            warn!(
                artifact = handle.kind.describe(),
                id = %handle.id,
                run = handle.run,
                "Artifact from previous run left on the provider"
            );
            provisioning_metrics().record_orphaned_artifact();
        }
        self.orphaned.extend(abandoned.iter().cloned());
        abandoned
    }

    /// Remove and return every live artifact
    pub fn take_outstanding(&mut self) -> Vec<ExternalResourceHandle> {
        self.live.drain(..).collect()
    }

    fn mark_orphaned(&mut self, handle: ExternalResourceHandle) {
        self.orphaned.push(handle);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackEntry {
    pub handle: ExternalResourceHandle,
    pub step: StepKind,
    #[serde(skip)]
    pub outcome: StepOutcome,
    pub progress: Progress,
}

impl RollbackEntry {
    pub fn error(&self) -> Option<&StepError> {
        self.outcome.error()
    }
}

/// What a rollback did, one entry per compensating call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollbackReport {
    pub entries: Vec<RollbackEntry>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    pub fn failures(&self) -> Vec<&RollbackEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success()).collect()
    }

    pub fn deleted(&self) -> Vec<&ExternalResourceHandle> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .map(|e| &e.handle)
            .collect()
    }
}

/// Issues compensating deletes for whatever the forward chain created
pub struct RollbackController<'a> {
    executor: &'a StepExecutor<'a>,
    scope: CallScope,
}

impl<'a> RollbackController<'a> {
    pub fn new(executor: &'a StepExecutor<'a>, scope: CallScope) -> Self {
        Self { executor, scope }
    }

    /// Delete every outstanding artifact, newest first.
    ///
    /// Best effort: a failed delete is reported and the walk continues.
    pub async fn roll_back(&self, ledger: &mut ArtifactLedger) -> RollbackReport {
        let handles: Vec<_> = ledger.take_outstanding();
        let events = self.executor.events();
        let mut report = RollbackReport::default();

        if handles.is_empty() {
            return report;
        }

        provisioning_metrics().record_rollback();
        info!(artifacts = handles.len(), "Rolling back test artifacts");
        events.emit(SessionEvent::RollbackStarted {
            artifacts: handles.len(),
        });

        for handle in handles.into_iter().rev() {
            let spec = handle.spec;
            let call = RemoteCall::new(
                self.scope.clone(),
                spec.delete_operation,
                handle.delete_payload.clone(),
            );

            events.emit(SessionEvent::StepStarted {
                step: spec.delete_kind,
            });
            let (outcome, progress) = self
                .executor
                .execute(spec.delete_kind, &call, None, None, false)
                .await;

            match &outcome {
                StepOutcome::Succeeded(_) => {
                    events.emit(SessionEvent::StepSucceeded {
                        step: spec.delete_kind,
                    });
                }
                StepOutcome::Failed(error) => {
                    warn!(
                        artifact = handle.kind.describe(),
                        id = %handle.id,
                        error = %error,
                        "Compensating delete failed"
                    );
                    provisioning_metrics().record_orphaned_artifact();
                    events.emit(SessionEvent::StepFailed {
                        step: spec.delete_kind,
                        error: error.clone(),
                    });
                    events.emit(SessionEvent::ArtifactOrphaned {
                        kind: handle.kind,
                        id: handle.id.clone(),
                    });
                    ledger.mark_orphaned(handle.clone());
                }
            }

            report.entries.push(RollbackEntry {
                handle,
                step: spec.delete_kind,
                outcome,
                progress,
            });
        }

        events.emit(SessionEvent::RollbackFinished {
            failures: report.failures().len(),
        });
        report
    }
}
