use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::commit::{CommitBlocker, CommitGate, CommitReceipt};
use super::coordinator::{ChainOutcome, ChainRunner, RunInputs};
use super::errors::ProvisionError;
use super::events::{EventSink, SessionEvent};
use super::executor::StepExecutor;
use super::lifecycle::{Lifecycle, LifecycleEvent, SessionPhase};
use super::pipeline::{Credentials, ProviderDefinition, StepContext};
use super::progress::{Progress, ProgressConfig};
use super::rollback::{ArtifactLedger, ExternalResourceHandle, RollbackController, RollbackReport};
use super::step::{StepError, StepErrorKind, StepKind, StepOutcome, StepTable};
use crate::api::{CallScope, IntegrationApi, RemoteCall, WorkspaceId};
use crate::config::ProvisioningConfig;
use crate::observability::provisioning_metrics;
use crate::telemetry::{create_session_span, generate_correlation_id};

/// Per-session knobs, usually taken from configuration
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub webhook_url: String,
    pub progress: ProgressConfig,
    pub test_issue_prefix: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ProvisioningConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &ProvisioningConfig) -> Self {
        Self {
            webhook_url: config.webhook_url.clone(),
            progress: config.progress(),
            test_issue_prefix: config.test_issue_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub step: StepKind,
    pub counter: u64,
    pub pending: bool,
    pub succeeded: bool,
    pub error: Option<StepError>,
    pub progress: Progress,
}

/// Read-only view of a session for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub provider: crate::api::ProviderKind,
    pub phase: SessionPhase,
    pub run: u64,
    pub steps: Vec<StepSnapshot>,
    pub artifacts: Vec<ExternalResourceHandle>,
    pub orphaned: Vec<ExternalResourceHandle>,
    pub commit_blocker: Option<CommitBlocker>,
}

/// One "add integration" attempt.
///
/// Owns the credentials, the selected target, the step table and the
/// artifacts created on the provider. Exclusively driven through `&mut self`;
/// the only thing shared with other tasks is the cancellation token.
pub struct ProvisioningSession {
    id: String,
    workspace_id: WorkspaceId,
    provider: ProviderDefinition,
    api: Arc<dyn IntegrationApi>,
    options: SessionOptions,
    credentials: Credentials,
    selection: Option<String>,
    steps: StepTable,
    ledger: ArtifactLedger,
    run: u64,
    test_issue_title: String,
    lifecycle: Lifecycle,
    commit_attempted: bool,
    rollback_in_progress: bool,
    last_rollback: Option<RollbackReport>,
    cancel: CancellationToken,
    events: EventSink,
    span: tracing::Span,
}

impl std::fmt::Debug for ProvisioningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningSession")
            .field("id", &self.id)
            .field("workspace_id", &self.workspace_id)
            .field("provider", &self.provider.kind)
            .field("phase", &self.lifecycle.phase())
            .field("run", &self.run)
            .finish()
    }
}

impl ProvisioningSession {
    /// Open a session; no remote call is made yet
    pub fn open(
        api: Arc<dyn IntegrationApi>,
        provider: ProviderDefinition,
        workspace_id: impl Into<WorkspaceId>,
        credentials: Credentials,
        options: SessionOptions,
    ) -> Result<Self, ProvisionError> {
        let missing = provider.missing_credentials(&credentials);
        if !missing.is_empty() {
            return Err(ProvisionError::MissingCredentials {
                provider: provider.kind,
                missing,
            });
        }

        let id = generate_correlation_id();
        let workspace_id = workspace_id.into();
        let span = create_session_span("add", provider.kind.slug(), &workspace_id, &id);
        span.in_scope(|| info!(provider = %provider.kind, "Provisioning session opened"));

        Ok(Self {
            steps: provider.setup.new_table(),
            id,
            workspace_id,
            provider,
            api,
            options,
            credentials,
            selection: None,
            ledger: ArtifactLedger::default(),
            run: 0,
            test_issue_title: String::new(),
            lifecycle: Lifecycle::new(),
            commit_attempted: false,
            rollback_in_progress: false,
            last_rollback: None,
            cancel: CancellationToken::new(),
            events: EventSink::default(),
            span,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &ProviderDefinition {
        &self.provider
    }

    pub fn phase(&self) -> SessionPhase {
        self.lifecycle.phase()
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn steps(&self) -> &StepTable {
        &self.steps
    }

    pub fn artifacts(&self) -> &[ExternalResourceHandle] {
        self.ledger.outstanding()
    }

    pub fn orphaned_artifacts(&self) -> &[ExternalResourceHandle] {
        self.ledger.orphaned()
    }

    pub fn test_issue_title(&self) -> &str {
        &self.test_issue_title
    }

    pub fn last_rollback(&self) -> Option<&RollbackReport> {
        self.last_rollback.as_ref()
    }

    /// Token that closes the session at the next step boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    fn ensure(&self, event: LifecycleEvent, action: &'static str) -> Result<(), ProvisionError> {
        if self.lifecycle.accepts(event) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidPhase {
                action,
                phase: self.phase(),
            })
        }
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), ProvisionError> {
        self.ensure(LifecycleEvent::Test, action)
    }

    pub fn set_credential(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ProvisionError> {
        self.ensure_editable("changing credentials")?;
        self.credentials.insert(name.into(), value.into());
        Ok(())
    }

    /// Choose the project / team / board the integration targets
    pub fn select_target(&mut self, target: impl Into<String>) -> Result<(), ProvisionError> {
        self.ensure_editable("selecting a target")?;
        self.selection = Some(target.into());
        Ok(())
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Targets the entered credentials can see, for the selection prompt.
    /// Read-only on the provider.
    pub async fn discover_targets(&self) -> Result<Vec<String>, ProvisionError> {
        let Some(discovery) = self.provider.targets else {
            return Ok(Vec::new());
        };
        let table = StepTable::new(&[]);
        let ctx = StepContext {
            credentials: &self.credentials,
            selection: None,
            outputs: &table,
            test_issue_title: "",
            webhook_url: &self.options.webhook_url,
        };
        let payload = (discovery.build)(&ctx).map_err(|error| ProvisionError::Maintenance {
            operation: discovery.operation,
            error,
        })?;
        let call = RemoteCall::new(
            CallScope::Provider(self.provider.kind),
            discovery.operation,
            payload,
        );
        let response = self
            .api
            .call(&self.workspace_id, &call)
            .instrument(self.span.clone())
            .await?;
        Ok((discovery.extract)(&response))
    }

    /// Start a fresh run of the forward chain and drive it to the end, to the
    /// first failure, or to a cancellation.
    pub async fn test(&mut self) -> Result<ChainOutcome, ProvisionError> {
        self.ensure(LifecycleEvent::Test, "test")?;
        let span = self.span.clone();
        self.run_chain().instrument(span).await
    }

    async fn run_chain(&mut self) -> Result<ChainOutcome, ProvisionError> {
        self.restart();
        self.lifecycle.handle(LifecycleEvent::Test);
        info!(run = self.run, "Running test chain");

        let outcome = {
            let executor = StepExecutor::new(
                self.api.as_ref(),
                &self.workspace_id,
                self.options.progress,
                &self.events,
            );
            let runner = ChainRunner::new(
                &executor,
                &self.provider.setup,
                CallScope::Provider(self.provider.kind),
            );
            let inputs = RunInputs {
                credentials: &self.credentials,
                selection: self.selection.as_deref(),
                test_issue_title: &self.test_issue_title,
                webhook_url: &self.options.webhook_url,
                run: self.run,
            };
            runner
                .run(&mut self.steps, &mut self.ledger, &inputs, &self.cancel)
                .await?
        };

        match &outcome {
            ChainOutcome::Completed => {
                info!(run = self.run, "Test chain completed");
                self.lifecycle
                    .handle(LifecycleEvent::ChainFinished { ok: true });
            }
            ChainOutcome::Halted { step, error } => {
                warn!(run = self.run, step = ?step, error = %error, "Test chain halted");
                self.lifecycle
                    .handle(LifecycleEvent::ChainFinished { ok: false });
            }
            ChainOutcome::Cancelled { .. } => {
                self.shut_down().await;
            }
        }
        Ok(outcome)
    }

    /// Reset every step to a shared baseline and forget the previous run's
    /// artifacts.
    fn restart(&mut self) {
        for handle in self.ledger.abandon_run() {
            self.events.emit(SessionEvent::ArtifactOrphaned {
                kind: handle.kind,
                id: handle.id,
            });
        }
        self.steps.restart();
        self.run += 1;
        self.commit_attempted = false;
        self.test_issue_title = format!(
            "{} {}",
            self.options.test_issue_prefix,
            rand::random::<u32>()
        );
        self.events.emit(SessionEvent::Cleared { run: self.run });
    }

    fn commit_gate(&self) -> CommitGate<'_> {
        CommitGate {
            steps: &self.steps,
            rollback_in_progress: self.rollback_in_progress,
            commit_attempted: self.commit_attempted,
        }
    }

    pub fn commit_blocker(&self) -> Option<CommitBlocker> {
        if self.provider.setup.is_empty() && self.phase() == SessionPhase::Editing {
            return None;
        }
        match self.phase() {
            SessionPhase::RollingBack => return Some(CommitBlocker::RollbackInProgress),
            phase if !phase.is_open() => return Some(CommitBlocker::AlreadyAttempted),
            _ => {}
        }
        self.commit_gate().check().err()
    }

    pub fn can_commit(&self) -> bool {
        self.commit_blocker().is_none()
    }

    /// Persist the integration, referencing the artifacts of this run
    pub async fn commit(&mut self) -> Result<CommitReceipt, ProvisionError> {
        if self.cancel.is_cancelled() {
            if self.phase().is_open() {
                let span = self.span.clone();
                self.shut_down().instrument(span).await;
            }
            return Err(ProvisionError::Cancelled);
        }
        // Providers without a test chain go straight to activation
        if self.provider.setup.is_empty() && self.phase() == SessionPhase::Editing {
            self.test().await?;
        }
        self.commit_gate()
            .check()
            .map_err(ProvisionError::CommitBlocked)?;
        self.ensure(LifecycleEvent::Commit, "commit")?;

        let span = self.span.clone();
        self.run_commit().instrument(span).await
    }

    async fn run_commit(&mut self) -> Result<CommitReceipt, ProvisionError> {
        self.commit_attempted = true;
        self.lifecycle.handle(LifecycleEvent::Commit);
        let definition = self.provider.commit;

        let payload = {
            let inputs = RunInputs {
                credentials: &self.credentials,
                selection: self.selection.as_deref(),
                test_issue_title: &self.test_issue_title,
                webhook_url: &self.options.webhook_url,
                run: self.run,
            };
            (definition.build)(&inputs.context(&self.steps))
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(error) => {
                self.lifecycle
                    .handle(LifecycleEvent::CommitFinished { ok: false });
                return Err(ProvisionError::CommitFailed(error));
            }
        };

        let call = RemoteCall::new(
            CallScope::Provider(self.provider.kind),
            definition.operation,
            payload.clone(),
        );
        self.events
            .emit(SessionEvent::StepStarted { step: StepKind::Commit });
        let (outcome, _) = StepExecutor::new(
            self.api.as_ref(),
            &self.workspace_id,
            self.options.progress,
            &self.events,
        )
        .execute(StepKind::Commit, &call, None, None, false)
        .await;

        match outcome {
            StepOutcome::Succeeded(response) => {
                self.lifecycle
                    .handle(LifecycleEvent::CommitFinished { ok: true });
                // Label and webhook now belong to the integration
                self.ledger.take_outstanding();
                self.api.invalidate_integrations(&self.workspace_id).await;
                provisioning_metrics().record_commit();
                self.events
                    .emit(SessionEvent::StepSucceeded { step: StepKind::Commit });
                self.events.emit(SessionEvent::Committed);
                info!(provider = %self.provider.kind, "Integration committed");
                Ok(CommitReceipt { payload, response })
            }
            StepOutcome::Failed(mut error) => {
                if error.kind == StepErrorKind::DuplicateIntegration {
                    error = error.with_hint(definition.duplicate_hint);
                }
                self.lifecycle
                    .handle(LifecycleEvent::CommitFinished { ok: false });
                self.events.emit(SessionEvent::StepFailed {
                    step: StepKind::Commit,
                    error: error.clone(),
                });
                warn!(error = %error, "Commit failed");
                Err(ProvisionError::CommitFailed(error))
            }
        }
    }

    /// Cancel the session: roll back what this run created, then close.
    ///
    /// A no-op once the session is committed or closed.
    pub async fn cancel(&mut self) -> Result<Option<RollbackReport>, ProvisionError> {
        match self.phase() {
            SessionPhase::Committed | SessionPhase::Closed => return Ok(None),
            phase if !phase.is_open() => {
                return Err(ProvisionError::InvalidPhase {
                    action: "cancel",
                    phase,
                })
            }
            _ => {}
        }
        self.cancel.cancel();
        let span = self.span.clone();
        Ok(self.shut_down().instrument(span).await)
    }

    async fn shut_down(&mut self) -> Option<RollbackReport> {
        let has_artifacts = !self.ledger.is_empty();
        self.lifecycle
            .handle(LifecycleEvent::Cancel { has_artifacts });

        if !has_artifacts {
            info!("Session closed without remote side effects");
            self.events.emit(SessionEvent::Closed);
            return None;
        }

        self.rollback_in_progress = true;
        let report = {
            let executor = StepExecutor::new(
                self.api.as_ref(),
                &self.workspace_id,
                self.options.progress,
                &self.events,
            );
            RollbackController::new(&executor, CallScope::Provider(self.provider.kind))
                .roll_back(&mut self.ledger)
                .await
        };
        self.rollback_in_progress = false;
        self.lifecycle.handle(LifecycleEvent::RollbackFinished);

        if report.is_clean() {
            info!(deleted = report.deleted().len(), "Rollback completed");
        } else {
            warn!(
                failures = report.failures().len(),
                "Rollback finished with failures; artifacts may remain on the provider"
            );
        }
        self.events.emit(SessionEvent::Closed);
        self.last_rollback = Some(report.clone());
        Some(report)
    }

    /// Close the dialog. Anything not committed is rolled back first.
    pub async fn close(mut self) -> Result<Option<RollbackReport>, ProvisionError> {
        match self.phase() {
            SessionPhase::Committed => {
                self.lifecycle.handle(LifecycleEvent::Close);
                self.events.emit(SessionEvent::Closed);
                Ok(None)
            }
            SessionPhase::Closed => Ok(self.last_rollback.take()),
            _ => self.cancel().await,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            provider: self.provider.kind,
            phase: self.phase(),
            run: self.run,
            steps: self
                .steps
                .states()
                .iter()
                .map(|s| StepSnapshot {
                    step: s.kind,
                    counter: s.counter,
                    pending: s.pending,
                    succeeded: s.succeeded(),
                    error: s.error().cloned(),
                    progress: s.progress,
                })
                .collect(),
            artifacts: self.ledger.outstanding().to_vec(),
            orphaned: self.ledger.orphaned().to_vec(),
            commit_blocker: self.commit_blocker(),
        }
    }
}
