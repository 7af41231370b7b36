use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::coordinator::{ChainOutcome, ChainRunner, RunInputs};
use super::errors::ProvisionError;
use super::events::{EventSink, SessionEvent};
use super::executor::StepExecutor;
use super::pipeline::{Credentials, ProviderDefinition};
use super::rollback::{ArtifactLedger, ExternalResourceHandle, RollbackController, RollbackReport};
use super::session::{SessionOptions, StepSnapshot};
use super::step::{StepError, StepKind, StepOutcome};
use crate::api::{CallScope, CommittedIntegration, IntegrationApi, RemoteCall};
use crate::telemetry::{create_session_span, generate_correlation_id};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceTestReport {
    pub outcome: ChainOutcome,
    pub steps: Vec<StepSnapshot>,
    /// Compensating deletes issued after a cancelled or halted run
    pub rollback: Option<RollbackReport>,
    /// Test issues still on the provider after the run and its rollback
    pub orphaned: Vec<ExternalResourceHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeardownEntry {
    pub step: StepKind,
    pub resource_id: String,
    pub error: Option<StepError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeardownReport {
    pub compensations: Vec<TeardownEntry>,
    /// Whether the persisted record was removed
    pub deleted: bool,
}

impl TeardownReport {
    pub fn failures(&self) -> Vec<&TeardownEntry> {
        self.compensations.iter().filter(|e| e.error.is_some()).collect()
    }
}

/// Re-verify, rotate or delete an already committed integration
pub struct IntegrationMaintenance {
    api: Arc<dyn IntegrationApi>,
    provider: ProviderDefinition,
    integration: CommittedIntegration,
    options: SessionOptions,
    cancel: CancellationToken,
    events: EventSink,
}

impl IntegrationMaintenance {
    pub fn new(
        api: Arc<dyn IntegrationApi>,
        provider: ProviderDefinition,
        integration: CommittedIntegration,
        options: SessionOptions,
    ) -> Self {
        Self {
            api,
            provider,
            integration,
            options,
            cancel: CancellationToken::new(),
            events: EventSink::default(),
        }
    }

    pub fn integration(&self) -> &CommittedIntegration {
        &self.integration
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    fn span(&self, operation: &str) -> tracing::Span {
        create_session_span(
            operation,
            self.provider.kind.slug(),
            &self.integration.workspace_id,
            &generate_correlation_id(),
        )
    }

    fn scope(&self) -> CallScope {
        CallScope::Integration(self.integration.id.clone())
    }

    fn executor(&self) -> StepExecutor<'_> {
        StepExecutor::new(
            self.api.as_ref(),
            &self.integration.workspace_id,
            self.options.progress,
            &self.events,
        )
    }

    /// Check access plus a create/delete test issue cycle, and webhook
    /// delivery where the provider verifies it. Nothing is re-created.
    pub async fn test(&self) -> Result<MaintenanceTestReport, ProvisionError> {
        let pipeline = &self.provider.maintenance.test;
        if pipeline.is_empty() {
            return Err(ProvisionError::Unsupported {
                provider: self.provider.kind,
                action: "testing",
            });
        }

        let span = self.span("test");
        async {
            let executor = self.executor();
            let runner = ChainRunner::new(&executor, pipeline, self.scope());
            let mut table = pipeline.new_table();
            let mut ledger = ArtifactLedger::default();
            let credentials = Credentials::new();
            let title = format!("{} {}", self.options.test_issue_prefix, rand::random::<u32>());
            let inputs = RunInputs {
                credentials: &credentials,
                selection: None,
                test_issue_title: &title,
                webhook_url: &self.options.webhook_url,
                run: 1,
            };

            let outcome = runner.run(&mut table, &mut ledger, &inputs, &self.cancel).await?;
            let rollback = if outcome.is_completed() || ledger.is_empty() {
                None
            } else {
                Some(
                    RollbackController::new(&executor, self.scope())
                        .roll_back(&mut ledger)
                        .await,
                )
            };
            ledger.abandon_run();
            let orphaned = ledger.orphaned().to_vec();
            match &outcome {
                ChainOutcome::Completed => info!("Integration test passed"),
                other => warn!(outcome = ?other, "Integration test did not pass"),
            }

            Ok(MaintenanceTestReport {
                outcome,
                steps: table
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
                rollback,
                orphaned,
            })
        }
        .instrument(span)
        .await
    }

    /// Replace the stored secret; no provider resources change
    pub async fn update_credentials(&self, secret: &str) -> Result<Value, ProvisionError> {
        let Some(operation) = self.provider.maintenance.update_operation else {
            return Err(ProvisionError::Unsupported {
                provider: self.provider.kind,
                action: "credential rotation",
            });
        };
        if secret.trim().is_empty() {
            return Err(ProvisionError::MissingCredentials {
                provider: self.provider.kind,
                missing: vec![self.provider.maintenance.update_field],
            });
        }

        let span = self.span("update-credentials");
        async {
            let mut body = Map::new();
            body.insert(
                self.provider.maintenance.update_field.to_string(),
                Value::String(secret.to_string()),
            );
            let call = RemoteCall::new(self.scope(), operation, Value::Object(body));
            let (outcome, _) = self
                .executor()
                .execute(StepKind::UpdateCredentials, &call, None, None, false)
                .await;
            match outcome {
                StepOutcome::Succeeded(value) => {
                    self.api
                        .invalidate_integrations(&self.integration.workspace_id)
                        .await;
                    info!("Credentials updated");
                    Ok(value)
                }
                StepOutcome::Failed(error) => Err(ProvisionError::Maintenance { operation, error }),
            }
        }
        .instrument(span)
        .await
    }

    /// Remove the provider resources recorded on the integration (webhook,
    /// then label or tag) and then the record itself.
    ///
    /// The record stays when a compensation fails, so the ids are not lost.
    pub async fn delete(&self) -> Result<TeardownReport, ProvisionError> {
        let span = self.span("delete");
        async {
            let executor = self.executor();
            let mut report = TeardownReport::default();

            for step in &self.provider.maintenance.teardown {
                let Some(resource_id) = (step.resource)(&self.integration) else {
                    continue;
                };
                let call = RemoteCall::new(self.scope(), step.operation, (step.payload)(&resource_id));
                let (outcome, _) = executor.execute(step.kind, &call, None, None, false).await;
                if let Some(error) = outcome.error() {
                    warn!(step = ?step.kind, id = %resource_id, error = %error, "Teardown step failed");
                }
                report.compensations.push(TeardownEntry {
                    step: step.kind,
                    resource_id,
                    error: outcome.error().cloned(),
                });
            }

            if !report.failures().is_empty() {
                warn!("Keeping integration record because provider cleanup failed");
                return Ok(report);
            }

            let call = RemoteCall::new(self.scope(), "delete", json!({}));
            let (outcome, _) = executor
                .execute(StepKind::DeleteIntegration, &call, None, None, false)
                .await;
            if let StepOutcome::Failed(error) = outcome {
                return Err(ProvisionError::Maintenance {
                    operation: "delete",
                    error,
                });
            }

            self.api
                .invalidate_integrations(&self.integration.workspace_id)
                .await;
            info!(integration = %self.integration.id, "Integration deleted");
            report.deleted = true;
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
