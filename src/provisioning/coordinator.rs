use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::errors::ProvisionError;
use super::events::SessionEvent;
use super::executor::StepExecutor;
use super::pipeline::{json_id, Credentials, PipelineDefinition, StepContext};
use super::progress::Progress;
use super::rollback::{ArtifactLedger, ExternalResourceHandle};
use super::step::{StepError, StepKind, StepOutcome, StepTable};
use crate::api::CallScope;

/// How a chain run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChainOutcome {
    /// Every step succeeded
    Completed,
    /// A step failed; nothing after it ran
    Halted { step: StepKind, error: StepError },
    /// The cancellation token fired between steps
    Cancelled { last_completed: Option<StepKind> },
}

impl ChainOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainOutcome::Completed)
    }
}

/// Inputs shared by every step of one run
#[derive(Debug, Clone, Copy)]
pub struct RunInputs<'a> {
    pub credentials: &'a Credentials,
    pub selection: Option<&'a str>,
    pub test_issue_title: &'a str,
    pub webhook_url: &'a str,
    pub run: u64,
}

impl<'a> RunInputs<'a> {
    pub fn context<'b>(&self, outputs: &'b StepTable) -> StepContext<'b>
    where
        'a: 'b,
    {
        StepContext {
            credentials: self.credentials,
            selection: self.selection,
            outputs,
            test_issue_title: self.test_issue_title,
            webhook_url: self.webhook_url,
        }
    }
}

/// Sequential lockstep runner.
///
/// Each iteration asks the table which gate is open, checks the token,
/// executes that one step and records the result. Nothing else can start a
/// step, so a step fires at most once per run.
pub struct ChainRunner<'a> {
    executor: &'a StepExecutor<'a>,
    pipeline: &'a PipelineDefinition,
    scope: CallScope,
}

impl<'a> ChainRunner<'a> {
    pub fn new(
        executor: &'a StepExecutor<'a>,
        pipeline: &'a PipelineDefinition,
        scope: CallScope,
    ) -> Self {
        Self {
            executor,
            pipeline,
            scope,
        }
    }

    pub async fn run(
        &self,
        table: &mut StepTable,
        ledger: &mut ArtifactLedger,
        inputs: &RunInputs<'_>,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome, ProvisionError> {
        let events = self.executor.events();
        let mut last_completed = None;

        while let Some(index) = table.next_ready() {
            if cancel.is_cancelled() {
                info!(after = ?last_completed, "Chain cancelled at step boundary");
                return Ok(ChainOutcome::Cancelled { last_completed });
            }

            let definition = self.pipeline.steps()[index];
            let kind = definition.kind;
            table.begin(kind)?;
            events.emit(SessionEvent::StepStarted { step: kind });

            let call = definition.remote_call(self.scope.clone(), &inputs.context(table));
            let (outcome, progress) = match call {
                Ok(call) => self.executor.execute_definition(&definition, &call).await,
                Err(error) => {
                    warn!(step = ?kind, error = %error, "Step input unavailable, no call issued");
                    (StepOutcome::Failed(error), Progress::default())
                }
            };

            if let StepOutcome::Succeeded(value) = &outcome {
                self.record_artifact(ledger, kind, value, inputs, table);
                ledger.release_by(kind);
            }
            table.complete(kind, outcome.clone(), progress)?;

            match outcome {
                StepOutcome::Succeeded(_) => {
                    events.emit(SessionEvent::StepSucceeded { step: kind });
                    last_completed = Some(kind);
                }
                StepOutcome::Failed(error) => {
                    events.emit(SessionEvent::StepFailed {
                        step: kind,
                        error: error.clone(),
                    });
                    return Ok(ChainOutcome::Halted { step: kind, error });
                }
            }
        }

        // The boundary after the last step counts too: a token that fired
        // while it was in flight must not leave the chain committable.
        if cancel.is_cancelled() && table.first_error().is_none() {
            info!(after = ?last_completed, "Chain cancelled after its last step");
            return Ok(ChainOutcome::Cancelled { last_completed });
        }
        match table.first_error() {
            Some((step, error)) => Ok(ChainOutcome::Halted {
                step,
                error: error.clone(),
            }),
            None => Ok(ChainOutcome::Completed),
        }
    }

    fn record_artifact(
        &self,
        ledger: &mut ArtifactLedger,
        kind: StepKind,
        value: &serde_json::Value,
        inputs: &RunInputs<'_>,
        outputs: &StepTable,
    ) {
        let Some(spec) = self.pipeline.get(kind).and_then(|d| d.artifact) else {
            return;
        };
        match json_id(value, spec.id_pointer) {
            Some(id) => {
                info!(step = ?kind, artifact = spec.kind.describe(), id = %id, "Artifact created");
                self.executor.events().emit(SessionEvent::ArtifactCreated {
                    kind: spec.kind,
                    id: id.clone(),
                });
                let delete_payload = (spec.delete_payload)(&inputs.context(outputs), &id);
                ledger.record(ExternalResourceHandle {
                    kind: spec.kind,
                    id,
                    created_by: kind,
                    run: inputs.run,
                    spec,
                    delete_payload,
                });
            }
            None => {
                // Created but unaddressable; nothing we can compensate later
                warn!(
                    step = ?kind,
                    pointer = spec.id_pointer,
                    "Response carries no artifact id"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProviderKind;
    use crate::provisioning::step::StepErrorKind;
    use crate::provisioning::events::EventSink;
    use crate::provisioning::mocks::ScriptedApi;
    use crate::provisioning::pipeline::{ArtifactKind, ArtifactSpec, StepDefinition};
    use crate::provisioning::progress::ProgressConfig;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
        Ok(json!({ "apiKey": ctx.credential("apiKey")? }))
    }

    fn label(ctx: &StepContext<'_>) -> Result<Value, StepError> {
        Ok(ctx.with_credentials(json!({})))
    }

    fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
        Ok(json!({ "labelId": ctx.output_str(StepKind::CreateLabel, "/id")? }))
    }

    fn delete_label(_: &StepContext<'_>, id: &str) -> Value {
        json!({ "labelId": id })
    }

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(vec![
            StepDefinition::new(StepKind::CheckAccess, "check-access", access),
            StepDefinition::new(StepKind::CreateLabel, "create-label", label).creates(ArtifactSpec {
                kind: ArtifactKind::Label,
                id_pointer: "/id",
                delete_operation: "delete-label",
                delete_kind: StepKind::DeleteLabel,
                delete_payload: delete_label,
                released_by: None,
            }),
            StepDefinition::new(StepKind::CreateWebhook, "create-webhook", webhook),
        ])
    }

    fn fast() -> ProgressConfig {
        ProgressConfig {
            tick_interval: Duration::from_millis(1),
            max_ticks: 2,
        }
    }

    fn credentials() -> Credentials {
        Credentials::from([("apiKey".to_string(), "k".to_string())])
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_steps_in_order_once() {
        let api = ScriptedApi::new();
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", fast(), &events);
        let pipeline = pipeline();
        let runner = ChainRunner::new(&executor, &pipeline, CallScope::Provider(ProviderKind::Linear));
        let mut table = pipeline.new_table();
        let mut ledger = ArtifactLedger::default();
        let creds = credentials();
        let inputs = RunInputs {
            credentials: &creds,
            selection: None,
            test_issue_title: "t",
            webhook_url: "w",
            run: 1,
        };

        let outcome = runner
            .run(&mut table, &mut ledger, &inputs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ChainOutcome::Completed);
        assert_eq!(api.operations(), vec!["check-access", "create-label", "create-webhook"]);
        assert_eq!(
            api.payload_of("create-webhook"),
            Some(json!({"labelId": "create-label-1"}))
        );
        assert_eq!(ledger.outstanding().len(), 1);
        assert!(table.all_succeeded());

        // A second pass without restart fires nothing
        let again = runner
            .run(&mut table, &mut ledger, &inputs, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(again, ChainOutcome::Completed);
        assert_eq!(api.get_executed_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_halts_chain() {
        let api = ScriptedApi::new();
        api.reject("create-label", "insufficient scope");
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", fast(), &events);
        let pipeline = pipeline();
        let runner = ChainRunner::new(&executor, &pipeline, CallScope::Provider(ProviderKind::Linear));
        let mut table = pipeline.new_table();
        let mut ledger = ArtifactLedger::default();
        let creds = credentials();
        let inputs = RunInputs {
            credentials: &creds,
            selection: None,
            test_issue_title: "t",
            webhook_url: "w",
            run: 1,
        };

        let outcome = runner
            .run(&mut table, &mut ledger, &inputs, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ChainOutcome::Halted { step: StepKind::CreateLabel, .. }
        ));
        assert_eq!(api.call_count("create-webhook"), 0);
        assert!(table.get(StepKind::CheckAccess).unwrap().succeeded());
        assert!(ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_input_fails_without_call() {
        let api = ScriptedApi::new();
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", fast(), &events);
        let pipeline = pipeline();
        let runner = ChainRunner::new(&executor, &pipeline, CallScope::Provider(ProviderKind::Linear));
        let mut table = pipeline.new_table();
        let mut ledger = ArtifactLedger::default();
        let creds = Credentials::new();
        let inputs = RunInputs {
            credentials: &creds,
            selection: None,
            test_issue_title: "t",
            webhook_url: "w",
            run: 1,
        };

        let outcome = runner
            .run(&mut table, &mut ledger, &inputs, &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            ChainOutcome::Halted { step, error } => {
                assert_eq!(step, StepKind::CheckAccess);
                assert_eq!(error.kind, StepErrorKind::MissingInput);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(api.get_executed_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_checked_between_steps() {
        let api = ScriptedApi::new();
        let token = CancellationToken::new();
        api.cancel_after("check-access", token.clone());
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", fast(), &events);
        let pipeline = pipeline();
        let runner = ChainRunner::new(&executor, &pipeline, CallScope::Provider(ProviderKind::Linear));
        let mut table = pipeline.new_table();
        let mut ledger = ArtifactLedger::default();
        let creds = credentials();
        let inputs = RunInputs {
            credentials: &creds,
            selection: None,
            test_issue_title: "t",
            webhook_url: "w",
            run: 1,
        };

        let outcome = runner.run(&mut table, &mut ledger, &inputs, &token).await.unwrap();

        assert_eq!(
            outcome,
            ChainOutcome::Cancelled {
                last_completed: Some(StepKind::CheckAccess)
            }
        );
        assert_eq!(api.operations(), vec!["check-access"]);
        assert!(!table.any_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_last_step_is_not_completed() {
        let api = ScriptedApi::new();
        let token = CancellationToken::new();
        api.cancel_after("create-webhook", token.clone());
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", fast(), &events);
        let pipeline = pipeline();
        let runner = ChainRunner::new(&executor, &pipeline, CallScope::Provider(ProviderKind::Linear));
        let mut table = pipeline.new_table();
        let mut ledger = ArtifactLedger::default();
        let creds = credentials();
        let inputs = RunInputs {
            credentials: &creds,
            selection: None,
            test_issue_title: "t",
            webhook_url: "w",
            run: 1,
        };

        let outcome = runner.run(&mut table, &mut ledger, &inputs, &token).await.unwrap();

        assert_eq!(
            outcome,
            ChainOutcome::Cancelled {
                last_completed: Some(StepKind::CreateWebhook)
            }
        );
        assert!(table.all_succeeded());
        // Delete body was fixed when the label was recorded
        assert_eq!(
            ledger.outstanding()[0].delete_payload,
            json!({"labelId": "create-label-1"})
        );
    }
}
