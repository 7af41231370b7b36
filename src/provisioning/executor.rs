use tracing::{debug, warn};

use super::events::{EventSink, SessionEvent};
use super::pipeline::StepDefinition;
use super::progress::{Progress, ProgressConfig, ProgressSimulator};
use super::step::{StepError, StepErrorKind, StepKind, StepOutcome};
use crate::api::{ApiError, IntegrationApi, RemoteCall};

/// Performs one remote call on behalf of a step.
///
/// The call and its progress simulator run side by side; the returned
/// outcome is only available once both have finished, so a full progress
/// bar never means the step is done.
pub struct StepExecutor<'a> {
    api: &'a dyn IntegrationApi,
    workspace_id: &'a str,
    progress: ProgressConfig,
    events: &'a EventSink,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        api: &'a dyn IntegrationApi,
        workspace_id: &'a str,
        progress: ProgressConfig,
        events: &'a EventSink,
    ) -> Self {
        Self {
            api,
            workspace_id,
            progress,
            events,
        }
    }

    pub fn events(&self) -> &EventSink {
        self.events
    }

    pub async fn execute(
        &self,
        step: StepKind,
        call: &RemoteCall,
        progress_max: Option<u32>,
        hint: Option<&str>,
        verifies: bool,
    ) -> (StepOutcome, Progress) {
        let config = match progress_max {
            Some(max) => self.progress.with_max_ticks(max),
            None => self.progress,
        };
        let simulator = ProgressSimulator::new(config);
        let events = self.events;

        debug!(step = ?step, operation = %call.operation, "Issuing remote call");
        let (result, progress) = tokio::join!(
            self.api.call(self.workspace_id, call),
            simulator.run(|progress| events.emit(SessionEvent::StepProgress { step, progress })),
        );

        let outcome = match result {
            Ok(value) => StepOutcome::Succeeded(value),
            Err(e) => {
                warn!(step = ?step, operation = %call.operation, error = %e, "Step failed");
                StepOutcome::Failed(step_error(&e, hint, verifies))
            }
        };
        (outcome, progress)
    }

    /// Execute a step described by a definition
    pub async fn execute_definition(
        &self,
        definition: &StepDefinition,
        call: &RemoteCall,
    ) -> (StepOutcome, Progress) {
        self.execute(
            definition.kind,
            call,
            definition.progress_max,
            definition.hint,
            definition.verifies,
        )
        .await
    }
}

/// Translate a backend failure into the error recorded on a step
pub fn step_error(err: &ApiError, hint: Option<&str>, verifies: bool) -> StepError {
    let kind = match err {
        ApiError::Network { .. } => StepErrorKind::Transport,
        ApiError::Conflict { .. } => StepErrorKind::DuplicateIntegration,
        ApiError::InvalidResponse { .. } => StepErrorKind::InvalidResponse,
        ApiError::Rejected { .. } if verifies => StepErrorKind::VerificationFailed,
        ApiError::Rejected { .. } => StepErrorKind::Rejected,
    };
    let error = StepError::new(kind, err.to_string());
    match hint {
        Some(hint) => error.with_hint(hint),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::MockIntegrationApi;
    use crate::api::{CallScope, ProviderKind};
    use crate::provisioning::mocks::ScriptedApi;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn call() -> RemoteCall {
        RemoteCall::new(
            CallScope::Provider(ProviderKind::Jira),
            "check-access",
            json!({"apiToken": "t"}),
        )
    }

    #[test]
    fn test_error_classification() {
        let rejected = ApiError::Rejected {
            status: 400,
            message: "nope".into(),
        };
        assert_eq!(step_error(&rejected, None, false).kind, StepErrorKind::Rejected);
        assert_eq!(
            step_error(&rejected, None, true).kind,
            StepErrorKind::VerificationFailed
        );

        let conflict = ApiError::Conflict { message: "dup".into() };
        let error = step_error(&conflict, Some("already added"), false);
        assert_eq!(error.kind, StepErrorKind::DuplicateIntegration);
        assert_eq!(error.hint.as_deref(), Some("already added"));

        let network = ApiError::Network { message: "reset".into() };
        assert_eq!(step_error(&network, None, true).kind, StepErrorKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_carries_hint() {
        let mut api = MockIntegrationApi::new();
        api.expect_call().times(1).returning(|_, _| {
            Err(ApiError::Rejected {
                status: 401,
                message: "bad token".into(),
            })
        });

        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", ProgressConfig::default(), &events);
        let (outcome, _) = executor
            .execute(StepKind::CheckAccess, &call(), None, Some("Bad access token"), false)
            .await;

        let error = outcome.error().cloned().unwrap();
        assert_eq!(error.kind, StepErrorKind::Rejected);
        assert_eq!(error.hint.as_deref(), Some("Bad access token"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_waits_for_slow_call_after_progress_is_full() {
        let api = ScriptedApi::new();
        api.delay("check-access", Duration::from_secs(3));

        let mut events = EventSink::default();
        let mut rx = events.subscribe();
        let executor = StepExecutor::new(&api, "ws1", ProgressConfig::default(), &events);
        let start = Instant::now();

        let (outcome, progress) = executor
            .execute(StepKind::CheckAccess, &call(), None, None, false)
            .await;

        assert!(outcome.is_success());
        assert!(progress.is_full());
        // Progress is full after 1s; the outcome still waits for the call
        assert!(start.elapsed() >= Duration::from_secs(3));

        let mut ticks = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::StepProgress { .. }) {
                ticks += 1;
            }
        }
        assert_eq!(ticks, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_waits_for_progress_after_fast_call() {
        let api = ScriptedApi::new();
        let events = EventSink::default();
        let executor = StepExecutor::new(&api, "ws1", ProgressConfig::default(), &events);
        let start = Instant::now();

        let (_, progress) = executor
            .execute(StepKind::DeleteTestIssue, &call(), Some(500), None, false)
            .await;

        assert_eq!(progress.max, 500);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }
}
