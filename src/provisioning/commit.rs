use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::step::{StepKind, StepTable};

/// Why the commit call is not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommitBlocker {
    /// The forward chain has not run to the end in this run
    Incomplete,
    Pending(StepKind),
    Failed(StepKind),
    RollbackInProgress,
    /// One commit per run; a new run needs a new Test
    AlreadyAttempted,
}

impl fmt::Display for CommitBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitBlocker::Incomplete => f.write_str("the test chain has not completed"),
            CommitBlocker::Pending(step) => write!(f, "{} is still running", step.label()),
            CommitBlocker::Failed(step) => write!(f, "{} failed", step.label()),
            CommitBlocker::RollbackInProgress => f.write_str("a rollback is in progress"),
            CommitBlocker::AlreadyAttempted => {
                f.write_str("commit was already attempted; run the test again")
            }
        }
    }
}

/// Composite readiness predicate for the final activation call
#[derive(Debug, Clone, Copy)]
pub struct CommitGate<'a> {
    pub steps: &'a StepTable,
    pub rollback_in_progress: bool,
    pub commit_attempted: bool,
}

impl<'a> CommitGate<'a> {
    pub fn check(&self) -> Result<(), CommitBlocker> {
        if self.rollback_in_progress {
            return Err(CommitBlocker::RollbackInProgress);
        }
        if self.commit_attempted {
            return Err(CommitBlocker::AlreadyAttempted);
        }
        if let Some(pending) = self.steps.states().iter().find(|s| s.pending) {
            return Err(CommitBlocker::Pending(pending.kind));
        }
        if let Some((step, _)) = self.steps.first_error() {
            return Err(CommitBlocker::Failed(step));
        }
        if !self.steps.all_succeeded() {
            return Err(CommitBlocker::Incomplete);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.check().is_ok()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReceipt {
    /// Body sent to the activation endpoint
    pub payload: Value,
    pub response: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::progress::Progress;
    use crate::provisioning::step::{StepError, StepErrorKind, StepOutcome};
    use serde_json::json;

    const CHAIN: [StepKind; 2] = [StepKind::CheckAccess, StepKind::CreateWebhook];

    fn completed() -> StepTable {
        let mut table = StepTable::new(&CHAIN);
        for kind in CHAIN {
            table.begin(kind).unwrap();
            table
                .complete(kind, StepOutcome::Succeeded(json!({})), Progress::default())
                .unwrap();
        }
        table
    }

    fn gate(steps: &StepTable) -> CommitGate<'_> {
        CommitGate {
            steps,
            rollback_in_progress: false,
            commit_attempted: false,
        }
    }

    #[test]
    fn test_open_after_clean_run() {
        let table = completed();
        assert!(gate(&table).is_open());
    }

    #[test]
    fn test_closed_before_any_run() {
        let table = StepTable::new(&CHAIN);
        assert_eq!(gate(&table).check(), Err(CommitBlocker::Incomplete));
    }

    #[test]
    fn test_closed_while_step_pending() {
        let mut table = StepTable::new(&CHAIN);
        table.begin(StepKind::CheckAccess).unwrap();
        assert_eq!(
            gate(&table).check(),
            Err(CommitBlocker::Pending(StepKind::CheckAccess))
        );
    }

    #[test]
    fn test_closed_on_error() {
        let mut table = StepTable::new(&CHAIN);
        table.begin(StepKind::CheckAccess).unwrap();
        table
            .complete(
                StepKind::CheckAccess,
                StepOutcome::Failed(StepError::new(StepErrorKind::Rejected, "401")),
                Progress::default(),
            )
            .unwrap();
        assert_eq!(
            gate(&table).check(),
            Err(CommitBlocker::Failed(StepKind::CheckAccess))
        );
    }

    #[test]
    fn test_closed_during_rollback_and_after_attempt() {
        let table = completed();
        let mut g = gate(&table);
        g.rollback_in_progress = true;
        assert_eq!(g.check(), Err(CommitBlocker::RollbackInProgress));

        let mut g = gate(&table);
        g.commit_attempted = true;
        assert_eq!(g.check(), Err(CommitBlocker::AlreadyAttempted));
    }

    #[test]
    fn test_closed_after_restart() {
        let mut table = completed();
        table.restart();
        assert_eq!(gate(&table).check(), Err(CommitBlocker::Incomplete));
    }
}
