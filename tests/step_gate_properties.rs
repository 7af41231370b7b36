// Property-based tests for the lockstep step gates and the commit gate
// Random chains, random outcomes, random restarts

use integration_provisioner::provisioning::{
    CommitBlocker, CommitGate, Progress, StepError, StepErrorKind, StepKind, StepOutcome, StepTable,
};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use serde_json::json;

const KINDS: [StepKind; 6] = [
    StepKind::CheckAccess,
    StepKind::CreateLabel,
    StepKind::CreateWebhook,
    StepKind::CreateTestIssue,
    StepKind::DeleteTestIssue,
    StepKind::VerifyWebhook,
];

#[derive(Debug, Clone, Copy, PartialEq, Arbitrary)]
enum Scripted {
    Succeed,
    Reject,
}

impl Scripted {
    fn outcome(self) -> StepOutcome {
        match self {
            Scripted::Succeed => StepOutcome::Succeeded(json!({"id": "x"})),
            Scripted::Reject => StepOutcome::Failed(StepError::new(StepErrorKind::Rejected, "no")),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct RunScript {
    #[proptest(strategy = "prop::collection::vec(any::<Scripted>(), 6)")]
    outcomes: Vec<Scripted>,
}

/// Drive one run the way the chain runner does and return the fired indices
fn drive(table: &mut StepTable, script: &RunScript) -> Vec<usize> {
    let mut fired = Vec::new();
    while let Some(index) = table.next_ready() {
        let kind = table.states()[index].kind;
        table.begin(kind).unwrap();
        table
            .complete(kind, script.outcomes[index].outcome(), Progress::default())
            .unwrap();
        fired.push(index);
    }
    fired
}

fn gate(table: &StepTable) -> CommitGate<'_> {
    CommitGate {
        steps: table,
        rollback_in_progress: false,
        commit_attempted: false,
    }
}

proptest! {
    #[test]
    fn prop_steps_fire_in_order_at_most_once_per_run(
        len in 1usize..=6,
        runs in prop::collection::vec(any::<RunScript>(), 1..5),
    ) {
        let mut table = StepTable::new(&KINDS[..len]);

        for (n, script) in runs.iter().enumerate() {
            if n > 0 {
                table.restart();
            }
            let fired = drive(&mut table, script);

            let expected: Vec<usize> = (0..fired.len()).collect();
            prop_assert_eq!(&fired, &expected, "steps fired out of order");

            match script.outcomes[..len].iter().position(|o| *o == Scripted::Reject) {
                Some(failed) => prop_assert_eq!(fired.len(), failed + 1),
                None => prop_assert_eq!(fired.len(), len),
            }

            let baseline = table.baseline();
            for (index, state) in table.states().iter().enumerate() {
                let expected = if index < fired.len() { baseline + 1 } else { baseline };
                prop_assert_eq!(state.counter, expected);
                prop_assert!(!state.pending);
            }
        }
    }

    #[test]
    fn prop_commit_gate_open_iff_every_step_succeeded(
        len in 1usize..=6,
        script in any::<RunScript>(),
    ) {
        let mut table = StepTable::new(&KINDS[..len]);
        drive(&mut table, &script);

        let all_ok = script.outcomes[..len].iter().all(|o| *o == Scripted::Succeed);
        prop_assert_eq!(gate(&table).is_open(), all_ok);
        prop_assert_eq!(table.all_succeeded(), all_ok);

        if let Some(failed) = script.outcomes[..len].iter().position(|o| *o == Scripted::Reject) {
            prop_assert_eq!(gate(&table).check(), Err(CommitBlocker::Failed(KINDS[failed])));
        }
    }

    #[test]
    fn prop_restart_makes_first_step_ready_again(
        len in 1usize..=6,
        runs in prop::collection::vec(any::<RunScript>(), 1..5),
    ) {
        let mut table = StepTable::new(&KINDS[..len]);
        let mut previous_baseline = table.baseline();

        for script in &runs {
            drive(&mut table, script);
            table.restart();

            prop_assert_eq!(table.next_ready(), Some(0));
            prop_assert!(table.baseline() > previous_baseline);
            prop_assert!(table.states().iter().all(|s| s.outcome.is_none()));
            prop_assert_eq!(gate(&table).check(), Err(CommitBlocker::Incomplete));
            previous_baseline = table.baseline();
        }
    }

    #[test]
    fn prop_rollback_or_prior_attempt_always_blocks(
        len in 1usize..=6,
        script in any::<RunScript>(),
        rollback_in_progress in any::<bool>(),
        commit_attempted in any::<bool>(),
    ) {
        prop_assume!(rollback_in_progress || commit_attempted);

        let mut table = StepTable::new(&KINDS[..len]);
        drive(&mut table, &script);

        let blocked = CommitGate {
            steps: &table,
            rollback_in_progress,
            commit_attempted,
        }
        .check();

        let expected = if rollback_in_progress {
            CommitBlocker::RollbackInProgress
        } else {
            CommitBlocker::AlreadyAttempted
        };
        prop_assert_eq!(blocked, Err(expected));
    }
}

#[test]
fn test_pending_step_blocks_commit_and_successors() {
    let mut table = StepTable::new(&KINDS[..2]);
    table.begin(StepKind::CheckAccess).unwrap();

    assert_eq!(table.next_ready(), None);
    assert_eq!(
        gate(&table).check(),
        Err(CommitBlocker::Pending(StepKind::CheckAccess))
    );
}
