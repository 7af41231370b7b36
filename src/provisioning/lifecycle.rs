use serde::Serialize;
use statig::prelude::*;
use std::fmt;

/// Inputs driving a session through its phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Test,
    ChainFinished { ok: bool },
    Cancel { has_artifacts: bool },
    RollbackFinished,
    Commit,
    CommitFinished { ok: bool },
    Close,
}

/// Externally visible phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Editing,
    Testing,
    Halted,
    Verified,
    Committing,
    Committed,
    RollingBack,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionPhase::Editing => "editing",
            SessionPhase::Testing => "testing",
            SessionPhase::Halted => "halted",
            SessionPhase::Verified => "verified",
            SessionPhase::Committing => "committing",
            SessionPhase::Committed => "committed",
            SessionPhase::RollingBack => "rolling back",
            SessionPhase::Closed => "closed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Default)]
pub struct SessionLifecycle;

#[state_machine(
    initial = "State::editing()",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl SessionLifecycle {
    /// Credentials are being entered; nothing has touched the provider
    #[state(superstate = "open")]
    fn editing(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Test => Transition(State::testing()),
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn testing(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::ChainFinished { ok: true } => Transition(State::verified()),
            LifecycleEvent::ChainFinished { ok: false } => Transition(State::halted()),
            _ => Super,
        }
    }

    /// A step failed, or the commit did; partial results stay visible
    #[state(superstate = "open")]
    fn halted(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Test => Transition(State::testing()),
            _ => Super,
        }
    }

    #[state(superstate = "open")]
    fn verified(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Commit => Transition(State::committing()),
            LifecycleEvent::Test => Transition(State::testing()),
            _ => Super,
        }
    }

    #[state]
    fn committing(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::CommitFinished { ok: true } => Transition(State::committed()),
            LifecycleEvent::CommitFinished { ok: false } => Transition(State::halted()),
            _ => Handled,
        }
    }

    #[state]
    fn committed(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Close => Transition(State::closed()),
            _ => Handled,
        }
    }

    #[state]
    fn rolling_back(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::RollbackFinished => Transition(State::closed()),
            _ => Handled,
        }
    }

    #[state]
    fn closed(event: &LifecycleEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }

    /// Leaving before commit: roll back when something was created
    #[superstate]
    fn open(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Cancel { has_artifacts: true } => Transition(State::rolling_back()),
            LifecycleEvent::Cancel { has_artifacts: false } | LifecycleEvent::Close => {
                Transition(State::closed())
            }
            _ => Handled,
        }
    }
}

/// Session phase machine
pub struct Lifecycle {
    machine: statig::blocking::StateMachine<SessionLifecycle>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("phase", &self.phase())
            .finish()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            machine: SessionLifecycle.state_machine(),
        }
    }

    /// Feed an event and return the resulting phase
    pub fn handle(&mut self, event: LifecycleEvent) -> SessionPhase {
        let before = self.phase();
        self.machine.handle(&event);
        let after = self.phase();
        if before != after {
            tracing::debug!(from = %before, to = %after, event = ?event, "Session phase changed");
        }
        after
    }

    pub fn phase(&self) -> SessionPhase {
        match self.machine.state() {
            State::Editing { .. } => SessionPhase::Editing,
            State::Testing { .. } => SessionPhase::Testing,
            State::Halted { .. } => SessionPhase::Halted,
            State::Verified { .. } => SessionPhase::Verified,
            State::Committing { .. } => SessionPhase::Committing,
            State::Committed { .. } => SessionPhase::Committed,
            State::RollingBack { .. } => SessionPhase::RollingBack,
            State::Closed { .. } => SessionPhase::Closed,
        }
    }

    /// Whether `event` would be accepted from the current phase
    pub fn accepts(&self, event: LifecycleEvent) -> bool {
        let phase = self.phase();
        match event {
            LifecycleEvent::Test => matches!(
                phase,
                SessionPhase::Editing | SessionPhase::Halted | SessionPhase::Verified
            ),
            LifecycleEvent::ChainFinished { .. } => phase == SessionPhase::Testing,
            LifecycleEvent::Commit => phase == SessionPhase::Verified,
            LifecycleEvent::CommitFinished { .. } => phase == SessionPhase::Committing,
            LifecycleEvent::Cancel { .. } => phase.is_open(),
            LifecycleEvent::RollbackFinished => phase == SessionPhase::RollingBack,
            LifecycleEvent::Close => phase.is_open() || phase == SessionPhase::Committed,
        }
    }
}

impl SessionPhase {
    /// Before commit and not yet closing
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            SessionPhase::Editing
                | SessionPhase::Testing
                | SessionPhase::Halted
                | SessionPhase::Verified
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), SessionPhase::Editing);
        assert_eq!(lifecycle.handle(LifecycleEvent::Test), SessionPhase::Testing);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChainFinished { ok: true }),
            SessionPhase::Verified
        );
        assert_eq!(lifecycle.handle(LifecycleEvent::Commit), SessionPhase::Committing);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::CommitFinished { ok: true }),
            SessionPhase::Committed
        );
        assert_eq!(lifecycle.handle(LifecycleEvent::Close), SessionPhase::Closed);
    }

    #[test]
    fn test_failed_chain_halts_and_can_rerun() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.handle(LifecycleEvent::Test);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChainFinished { ok: false }),
            SessionPhase::Halted
        );
        assert!(!lifecycle.accepts(LifecycleEvent::Commit));
        assert_eq!(lifecycle.handle(LifecycleEvent::Commit), SessionPhase::Halted);
        assert_eq!(lifecycle.handle(LifecycleEvent::Test), SessionPhase::Testing);
    }

    #[test]
    fn test_failed_commit_returns_to_halted() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.handle(LifecycleEvent::Test);
        lifecycle.handle(LifecycleEvent::ChainFinished { ok: true });
        lifecycle.handle(LifecycleEvent::Commit);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::CommitFinished { ok: false }),
            SessionPhase::Halted
        );
    }

    #[test]
    fn test_cancel_with_artifacts_rolls_back() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.handle(LifecycleEvent::Test);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::Cancel { has_artifacts: true }),
            SessionPhase::RollingBack
        );
        // No new run while compensating
        assert_eq!(lifecycle.handle(LifecycleEvent::Test), SessionPhase::RollingBack);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::RollbackFinished),
            SessionPhase::Closed
        );
    }

    #[test]
    fn test_cancel_without_artifacts_closes() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(
            lifecycle.handle(LifecycleEvent::Cancel { has_artifacts: false }),
            SessionPhase::Closed
        );
        assert!(lifecycle.phase().is_terminal());
        assert_eq!(lifecycle.handle(LifecycleEvent::Test), SessionPhase::Closed);
    }

    #[test]
    fn test_committing_ignores_cancel() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.handle(LifecycleEvent::Test);
        lifecycle.handle(LifecycleEvent::ChainFinished { ok: true });
        lifecycle.handle(LifecycleEvent::Commit);
        assert!(!lifecycle.accepts(LifecycleEvent::Cancel { has_artifacts: true }));
        assert_eq!(
            lifecycle.handle(LifecycleEvent::Cancel { has_artifacts: true }),
            SessionPhase::Committing
        );
    }
}
