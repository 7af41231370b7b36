// Step bookkeeping for one provisioning chain.
//
// Every step owns a completion counter. A run starts with all counters at the
// same baseline; a step's counter moves exactly once, after its remote call
// resolved. The gate for a step with predecessor P is
// `counter(step) == counter(P) - 1 && P succeeded`.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::progress::Progress;

/// Named operations a chain can be made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    CheckAccess,
    CreateList,
    CreateLabel,
    CreateWebhook,
    CreateTestIssue,
    DeleteTestIssue,
    VerifyWebhook,
    CreateChannel,
    InviteToChannel,
    DeleteLabel,
    DeleteWebhook,
    UpdateCredentials,
    DeleteIntegration,
    Commit,
}

impl StepKind {
    /// Status-line wording
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::CheckAccess => "Checking access",
            StepKind::CreateList => "Creating list",
            StepKind::CreateLabel => "Creating label",
            StepKind::CreateWebhook => "Creating webhook",
            StepKind::CreateTestIssue => "Creating test issue",
            StepKind::DeleteTestIssue => "Deleting test issue",
            StepKind::VerifyWebhook => "Testing webhook",
            StepKind::CreateChannel => "Creating channel",
            StepKind::InviteToChannel => "Inviting to channel",
            StepKind::DeleteLabel => "Deleting label",
            StepKind::DeleteWebhook => "Deleting webhook",
            StepKind::UpdateCredentials => "Updating credentials",
            StepKind::DeleteIntegration => "Deleting integration",
            StepKind::Commit => "Adding integration",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepErrorKind {
    /// Network failure between us and the backend
    Transport,
    /// Provider or backend refused the request
    Rejected,
    /// Expected webhook event was not observed
    VerificationFailed,
    /// Commit refused because the integration already exists
    DuplicateIntegration,
    /// A required input could not be resolved before the call
    MissingInput,
    /// Backend answered with something unusable
    InvalidResponse,
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepErrorKind::Transport => "network error",
            StepErrorKind::Rejected => "rejected",
            StepErrorKind::VerificationFailed => "verification failed",
            StepErrorKind::DuplicateIntegration => "duplicate integration",
            StepErrorKind::MissingInput => "missing input",
            StepErrorKind::InvalidResponse => "invalid response",
        };
        f.write_str(text)
    }
}

/// Error recorded against a single step
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
    /// Provider-specific explanation shown next to the failing step
    pub hint: Option<String>,
}

impl StepError {
    pub fn new(kind: StepErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn missing_input(what: &str) -> Self {
        Self::new(StepErrorKind::MissingInput, format!("{what} is not available"))
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded(Value),
    Failed(StepError),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            StepOutcome::Succeeded(value) => Some(value),
            StepOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match self {
            StepOutcome::Succeeded(_) => None,
            StepOutcome::Failed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub kind: StepKind,
    pub counter: u64,
    pub pending: bool,
    pub outcome: Option<StepOutcome>,
    pub progress: Progress,
}

impl StepState {
    fn new(kind: StepKind, baseline: u64) -> Self {
        Self {
            kind,
            counter: baseline,
            pending: false,
            outcome: None,
            progress: Progress::default(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().is_some_and(StepOutcome::is_success)
    }

    pub fn error(&self) -> Option<&StepError> {
        self.outcome.as_ref().and_then(StepOutcome::error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepTableError {
    #[error("step {0:?} is not part of this chain")]
    UnknownStep(StepKind),
    #[error("step {0:?} already has a call in flight")]
    AlreadyPending(StepKind),
    #[error("step {0:?} already completed in this run")]
    AlreadyCompleted(StepKind),
    #[error("step {0:?} is not in flight")]
    NotPending(StepKind),
}

/// Ordered step states of one chain, linear by construction
#[derive(Debug, Clone, PartialEq)]
pub struct StepTable {
    steps: Vec<StepState>,
    baseline: u64,
}

impl StepTable {
    pub fn new(kinds: &[StepKind]) -> Self {
        Self {
            steps: kinds.iter().map(|kind| StepState::new(*kind, 0)).collect(),
            baseline: 0,
        }
    }

    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn states(&self) -> &[StepState] {
        &self.steps
    }

    pub fn get(&self, kind: StepKind) -> Option<&StepState> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    fn position(&self, kind: StepKind) -> Result<usize, StepTableError> {
        self.steps
            .iter()
            .position(|s| s.kind == kind)
            .ok_or(StepTableError::UnknownStep(kind))
    }

    /// Start a new run: every counter moves to the first step's counter,
    /// results and pending flags are dropped.
    pub fn restart(&mut self) {
        let baseline = self
            .steps
            .iter()
            .map(|s| s.counter)
            .max()
            .unwrap_or(self.baseline);
        self.baseline = baseline;
        for step in &mut self.steps {
            *step = StepState::new(step.kind, baseline);
        }
    }

    /// Whether the step at `index` may fire now
    pub fn gate_open(&self, index: usize) -> bool {
        let Some(step) = self.steps.get(index) else {
            return false;
        };
        if step.pending {
            return false;
        }
        if index == 0 {
            return step.counter == self.baseline;
        }
        let predecessor = &self.steps[index - 1];
        step.counter + 1 == predecessor.counter && predecessor.succeeded()
    }

    /// Index of the one step whose gate is open, if any
    pub fn next_ready(&self) -> Option<usize> {
        (0..self.steps.len()).find(|i| self.gate_open(*i))
    }

    pub fn begin(&mut self, kind: StepKind) -> Result<(), StepTableError> {
        let index = self.position(kind)?;
        let baseline = self.baseline;
        let step = &mut self.steps[index];
        if step.pending {
            return Err(StepTableError::AlreadyPending(kind));
        }
        if step.counter != baseline {
            return Err(StepTableError::AlreadyCompleted(kind));
        }
        step.pending = true;
        step.progress = Progress::default();
        Ok(())
    }

    /// Record a resolved call; the counter advances only here
    pub fn complete(
        &mut self,
        kind: StepKind,
        outcome: StepOutcome,
        progress: Progress,
    ) -> Result<(), StepTableError> {
        let index = self.position(kind)?;
        let step = &mut self.steps[index];
        if !step.pending {
            return Err(StepTableError::NotPending(kind));
        }
        step.pending = false;
        step.outcome = Some(outcome);
        step.progress = progress;
        step.counter += 1;
        Ok(())
    }

    pub fn value(&self, kind: StepKind) -> Option<&Value> {
        self.get(kind)
            .and_then(|s| s.outcome.as_ref())
            .and_then(StepOutcome::value)
    }

    pub fn any_pending(&self) -> bool {
        self.steps.iter().any(|s| s.pending)
    }

    pub fn first_error(&self) -> Option<(StepKind, &StepError)> {
        self.steps
            .iter()
            .find_map(|s| s.error().map(|e| (s.kind, e)))
    }

    /// Every step resolved exactly once in the current run
    pub fn all_advanced(&self) -> bool {
        self.steps.iter().all(|s| s.counter == self.baseline + 1)
    }

    pub fn all_succeeded(&self) -> bool {
        self.all_advanced() && self.steps.iter().all(StepState::succeeded)
    }
}
