use thiserror::Error;

use super::commit::CommitBlocker;
use super::lifecycle::SessionPhase;
use super::step::{StepError, StepTableError};
use crate::api::{ApiError, ProviderKind};

/// Session-level failures: misuse of the session or a failed final call.
///
/// Per-step failures are not errors at this level; they are recorded in the
/// step table and reported through the chain outcome.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{provider} requires credential(s): {}", missing.join(", "))]
    MissingCredentials {
        provider: ProviderKind,
        missing: Vec<&'static str>,
    },

    #[error("{action} is not allowed while the session is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("session was cancelled")]
    Cancelled,

    #[error("commit is not available: {0}")]
    CommitBlocked(CommitBlocker),

    #[error("commit failed: {0}")]
    CommitFailed(StepError),

    #[error("{provider} does not support {action}")]
    Unsupported {
        provider: ProviderKind,
        action: &'static str,
    },

    #[error("step bookkeeping error: {0}")]
    StepTable(#[from] StepTableError),

    #[error("backend error: {0}")]
    Api(#[from] ApiError),

    #[error("{operation} failed: {error}")]
    Maintenance {
        operation: &'static str,
        error: StepError,
    },
}
