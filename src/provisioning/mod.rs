//! Integration provisioning.
//!
//! A session runs a provider's step chain against the backend in lockstep,
//! tracks every artifact it creates on the provider, and either commits the
//! integration or compensates those artifacts. Maintenance flows reuse the
//! same runner against an already committed integration.

pub mod commit;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod executor;
pub mod lifecycle;
pub mod maintenance;
pub mod pipeline;
pub mod progress;
pub mod rollback;
pub mod session;
pub mod step;

#[cfg(test)]
pub(crate) mod mocks;

pub use commit::{CommitBlocker, CommitGate, CommitReceipt};
pub use coordinator::{ChainOutcome, ChainRunner, RunInputs};
pub use errors::ProvisionError;
pub use events::{EventSink, SessionEvent};
pub use executor::StepExecutor;
pub use lifecycle::{LifecycleEvent, SessionPhase};
pub use maintenance::{IntegrationMaintenance, MaintenanceTestReport, TeardownEntry, TeardownReport};
pub use pipeline::{
    json_id, ArtifactKind, ArtifactSpec, CommitDefinition, Credentials, MaintenanceDefinition,
    PipelineDefinition, ProviderDefinition, StepContext, StepDefinition, TargetDiscovery,
    TeardownStep,
};
pub use progress::{Progress, ProgressConfig};
pub use rollback::{ArtifactLedger, ExternalResourceHandle, RollbackReport};
pub use session::{ProvisioningSession, SessionOptions, SessionSnapshot, StepSnapshot};
pub use step::{StepError, StepErrorKind, StepKind, StepOutcome, StepTable};
