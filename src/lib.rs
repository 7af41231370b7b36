// Integration Provisioner - verified setup and teardown of workspace integrations
// This exposes the core components for the CLI and for testing

pub mod api;
pub mod cli;
pub mod config;
pub mod http;
pub mod observability;
pub mod providers;
pub mod provisioning;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use api::{ApiError, BackendClient, CommittedIntegration, IntegrationApi, ProviderKind, RemoteCall};
pub use config::{config, ProvisionerConfig};
pub use http::RateLimitedHttpClient;
pub use observability::{provisioning_metrics, ProvisioningMetrics};
pub use provisioning::{
    ChainOutcome, CommitBlocker, Credentials, IntegrationMaintenance, ProvisionError,
    ProvisioningSession, SessionOptions, SessionPhase, StepKind,
};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{create_session_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
