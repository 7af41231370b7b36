pub mod client;
pub mod errors;
pub mod types;

pub use client::{BackendClient, IntegrationApi};
pub use errors::ApiError;
pub use types::{CallScope, CommittedIntegration, IntegrationId, ProviderKind, RemoteCall, WorkspaceId};
