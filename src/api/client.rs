use super::errors::ApiError;
use super::types::{CommittedIntegration, RemoteCall};
use crate::config::BackendConfig;
use crate::http::RateLimitedHttpClient;
use crate::observability::provisioning_metrics;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Backend operations the provisioning saga depends on.
///
/// The REST API is a black box: every step is one `call`, and the
/// integration listing is the only read. Implemented over HTTP by
/// [`BackendClient`] and by scripted doubles in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntegrationApi: Send + Sync {
    /// Issue one remote call and return the backend's JSON echo
    async fn call(&self, workspace_id: &str, call: &RemoteCall) -> Result<Value, ApiError>;

    /// List committed integrations of a workspace
    async fn list_integrations(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<CommittedIntegration>, ApiError>;

    /// Forget any cached listing for a workspace
    async fn invalidate_integrations(&self, workspace_id: &str);
}

/// HTTP implementation of [`IntegrationApi`]
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: RateLimitedHttpClient,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let http = RateLimitedHttpClient::new(
            &config.base_url,
            config.api_token.clone(),
            config.requests_per_second,
            config.burst_capacity,
            Duration::from_secs(config.listing_cache_ttl_seconds),
        )?;
        Ok(Self { http })
    }

    fn listing_path(workspace_id: &str) -> String {
        format!("/api/workspaces/{workspace_id}/integrations")
    }
}

#[async_trait]
impl IntegrationApi for BackendClient {
    async fn call(&self, workspace_id: &str, call: &RemoteCall) -> Result<Value, ApiError> {
        let metrics = provisioning_metrics();
        metrics.record_request();

        let result = self.http.post_json(&call.path(workspace_id), &call.payload).await;
        if let Err(e) = &result {
            metrics.record_error();
            warn!(operation = %call.operation, error = %e, "Backend call failed");
        }
        result
    }

    async fn list_integrations(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<CommittedIntegration>, ApiError> {
        provisioning_metrics().record_request();
        let value = self.http.get_json(&Self::listing_path(workspace_id)).await?;
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
            message: e.to_string(),
        })
    }

    async fn invalidate_integrations(&self, workspace_id: &str) {
        self.http
            .invalidate_cache_pattern(&Self::listing_path(workspace_id))
            .await;
    }
}
