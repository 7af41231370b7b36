use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type WorkspaceId = String;
pub type IntegrationId = String;

/// Third-party providers that can be connected to a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Jira,
    Github,
    Gitlab,
    Asana,
    Linear,
    Trello,
    Height,
    Pagerduty,
    Slack,
    Msteams,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 10] = [
        ProviderKind::Jira,
        ProviderKind::Github,
        ProviderKind::Gitlab,
        ProviderKind::Asana,
        ProviderKind::Linear,
        ProviderKind::Trello,
        ProviderKind::Height,
        ProviderKind::Pagerduty,
        ProviderKind::Slack,
        ProviderKind::Msteams,
    ];

    /// Path segment used by the backend for this provider
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderKind::Jira => "jira",
            ProviderKind::Github => "github",
            ProviderKind::Gitlab => "gitlab",
            ProviderKind::Asana => "asana",
            ProviderKind::Linear => "linear",
            ProviderKind::Trello => "trello",
            ProviderKind::Height => "height",
            ProviderKind::Pagerduty => "pagerduty",
            ProviderKind::Slack => "slack",
            ProviderKind::Msteams => "msteams",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Jira => "Jira",
            ProviderKind::Github => "GitHub",
            ProviderKind::Gitlab => "GitLab",
            ProviderKind::Asana => "Asana",
            ProviderKind::Linear => "Linear",
            ProviderKind::Trello => "Trello",
            ProviderKind::Height => "Height",
            ProviderKind::Pagerduty => "PagerDuty",
            ProviderKind::Slack => "Slack",
            ProviderKind::Msteams => "Microsoft Teams",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which family of backend endpoints a call is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScope {
    /// `/integrations/{provider}/{op}`, used while provisioning
    Provider(ProviderKind),
    /// `/integrations/{integration_id}/{op}`, used against committed integrations
    Integration(IntegrationId),
}

/// One backend request issued on behalf of a step
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub scope: CallScope,
    pub operation: String,
    pub payload: Value,
}

impl RemoteCall {
    pub fn new(scope: CallScope, operation: &str, payload: Value) -> Self {
        Self {
            scope,
            operation: operation.to_string(),
            payload,
        }
    }

    /// Backend path for this call within a workspace
    pub fn path(&self, workspace_id: &str) -> String {
        let target = match &self.scope {
            CallScope::Provider(provider) => provider.slug().to_string(),
            CallScope::Integration(id) => id.clone(),
        };
        format!(
            "/api/workspaces/{}/integrations/{}/{}",
            workspace_id, target, self.operation
        )
    }
}

/// Persisted integration record as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedIntegration {
    pub id: IntegrationId,
    pub workspace_id: WorkspaceId,
    #[serde(rename = "type")]
    pub provider: ProviderKind,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub credential_ref: Option<String>,
    #[serde(default, alias = "webhookId")]
    pub webhook_id: Option<String>,
    #[serde(default, alias = "fogbender_label_id", alias = "fogbenderLabelId")]
    pub label_id: Option<String>,
    /// Provider-specific fields the crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommittedIntegration {
    pub fn display_label(&self) -> String {
        match (&self.project_name, &self.project_url) {
            (Some(name), Some(url)) => format!("{name} ({url})"),
            (Some(name), None) => name.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_call_paths() {
        let call = RemoteCall::new(
            CallScope::Provider(ProviderKind::Linear),
            "create-label",
            json!({}),
        );
        assert_eq!(
            call.path("ws1"),
            "/api/workspaces/ws1/integrations/linear/create-label"
        );

        let call = RemoteCall::new(CallScope::Integration("42".to_string()), "delete", json!({}));
        assert_eq!(call.path("ws1"), "/api/workspaces/ws1/integrations/42/delete");
    }

    #[test]
    fn test_committed_integration_keeps_provider_fields() {
        let record: CommittedIntegration = serde_json::from_value(json!({
            "id": "i1",
            "workspace_id": "ws1",
            "type": "github",
            "project_name": "acme/app",
            "project_url": "https://github.com/acme/app",
            "inserted_at": "2024-01-02T03:04:05Z",
            "webhook_id": "W1",
            "fogbender_label_id": "L1",
            "repo": "acme/app"
        }))
        .unwrap();

        assert_eq!(record.provider, ProviderKind::Github);
        assert_eq!(record.webhook_id.as_deref(), Some("W1"));
        assert_eq!(record.label_id.as_deref(), Some("L1"));
        assert_eq!(record.extra.get("repo"), Some(&json!("acme/app")));
        assert_eq!(record.display_label(), "acme/app (https://github.com/acme/app)");
    }
}
