use serde_json::{json, Value};

use crate::api::ProviderKind;
use crate::provisioning::{
    CommitDefinition, MaintenanceDefinition, PipelineDefinition, ProviderDefinition, StepContext,
    StepError,
};

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "userToken": ctx.credential("userToken")? }))
}

/// No setup chain; the token is validated by the backend on activation
pub fn definition() -> ProviderDefinition {
    ProviderDefinition {
        kind: ProviderKind::Pagerduty,
        required_credentials: &["userToken"],
        selection_label: None,
        targets: None,
        setup: PipelineDefinition::new(Vec::new()),
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this PagerDuty account has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test: PipelineDefinition::new(Vec::new()),
            update_operation: Some("update-api-key"),
            update_field: "userToken",
            teardown: Vec::new(),
        },
    }
}
