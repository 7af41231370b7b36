use serde_json::{json, Value};

use super::str_field;
use crate::api::ProviderKind;
use crate::provisioning::{
    CommitDefinition, MaintenanceDefinition, PipelineDefinition, ProviderDefinition, StepContext,
    StepDefinition, StepError, StepKind,
};

fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "userToken": ctx.credential("userToken")?,
        "userId": ctx.credential("userId")?,
    }))
}

fn invite(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let mut body = access(ctx)?;
    body["channelId"] = json!(ctx.output_str(StepKind::CreateChannel, "/channel/id")?);
    Ok(body)
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let team = ctx.output(StepKind::CheckAccess)?;
    let mut body = access(ctx)?;
    body["projectId"] = json!(ctx.output_str(StepKind::CheckAccess, "/team/id")?);
    body["projectName"] = json!(str_field(team, "/team/name"));
    body["projectUrl"] = json!(str_field(team, "/url"));
    body["channelId"] = json!(ctx.output_str(StepKind::CreateChannel, "/channel/id")?);
    Ok(body)
}

pub fn definition() -> ProviderDefinition {
    // The channel is kept on rollback; users may already be talking in it
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", access)
            .hint("Bad user token or user id."),
        StepDefinition::new(StepKind::CreateChannel, "create-channel", access),
        StepDefinition::new(StepKind::InviteToChannel, "invite-to-channel", invite),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Slack,
        required_credentials: &["userToken", "userId"],
        selection_label: None,
        targets: None,
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this Slack workspace has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test: PipelineDefinition::new(Vec::new()),
            update_operation: Some("update-api-key"),
            update_field: "userToken",
            teardown: Vec::new(),
        },
    }
}
