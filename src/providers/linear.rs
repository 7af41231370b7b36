use serde_json::{json, Value};

use super::{find_item, label_teardown, names, no_payload, str_field, title_only, webhook_teardown};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind, TargetDiscovery,
};

const ACCESS_HINT: &str = "Bad access token or incorrect project full path.";

fn teams(value: &Value) -> &Value {
    value.pointer("/teams/nodes").unwrap_or(value)
}

fn team_id(ctx: &StepContext<'_>) -> Result<String, StepError> {
    let selection = ctx.selection()?;
    let checked = ctx.output(StepKind::CheckAccess)?;
    find_item(teams(checked), "name", selection)
        .and_then(|team| str_field(team, "/id"))
        .ok_or_else(|| StepError::missing_input(&format!("team `{selection}`")))
}

fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")? }))
}

fn label(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")?, "teamId": team_id(ctx)? }))
}

fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "apiKey": ctx.credential("apiKey")?,
        "teamId": team_id(ctx)?,
        "webhookUrl": ctx.webhook_url,
    }))
}

fn create_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
        "teamId": team_id(ctx)?,
        "labelId": ctx.output_str(StepKind::CreateLabel, "/id")?,
    }))
}

fn delete_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "issueTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
    }))
}

fn rollback_label(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "labelId": id }))
}

fn rollback_webhook(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "webhookId": id }))
}

fn rollback_issue(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "issueId": id, "issueTitle": ctx.test_issue_title }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let checked = ctx.output(StepKind::CheckAccess)?;
    let team = find_item(teams(checked), "name", ctx.selection()?)
        .ok_or_else(|| StepError::missing_input("selected team"))?;
    let team_id = team_id(ctx)?;
    let project_url = match (str_field(checked, "/organization/urlKey"), str_field(team, "/key")) {
        (Some(org), Some(key)) => Some(format!("https://linear.app/{org}/team/{key}")),
        _ => None,
    };

    Ok(json!({
        "projectId": team_id,
        "teamId": team_id,
        "teamName": ctx.selection()?,
        "projectUrl": project_url,
        "apiKey": ctx.credential("apiKey")?,
        "fogbenderLabelId": ctx.output_str(StepKind::CreateLabel, "/id")?,
        "webhookId": ctx.output_str(StepKind::CreateWebhook, "/id")?,
    }))
}

fn issue_id(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "issueTitle": ctx.test_issue_title,
    }))
}

fn team_names(value: &Value) -> Vec<String> {
    names(teams(value), "name")
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/id",
        delete_operation: "delete-issue",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_issue,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", access).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateLabel, "create-label", label).creates(ArtifactSpec {
            kind: ArtifactKind::Label,
            id_pointer: "/id",
            delete_operation: "delete-label",
            delete_kind: StepKind::DeleteLabel,
            delete_payload: rollback_label,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateWebhook, "create-webhook", webhook).creates(ArtifactSpec {
            kind: ArtifactKind::Webhook,
            id_pointer: "/id",
            delete_operation: "delete-webhook",
            delete_kind: StepKind::DeleteWebhook,
            delete_payload: rollback_webhook,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_issue).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_issue),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", no_payload).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", issue_id),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Linear,
        required_credentials: &["apiKey"],
        selection_label: Some("team"),
        targets: Some(TargetDiscovery {
            operation: "check-access",
            build: access,
            extract: team_names,
        }),
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this team has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-key"),
            update_field: "apiKey",
            teardown: vec![webhook_teardown(), label_teardown("delete-label")],
        },
    }
}
