use serde_json::{json, Value};

use super::{no_payload, str_field, title_only, webhook_teardown};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind,
};

fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "userToken": ctx.credential("userToken")? }))
}

fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "webhookUrl": ctx.webhook_url,
        "userToken": ctx.credential("userToken")?,
    }))
}

fn create_task(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "fogbenderListId": ctx.output_str(StepKind::CreateList, "/id")?,
        "issueTitle": ctx.test_issue_title,
        "userToken": ctx.credential("userToken")?,
    }))
}

fn task_name(ctx: &StepContext<'_>) -> String {
    ctx.output_str(StepKind::CreateTestIssue, "/name")
        .unwrap_or_else(|_| ctx.test_issue_title.to_string())
}

fn delete_task(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "taskId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "taskName": task_name(ctx),
        "userToken": ctx.credential("userToken")?,
    }))
}

fn rollback_webhook(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "webhookId": id }))
}

fn rollback_task(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "taskId": id, "taskName": task_name(ctx) }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let workspace = ctx.output(StepKind::CheckAccess)?;
    Ok(json!({
        "projectId": ctx.output_str(StepKind::CheckAccess, "/id")?,
        "projectName": str_field(workspace, "/name"),
        "projectUrl": str_field(workspace, "/url"),
        "fogbenderListId": ctx.output_str(StepKind::CreateList, "/id")?,
        "webhookId": ctx.output_str(StepKind::CreateWebhook, "/id")?,
        "userToken": ctx.credential("userToken")?,
    }))
}

fn task(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "taskId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "taskName": task_name(ctx),
    }))
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/id",
        delete_operation: "delete-issue",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_task,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", access)
            .hint("Bad access token."),
        // The list is shared by every integration of the workspace and survives a rollback
        StepDefinition::new(StepKind::CreateList, "create-fogbender-list", access),
        StepDefinition::new(StepKind::CreateWebhook, "create-webhook", webhook).creates(ArtifactSpec {
            kind: ArtifactKind::Webhook,
            id_pointer: "/id",
            delete_operation: "delete-webhook",
            delete_kind: StepKind::DeleteWebhook,
            delete_payload: rollback_webhook,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_task).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_task),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", no_payload)
            .hint("Bad access token."),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", task),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Height,
        required_credentials: &["userToken"],
        selection_label: None,
        targets: None,
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this workspace has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-key"),
            update_field: "userToken",
            teardown: vec![webhook_teardown()],
        },
    }
}
