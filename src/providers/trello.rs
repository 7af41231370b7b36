use serde_json::{json, Value};

use super::{names, no_payload, selected_item, str_field, title_only, webhook_teardown};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind, TargetDiscovery,
};

const ACCESS_HINT: &str = "Bad api key or incorrect project full path.";

fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "token": ctx.credential("token")? }))
}

fn board_id(ctx: &StepContext<'_>) -> Result<String, StepError> {
    let board = selected_item(ctx, StepKind::CheckAccess, "name")?;
    str_field(board, "/id").ok_or_else(|| StepError::missing_input("board id"))
}

fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "webhookUrl": ctx.webhook_url,
        "token": ctx.credential("token")?,
        "idBoard": board_id(ctx)?,
    }))
}

fn create_card(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "idBoard": board_id(ctx)?,
        "issueTitle": ctx.test_issue_title,
        "token": ctx.credential("token")?,
    }))
}

fn card_name(ctx: &StepContext<'_>) -> String {
    ctx.output_str(StepKind::CreateTestIssue, "/name")
        .unwrap_or_else(|_| ctx.test_issue_title.to_string())
}

fn delete_card(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "cardId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "cardName": card_name(ctx),
        "token": ctx.credential("token")?,
    }))
}

fn rollback_webhook(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "webhookId": id }))
}

fn rollback_card(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "cardId": id, "cardName": card_name(ctx) }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let board = selected_item(ctx, StepKind::CheckAccess, "name")?;
    Ok(json!({
        "projectId": board_id(ctx)?,
        "projectName": ctx.selection()?,
        "projectUrl": str_field(board, "/shortUrl").or_else(|| str_field(board, "/url")),
        "webhookId": ctx.output_str(StepKind::CreateWebhook, "/id")?,
        "token": ctx.credential("token")?,
    }))
}

fn card(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "cardId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "cardName": card_name(ctx),
    }))
}

fn board_names(value: &Value) -> Vec<String> {
    names(value, "name")
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/id",
        delete_operation: "delete-issue",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_card,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", access).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateWebhook, "create-webhook", webhook).creates(ArtifactSpec {
            kind: ArtifactKind::Webhook,
            id_pointer: "/id",
            delete_operation: "delete-webhook",
            delete_kind: StepKind::DeleteWebhook,
            delete_payload: rollback_webhook,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_card).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_card),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", no_payload).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", card),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Trello,
        required_credentials: &["token"],
        selection_label: Some("board"),
        targets: Some(TargetDiscovery {
            operation: "check-access",
            build: access,
            extract: board_names,
        }),
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this board has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-key"),
            update_field: "token",
            teardown: vec![webhook_teardown()],
        },
    }
}
