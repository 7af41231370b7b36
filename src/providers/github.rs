use serde_json::{json, Value};

use super::{label_teardown, names, no_payload, selected_item, str_field, title_only, webhook_teardown};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind, TargetDiscovery,
};

fn repositories(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")? }))
}

fn label(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")?, "repo": ctx.selection()? }))
}

fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "apiKey": ctx.credential("apiKey")?,
        "repo": ctx.selection()?,
        "webhookUrl": ctx.webhook_url,
    }))
}

fn create_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
        "repo": ctx.selection()?,
        "labelId": ctx.output_str(StepKind::CreateLabel, "/id")?,
    }))
}

fn delete_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "repo": ctx.selection()?,
        "issueNumber": ctx.output_str(StepKind::CreateTestIssue, "/number")?,
        "issueTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
    }))
}

fn rollback_label(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "repo": ctx.selection, "labelId": id }))
}

fn rollback_webhook(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "repo": ctx.selection, "webhookId": id }))
}

fn rollback_issue(ctx: &StepContext<'_>, number: &str) -> Value {
    ctx.with_credentials(json!({
        "repo": ctx.selection,
        "issueNumber": number,
        "issueTitle": ctx.test_issue_title,
    }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let repo = selected_item(ctx, StepKind::CheckAccess, "full_name")?;
    Ok(json!({
        "repo": ctx.selection()?,
        "repositoryId": str_field(repo, "/id"),
        "repositoryUrl": str_field(repo, "/html_url"),
        "apiKey": ctx.credential("apiKey")?,
        "fogbenderLabelId": ctx.output_str(StepKind::CreateLabel, "/id")?,
        "webhookId": ctx.output_str(StepKind::CreateWebhook, "/id")?,
    }))
}

fn issue_number(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueNumber": ctx.output_str(StepKind::CreateTestIssue, "/number")?,
        "issueTitle": ctx.test_issue_title,
    }))
}

fn repository_names(value: &Value) -> Vec<String> {
    names(value, "full_name")
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/number",
        delete_operation: "delete-issue",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_issue,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "get-repositories", repositories)
            .hint("Bad access token."),
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
        // Issues are addressed by number, not by id
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_issue).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_issue),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "get-repositories", no_payload)
            .hint("Bad access token."),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", issue_number),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Github,
        required_credentials: &["apiKey"],
        selection_label: Some("repository"),
        targets: Some(TargetDiscovery {
            operation: "get-repositories",
            build: repositories,
            extract: repository_names,
        }),
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this repository has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-key"),
            update_field: "apiKey",
            teardown: vec![webhook_teardown(), label_teardown("delete-label")],
        },
    }
}
