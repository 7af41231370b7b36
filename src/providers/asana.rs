use serde_json::{json, Value};

use super::{label_teardown, names, no_payload, selected_item, str_field, webhook_teardown};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind, TargetDiscovery,
};

const ACCESS_HINT: &str = "Bad access token or incorrect project full path.";

fn projects(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")? }))
}

fn project_id(ctx: &StepContext<'_>) -> Result<String, StepError> {
    let project = selected_item(ctx, StepKind::CheckAccess, "name")?;
    str_field(project, "/gid").ok_or_else(|| StepError::missing_input("project gid"))
}

fn tag(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "apiKey": ctx.credential("apiKey")? }))
}

fn webhook(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "apiKey": ctx.credential("apiKey")?,
        "projectId": project_id(ctx)?,
        "webhookUrl": ctx.webhook_url,
    }))
}

fn create_task(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "taskTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
        "projectId": project_id(ctx)?,
        "tagId": ctx.output_str(StepKind::CreateLabel, "/gid")?,
    }))
}

fn delete_task(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "taskId": ctx.output_str(StepKind::CreateTestIssue, "/gid")?,
        "taskTitle": ctx.test_issue_title,
        "apiKey": ctx.credential("apiKey")?,
    }))
}

fn rollback_tag(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "tagId": id }))
}

fn rollback_webhook(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "webhookId": id }))
}

fn rollback_task(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "taskId": id, "taskTitle": ctx.test_issue_title }))
}

fn task_by_id(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "taskId": ctx.output_str(StepKind::CreateTestIssue, "/gid")? }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "projectId": project_id(ctx)?,
        "projectName": ctx.selection()?,
        "apiKey": ctx.credential("apiKey")?,
        "fogbenderTagId": ctx.output_str(StepKind::CreateLabel, "/gid")?,
        "webhookId": ctx.output_str(StepKind::CreateWebhook, "/gid")?,
    }))
}

fn title(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "taskTitle": ctx.test_issue_title }))
}

fn task_id_and_title(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "taskId": ctx.output_str(StepKind::CreateTestIssue, "/gid")?,
        "taskTitle": ctx.test_issue_title,
    }))
}

fn project_names(value: &Value) -> Vec<String> {
    names(value, "name")
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/gid",
        delete_operation: "delete-task",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_task,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

/// Tags stand in for labels and tasks for issues; ids are `gid` strings.
pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "get-projects", projects).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateLabel, "create-tag", tag).creates(ArtifactSpec {
            kind: ArtifactKind::Tag,
            id_pointer: "/gid",
            delete_operation: "delete-tag",
            delete_kind: StepKind::DeleteLabel,
            delete_payload: rollback_tag,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateWebhook, "create-webhook", webhook).creates(ArtifactSpec {
            kind: ArtifactKind::Webhook,
            id_pointer: "/gid",
            delete_operation: "delete-webhook",
            delete_kind: StepKind::DeleteWebhook,
            delete_payload: rollback_webhook,
            released_by: None,
        }),
        StepDefinition::new(StepKind::CreateTestIssue, "create-task", create_task).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-task", delete_task),
        StepDefinition::new(StepKind::VerifyWebhook, "get-task-by-id", task_by_id).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "get-projects", no_payload).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateTestIssue, "create-task", title).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-task", task_id_and_title),
        StepDefinition::new(StepKind::VerifyWebhook, "get-task-by-id", task_by_id).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Asana,
        required_credentials: &["apiKey"],
        selection_label: Some("project"),
        targets: Some(TargetDiscovery {
            operation: "get-projects",
            build: projects,
            extract: project_names,
        }),
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this project has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-key"),
            update_field: "apiKey",
            teardown: vec![webhook_teardown(), label_teardown("delete-tag")],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_read_from_gid() {
        let def = definition();
        for step in def.setup.steps() {
            if let Some(artifact) = step.artifact {
                assert_eq!(artifact.id_pointer, "/gid");
            }
        }
        assert_eq!(
            def.setup.get(StepKind::CreateLabel).unwrap().artifact.unwrap().kind,
            ArtifactKind::Tag
        );
    }
}
