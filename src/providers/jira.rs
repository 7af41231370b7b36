use serde_json::{json, Value};

use super::{no_payload, str_field, title_only};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind,
};

fn access(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "jiraUrl": ctx.credential("jiraUrl")?,
        "jiraUser": ctx.credential("jiraUser")?,
        "apiToken": ctx.credential("apiToken")?,
        "projectKey": ctx.credential("projectKey")?,
    }))
}

fn create_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let mut body = access(ctx)?;
    body["issueTitle"] = json!(ctx.test_issue_title);
    Ok(body)
}

fn delete_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let mut body = access(ctx)?;
    body["issueId"] = json!(ctx.output_str(StepKind::CreateTestIssue, "/id")?);
    body["issueTitle"] = json!(ctx.test_issue_title);
    Ok(body)
}

fn rollback_issue(ctx: &StepContext<'_>, id: &str) -> Value {
    ctx.with_credentials(json!({ "issueId": id, "issueTitle": ctx.test_issue_title }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let mut body = access(ctx)?;
    let project = ctx.output(StepKind::CheckAccess)?;
    body["projectName"] = json!(str_field(project, "/name")
        .unwrap_or_else(|| ctx.credentials.get("projectKey").cloned().unwrap_or_default()));
    Ok(body)
}

fn issue_id(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueId": ctx.output_str(StepKind::CreateTestIssue, "/id")?,
        "issueTitle": ctx.test_issue_title,
    }))
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
    let hint = "Bad access token or incorrect project key.";
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", access).hint(hint),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_issue).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_issue).progress_max(500),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", no_payload).hint(hint),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", issue_id).progress_max(500),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Jira,
        required_credentials: &["jiraUrl", "jiraUser", "apiToken", "projectKey"],
        selection_label: None,
        targets: None,
        setup,
        commit: CommitDefinition {
            operation: "add-integration",
            build: add_integration,
            duplicate_hint: "Duplicate integration: this project has already been added.",
        },
        maintenance: MaintenanceDefinition {
            test,
            update_operation: Some("update-api-token"),
            update_field: "apiToken",
            teardown: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deletion_gets_the_long_progress_bar() {
        let def = definition();
        let step = def.setup.get(StepKind::DeleteTestIssue).unwrap();
        assert_eq!(step.progress_max, Some(500));
        assert!(def.setup.get(StepKind::VerifyWebhook).unwrap().verifies);
    }
}
