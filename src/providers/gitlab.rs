use serde_json::{json, Value};

use super::{no_payload, str_field, title_only};
use crate::api::ProviderKind;
use crate::provisioning::{
    ArtifactKind, ArtifactSpec, CommitDefinition, MaintenanceDefinition, PipelineDefinition,
    ProviderDefinition, StepContext, StepDefinition, StepError, StepKind,
};

const ACCESS_HINT: &str = "Bad access token or incorrect project full path.";

/// GitLab addresses projects by their URL-encoded full path
fn encoded_path(path: &str) -> String {
    path.replace('/', "%2F")
}

fn credentials(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "projectPath": ctx.credential("projectPath")?,
        "accessToken": ctx.credential("accessToken")?,
    }))
}

fn create_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "projectId": ctx.output_str(StepKind::CheckAccess, "/id")?,
        "issueTitle": ctx.test_issue_title,
        "accessToken": ctx.credential("accessToken")?,
    }))
}

fn delete_issue(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "projectId": encoded_path(ctx.credential("projectPath")?),
        "issueIid": ctx.output_str(StepKind::CreateTestIssue, "/iid")?,
        "issueTitle": ctx.test_issue_title,
        "accessToken": ctx.credential("accessToken")?,
    }))
}

fn rollback_issue(ctx: &StepContext<'_>, iid: &str) -> Value {
    let project = ctx
        .credentials
        .get("projectPath")
        .map(|p| encoded_path(p))
        .unwrap_or_default();
    ctx.with_credentials(json!({
        "projectId": project,
        "issueIid": iid,
        "issueTitle": ctx.test_issue_title,
    }))
}

fn add_integration(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    let project = ctx.output(StepKind::CheckAccess)?;
    Ok(ctx.with_credentials(json!({
        "projectId": ctx.output_str(StepKind::CheckAccess, "/id")?,
        "projectName": str_field(project, "/name"),
        "projectUrl": str_field(project, "/web_url"),
    })))
}

fn issue_iid(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({
        "issueIid": ctx.output_str(StepKind::CreateTestIssue, "/iid")?,
        "issueTitle": ctx.test_issue_title,
    }))
}

fn test_issue() -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::TestIssue,
        id_pointer: "/iid",
        delete_operation: "delete-issue",
        delete_kind: StepKind::DeleteTestIssue,
        delete_payload: rollback_issue,
        released_by: Some(StepKind::DeleteTestIssue),
    }
}

pub fn definition() -> ProviderDefinition {
    let setup = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", credentials).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", create_issue).creates(test_issue()),
        // Deletion is slow on GitLab
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", delete_issue).progress_max(500),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    let test = PipelineDefinition::new(vec![
        StepDefinition::new(StepKind::CheckAccess, "check-access", no_payload).hint(ACCESS_HINT),
        StepDefinition::new(StepKind::CreateTestIssue, "create-issue", title_only).creates(test_issue()),
        StepDefinition::new(StepKind::DeleteTestIssue, "delete-issue", issue_iid).progress_max(500),
        StepDefinition::new(StepKind::VerifyWebhook, "get-issue-by-name", title_only).verification(),
    ]);

    ProviderDefinition {
        kind: ProviderKind::Gitlab,
        required_credentials: &["projectPath", "accessToken"],
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
            update_operation: Some("update-api-key"),
            update_field: "accessToken",
            teardown: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path_is_url_encoded() {
        assert_eq!(encoded_path("group/sub/project"), "group%2Fsub%2Fproject");
        assert_eq!(encoded_path("plain"), "plain");
    }
}
