//! Provider catalogue.
//!
//! Each module declares one provider's setup chain, activation call and
//! maintenance flows as data over the generic provisioning runner.

pub mod asana;
pub mod github;
pub mod gitlab;
pub mod height;
pub mod jira;
pub mod linear;
pub mod msteams;
pub mod pagerduty;
pub mod slack;
pub mod trello;

use serde_json::{json, Value};

use crate::api::{CommittedIntegration, ProviderKind};
use crate::provisioning::{
    StepContext, StepError, StepKind, TeardownStep,
};

/// Definition of `kind`
pub fn definition(kind: ProviderKind) -> crate::provisioning::ProviderDefinition {
    match kind {
        ProviderKind::Jira => jira::definition(),
        ProviderKind::Github => github::definition(),
        ProviderKind::Gitlab => gitlab::definition(),
        ProviderKind::Asana => asana::definition(),
        ProviderKind::Linear => linear::definition(),
        ProviderKind::Trello => trello::definition(),
        ProviderKind::Height => height::definition(),
        ProviderKind::Pagerduty => pagerduty::definition(),
        ProviderKind::Slack => slack::definition(),
        ProviderKind::Msteams => msteams::definition(),
    }
}

pub fn all() -> Vec<crate::provisioning::ProviderDefinition> {
    ProviderKind::ALL.iter().map(|kind| definition(*kind)).collect()
}

/// Elements of a list response; some endpoints wrap the list in `data`
pub(crate) fn items(value: &Value) -> &[Value] {
    value
        .as_array()
        .or_else(|| value.get("data").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First element of a list response whose `field` equals `wanted`
pub(crate) fn find_item<'a>(list: &'a Value, field: &str, wanted: &str) -> Option<&'a Value> {
    items(list)
        .iter()
        .find(|item| item.get(field).and_then(Value::as_str) == Some(wanted))
}

/// `field` of every element of a list, skipping elements without it
pub(crate) fn names(list: &Value, field: &str) -> Vec<String> {
    items(list)
        .iter()
        .filter_map(|item| item.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

pub(crate) fn str_field(value: &Value, pointer: &str) -> Option<String> {
    crate::provisioning::json_id(value, pointer)
}

/// Selected element of the list returned by `step`
pub(crate) fn selected_item<'a>(
    ctx: &StepContext<'a>,
    step: StepKind,
    field: &str,
) -> Result<&'a Value, StepError> {
    let selection = ctx.selection()?;
    find_item(ctx.output(step)?, field, selection)
        .ok_or_else(|| StepError::missing_input(&format!("`{selection}` among available targets")))
}

pub(crate) fn title_only(ctx: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({ "issueTitle": ctx.test_issue_title }))
}

pub(crate) fn no_payload(_: &StepContext<'_>) -> Result<Value, StepError> {
    Ok(json!({}))
}

pub(crate) fn webhook_teardown() -> TeardownStep {
    TeardownStep {
        kind: StepKind::DeleteWebhook,
        operation: "delete-webhook",
        resource: |i: &CommittedIntegration| i.webhook_id.clone(),
        payload: |id: &str| json!({ "webhookId": id }),
    }
}

pub(crate) fn label_teardown(operation: &'static str) -> TeardownStep {
    TeardownStep {
        kind: StepKind::DeleteLabel,
        operation,
        resource: |i: &CommittedIntegration| i.label_id.clone(),
        payload: |id: &str| json!({ "labelId": id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::{ArtifactKind, ProviderDefinition};

    #[test]
    fn test_every_provider_has_a_definition() {
        for kind in ProviderKind::ALL {
            assert_eq!(definition(kind).kind, kind);
        }
        assert_eq!(all().len(), ProviderKind::ALL.len());
    }

    fn artifact_order(def: &ProviderDefinition) -> Vec<ArtifactKind> {
        def.setup
            .steps()
            .iter()
            .filter_map(|s| s.artifact.map(|a| a.kind))
            .collect()
    }

    #[test]
    fn test_labels_are_created_before_webhooks() {
        for def in all() {
            let order = artifact_order(&def);
            let label = order
                .iter()
                .position(|k| matches!(k, ArtifactKind::Label | ArtifactKind::Tag));
            let webhook = order.iter().position(|k| *k == ArtifactKind::Webhook);
            if let (Some(label), Some(webhook)) = (label, webhook) {
                assert!(label < webhook, "{:?}", def.kind);
            }
        }
    }

    #[test]
    fn test_test_issues_are_released_by_their_cleanup_step() {
        for def in all() {
            for step in def.setup.steps() {
                if let Some(artifact) = step.artifact {
                    if artifact.kind == ArtifactKind::TestIssue {
                        let releaser = artifact.released_by.unwrap();
                        assert!(def.setup.get(releaser).is_some(), "{:?}", def.kind);
                    }
                }
            }
        }
    }

    #[test]
    fn test_teardown_deletes_webhook_before_label() {
        for def in all() {
            let kinds: Vec<_> = def.maintenance.teardown.iter().map(|t| t.kind).collect();
            if let Some(label) = kinds.iter().position(|k| *k == StepKind::DeleteLabel) {
                let webhook = kinds.iter().position(|k| *k == StepKind::DeleteWebhook);
                assert!(webhook.is_some_and(|w| w < label), "{:?}", def.kind);
            }
        }
    }

    #[test]
    fn test_list_helpers() {
        let list = json!([{"name": "a", "id": 1}, {"name": "b", "id": 2}, {"id": 3}]);
        assert_eq!(names(&list, "name"), vec!["a", "b"]);
        assert_eq!(find_item(&list, "name", "b").unwrap()["id"], 2);

        let wrapped = json!({"data": [{"name": "x"}]});
        assert_eq!(names(&wrapped, "name"), vec!["x"]);
        assert!(items(&json!({"other": 1})).is_empty());
    }
}
