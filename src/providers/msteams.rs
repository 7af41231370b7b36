use crate::api::ProviderKind;
use crate::provisioning::{
    CommitDefinition, MaintenanceDefinition, PipelineDefinition, ProviderDefinition,
};

use super::no_payload;

/// Teams is enabled per workspace; the bot install happens on the Microsoft side
pub fn definition() -> ProviderDefinition {
    ProviderDefinition {
        kind: ProviderKind::Msteams,
        required_credentials: &[],
        selection_label: None,
        targets: None,
        setup: PipelineDefinition::new(Vec::new()),
        commit: CommitDefinition {
            operation: "enable",
            build: no_payload,
            duplicate_hint: "Microsoft Teams is already enabled for this workspace.",
        },
        maintenance: MaintenanceDefinition {
            test: PipelineDefinition::new(Vec::new()),
            update_operation: None,
            update_field: "",
            teardown: Vec::new(),
        },
    }
}
