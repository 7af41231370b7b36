// Declarative description of provider chains.
//
// A provider is a list of step definitions; one generic runner walks them.
// Payload builders are plain functions over a `StepContext`, so a chain is
// data and can be inspected and tested without a backend.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::step::{StepError, StepKind, StepTable};
use crate::api::{CallScope, CommittedIntegration, ProviderKind, RemoteCall};

/// Credential fields entered for a provider, keyed by backend field name
pub type Credentials = BTreeMap<String, String>;

/// Builds the request body of a step from everything known so far
pub type PayloadFn = fn(&StepContext<'_>) -> Result<Value, StepError>;

/// Builds the body of a compensating delete for one created artifact
pub type DeletePayloadFn = fn(&StepContext<'_>, &str) -> Value;

/// Inputs visible to payload builders
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub credentials: &'a Credentials,
    pub selection: Option<&'a str>,
    pub outputs: &'a StepTable,
    pub test_issue_title: &'a str,
    pub webhook_url: &'a str,
}

impl<'a> StepContext<'a> {
    pub fn credential(&self, name: &str) -> Result<&'a str, StepError> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StepError::missing_input(&format!("credential `{name}`")))
    }

    pub fn selection(&self) -> Result<&'a str, StepError> {
        self.selection
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StepError::missing_input("selected target"))
    }

    /// Response of an earlier step in this run
    pub fn output(&self, kind: StepKind) -> Result<&'a Value, StepError> {
        self.outputs
            .value(kind)
            .ok_or_else(|| StepError::missing_input(&format!("result of `{}`", kind.label())))
    }

    /// String (or number) found at a JSON pointer inside an earlier response
    pub fn output_str(&self, kind: StepKind, pointer: &str) -> Result<String, StepError> {
        let value = self.output(kind)?;
        json_id(value, pointer).ok_or_else(|| {
            StepError::missing_input(&format!("`{pointer}` in result of `{}`", kind.label()))
        })
    }

    /// Credentials as a JSON object, the base of most payloads
    pub fn credentials_json(&self) -> Value {
        let map: Map<String, Value> = self
            .credentials
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// Credentials merged with extra fields
    pub fn with_credentials(&self, extra: Value) -> Value {
        let mut base = self.credentials_json();
        if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
            base.extend(extra);
        }
        base
    }
}

/// Read an identifier at `pointer`, accepting both string and numeric ids
pub fn json_id(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Label,
    Tag,
    Webhook,
    TestIssue,
}

impl ArtifactKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ArtifactKind::Label => "label",
            ArtifactKind::Tag => "tag",
            ArtifactKind::Webhook => "webhook",
            ArtifactKind::TestIssue => "test issue",
        }
    }
}

/// How a step's created resource is found and compensated
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    /// JSON pointer to the id inside the step's response
    pub id_pointer: &'static str,
    pub delete_operation: &'static str,
    pub delete_kind: StepKind,
    pub delete_payload: DeletePayloadFn,
    /// Forward step whose success already removed the artifact
    pub released_by: Option<StepKind>,
}

#[derive(Debug, Clone, Copy)]
pub struct StepDefinition {
    pub kind: StepKind,
    pub operation: &'static str,
    pub build: PayloadFn,
    pub artifact: Option<ArtifactSpec>,
    pub hint: Option<&'static str>,
    pub progress_max: Option<u32>,
    /// Errors of this step mean the expected webhook event never arrived
    pub verifies: bool,
}

impl StepDefinition {
    pub fn new(kind: StepKind, operation: &'static str, build: PayloadFn) -> Self {
        Self {
            kind,
            operation,
            build,
            artifact: None,
            hint: None,
            progress_max: None,
            verifies: false,
        }
    }

    pub fn creates(mut self, artifact: ArtifactSpec) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn progress_max(mut self, ticks: u32) -> Self {
        self.progress_max = Some(ticks);
        self
    }

    pub fn verification(mut self) -> Self {
        self.verifies = true;
        self
    }

    pub fn remote_call(&self, scope: CallScope, ctx: &StepContext<'_>) -> Result<RemoteCall, StepError> {
        let payload = (self.build)(ctx)?;
        Ok(RemoteCall::new(scope, self.operation, payload))
    }
}

/// Ordered, linear chain of steps
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    steps: Vec<StepDefinition>,
}

impl PipelineDefinition {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }

    pub fn get(&self, kind: StepKind) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Declared predecessor; the first step has none
    pub fn predecessor(&self, kind: StepKind) -> Option<StepKind> {
        let index = self.steps.iter().position(|s| s.kind == kind)?;
        index.checked_sub(1).map(|i| self.steps[i].kind)
    }

    pub fn new_table(&self) -> StepTable {
        StepTable::new(&self.kinds())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Final activation call of a setup session
#[derive(Debug, Clone, Copy)]
pub struct CommitDefinition {
    pub operation: &'static str,
    pub build: PayloadFn,
    pub duplicate_hint: &'static str,
}

/// Compensation of one persisted resource when deleting an integration
#[derive(Debug, Clone, Copy)]
pub struct TeardownStep {
    pub kind: StepKind,
    pub operation: &'static str,
    pub resource: fn(&CommittedIntegration) -> Option<String>,
    pub payload: fn(&str) -> Value,
}

/// Flows run against an already committed integration
#[derive(Debug, Clone)]
pub struct MaintenanceDefinition {
    pub test: PipelineDefinition,
    pub update_operation: Option<&'static str>,
    /// Body field carrying the new secret
    pub update_field: &'static str,
    /// Webhook first, then label/tag
    pub teardown: Vec<TeardownStep>,
}

/// Read-only lookup of the targets a set of credentials can see
#[derive(Debug, Clone, Copy)]
pub struct TargetDiscovery {
    pub operation: &'static str,
    pub build: PayloadFn,
    pub extract: fn(&Value) -> Vec<String>,
}

/// Everything the crate knows about one provider
#[derive(Debug, Clone)]
pub struct ProviderDefinition {
    pub kind: ProviderKind,
    pub required_credentials: &'static [&'static str],
    /// What the user has to pick before the chain can run, if anything
    pub selection_label: Option<&'static str>,
    pub targets: Option<TargetDiscovery>,
    pub setup: PipelineDefinition,
    pub commit: CommitDefinition,
    pub maintenance: MaintenanceDefinition,
}

impl ProviderDefinition {
    /// Credential fields required but not supplied
    pub fn missing_credentials(&self, credentials: &Credentials) -> Vec<&'static str> {
        self.required_credentials
            .iter()
            .filter(|name| {
                credentials
                    .get(**name)
                    .map(|v| v.trim().is_empty())
                    .unwrap_or(true)
            })
            .copied()
            .collect()
    }
}
