// Scripted backend double for provisioning tests - no network

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, CallScope, CommittedIntegration, IntegrationApi, RemoteCall};

/// Call as seen by the backend double
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub scope: CallScope,
    pub operation: String,
    pub payload: Value,
}

/// Backend double answering by operation name and recording every call.
///
/// Unscripted operations answer `{"id": "<operation>-<n>"}` so that artifact
/// ids are predictable and unique per call.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, ApiError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    cancel_after: Mutex<Option<(String, CancellationToken)>>,
    executed_calls: Mutex<Vec<RecordedCall>>,
    invalidations: Mutex<usize>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one answer for the next call of `operation`
    pub fn respond(&self, operation: &str, result: Result<Value, ApiError>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn succeed(&self, operation: &str, value: Value) -> &Self {
        self.respond(operation, Ok(value))
    }

    pub fn reject(&self, operation: &str, message: &str) -> &Self {
        self.respond(
            operation,
            Err(ApiError::Rejected {
                status: 400,
                message: message.to_string(),
            }),
        )
    }

    pub fn delay(&self, operation: &str, delay: Duration) -> &Self {
        self.delays
            .lock()
            .unwrap()
            .insert(operation.to_string(), delay);
        self
    }

    /// Trigger `token` right after `operation` has been answered
    pub fn cancel_after(&self, operation: &str, token: CancellationToken) -> &Self {
        *self.cancel_after.lock().unwrap() = Some((operation.to_string(), token));
        self
    }

    pub fn get_executed_calls(&self) -> Vec<RecordedCall> {
        self.executed_calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.get_executed_calls()
            .into_iter()
            .map(|c| c.operation)
            .collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.get_executed_calls()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn payload_of(&self, operation: &str) -> Option<Value> {
        self.get_executed_calls()
            .into_iter()
            .rev()
            .find(|c| c.operation == operation)
            .map(|c| c.payload)
    }

    pub fn clear_executed_calls(&self) {
        self.executed_calls.lock().unwrap().clear();
    }

    pub fn invalidation_count(&self) -> usize {
        *self.invalidations.lock().unwrap()
    }
}

#[async_trait]
impl IntegrationApi for ScriptedApi {
    async fn call(&self, _workspace_id: &str, call: &RemoteCall) -> Result<Value, ApiError> {
        let count = {
            let mut calls = self.executed_calls.lock().unwrap();
            calls.push(RecordedCall {
                scope: call.scope.clone(),
                operation: call.operation.clone(),
                payload: call.payload.clone(),
            });
            calls.iter().filter(|c| c.operation == call.operation).count()
        };

        let delay = self.delays.lock().unwrap().get(&call.operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&call.operation)
            .and_then(VecDeque::pop_front);
        let result =
            scripted.unwrap_or_else(|| Ok(json!({ "id": format!("{}-{}", call.operation, count) })));

        if let Some((operation, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if *operation == call.operation {
                token.cancel();
            }
        }
        result
    }

    async fn list_integrations(
        &self,
        _workspace_id: &str,
    ) -> Result<Vec<CommittedIntegration>, ApiError> {
        Ok(Vec::new())
    }

    async fn invalidate_integrations(&self, _workspace_id: &str) {
        *self.invalidations.lock().unwrap() += 1;
    }
}
