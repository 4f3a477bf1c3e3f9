//! Dynamic option lists for fields whose choices depend on another value.
//!
//! Like preview submissions, resolutions are planned here and executed by the
//! caller. Sequence numbers are tracked per field id, so a slow response for
//! one field never blocks or overrides another.

use std::collections::HashMap;

use serde_json::Value;
use shared::domain::{FieldSchema, FieldType, HandlerOption};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config_store::ConfigSnapshot;

/// Keys of a location object that the handler cares about. Display-only keys
/// (`value`, `display`) are stripped so choosing an option does not trigger a
/// new lookup.
const LOCATION_SEMANTIC_KEYS: [&str; 4] = ["lat", "lng", "locality", "timezone"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTicket {
    pub field_id: String,
    pub handler: String,
    pub seq: u64,
    pub param: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("no handler registered under {0:?}")]
    Unregistered(String),
    #[error("handler invocation failed: {0}")]
    Invocation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Applied,
    Superseded,
    Failed(HandlerError),
}

#[derive(Debug, Clone)]
struct HandlerBinding {
    field_id: String,
    dependency_id: String,
    handler: String,
    field_type: FieldType,
}

#[derive(Debug, Default)]
struct FieldResolution {
    last_issued: u64,
    last_applied: u64,
    last_param: Option<String>,
}

#[derive(Debug, Default)]
pub struct HandlerDependencyResolver {
    bindings: Vec<HandlerBinding>,
    fields: HashMap<String, FieldResolution>,
    results: HashMap<String, Vec<HandlerOption>>,
}

impl HandlerDependencyResolver {
    pub fn from_schema(schema: &[FieldSchema]) -> Self {
        let bindings = schema
            .iter()
            .filter_map(|field| {
                let handler = field.handler.as_ref()?;
                Some(HandlerBinding {
                    field_id: field.id.clone(),
                    dependency_id: field.dependency_id().to_string(),
                    handler: handler.clone(),
                    field_type: field.field_type.clone(),
                })
            })
            .collect();
        Self {
            bindings,
            ..Self::default()
        }
    }

    /// Plans one invocation per bound field whose serialized dependency value
    /// differs from the last one seen.
    pub fn observe(&mut self, config: &ConfigSnapshot) -> Vec<HandlerTicket> {
        let mut tickets = Vec::new();
        for binding in &self.bindings {
            let param = config
                .get(&binding.dependency_id)
                .map(|value| semantic_param(&binding.field_type, value));
            let state = self.fields.entry(binding.field_id.clone()).or_default();
            if state.last_param == param {
                continue;
            }
            state.last_param = param.clone();
            let Some(param) = param else {
                debug!(field_id = %binding.field_id, "handler: dependency unset; nothing to resolve");
                continue;
            };

            state.last_issued += 1;
            debug!(
                field_id = %binding.field_id,
                handler = %binding.handler,
                seq = state.last_issued,
                "handler: invocation issued"
            );
            tickets.push(HandlerTicket {
                field_id: binding.field_id.clone(),
                handler: binding.handler.clone(),
                seq: state.last_issued,
                param,
            });
        }
        tickets
    }

    pub fn complete(
        &mut self,
        field_id: &str,
        seq: u64,
        result: Result<Vec<HandlerOption>, HandlerError>,
    ) -> HandlerOutcome {
        let state = self.fields.entry(field_id.to_string()).or_default();
        if seq <= state.last_applied {
            debug!(field_id, seq, last_applied = state.last_applied, "handler: stale response discarded");
            return HandlerOutcome::Superseded;
        }
        match result {
            Ok(options) => {
                state.last_applied = seq;
                info!(field_id, seq, options = options.len(), "handler: options updated");
                self.results.insert(field_id.to_string(), options);
                HandlerOutcome::Applied
            }
            Err(err) => {
                warn!(field_id, seq, "handler: resolution failed, keeping previous options: {err}");
                // Forget the param so the next observe retries the same value.
                if seq == state.last_issued {
                    state.last_param = None;
                }
                HandlerOutcome::Failed(err)
            }
        }
    }

    /// Latest resolved options for `field_id`; empty until the first success.
    pub fn options(&self, field_id: &str) -> &[HandlerOption] {
        self.results.get(field_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn results(&self) -> &HashMap<String, Vec<HandlerOption>> {
        &self.results
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|binding| binding.handler.as_str())
    }
}

/// Serialized form of a value as handed to its handler.
pub fn semantic_param(field_type: &FieldType, value: &str) -> String {
    if *field_type != FieldType::LocationBased {
        return value.to_string();
    }
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Object(map)) => {
            let reduced: serde_json::Map<String, Value> = LOCATION_SEMANTIC_KEYS
                .iter()
                .filter_map(|key| map.get(*key).map(|v| ((*key).to_string(), v.clone())))
                .collect();
            Value::Object(reduced).to_string()
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/handler_resolver_tests.rs"]
mod tests;
