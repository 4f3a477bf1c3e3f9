//! Config export/import file: `{"<field id>": {"value": "<string>"}, ...}`.

use serde_json::{Map, Value};
use shared::{
    domain::ConfigEntry,
    protocol::{is_reserved_key, ConfigFileEntry},
};
use thiserror::Error;

use crate::config_store::ConfigSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("invalid config file encoding: {0}")]
    InvalidEncoding(String),
    #[error("malformed config file: {0}")]
    WrongShape(String),
    #[error("config file uses reserved key {0:?}")]
    ReservedKey(String),
}

/// Parses and validates a whole file before anything touches the store.
pub fn parse_config_file(bytes: &[u8]) -> Result<Vec<ConfigEntry>, ImportError> {
    let text =
        std::str::from_utf8(bytes).map_err(|err| ImportError::InvalidEncoding(err.to_string()))?;
    let root: Value =
        serde_json::from_str(text).map_err(|err| ImportError::InvalidEncoding(err.to_string()))?;
    let Value::Object(fields) = root else {
        return Err(ImportError::WrongShape(
            "expected a JSON object keyed by field id".to_string(),
        ));
    };

    let mut entries = Vec::with_capacity(fields.len());
    for (id, record) in fields {
        if is_reserved_key(&id) {
            return Err(ImportError::ReservedKey(id));
        }
        let value = match &record {
            Value::Object(record) => record.get("value"),
            _ => None,
        };
        let value = match value {
            Some(Value::String(s)) => s.clone(),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
            Some(_) => {
                return Err(ImportError::WrongShape(format!(
                    "field {id:?} has a non-scalar value"
                )))
            }
            None => {
                return Err(ImportError::WrongShape(format!(
                    "field {id:?} is missing a value"
                )))
            }
        };
        entries.push(ConfigEntry { id, value });
    }
    Ok(entries)
}

/// Serializes the full store, including entries the URL cannot carry.
pub fn export_config(config: &ConfigSnapshot) -> Result<String, serde_json::Error> {
    let mut root = Map::with_capacity(config.len());
    for entry in config.iter() {
        root.insert(
            entry.id.clone(),
            serde_json::to_value(ConfigFileEntry::from(entry))?,
        );
    }
    serde_json::to_string_pretty(&Value::Object(root))
}

#[cfg(test)]
#[path = "tests/config_file_tests.rs"]
mod tests;
