use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigEntry, HandlerOption};

/// Reserved keys for metadata carried next to user fields. The leading
/// underscore keeps them out of the schema's id space.
pub const RENDER_SCALE_KEY: &str = "_renderScale";
pub const META_TIMEZONE_KEY: &str = "_metaTimezone";
pub const META_LOCALE_KEY: &str = "_metaLocale";

pub const RESERVED_KEYS: [&str; 3] = [RENDER_SCALE_KEY, META_TIMEZONE_KEY, META_LOCALE_KEY];

/// Entries longer than this many characters are left out of the query string.
pub const URL_VALUE_LIMIT: usize = 1024;

pub const PREVIEW_PATH: &str = "api/v1/preview";
pub const SCHEMA_PATH: &str = "api/v1/schema";
pub const HANDLERS_PATH: &str = "api/v1/handlers";

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// JSON body returned by the preview endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub img_type: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, rename = "is2x")]
    pub is_2x: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON body posted to `api/v1/handlers/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerRequest {
    pub config: BTreeMap<String, String>,
    pub id: String,
    pub param: String,
}

pub type HandlerResponse = Vec<HandlerOption>;

/// Per-field record of the config export file: `{"<id>": {"value": "..."}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFileEntry<'a> {
    pub value: &'a str,
}

impl<'a> From<&'a ConfigEntry> for ConfigFileEntry<'a> {
    fn from(entry: &'a ConfigEntry) -> Self {
        Self {
            value: &entry.value,
        }
    }
}
