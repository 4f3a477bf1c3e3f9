use serde::{Deserialize, Serialize};

/// One configuration field value. Composite values (locations, photos) are
/// carried as their serialized string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(id: impl Into<String>, value: impl ToString) -> Self {
        Self {
            id: id.into(),
            value: value.to_string(),
        }
    }

    /// Length in characters, which is what the URL size limit is measured in.
    pub fn value_len(&self) -> usize {
        self.value.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderScale {
    #[serde(rename = "1x")]
    Single,
    #[serde(rename = "2x")]
    Double,
}

impl RenderScale {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Single => "1",
            Self::Double => "2",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::Single),
            "2" => Some(Self::Double),
            _ => None,
        }
    }

    pub fn is_2x(self) -> bool {
        self == Self::Double
    }
}

/// Side-channel render metadata. Empty strings mean "unspecified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub render_scale: Option<RenderScale>,
    pub timezone: String,
    pub locale: String,
}

impl MetadataEntry {
    /// Reserved key/value pairs merged into the query string and preview
    /// submissions. Timezone and locale are always present (possibly empty);
    /// the scale only once it has been chosen.
    pub fn reserved_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (crate::protocol::META_TIMEZONE_KEY, self.timezone.clone()),
            (crate::protocol::META_LOCALE_KEY, self.locale.clone()),
        ];
        if let Some(scale) = self.render_scale {
            pairs.push((
                crate::protocol::RENDER_SCALE_KEY,
                scale.wire_value().to_string(),
            ));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Webp,
    Gif,
}

impl ImageFormat {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "webp" | "image/webp" => Some(Self::Webp),
            "gif" | "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResult {
    pub image_bytes: Vec<u8>,
    pub image_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub loading: bool,
}

/// One entry of a dynamically resolved option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOption {
    pub value: String,
    pub display: String,
}

impl HandlerOption {
    pub fn new(value: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: display.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Color,
    Datetime,
    Dropdown,
    Generated,
    Location,
    #[serde(rename = "locationbased")]
    LocationBased,
    Notification,
    Oauth2,
    #[serde(rename = "png")]
    PhotoSelect,
    Text,
    Toggle,
    Typeahead,
    #[serde(other)]
    Other,
}

/// Read-only schema descriptor for one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FieldSchema {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
            name: None,
            desc: None,
            default: None,
            handler: None,
            source: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The declared default coerced to the stored string form. `null` and
    /// `""` count as undeclared.
    pub fn default_value(&self) -> Option<String> {
        match self.default.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Field whose value feeds this field's handler.
    pub fn dependency_id(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub schema: Vec<FieldSchema>,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
