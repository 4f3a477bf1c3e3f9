use std::{collections::HashMap, env, fs, path::Path};

use editor_core::SessionOptions;
use shared::protocol::URL_VALUE_LIMIT;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub url_value_limit: usize,
    pub trailing_refresh: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080/".into(),
            url_value_limit: URL_VALUE_LIMIT,
            trailing_refresh: true,
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            url_value_limit: self.url_value_limit,
            trailing_refresh: self.trailing_refresh,
        }
    }
}

/// Defaults, then `path` if it exists, then environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("config: ignoring unreadable settings file: {err}");
            return;
        }
    };
    let text = |key: &str| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };

    if let Some(v) = text("backend_url") {
        settings.backend_url = v;
    }
    if let Some(v) = text("url_value_limit") {
        set_limit(settings, &v);
    }
    if let Some(v) = text("trailing_refresh") {
        set_trailing_refresh(settings, &v);
    }
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("EDITOR_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = var("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = var("APP__URL_VALUE_LIMIT") {
        set_limit(settings, &v);
    }

    if let Some(v) = var("APP__TRAILING_REFRESH") {
        set_trailing_refresh(settings, &v);
    }
}

fn set_limit(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(parsed) => settings.url_value_limit = parsed,
        Err(_) => warn!(value = raw, "config: url_value_limit is not a number"),
    }
}

fn set_trailing_refresh(settings: &mut Settings, raw: &str) {
    match parse_flag(raw) {
        Some(flag) => settings.trailing_refresh = flag,
        None => warn!(value = raw, "config: trailing_refresh is not a boolean"),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
