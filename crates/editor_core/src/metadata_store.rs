use std::{env, fs};

use shared::domain::{MetadataEntry, RenderScale};
use tracing::{debug, info};

/// Source of runtime defaults for timezone and locale.
pub trait EnvironmentProbe: Send + Sync {
    fn timezone(&self) -> Option<String>;
    fn locale(&self) -> Option<String>;
}

/// Reads the process environment the way a POSIX host exposes it.
pub struct SystemEnvironment;

impl EnvironmentProbe for SystemEnvironment {
    fn timezone(&self) -> Option<String> {
        if let Some(tz) = env::var("TZ").ok().and_then(|raw| zone_from_tz(&raw)) {
            return Some(tz);
        }
        fs::read_to_string("/etc/timezone")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|tz| !tz.is_empty())
    }

    fn locale(&self) -> Option<String> {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .find_map(|raw| normalize_posix_locale(&raw))
    }
}

/// Fixed values, for hosts that already know the answer and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub timezone: Option<String>,
    pub locale: Option<String>,
}

impl EnvironmentProbe for StaticEnvironment {
    fn timezone(&self) -> Option<String> {
        self.timezone.clone()
    }

    fn locale(&self) -> Option<String> {
        self.locale.clone()
    }
}

/// Zone name from a `TZ` value. File paths such as `:/etc/localtime` name no
/// zone and yield `None`.
pub fn zone_from_tz(raw: &str) -> Option<String> {
    let tz = raw.trim().trim_start_matches(':').trim();
    if tz.is_empty() || tz.starts_with('/') {
        return None;
    }
    Some(tz.to_string())
}

/// `en_US.UTF-8` → `en-US`. `C` and `POSIX` carry no locale preference.
pub fn normalize_posix_locale(raw: &str) -> Option<String> {
    let base = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

#[derive(Debug, Default)]
pub struct MetadataStore {
    entry: MetadataEntry,
    explicit_timezone: bool,
    explicit_locale: bool,
    defaults_injected: bool,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> &MetadataEntry {
        &self.entry
    }

    pub fn render_scale(&self) -> Option<RenderScale> {
        self.entry.render_scale
    }

    pub fn set_render_scale(&mut self, scale: Option<RenderScale>) -> bool {
        if self.entry.render_scale == scale {
            return false;
        }
        self.entry.render_scale = scale;
        true
    }

    /// An explicit user choice; an empty string is a choice too.
    pub fn set_timezone(&mut self, timezone: impl Into<String>) -> bool {
        self.explicit_timezone = true;
        replace_if_changed(&mut self.entry.timezone, timezone.into())
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) -> bool {
        self.explicit_locale = true;
        replace_if_changed(&mut self.entry.locale, locale.into())
    }

    /// Values restored from a shared URL. Empty values mean "not specified"
    /// and leave room for environment defaults.
    pub fn hydrate(
        &mut self,
        render_scale: Option<RenderScale>,
        timezone: Option<String>,
        locale: Option<String>,
    ) {
        if render_scale.is_some() {
            self.entry.render_scale = render_scale;
        }
        if let Some(timezone) = timezone.filter(|tz| !tz.is_empty()) {
            self.set_timezone(timezone);
        }
        if let Some(locale) = locale.filter(|loc| !loc.is_empty()) {
            self.set_locale(locale);
        }
    }

    /// Fills unset timezone/locale from the environment. Runs at most once per
    /// session; later calls are no-ops even if the user cleared a value since.
    pub fn inject_defaults(&mut self, probe: &dyn EnvironmentProbe) -> bool {
        if self.defaults_injected {
            debug!("metadata: default injection already ran");
            return false;
        }
        self.defaults_injected = true;

        let mut changed = false;
        if !self.explicit_timezone && self.entry.timezone.is_empty() {
            if let Some(tz) = probe.timezone() {
                info!(timezone = %tz, "metadata: injected environment timezone");
                self.entry.timezone = tz;
                changed = true;
            }
        }
        if !self.explicit_locale && self.entry.locale.is_empty() {
            if let Some(locale) = probe.locale() {
                info!(locale = %locale, "metadata: injected environment locale");
                self.entry.locale = locale;
                changed = true;
            }
        }
        changed
    }

    pub fn defaults_injected(&self) -> bool {
        self.defaults_injected
    }
}

fn replace_if_changed(slot: &mut String, value: String) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
#[path = "tests/metadata_store_tests.rs"]
mod tests;
