//! Two-way mapping between editor state and the shareable query string.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{ConfigEntry, MetadataEntry, RenderScale},
    protocol::{META_LOCALE_KEY, META_TIMEZONE_KEY, RENDER_SCALE_KEY},
};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::{
    config_store::{ConfigSnapshot, ConfigStore},
    metadata_store::MetadataStore,
};

/// The page's location history, reduced to what the editor needs. Queries
/// are passed without the leading `?`.
pub trait QueryHistory: Send {
    fn current_query(&self) -> String;
    fn replace_query(&mut self, query: &str);
}

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<String>,
    replacements: usize,
}

/// In-process history. Clones share the same underlying entries so a host can
/// keep a handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    state: Arc<Mutex<HistoryState>>,
}

impl MemoryHistory {
    pub fn new(initial_query: impl AsRef<str>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HistoryState {
                entries: vec![initial_query.as_ref().trim_start_matches('?').to_string()],
                replacements: 0,
            })),
        }
    }

    /// Simulates the user following a link: adds a new history entry.
    pub fn navigate(&self, query: impl AsRef<str>) {
        self.lock()
            .entries
            .push(query.as_ref().trim_start_matches('?').to_string());
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueryHistory for MemoryHistory {
    fn current_query(&self) -> String {
        self.lock().entries.last().cloned().unwrap_or_default()
    }

    fn replace_query(&mut self, query: &str) {
        let mut state = self.lock();
        match state.entries.last_mut() {
            Some(current) => *current = query.to_string(),
            None => state.entries.push(query.to_string()),
        }
        state.replacements += 1;
    }
}

/// Everything a query string carries, already split into config and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydratedQuery {
    pub config: Vec<ConfigEntry>,
    pub render_scale: Option<RenderScale>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
}

pub fn parse_query(query: &str) -> HydratedQuery {
    let mut hydrated = HydratedQuery::default();
    let query = query.trim_start_matches('?');
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            RENDER_SCALE_KEY => match RenderScale::from_wire(&value) {
                Some(scale) => hydrated.render_scale = Some(scale),
                None => warn!(value = %value, "url: ignoring invalid render scale"),
            },
            META_TIMEZONE_KEY => hydrated.timezone = Some(value.into_owned()),
            META_LOCALE_KEY => hydrated.locale = Some(value.into_owned()),
            _ => hydrated
                .config
                .push(ConfigEntry::new(key.into_owned(), value.into_owned())),
        }
    }
    hydrated
}

/// Serializes every entry no longer than `value_limit` characters, followed
/// by the reserved metadata keys.
pub fn build_query(config: &ConfigSnapshot, metadata: &MetadataEntry, value_limit: usize) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for entry in config.iter() {
        if entry.value_len() <= value_limit {
            serializer.append_pair(&entry.id, &entry.value);
        } else {
            debug!(
                field_id = %entry.id,
                len = entry.value_len(),
                "url: entry too large for query string; omitted"
            );
        }
    }
    for (key, value) in metadata.reserved_pairs() {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

pub struct UrlSync {
    history: Box<dyn QueryHistory>,
    value_limit: usize,
}

impl UrlSync {
    pub fn new(history: Box<dyn QueryHistory>, value_limit: usize) -> Self {
        Self {
            history,
            value_limit,
        }
    }

    /// Loads the current query into the stores. Metadata is written in full
    /// before this returns.
    pub fn hydrate(&self, store: &mut ConfigStore, metadata: &mut MetadataStore) -> usize {
        let hydrated = parse_query(&self.history.current_query());
        let count = hydrated.config.len();
        for entry in hydrated.config {
            store.set(entry.id, entry.value);
        }
        metadata.hydrate(hydrated.render_scale, hydrated.timezone, hydrated.locale);
        debug!(fields = count, "url: hydrated stores from query");
        count
    }

    /// Rebuilds the query and replaces the current history entry if the text
    /// differs. Returns the new query when a replacement happened.
    pub fn sync(&mut self, config: &ConfigSnapshot, metadata: &MetadataEntry) -> Option<String> {
        let query = build_query(config, metadata, self.value_limit);
        if self.history.current_query() == query {
            return None;
        }
        self.history.replace_query(&query);
        Some(query)
    }

    pub fn current_query(&self) -> String {
        self.history.current_query()
    }
}

#[cfg(test)]
#[path = "tests/url_sync_tests.rs"]
mod tests;
