use std::{collections::HashMap, sync::Arc};

use shared::domain::{ConfigEntry, FieldSchema};

/// Immutable, cheaply clonable view of the store in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot(Arc<Vec<ConfigEntry>>);

impl ConfigSnapshot {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.0
    }
}

/// Field id → value, the source of truth for user edits.
///
/// Every mutation either applies completely or not at all; bulk operations
/// build the replacement off to the side and publish it with a single swap.
#[derive(Debug, Default)]
pub struct ConfigStore {
    entries: Vec<ConfigEntry>,
    index: HashMap<String, usize>,
    revision: u64,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `id`. An existing entry keeps its position. Returns whether the
    /// stored value changed.
    pub fn set(&mut self, id: impl Into<String>, value: impl ToString) -> bool {
        let id = id.into();
        let value = value.to_string();
        match self.index.get(&id) {
            Some(&pos) => {
                if self.entries[pos].value == value {
                    return false;
                }
                self.entries[pos].value = value;
            }
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push(ConfigEntry { id, value });
            }
        }
        self.revision += 1;
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<ConfigEntry> {
        let pos = self.index.remove(id)?;
        let removed = self.entries.remove(pos);
        for entry in &self.entries[pos..] {
            if let Some(slot) = self.index.get_mut(&entry.id) {
                *slot -= 1;
            }
        }
        self.revision += 1;
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index
            .get(id)
            .map(|&pos| self.entries[pos].value.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get_all(&self) -> ConfigSnapshot {
        ConfigSnapshot(Arc::new(self.entries.clone()))
    }

    /// Overwrites every field that declares a default. Fields without one are
    /// left exactly as they are. Returns the number of values that changed.
    pub fn reset_to_defaults(&mut self, schema: &[FieldSchema]) -> usize {
        let mut staged = Staged::from_store(self);
        let mut changed = 0;
        for field in schema {
            if let Some(default) = field.default_value() {
                if staged.set(&field.id, default) {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.publish(staged);
        }
        changed
    }

    /// Populates fields with declared defaults that are not present yet.
    pub fn fill_missing_defaults(&mut self, schema: &[FieldSchema]) -> usize {
        let mut staged = Staged::from_store(self);
        let mut filled = 0;
        for field in schema {
            if staged.index.contains_key(&field.id) {
                continue;
            }
            if let Some(default) = field.default_value() {
                staged.set(&field.id, default);
                filled += 1;
            }
        }
        if filled > 0 {
            self.publish(staged);
        }
        filled
    }

    /// Replaces the whole store. Later duplicates of an id win.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = ConfigEntry>) {
        let mut staged = Staged::default();
        for entry in entries {
            staged.set(&entry.id, entry.value);
        }
        self.publish(staged);
    }

    fn publish(&mut self, staged: Staged) {
        if staged.entries == self.entries {
            return;
        }
        self.entries = staged.entries;
        self.index = staged.index;
        self.revision += 1;
    }
}

#[derive(Default)]
struct Staged {
    entries: Vec<ConfigEntry>,
    index: HashMap<String, usize>,
}

impl Staged {
    fn from_store(store: &ConfigStore) -> Self {
        Self {
            entries: store.entries.clone(),
            index: store.index.clone(),
        }
    }

    fn set(&mut self, id: &str, value: String) -> bool {
        match self.index.get(id) {
            Some(&pos) if self.entries[pos].value == value => false,
            Some(&pos) => {
                self.entries[pos].value = value;
                true
            }
            None => {
                self.index.insert(id.to_string(), self.entries.len());
                self.entries.push(ConfigEntry {
                    id: id.to_string(),
                    value,
                });
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/config_store_tests.rs"]
mod tests;
