//! Debounced preview submissions with issue-order supersession.
//!
//! `PreviewSync` never performs I/O itself. [`PreviewSync::observe`] decides
//! whether a state change should produce a request and hands back a
//! [`PreviewTicket`]; the caller runs the request and reports back through
//! [`PreviewSync::complete`]. Sequence numbers are assigned at issue time and a
//! response is applied only if it is newer than everything applied so far.

use std::collections::BTreeSet;

use shared::domain::{MetadataEntry, PreviewResult};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config_store::ConfigSnapshot;

/// The tuple the preview depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewInputs {
    pub config: ConfigSnapshot,
    pub metadata: MetadataEntry,
}

/// Ordered form fields sent to the rendering backend: every config entry
/// regardless of size, then the reserved metadata keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSubmission {
    pub fields: Vec<(String, String)>,
}

impl PreviewSubmission {
    pub fn build(inputs: &PreviewInputs) -> Self {
        let mut fields: Vec<(String, String)> = inputs
            .config
            .iter()
            .map(|entry| (entry.id.clone(), entry.value.clone()))
            .collect();
        fields.extend(
            inputs
                .metadata
                .reserved_pairs()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value)),
        );
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTicket {
    pub seq: u64,
    pub submission: PreviewSubmission,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("preview request failed: {0}")]
    Transport(String),
    #[error("backend failed to render preview: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    Applied,
    Superseded,
    Failed(PreviewError),
}

#[derive(Debug)]
pub struct PreviewSync {
    last_issued: u64,
    last_applied: u64,
    in_flight: BTreeSet<u64>,
    current: Option<PreviewResult>,
    last_inputs: Option<PreviewInputs>,
    coalesced: bool,
    trailing_refresh: bool,
}

impl PreviewSync {
    pub fn new(trailing_refresh: bool) -> Self {
        Self {
            last_issued: 0,
            last_applied: 0,
            in_flight: BTreeSet::new(),
            current: None,
            last_inputs: None,
            coalesced: false,
            trailing_refresh,
        }
    }

    /// Compares `inputs` with the previously observed tuple and, if they
    /// differ, decides whether to issue a request now.
    pub fn observe(&mut self, inputs: &PreviewInputs) -> Option<PreviewTicket> {
        if self.last_inputs.as_ref() == Some(inputs) {
            return None;
        }
        self.last_inputs = Some(inputs.clone());

        if !self.in_flight.is_empty() && self.current.is_some() {
            self.coalesced = true;
            debug!(
                in_flight = self.in_flight.len(),
                "preview: change coalesced while request in flight"
            );
            return None;
        }
        Some(self.issue(inputs))
    }

    /// Applies a finished request. Only a response newer than anything
    /// already applied replaces the current result.
    pub fn complete(
        &mut self,
        seq: u64,
        result: Result<PreviewResult, PreviewError>,
    ) -> PreviewOutcome {
        self.in_flight.remove(&seq);

        let outcome = if seq <= self.last_applied {
            debug!(seq, last_applied = self.last_applied, "preview: stale response discarded");
            PreviewOutcome::Superseded
        } else {
            match result {
                Ok(mut preview) => {
                    self.last_applied = seq;
                    preview.loading = false;
                    self.current = Some(preview);
                    info!(seq, "preview: result applied");
                    PreviewOutcome::Applied
                }
                Err(err) => {
                    warn!(seq, "preview: request failed: {err}");
                    PreviewOutcome::Failed(err)
                }
            }
        };

        let loading = self.is_loading();
        if let Some(current) = self.current.as_mut() {
            current.loading = loading;
        }
        outcome
    }

    /// Issues the deferred request for a change that was coalesced, once
    /// nothing is in flight anymore.
    pub fn take_trailing(&mut self) -> Option<PreviewTicket> {
        if !self.trailing_refresh || !self.coalesced || !self.in_flight.is_empty() {
            return None;
        }
        let inputs = self.last_inputs.clone()?;
        debug!("preview: issuing trailing refresh");
        Some(self.issue(&inputs))
    }

    pub fn current(&self) -> Option<&PreviewResult> {
        self.current.as_ref()
    }

    /// True while a request newer than the applied result is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight
            .iter()
            .next_back()
            .is_some_and(|&seq| seq > self.last_applied)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    fn issue(&mut self, inputs: &PreviewInputs) -> PreviewTicket {
        self.coalesced = false;
        self.last_issued += 1;
        let seq = self.last_issued;
        self.in_flight.insert(seq);
        if let Some(current) = self.current.as_mut() {
            current.loading = true;
        }
        debug!(seq, "preview: request issued");
        PreviewTicket {
            seq,
            submission: PreviewSubmission::build(inputs),
        }
    }
}

#[cfg(test)]
#[path = "tests/preview_sync_tests.rs"]
mod tests;
