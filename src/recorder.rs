//! Per-trial observation recorder
//!
//! Runs inline with the inference engine's evaluation loop, so `record` does a
//! constant amount of work per event: one allocation-free resolution, one hash
//! lookup, and an allocation only the first time an identity or unresolved
//! name is seen.

// Module-level clippy allows
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::profile::{Category, ModelProfile, TensorKind};
use crate::resolve::{resolve_identity, ResolvedIdentity};

/// Default cap on distinct unresolved names kept for diagnostics
pub const DEFAULT_MAX_UNRESOLVED_NAMES: usize = 64;

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Distinct unresolved names retained per trial; later names are only counted
    pub max_unresolved_names: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderConfig {
    /// Create configuration with default cap
    pub fn new() -> Self {
        Self {
            max_unresolved_names: DEFAULT_MAX_UNRESOLVED_NAMES,
        }
    }

    /// Set the unresolved-name diagnostic cap
    pub fn with_max_unresolved_names(mut self, cap: usize) -> Self {
        self.max_unresolved_names = cap;
        self
    }
}

/// One evaluation event as delivered by the instrumentation hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawObservation<'a> {
    /// Declared tensor name (may be malformed or truncated)
    pub name: &'a str,
    /// Byte size at capture time
    pub bytes: u64,
}

impl<'a> RawObservation<'a> {
    /// Create an observation
    pub fn new(name: &'a str, bytes: u64) -> Self {
        Self { name, bytes }
    }
}

/// Aggregate for one resolved identity within a trial
///
/// Serialized as one `tensor_counts` entry of the capture document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorStat {
    /// Raw name of the first observation, kept for diagnostics
    pub name: String,
    /// Layer index
    pub layer: i32,
    /// Tensor kind
    pub kind: TensorKind,
    /// Category
    pub category: Category,
    /// Number of observations (at least 1)
    pub count: u64,
    /// First-seen sequence number within the trial
    pub order: u64,
}

impl TensorStat {
    /// The identity this stat aggregates
    pub fn identity(&self) -> ResolvedIdentity {
        ResolvedIdentity {
            layer: self.layer,
            kind: self.kind.clone(),
            category: self.category,
        }
    }
}

/// Everything a recorder accumulated, taken at trial end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderSnapshot {
    /// Stats ordered by first-seen sequence number
    pub stats: Vec<TensorStat>,
    /// Unresolved observation events (every occurrence, not distinct names)
    pub unresolved_count: u64,
    /// First distinct unresolved names, up to the configured cap
    pub unresolved_names: Vec<String>,
    /// All observation events
    pub total_events: u64,
    /// Sum of observed byte sizes
    pub total_bytes: u64,
}

/// Stateful per-trial store of identity counts and first-seen order
#[derive(Debug, Clone)]
pub struct ObservationRecorder {
    profile: ModelProfile,
    config: RecorderConfig,
    index: HashMap<ResolvedIdentity, usize>,
    stats: Vec<TensorStat>,
    unresolved_count: u64,
    unresolved_names: Vec<String>,
    unresolved_seen: HashSet<String>,
    total_events: u64,
    total_bytes: u64,
}

impl ObservationRecorder {
    /// Create an empty recorder resolving against `profile`
    pub fn new(profile: ModelProfile, config: RecorderConfig) -> Self {
        Self {
            profile,
            config,
            index: HashMap::new(),
            stats: Vec::new(),
            unresolved_count: 0,
            unresolved_names: Vec::new(),
            unresolved_seen: HashSet::new(),
            total_events: 0,
            total_bytes: 0,
        }
    }

    /// Record one evaluation event
    pub fn record(&mut self, observation: &RawObservation<'_>) {
        self.total_events += 1;
        self.total_bytes = self.total_bytes.saturating_add(observation.bytes);

        let Some(identity) = resolve_identity(observation.name, &self.profile) else {
            self.record_unresolved(observation.name);
            return;
        };

        if let Some(&slot) = self.index.get(&identity) {
            self.stats[slot].count += 1;
            return;
        }

        let order = self.stats.len() as u64;
        self.index.insert(identity.clone(), self.stats.len());
        self.stats.push(TensorStat {
            name: observation.name.to_string(),
            layer: identity.layer,
            kind: identity.kind,
            category: identity.category,
            count: 1,
            order,
        });
    }

    fn record_unresolved(&mut self, name: &str) {
        self.unresolved_count += 1;
        if self.unresolved_names.len() >= self.config.max_unresolved_names
            || self.unresolved_seen.contains(name)
        {
            return;
        }
        debug!(name, family = self.profile.family, "unresolved tensor name");
        self.unresolved_seen.insert(name.to_string());
        self.unresolved_names.push(name.to_string());
    }

    /// Stats ordered by first observation
    pub fn snapshot(&self) -> Vec<TensorStat> {
        self.stats.clone()
    }

    /// Consume the recorder, returning everything it accumulated
    pub fn finish(self) -> RecorderSnapshot {
        RecorderSnapshot {
            stats: self.stats,
            unresolved_count: self.unresolved_count,
            unresolved_names: self.unresolved_names,
            total_events: self.total_events,
            total_bytes: self.total_bytes,
        }
    }

    /// Distinct identities seen so far
    pub fn distinct_tensors(&self) -> usize {
        self.stats.len()
    }

    /// Unresolved observation events so far
    pub fn unresolved_count(&self) -> u64 {
        self.unresolved_count
    }

    /// Retained unresolved names
    pub fn unresolved_names(&self) -> &[String] {
        &self.unresolved_names
    }

    /// All observation events so far
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Count for one identity, if seen
    pub fn count_of(&self, identity: &ResolvedIdentity) -> Option<u64> {
        self.index.get(identity).map(|&slot| self.stats[slot].count)
    }
}
