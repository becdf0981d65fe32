//! Capture sessions, trials, and the durable capture document
//!
//! Each trial moves through a small state machine:
//!
//! ```text
//! NotStarted ──start_trial──▶ Active ──end_trial──▶ Sealed
//!                               ▲                     │
//!                               └─────start_trial─────┘
//! ```
//!
//! A sealed [`Trial`] is immutable. A [`Capture`] owns its sealed trials and
//! serializes to a JSON document; reloading takes each stat's layer, kind and
//! category verbatim from the document instead of re-resolving the raw name,
//! so captures stay stable when naming rules change.
//!
//! ```rust
//! use observar::capture::{CaptureConfig, CaptureSession};
//! use observar::recorder::RawObservation;
//!
//! let mut session = CaptureSession::new(CaptureConfig::new("model.gguf", "llama")).unwrap();
//! session.start_trial("Hello").unwrap();
//! session.record(&RawObservation::new("token_embd.weight", 4096));
//! let trial = session.end_trial("world").unwrap();
//! assert_eq!(trial.tensor_stats().len(), 1);
//! ```

// Module-level clippy allows
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ObservarError, Result};
use crate::profile::{get_profile, ModelProfile, EMBEDDING_LAYER, OUTPUT_LAYER};
use crate::recorder::{ObservationRecorder, RawObservation, RecorderConfig, TensorStat};
use crate::resolve::ResolvedIdentity;

// ============================================================================
// Configuration
// ============================================================================

/// Capture session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Path of the model being observed
    pub model_path: String,
    /// Family label used to select naming rules
    pub model_family: String,
    /// Recorder settings applied to every trial
    pub recorder: RecorderConfig,
}

impl CaptureConfig {
    /// Create configuration with default recorder settings
    pub fn new(model_path: impl Into<String>, model_family: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            model_family: model_family.into(),
            recorder: RecorderConfig::default(),
        }
    }

    /// Set recorder settings
    #[must_use]
    pub fn with_recorder(mut self, recorder: RecorderConfig) -> Self {
        self.recorder = recorder;
        self
    }
}

// ============================================================================
// Trial / Capture
// ============================================================================

/// Lifecycle state of the session's current trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// No trial has been started yet
    NotStarted,
    /// A trial is recording
    Active,
    /// The last trial has been sealed
    Sealed,
}

/// One sealed inference run
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    prompt: String,
    generated_text: String,
    duration_ms: f64,
    unresolved_count: u64,
    stats: Vec<TensorStat>,
    unresolved_names: Vec<String>,
}

impl Trial {
    /// Build a sealed trial from its parts; stats are ordered by `order`
    pub fn sealed(
        prompt: impl Into<String>,
        generated_text: impl Into<String>,
        duration_ms: f64,
        unresolved_count: u64,
        mut stats: Vec<TensorStat>,
    ) -> Self {
        stats.sort_by_key(|s| s.order);
        Self {
            prompt: prompt.into(),
            generated_text: generated_text.into(),
            duration_ms,
            unresolved_count,
            stats,
            unresolved_names: Vec::new(),
        }
    }

    /// Input prompt
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Generated text
    pub fn generated_text(&self) -> &str {
        &self.generated_text
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Unresolved observation events, not distinct unresolved names
    pub fn unresolved_count(&self) -> u64 {
        self.unresolved_count
    }

    /// Stats in computation order (first observed first)
    pub fn tensor_stats(&self) -> &[TensorStat] {
        &self.stats
    }

    /// Retained unresolved names (live captures only; not persisted)
    pub fn unresolved_names(&self) -> &[String] {
        &self.unresolved_names
    }

    /// Sum of all observation counts
    pub fn total_observations(&self) -> u64 {
        self.stats.iter().map(|s| s.count).sum()
    }
}

/// Sealed trials plus the model they were captured from
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    model_path: String,
    model_family: String,
    trials: Vec<Trial>,
}

impl Capture {
    /// Create an empty capture
    pub fn new(model_path: impl Into<String>, model_family: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            model_family: model_family.into(),
            trials: Vec::new(),
        }
    }

    /// Originating model path
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// Family label recorded at capture time
    pub fn model_family(&self) -> &str {
        &self.model_family
    }

    /// Sealed trials in capture order
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// One trial by index
    pub fn trial(&self, index: usize) -> Result<&Trial> {
        self.trials.get(index).ok_or(ObservarError::TrialNotFound {
            index,
            available: self.trials.len(),
        })
    }

    /// Distinct identities across all trials
    pub fn distinct_tensors(&self) -> usize {
        self.trials
            .iter()
            .flat_map(|t| t.stats.iter().map(TensorStat::identity))
            .collect::<HashSet<ResolvedIdentity>>()
            .len()
    }

    /// Durable document form
    pub fn to_document(&self) -> CaptureDocument {
        CaptureDocument {
            model_path: self.model_path.clone(),
            model_family: self.model_family.clone(),
            trials: self
                .trials
                .iter()
                .map(|t| TrialDocument {
                    prompt: t.prompt.clone(),
                    generated_text: t.generated_text.clone(),
                    duration_ms: t.duration_ms,
                    unresolved_count: t.unresolved_count,
                    tensor_counts: t.stats.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a capture from its document form
    ///
    /// All-or-nothing: any invalid trial rejects the whole document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` for a zero count, a layer outside
    /// `-1..=999`, a repeated `order` within one trial, or one `(layer, kind)`
    /// carrying two different categories within one trial.
    pub fn from_document(doc: CaptureDocument) -> Result<Self> {
        let mut trials = Vec::with_capacity(doc.trials.len());
        for (index, trial) in doc.trials.into_iter().enumerate() {
            validate_tensor_counts(index, &trial.tensor_counts)?;
            trials.push(Trial::sealed(
                trial.prompt,
                trial.generated_text,
                trial.duration_ms,
                trial.unresolved_count,
                trial.tensor_counts,
            ));
        }
        Ok(Self {
            model_path: doc.model_path,
            model_family: doc.model_family,
            trials,
        })
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: CaptureDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Write the JSON document, creating parent directories
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), trials = self.trials.len(), "capture saved");
        Ok(())
    }

    /// Read and validate a JSON document
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn validate_tensor_counts(trial: usize, stats: &[TensorStat]) -> Result<()> {
    let mut orders = HashSet::with_capacity(stats.len());
    let mut categories = HashMap::with_capacity(stats.len());
    for stat in stats {
        if stat.count == 0 {
            return Err(ObservarError::InvalidDocument(format!(
                "trial {trial}: tensor '{}' has count 0",
                stat.name
            )));
        }
        if !(EMBEDDING_LAYER..=OUTPUT_LAYER).contains(&stat.layer) {
            return Err(ObservarError::InvalidDocument(format!(
                "trial {trial}: tensor '{}' has layer {} outside {EMBEDDING_LAYER}..={OUTPUT_LAYER}",
                stat.name, stat.layer
            )));
        }
        if !orders.insert(stat.order) {
            return Err(ObservarError::InvalidDocument(format!(
                "trial {trial}: order {} appears more than once",
                stat.order
            )));
        }
        let category = *categories.entry((stat.layer, &stat.kind)).or_insert(stat.category);
        if category != stat.category {
            return Err(ObservarError::InvalidDocument(format!(
                "trial {trial}: layer {} kind '{}' has categories '{}' and '{}'",
                stat.layer,
                stat.kind.as_str(),
                category.as_str(),
                stat.category.as_str()
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Document schema
// ============================================================================

/// JSON form of a capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDocument {
    /// Originating model path
    pub model_path: String,
    /// Family label
    pub model_family: String,
    /// Sealed trials
    pub trials: Vec<TrialDocument>,
}

/// JSON form of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDocument {
    /// Input prompt
    pub prompt: String,
    /// Generated text
    pub generated_text: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
    /// Unresolved observation events (every occurrence, not distinct names)
    pub unresolved_count: u64,
    /// Per-identity stats in computation order
    pub tensor_counts: Vec<TensorStat>,
}

// ============================================================================
// Capture session
// ============================================================================

/// Summary counters for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatistics {
    /// Callbacks received during trials (ask and data phases)
    pub total_callbacks: u64,
    /// Distinct identities across sealed trials
    pub unique_tensors: usize,
    /// Sealed trials
    pub total_trials: usize,
    /// Family label
    pub model_family: String,
}

#[derive(Debug)]
struct ActiveTrial {
    prompt: String,
    started: Instant,
    recorder: ObservationRecorder,
}

/// Owns a capture and drives its trial lifecycle
///
/// Not synchronized: a single writer (normally the inference thread) owns
/// the session. Services accepting concurrent requests keep one session per
/// client or serialize access themselves.
#[derive(Debug)]
pub struct CaptureSession {
    capture: Capture,
    profile: ModelProfile,
    recorder_config: RecorderConfig,
    state: TrialState,
    active: Option<ActiveTrial>,
    total_callbacks: u64,
}

impl CaptureSession {
    /// Create a session for a built-in family
    ///
    /// # Errors
    ///
    /// Returns `UnknownFamily` if the configured family is not supported
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let profile = get_profile(&config.model_family)?.clone();
        Ok(Self::with_profile(config.model_path, profile, config.recorder))
    }

    /// Create a session with an explicit profile
    pub fn with_profile(
        model_path: impl Into<String>,
        profile: ModelProfile,
        recorder_config: RecorderConfig,
    ) -> Self {
        Self {
            capture: Capture::new(model_path, profile.family),
            profile,
            recorder_config,
            state: TrialState::NotStarted,
            active: None,
            total_callbacks: 0,
        }
    }

    /// Current trial state
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Profile used for resolution
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Begin a trial
    ///
    /// # Errors
    ///
    /// Returns `TrialAlreadyActive` if a trial is recording; the active
    /// trial is left untouched.
    pub fn start_trial(&mut self, prompt: impl Into<String>) -> Result<()> {
        if self.active.is_some() {
            return Err(ObservarError::TrialAlreadyActive);
        }
        let prompt = prompt.into();
        info!(
            trial = self.capture.trials.len(),
            family = self.profile.family,
            "trial started"
        );
        self.active = Some(ActiveTrial {
            prompt,
            started: Instant::now(),
            recorder: ObservationRecorder::new(self.profile.clone(), self.recorder_config.clone()),
        });
        self.state = TrialState::Active;
        Ok(())
    }

    /// Record one observation into the active trial
    ///
    /// Returns `false` (and records nothing) when no trial is active.
    pub fn record(&mut self, observation: &RawObservation<'_>) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.recorder.record(observation);
                true
            },
            None => false,
        }
    }

    /// Count one engine callback; callbacks outside a trial are not counted
    pub(crate) fn note_callback(&mut self) {
        if self.active.is_some() {
            self.total_callbacks += 1;
        }
    }

    /// Seal the active trial
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTrial` if no trial was started
    pub fn end_trial(&mut self, generated_text: impl Into<String>) -> Result<&Trial> {
        let active = self.active.take().ok_or(ObservarError::NoActiveTrial)?;
        let duration_ms = active.started.elapsed().as_secs_f64() * 1000.0;
        let snapshot = active.recorder.finish();

        info!(
            trial = self.capture.trials.len(),
            distinct = snapshot.stats.len(),
            events = snapshot.total_events,
            bytes = snapshot.total_bytes,
            unresolved = snapshot.unresolved_count,
            duration_ms,
            "trial sealed"
        );

        let mut trial = Trial::sealed(
            active.prompt,
            generated_text,
            duration_ms,
            snapshot.unresolved_count,
            snapshot.stats,
        );
        trial.unresolved_names = snapshot.unresolved_names;
        self.capture.trials.push(trial);
        self.state = TrialState::Sealed;

        let last = self.capture.trials.len() - 1;
        Ok(&self.capture.trials[last])
    }

    /// Recorder of the active trial
    pub fn active_recorder(&self) -> Option<&ObservationRecorder> {
        self.active.as_ref().map(|a| &a.recorder)
    }

    /// Sealed trials so far
    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Consume the session; an active trial is discarded
    pub fn into_capture(self) -> Capture {
        self.capture
    }

    /// Document of all sealed trials
    pub fn to_document(&self) -> CaptureDocument {
        self.capture.to_document()
    }

    /// Session counters
    pub fn statistics(&self) -> CaptureStatistics {
        CaptureStatistics {
            total_callbacks: self.total_callbacks,
            unique_tensors: self.capture.distinct_tensors(),
            total_trials: self.capture.trials.len(),
            model_family: self.capture.model_family.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::TensorKind;

    fn session() -> CaptureSession {
        CaptureSession::new(CaptureConfig::new("/models/llama-3.2-1b.gguf", "llama")).expect("test")
    }

    #[test]
    fn test_unknown_family_rejected() {
        let err = CaptureSession::new(CaptureConfig::new("m.gguf", "bloom")).unwrap_err();
        assert!(matches!(err, ObservarError::UnknownFamily(_)));
    }

    #[test]
    fn test_lifecycle_states() {
        let mut s = session();
        assert_eq!(s.state(), TrialState::NotStarted);
        s.start_trial("a").expect("test");
        assert_eq!(s.state(), TrialState::Active);
        s.end_trial("b").expect("test");
        assert_eq!(s.state(), TrialState::Sealed);
        s.start_trial("c").expect("test");
        assert_eq!(s.state(), TrialState::Active);
    }

    #[test]
    fn test_double_start_preserves_active_trial() {
        let mut s = session();
        s.start_trial("first").expect("test");
        s.record(&RawObservation::new("blk.0.attn_q.weight", 8));
        s.record(&RawObservation::new("blk.0.attn_q.weight", 8));

        let err = s.start_trial("second").unwrap_err();
        assert!(matches!(err, ObservarError::TrialAlreadyActive));
        assert_eq!(s.state(), TrialState::Active);

        let trial = s.end_trial("done").expect("test");
        assert_eq!(trial.prompt(), "first");
        assert_eq!(trial.tensor_stats()[0].count, 2);
    }

    #[test]
    fn test_end_without_start() {
        let mut s = session();
        let err = s.end_trial("x").unwrap_err();
        assert!(matches!(err, ObservarError::NoActiveTrial));
        assert_eq!(s.state(), TrialState::NotStarted);
        assert!(s.capture().trials().is_empty());
    }

    #[test]
    fn test_record_without_trial_is_ignored() {
        let mut s = session();
        assert!(!s.record(&RawObservation::new("token_embd.weight", 1)));
        s.start_trial("p").expect("test");
        assert!(s.record(&RawObservation::new("token_embd.weight", 1)));
    }

    #[test]
    fn test_end_trial_captures_snapshot() {
        let mut s = session();
        s.start_trial("Hello").expect("test");
        for name in ["token_embd.weight", "blk.0.attn_norm.weight", "mystery", "output.weight"] {
            s.record(&RawObservation::new(name, 32));
        }
        let trial = s.end_trial("world").expect("test");
        assert_eq!(trial.generated_text(), "world");
        assert_eq!(trial.unresolved_count(), 1);
        assert_eq!(trial.unresolved_names(), &["mystery".to_string()]);
        assert!(trial.duration_ms() >= 0.0);
        let kinds: Vec<&TensorKind> = trial.tensor_stats().iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![&TensorKind::Embedding, &TensorKind::AttnNorm, &TensorKind::Output]
        );
    }

    #[test]
    fn test_trials_are_independent() {
        let mut s = session();
        s.start_trial("one").expect("test");
        s.record(&RawObservation::new("blk.0.ffn_up.weight", 1));
        s.end_trial("").expect("test");
        s.start_trial("two").expect("test");
        s.record(&RawObservation::new("blk.1.ffn_up.weight", 1));
        s.end_trial("").expect("test");

        let trials = s.capture().trials();
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].tensor_stats()[0].layer, 0);
        assert_eq!(trials[1].tensor_stats()[0].layer, 1);
        assert_eq!(trials[1].tensor_stats()[0].order, 0);
        assert_eq!(s.statistics().unique_tensors, 2);
    }

    #[test]
    fn test_document_roundtrip() {
        let mut s = session();
        s.start_trial("p").expect("test");
        for name in ["token_embd.weight", "blk.0.attn_q.weight", "blk.0.attn_q.weight"] {
            s.record(&RawObservation::new(name, 1));
        }
        s.end_trial("g").expect("test");

        let json = s.capture().to_json().expect("test");
        let back = Capture::from_json(&json).expect("test");
        assert_eq!(back.to_document(), s.to_document());
        assert_eq!(back.model_path(), "/models/llama-3.2-1b.gguf");
        assert_eq!(back.model_family(), "llama");
    }

    #[test]
    fn test_document_field_names() {
        let mut s = session();
        s.start_trial("p").expect("test");
        s.record(&RawObservation::new("blk.2.ffn_down.weight", 1));
        s.end_trial("g").expect("test");
        let value = serde_json::to_value(s.to_document()).expect("test");
        let entry = &value["trials"][0]["tensor_counts"][0];
        assert_eq!(entry["name"], "blk.2.ffn_down.weight");
        assert_eq!(entry["layer"], 2);
        assert_eq!(entry["kind"], "ffn_down");
        assert_eq!(entry["category"], "feedforward");
        assert_eq!(entry["count"], 1);
        assert_eq!(entry["order"], 0);
        assert!(value["trials"][0]["duration_ms"].is_number());
        assert_eq!(value["trials"][0]["unresolved_count"], 0);
    }

    #[test]
    fn test_from_document_rejects_bad_stats() {
        let base = r#"{"model_path":"m","model_family":"llama","trials":[{"prompt":"","generated_text":"","duration_ms":1.0,"unresolved_count":0,"tensor_counts":[STATS]}]}"#;
        let bad = [
            r#"{"name":"a","layer":0,"kind":"attn_q","category":"attention","count":0,"order":0}"#,
            r#"{"name":"a","layer":1000,"kind":"attn_q","category":"attention","count":1,"order":0}"#,
            r#"{"name":"a","layer":0,"kind":"attn_q","category":"attention","count":1,"order":0},{"name":"b","layer":0,"kind":"attn_k","category":"attention","count":1,"order":0}"#,
            r#"{"name":"a","layer":0,"kind":"attn_q","category":"vision","count":1,"order":0}"#,
            r#"{"name":"a","layer":0,"kind":"attn_q","category":"attention","count":-3,"order":0}"#,
            r#"{"name":"a","layer":3,"kind":"attn_q","category":"attention","count":1,"order":0},{"name":"b","layer":3,"kind":"attn_q","category":"feedforward","count":1,"order":1}"#,
        ];
        for stats in bad {
            let json = base.replace("STATS", stats);
            let err = Capture::from_json(&json).unwrap_err();
            assert!(matches!(err, ObservarError::InvalidDocument(_)), "{stats}");
        }
    }

    #[test]
    fn test_from_document_allows_same_kind_across_layers_and_trials() {
        let json = r#"{
            "model_path": "m", "model_family": "llama",
            "trials": [
                {"prompt": "", "generated_text": "", "duration_ms": 1.0, "unresolved_count": 0,
                 "tensor_counts": [
                    {"name": "a", "layer": 0, "kind": "attn_q", "category": "attention", "count": 1, "order": 0},
                    {"name": "b", "layer": 1, "kind": "attn_q", "category": "feedforward", "count": 1, "order": 1}
                 ]},
                {"prompt": "", "generated_text": "", "duration_ms": 1.0, "unresolved_count": 0,
                 "tensor_counts": [
                    {"name": "a", "layer": 0, "kind": "attn_q", "category": "feedforward", "count": 1, "order": 0}
                 ]}
            ]
        }"#;
        let capture = Capture::from_json(json).expect("test");
        assert_eq!(capture.trials().len(), 2);
    }

    #[test]
    fn test_callbacks_outside_trial_not_counted() {
        use crate::hook::{EvalObserver, TensorHandle};

        let mut s = session();
        let handle = TensorHandle::new("blk.0.attn_q.weight", 8);
        s.on_eval(&handle, true);
        s.on_eval(&handle, false);
        assert_eq!(s.statistics().total_callbacks, 0);

        s.start_trial("p").expect("test");
        s.on_eval(&handle, true);
        s.on_eval(&handle, false);
        s.end_trial("g").expect("test");
        s.on_eval(&handle, false);
        assert_eq!(s.statistics().total_callbacks, 2);
    }

    #[test]
    fn test_from_document_keeps_identity_verbatim() {
        let json = r#"{
            "model_path": "m", "model_family": "llama",
            "trials": [{
                "prompt": "p", "generated_text": "g", "duration_ms": 2.5, "unresolved_count": 4,
                "tensor_counts": [
                    {"name": "blk.9.ssm_x.weight", "layer": 9, "kind": "ssm_x", "category": "feedforward", "count": 2, "order": 1},
                    {"name": "token_embd.weight", "layer": 5, "kind": "attn_v", "category": "attention", "count": 1, "order": 0}
                ]
            }]
        }"#;
        let capture = Capture::from_json(json).expect("test");
        let stats = capture.trials()[0].tensor_stats();
        assert_eq!(stats[0].name, "token_embd.weight");
        assert_eq!(stats[0].layer, 5);
        assert_eq!(stats[0].kind, TensorKind::AttnV);
        assert_eq!(stats[1].kind, TensorKind::Other("ssm_x".to_string()));
        assert_eq!(capture.trials()[0].unresolved_count(), 4);
    }

    #[test]
    fn test_trial_lookup() {
        let capture = Capture::new("m", "llama");
        let err = capture.trial(0).unwrap_err();
        assert!(matches!(
            err,
            ObservarError::TrialNotFound {
                index: 0,
                available: 0
            }
        ));
    }
}
