//! Query interface for transport layers
//!
//! Callers (an HTTP handler, the CLI) own an [`AnalysisSession`] and pass it
//! to each request; there is no process-wide capture. `load` is all-or-nothing:
//! a rejected document leaves the previously loaded capture in place.

// Module-level clippy allows
#![allow(clippy::must_use_candidate)]

use std::path::Path;

use serde::Serialize;

use crate::capture::{Capture, CaptureDocument};
use crate::error::{ObservarError, Result};
use crate::profile::{all_profiles, get_profile, Category, FlowEdge, FlowGroup, ProfileSummary};
use crate::projector::{project, GridResult, ProjectionSource};

// ============================================================================
// Stateless queries
// ============================================================================

/// Parse a capture document
///
/// # Errors
///
/// Returns `InvalidDocument` if the JSON is malformed or fails validation
pub fn load(document: &str) -> Result<Capture> {
    Capture::from_json(document)
}

/// Build a capture from an already-decoded document
///
/// # Errors
///
/// Returns `InvalidDocument` if the document fails validation
pub fn load_document(document: CaptureDocument) -> Result<Capture> {
    Capture::from_document(document)
}

/// Project a capture with the named family and size
///
/// `trial` selects one trial by index; `None` merges all trials.
///
/// # Errors
///
/// Returns `UnknownFamily`, `UnknownSize` or `TrialNotFound`
pub fn analyze(
    capture: &Capture,
    family: &str,
    size_label: &str,
    trial: Option<usize>,
) -> Result<GridResult> {
    let profile = get_profile(family)?;
    let source = match trial {
        Some(index) => ProjectionSource::Trial(capture.trial(index)?),
        None => ProjectionSource::Capture(capture),
    };
    project(source, profile, size_label)
}

/// Catalogue of supported model families
pub fn models() -> Vec<ProfileSummary> {
    all_profiles().iter().map(|p| p.summary()).collect()
}

/// Color tables for categories and flow groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorTable {
    /// Category label to color
    pub categories: Vec<(String, String)>,
    /// Flow group label to color
    pub flows: Vec<(String, String)>,
}

/// Default color tables
pub fn colors() -> ColorTable {
    let categories = Category::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), c.default_color().to_string()))
        .collect();
    let flows = FlowGroup::ALL
        .iter()
        .map(|g| (g.as_str().to_string(), g.color().to_string()))
        .collect();
    ColorTable { categories, flows }
}

/// Static flow edges of a family
///
/// # Errors
///
/// Returns `UnknownFamily` for an unsupported label
pub fn flows(family: &str) -> Result<Vec<FlowEdge>> {
    Ok(get_profile(family)?.flow_edges())
}

// ============================================================================
// Session state
// ============================================================================

/// Load state reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Whether a capture is loaded
    pub loaded: bool,
    /// Trials in the loaded capture
    pub trial_count: usize,
    /// Model path of the loaded capture
    pub model_path: Option<String>,
}

/// Explicit per-client analysis state
#[derive(Debug, Default)]
pub struct AnalysisSession {
    capture: Option<Capture>,
}

impl AnalysisSession {
    /// Empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded capture with a parsed document
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument`; the current capture is kept
    pub fn load(&mut self, document: &str) -> Result<&Capture> {
        let capture = load(document)?;
        Ok(self.capture.insert(capture))
    }

    /// Replace the loaded capture with one read from disk
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidDocument`; the current capture is kept
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&Capture> {
        let capture = Capture::load_json(path)?;
        Ok(self.capture.insert(capture))
    }

    /// Install an in-memory capture (e.g. from a live session)
    pub fn set_capture(&mut self, capture: Capture) {
        self.capture = Some(capture);
    }

    /// Loaded capture, if any
    pub fn capture(&self) -> Option<&Capture> {
        self.capture.as_ref()
    }

    /// Project the loaded capture
    ///
    /// # Errors
    ///
    /// Returns `NoCaptureLoaded` before a successful load, otherwise as [`analyze`]
    pub fn analyze(
        &self,
        family: &str,
        size_label: &str,
        trial: Option<usize>,
    ) -> Result<GridResult> {
        let capture = self.capture.as_ref().ok_or(ObservarError::NoCaptureLoaded)?;
        analyze(capture, family, size_label, trial)
    }

    /// Current load state
    pub fn status(&self) -> Status {
        match &self.capture {
            Some(capture) => Status {
                loaded: true,
                trial_count: capture.trials().len(),
                model_path: Some(capture.model_path().to_string()),
            },
            None => Status {
                loaded: false,
                trial_count: 0,
                model_path: None,
            },
        }
    }
}
