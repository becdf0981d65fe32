//! # Observar
//!
//! Tensor identity resolution and aggregation for instrumented transformer
//! inference.
//!
//! Observar (Spanish: "to observe") sits behind an inference engine's
//! evaluation callback, turns the raw tensor names it reports into semantic
//! identities (layer, kind, category), counts them per trial in first-seen
//! order, and projects the result onto a layer-ordered grid with static flow
//! edges for visualization.
//!
//! ## Features
//!
//! - **Five families**: llama, granite, qwen, phi (fused QKV), mistral (MoE)
//! - **Two namings**: declared weight names and compute-graph node names
//! - **Durable captures**: JSON documents that reload without re-resolving
//! - **Deterministic projection**: stable layout and intensities across runs
//!
//! ## Example
//!
//! ```rust
//! use observar::capture::{CaptureConfig, CaptureSession};
//! use observar::hook::{EvalObserver, TensorHandle};
//! use observar::projector::project;
//!
//! let mut session = CaptureSession::new(CaptureConfig::new("llama-1b.gguf", "llama")).unwrap();
//! session.start_trial("Hello").unwrap();
//! for name in ["token_embd.weight", "blk.0.attn_q.weight", "output.weight"] {
//!     let tensor = TensorHandle::new(name, 1024);
//!     if session.on_eval(&tensor, true) {
//!         session.on_eval(&tensor, false);
//!     }
//! }
//! session.end_trial("Hi").unwrap();
//!
//! let grid = project(session.capture(), session.profile(), "1b").unwrap();
//! assert_eq!(grid.total_layers, 16);
//! assert_eq!(grid.max_count, 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! eval callback → hook → resolve(profile) → recorder → capture (Trial)
//!                                                           ↓
//!                                    query::analyze → projector → GridResult
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_wrap)] // u64 -> i64 for counts is safe
#![allow(clippy::cast_precision_loss)] // u64 -> f64 for intensities is acceptable
#![allow(clippy::cast_possible_truncation)] // u128 -> u64 for durations is safe
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections
#![allow(clippy::float_cmp)] // Allow float comparisons in tests

/// Capture sessions, trials, and the capture document
pub mod capture;
pub mod error;
/// Instrumentation hook between an inference engine and a capture session
pub mod hook;
/// Naming-rule profiles for the supported model families
pub mod profile;
/// Grid/flow projection for visualization
pub mod projector;
/// Query interface for transport layers (load, analyze, status)
pub mod query;
pub mod recorder;
pub mod resolve;
/// Deterministic synthetic inference traces
pub mod testing;

// Re-exports for convenience
pub use capture::{Capture, CaptureConfig, CaptureSession, Trial};
pub use error::{ObservarError, Result};
pub use profile::{get_profile, Category, ModelProfile, TensorKind};
pub use projector::{project, GridCell, GridResult};
pub use resolve::{resolve, Resolution, ResolvedIdentity};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_reexports() {
        let llama = get_profile("llama").expect("test");
        assert!(resolve("blk.0.attn_q.weight", llama).is_resolved());
        assert!(matches!(get_profile("gpt2"), Err(ObservarError::UnknownFamily(_))));
    }
}
