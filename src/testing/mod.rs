//! Synthetic Trace Infrastructure
//!
//! Drives the capture pipeline without a real inference engine: a seeded
//! generator produces the evaluation events an engine would report for a
//! profile, and [`generators::TraceGenerator::replay`] feeds them through any
//! [`crate::hook::EvalObserver`] in ask/data order.
//!
//! Used by the unit tests, the integration tests, the recorder bench, and
//! the CLI `simulate` command.
//!
//! ```text
//! TraceGenerator(seed) → Vec<TraceEvent> → replay(observer) → CaptureSession
//! ```

pub mod generators;

pub use generators::{NameStyle, TraceEvent, TraceGenerator};
