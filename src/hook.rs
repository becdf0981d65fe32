//! Instrumentation hook
//!
//! The inference engine invokes an evaluation callback once per computed
//! node, synchronously on its own thread, in two phases: an *ask* phase where
//! it asks whether the observer wants the node's data, and a *data* phase
//! once the node has been computed. Only the data phase is recorded.
//!
//! The handle passed to the callback is opaque; only its declared name and
//! byte size are read. Handle addresses are never used as keys since they are
//! not stable across evaluations.

use crate::capture::CaptureSession;
use crate::recorder::RawObservation;

/// Opaque handle to an evaluated compute node
pub trait ObservedTensor {
    /// Declared tensor name
    fn name(&self) -> &str;

    /// Byte size at evaluation time
    fn nbytes(&self) -> u64;
}

/// Receiver of evaluation callbacks
pub trait EvalObserver {
    /// Handle one callback.
    ///
    /// In the ask phase the return value tells the engine whether to deliver
    /// the node's data; in the data phase it tells the engine to continue.
    /// Implementations must not panic or block.
    fn on_eval(&mut self, tensor: &dyn ObservedTensor, ask: bool) -> bool;
}

/// Owned name/size pair implementing [`ObservedTensor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorHandle {
    name: String,
    nbytes: u64,
}

impl TensorHandle {
    /// Create a handle
    #[must_use]
    pub fn new(name: impl Into<String>, nbytes: u64) -> Self {
        Self {
            name: name.into(),
            nbytes,
        }
    }
}

impl ObservedTensor for TensorHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn nbytes(&self) -> u64 {
        self.nbytes
    }
}

impl EvalObserver for CaptureSession {
    fn on_eval(&mut self, tensor: &dyn ObservedTensor, ask: bool) -> bool {
        self.note_callback();
        if !ask {
            self.record(&RawObservation::new(tensor.name(), tensor.nbytes()));
        }
        true
    }
}
