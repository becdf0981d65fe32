//! Synthetic Inference Traces
//!
//! Deterministic evaluation-event streams shaped like a real forward pass:
//! embedding, every block's kinds in execution order, final norm, output
//! head, repeated once per generated token. Names come from the profile's
//! own rule tables, so every non-noise event resolves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::hook::{EvalObserver, TensorHandle};
use crate::profile::{ModelProfile, NamePattern, TensorKind};

/// Which naming an engine reports for evaluated tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameStyle {
    /// Declared weight names (`blk.3.attn_q.weight`)
    #[default]
    Weights,
    /// Compute-graph node names (`Qcur-3`)
    GraphNodes,
}

/// Node names no profile resolves, used as noise
const NOISE_STEMS: [&str; 4] = ["kq_soft_max", "ffn_silu", "l_out", "kq_scaled"];

static EXPERT_KINDS: [TensorKind; 4] = [
    TensorKind::FfnRouter,
    TensorKind::FfnGateExperts,
    TensorKind::FfnUpExperts,
    TensorKind::FfnDownExperts,
];

/// One evaluation event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Reported tensor name
    pub name: String,
    /// Reported byte size
    pub nbytes: u64,
}

impl TraceEvent {
    /// Handle suitable for an [`EvalObserver`]
    pub fn handle(&self) -> TensorHandle {
        TensorHandle::new(self.name.clone(), self.nbytes)
    }
}

/// Deterministic trace generator for reproducible tests
///
/// # Example
///
/// ```rust
/// use observar::profile::get_profile;
/// use observar::testing::generators::TraceGenerator;
///
/// let llama = get_profile("llama").unwrap();
/// let trace = TraceGenerator::new(42).with_tokens(2).generate(llama, 4);
/// // (embedding + 4 blocks x 9 kinds + norm + output) per token
/// assert_eq!(trace.len(), 2 * (1 + 4 * 9 + 2));
/// ```
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    seed: u64,
    tokens: usize,
    style: NameStyle,
    noise_rate: f64,
    experts: bool,
}

impl TraceGenerator {
    /// Create generator with specific seed (one token, weight names, no noise)
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tokens: 1,
            style: NameStyle::Weights,
            noise_rate: 0.0,
            experts: false,
        }
    }

    /// Number of forward passes
    #[must_use]
    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.tokens = tokens;
        self
    }

    /// Naming style of emitted events
    #[must_use]
    pub fn with_style(mut self, style: NameStyle) -> Self {
        self.style = style;
        self
    }

    /// Probability of an unresolvable event after each block, clamped to `[0, 1]`
    #[must_use]
    pub fn with_noise_rate(mut self, rate: f64) -> Self {
        self.noise_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Emit expert FFN kinds for mixture-of-experts profiles
    #[must_use]
    pub fn with_experts(mut self, experts: bool) -> Self {
        self.experts = experts;
        self
    }

    /// Generate the event stream for `layer_count` blocks
    pub fn generate(&self, profile: &ModelProfile, layer_count: usize) -> Vec<TraceEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let block_kinds: Vec<&TensorKind> = if self.experts && profile.mixture_of_experts {
            profile.tensor_types.iter().chain(EXPERT_KINDS.iter()).collect()
        } else {
            profile.tensor_types.iter().collect()
        };

        let mut events = Vec::new();
        for _ in 0..self.tokens {
            self.push_global(&mut events, &mut rng, profile, &TensorKind::Embedding);
            for layer in 0..layer_count {
                for kind in &block_kinds {
                    if let Some(name) = self.block_name(profile, kind, layer) {
                        events.push(TraceEvent {
                            name,
                            nbytes: sample_bytes(&mut rng),
                        });
                    }
                }
                if self.noise_rate > 0.0 && rng.gen_bool(self.noise_rate) {
                    let stem = NOISE_STEMS[rng.gen_range(0..NOISE_STEMS.len())];
                    events.push(TraceEvent {
                        name: format!("{stem}-{layer}"),
                        nbytes: sample_bytes(&mut rng),
                    });
                }
            }
            self.push_global(&mut events, &mut rng, profile, &TensorKind::OutputNorm);
            self.push_global(&mut events, &mut rng, profile, &TensorKind::Output);
        }
        events
    }

    fn push_global(
        &self,
        events: &mut Vec<TraceEvent>,
        rng: &mut StdRng,
        profile: &ModelProfile,
        kind: &TensorKind,
    ) {
        let mut stems = profile.rules().filter_map(|rule| match rule.pattern {
            NamePattern::Global(stem) if &rule.kind == kind => Some(stem),
            _ => None,
        });
        let stem = match self.style {
            NameStyle::Weights => stems.next().map(|s| format!("{s}.weight")),
            NameStyle::GraphNodes => stems.last().map(ToString::to_string),
        };
        if let Some(name) = stem {
            events.push(TraceEvent {
                name,
                nbytes: sample_bytes(rng),
            });
        }
    }

    fn block_name(&self, profile: &ModelProfile, kind: &TensorKind, layer: usize) -> Option<String> {
        profile.rules().find_map(|rule| {
            if &rule.kind != kind {
                return None;
            }
            match (self.style, rule.pattern) {
                (NameStyle::Weights, NamePattern::Block(token)) => {
                    Some(format!("blk.{layer}.{token}.weight"))
                },
                (NameStyle::GraphNodes, NamePattern::Node(stem)) => Some(format!("{stem}-{layer}")),
                _ => None,
            }
        })
    }

    /// Feed a trace through an observer, ask phase then data phase per event
    pub fn replay<O: EvalObserver + ?Sized>(events: &[TraceEvent], observer: &mut O) {
        for event in events {
            let handle = event.handle();
            if observer.on_eval(&handle, true) {
                observer.on_eval(&handle, false);
            }
        }
    }
}

fn sample_bytes(rng: &mut StdRng) -> u64 {
    4096 * rng.gen_range(1u64..=64)
}
