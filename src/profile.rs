//! Naming-rule profiles for the supported model families
//!
//! A profile is pure data: an ordered list of naming-rule tables that map raw
//! tensor names onto a [`TensorKind`], the family's layer-count table, and the
//! display metadata the projector needs (expected kinds per layer, category
//! colors, flow edges).
//!
//! Family-specific variance is expressed through the rule tables rather than
//! per-family types, so resolution stays a single pure function:
//!
//! | Family    | QKV      | FFN                     |
//! |-----------|----------|-------------------------|
//! | llama     | separate | gate/up/down            |
//! | granite   | separate | gate/up/down            |
//! | qwen      | separate | gate/up/down (+ biases) |
//! | phi       | fused    | up/down                 |
//! | mistral   | separate | gate/up/down or experts |
//!
//! Layer convention: `-1` embedding, `0..N-1` transformer blocks,
//! `998` final normalization, `999` output projection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ObservarError, Result};

/// Layer index of the token embedding
pub const EMBEDDING_LAYER: i32 = -1;
/// Layer index of the final normalization
pub const OUTPUT_NORM_LAYER: i32 = 998;
/// Layer index of the output projection (logits)
pub const OUTPUT_LAYER: i32 = 999;

/// Color used when a category has no entry in a profile's table
pub const FALLBACK_COLOR: &str = "#808080";

/// Supported family labels in catalogue order
pub const SUPPORTED_FAMILIES: [&str; 5] = ["llama", "granite", "qwen", "phi", "mistral"];

// ============================================================================
// Category
// ============================================================================

/// Coarse grouping of tensor kinds, used for coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Token embedding lookup
    Embedding,
    /// Attention projections
    Attention,
    /// Feed-forward (dense or mixture-of-experts)
    Feedforward,
    /// Layer and final normalization
    Normalization,
    /// Output projection
    Output,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 5] = [
        Self::Embedding,
        Self::Attention,
        Self::Feedforward,
        Self::Normalization,
        Self::Output,
    ];

    /// Serialized name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Attention => "attention",
            Self::Feedforward => "feedforward",
            Self::Normalization => "normalization",
            Self::Output => "output",
        }
    }

    /// Parse a serialized category name (case-insensitive)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "embedding" => Some(Self::Embedding),
            "attention" => Some(Self::Attention),
            "feedforward" | "ffn" => Some(Self::Feedforward),
            "normalization" | "norm" => Some(Self::Normalization),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    /// Color from the shared category table
    #[must_use]
    pub fn default_color(&self) -> &'static str {
        CATEGORY_COLORS
            .iter()
            .find(|(c, _)| c == self)
            .map_or(FALLBACK_COLOR, |&(_, color)| color)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TensorKind
// ============================================================================

/// Semantic role of a tensor within the model
///
/// Serialized as its GGUF component name (`attn_q`, `ffn_gate_exps`, ...).
/// Kinds read back from a capture document that this version does not know
/// are preserved verbatim as [`TensorKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TensorKind {
    /// Token embedding table
    Embedding,
    /// Pre-attention normalization
    AttnNorm,
    /// Query projection
    AttnQ,
    /// Key projection
    AttnK,
    /// Value projection
    AttnV,
    /// Fused query/key/value projection
    AttnQkv,
    /// Attention output projection
    AttnOutput,
    /// Pre-FFN normalization
    FfnNorm,
    /// Mixture-of-experts router
    FfnRouter,
    /// FFN gate projection
    FfnGate,
    /// Per-expert gate projections
    FfnGateExperts,
    /// FFN up projection
    FfnUp,
    /// Per-expert up projections
    FfnUpExperts,
    /// FFN down projection
    FfnDown,
    /// Per-expert down projections
    FfnDownExperts,
    /// Final normalization
    OutputNorm,
    /// Output projection / logits
    Output,
    /// Kind not known to this version (loaded from a document)
    Other(String),
}

impl TensorKind {
    /// Kinds this version resolves, in canonical grid order
    pub const CANONICAL: [TensorKind; 17] = [
        Self::Embedding,
        Self::AttnNorm,
        Self::AttnQ,
        Self::AttnK,
        Self::AttnV,
        Self::AttnQkv,
        Self::AttnOutput,
        Self::FfnNorm,
        Self::FfnRouter,
        Self::FfnGate,
        Self::FfnGateExperts,
        Self::FfnUp,
        Self::FfnUpExperts,
        Self::FfnDown,
        Self::FfnDownExperts,
        Self::OutputNorm,
        Self::Output,
    ];

    /// Serialized name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Embedding => "token_embd",
            Self::AttnNorm => "attn_norm",
            Self::AttnQ => "attn_q",
            Self::AttnK => "attn_k",
            Self::AttnV => "attn_v",
            Self::AttnQkv => "attn_qkv",
            Self::AttnOutput => "attn_output",
            Self::FfnNorm => "ffn_norm",
            Self::FfnRouter => "ffn_gate_inp",
            Self::FfnGate => "ffn_gate",
            Self::FfnGateExperts => "ffn_gate_exps",
            Self::FfnUp => "ffn_up",
            Self::FfnUpExperts => "ffn_up_exps",
            Self::FfnDown => "ffn_down",
            Self::FfnDownExperts => "ffn_down_exps",
            Self::OutputNorm => "output_norm",
            Self::Output => "output",
            Self::Other(name) => name,
        }
    }

    /// Parse a known kind name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "token_embd" | "embedding" => Self::Embedding,
            "attn_norm" => Self::AttnNorm,
            "attn_q" => Self::AttnQ,
            "attn_k" => Self::AttnK,
            "attn_v" => Self::AttnV,
            "attn_qkv" => Self::AttnQkv,
            "attn_output" => Self::AttnOutput,
            "ffn_norm" => Self::FfnNorm,
            "ffn_gate_inp" => Self::FfnRouter,
            "ffn_gate" => Self::FfnGate,
            "ffn_gate_exps" => Self::FfnGateExperts,
            "ffn_up" => Self::FfnUp,
            "ffn_up_exps" => Self::FfnUpExperts,
            "ffn_down" => Self::FfnDown,
            "ffn_down_exps" => Self::FfnDownExperts,
            "output_norm" => Self::OutputNorm,
            "output" => Self::Output,
            _ => return None,
        };
        Some(kind)
    }

    /// Position in the canonical within-layer ordering
    ///
    /// Unknown kinds sort after every known kind.
    #[must_use]
    pub fn canonical_rank(&self) -> usize {
        Self::CANONICAL
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::CANONICAL.len())
    }

    /// Category a rule assigns to this kind
    ///
    /// `None` only for [`TensorKind::Other`].
    #[must_use]
    pub const fn default_category(&self) -> Option<Category> {
        match self {
            Self::Embedding => Some(Category::Embedding),
            Self::AttnNorm | Self::FfnNorm | Self::OutputNorm => Some(Category::Normalization),
            Self::AttnQ | Self::AttnK | Self::AttnV | Self::AttnQkv | Self::AttnOutput => {
                Some(Category::Attention)
            },
            Self::FfnRouter
            | Self::FfnGate
            | Self::FfnGateExperts
            | Self::FfnUp
            | Self::FfnUpExperts
            | Self::FfnDown
            | Self::FfnDownExperts => Some(Category::Feedforward),
            Self::Output => Some(Category::Output),
            Self::Other(_) => None,
        }
    }

    /// Sentinel layer for tensors outside the transformer stack
    #[must_use]
    pub const fn fixed_layer(&self) -> Option<i32> {
        match self {
            Self::Embedding => Some(EMBEDDING_LAYER),
            Self::OutputNorm => Some(OUTPUT_NORM_LAYER),
            Self::Output => Some(OUTPUT_LAYER),
            _ => None,
        }
    }
}

impl From<String> for TensorKind {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(Self::Other(s))
    }
}

impl From<TensorKind> for String {
    fn from(kind: TensorKind) -> Self {
        match kind {
            TensorKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Naming rules
// ============================================================================

/// Structural shape a raw tensor name must have for a rule to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    /// `{stem}`, `{stem}.weight` or `{stem}.bias` with no layer index
    Global(&'static str),
    /// `blk.{layer}.{component}`, optionally suffixed `.weight` / `.bias`
    Block(&'static str),
    /// `blk.{layer}.{component}.{expert}[.weight]` (per-expert GGUF layout)
    BlockExpert(&'static str),
    /// `{stem}-{layer}`, the compute-graph node naming of eval callbacks
    Node(&'static str),
}

/// Maps one name pattern to a tensor kind and category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRule {
    /// Name shape and literal token
    pub pattern: NamePattern,
    /// Kind assigned on match
    pub kind: TensorKind,
    /// Category assigned on match
    pub category: Category,
}

impl NamingRule {
    const fn new(pattern: NamePattern, kind: TensorKind, category: Category) -> Self {
        Self {
            pattern,
            kind,
            category,
        }
    }
}

use Category as C;
use NamePattern::{Block, BlockExpert, Global, Node};
use TensorKind as K;

/// Embedding and post-stack tensors, shared by every family
static GLOBAL_RULES: [NamingRule; 6] = [
    NamingRule::new(Global("token_embd"), K::Embedding, C::Embedding),
    NamingRule::new(Global("output_norm"), K::OutputNorm, C::Normalization),
    NamingRule::new(Global("output"), K::Output, C::Output),
    NamingRule::new(Global("inp_embd"), K::Embedding, C::Embedding),
    NamingRule::new(Global("result_norm"), K::OutputNorm, C::Normalization),
    NamingRule::new(Global("result_output"), K::Output, C::Output),
];

/// Separate Q/K/V attention with gated FFN (declared weight names)
static DENSE_BLOCK_RULES: [NamingRule; 9] = [
    NamingRule::new(Block("attn_norm"), K::AttnNorm, C::Normalization),
    NamingRule::new(Block("attn_q"), K::AttnQ, C::Attention),
    NamingRule::new(Block("attn_k"), K::AttnK, C::Attention),
    NamingRule::new(Block("attn_v"), K::AttnV, C::Attention),
    NamingRule::new(Block("attn_output"), K::AttnOutput, C::Attention),
    NamingRule::new(Block("ffn_norm"), K::FfnNorm, C::Normalization),
    NamingRule::new(Block("ffn_gate"), K::FfnGate, C::Feedforward),
    NamingRule::new(Block("ffn_up"), K::FfnUp, C::Feedforward),
    NamingRule::new(Block("ffn_down"), K::FfnDown, C::Feedforward),
];

/// Separate Q/K/V attention with gated FFN (compute-graph node names)
static DENSE_NODE_RULES: [NamingRule; 9] = [
    NamingRule::new(Node("attn_norm"), K::AttnNorm, C::Normalization),
    NamingRule::new(Node("Qcur"), K::AttnQ, C::Attention),
    NamingRule::new(Node("Kcur"), K::AttnK, C::Attention),
    NamingRule::new(Node("Vcur"), K::AttnV, C::Attention),
    NamingRule::new(Node("kqv_out"), K::AttnOutput, C::Attention),
    NamingRule::new(Node("ffn_norm"), K::FfnNorm, C::Normalization),
    NamingRule::new(Node("ffn_gate"), K::FfnGate, C::Feedforward),
    NamingRule::new(Node("ffn_up"), K::FfnUp, C::Feedforward),
    NamingRule::new(Node("ffn_out"), K::FfnDown, C::Feedforward),
];

/// Fused QKV attention with ungated FFN (Phi)
static FUSED_BLOCK_RULES: [NamingRule; 6] = [
    NamingRule::new(Block("attn_norm"), K::AttnNorm, C::Normalization),
    NamingRule::new(Block("attn_qkv"), K::AttnQkv, C::Attention),
    NamingRule::new(Block("attn_output"), K::AttnOutput, C::Attention),
    NamingRule::new(Block("ffn_norm"), K::FfnNorm, C::Normalization),
    NamingRule::new(Block("ffn_up"), K::FfnUp, C::Feedforward),
    NamingRule::new(Block("ffn_down"), K::FfnDown, C::Feedforward),
];

/// Q/K/V node views are slices of the fused projection
static FUSED_NODE_RULES: [NamingRule; 9] = [
    NamingRule::new(Node("attn_norm"), K::AttnNorm, C::Normalization),
    NamingRule::new(Node("wqkv"), K::AttnQkv, C::Attention),
    NamingRule::new(Node("Qcur"), K::AttnQkv, C::Attention),
    NamingRule::new(Node("Kcur"), K::AttnQkv, C::Attention),
    NamingRule::new(Node("Vcur"), K::AttnQkv, C::Attention),
    NamingRule::new(Node("kqv_out"), K::AttnOutput, C::Attention),
    NamingRule::new(Node("ffn_norm"), K::FfnNorm, C::Normalization),
    NamingRule::new(Node("ffn_up"), K::FfnUp, C::Feedforward),
    NamingRule::new(Node("ffn_out"), K::FfnDown, C::Feedforward),
];

/// Mixture-of-experts FFN (Mixtral)
static EXPERT_RULES: [NamingRule; 11] = [
    NamingRule::new(Block("ffn_gate_inp"), K::FfnRouter, C::Feedforward),
    NamingRule::new(Block("ffn_gate_exps"), K::FfnGateExperts, C::Feedforward),
    NamingRule::new(Block("ffn_up_exps"), K::FfnUpExperts, C::Feedforward),
    NamingRule::new(Block("ffn_down_exps"), K::FfnDownExperts, C::Feedforward),
    NamingRule::new(BlockExpert("ffn_gate"), K::FfnGateExperts, C::Feedforward),
    NamingRule::new(BlockExpert("ffn_up"), K::FfnUpExperts, C::Feedforward),
    NamingRule::new(BlockExpert("ffn_down"), K::FfnDownExperts, C::Feedforward),
    NamingRule::new(Node("ffn_moe_logits"), K::FfnRouter, C::Feedforward),
    NamingRule::new(Node("ffn_moe_gate"), K::FfnGateExperts, C::Feedforward),
    NamingRule::new(Node("ffn_moe_up"), K::FfnUpExperts, C::Feedforward),
    NamingRule::new(Node("ffn_moe_down"), K::FfnDownExperts, C::Feedforward),
];

static DENSE_TENSOR_TYPES: [TensorKind; 9] = [
    K::AttnNorm,
    K::AttnQ,
    K::AttnK,
    K::AttnV,
    K::AttnOutput,
    K::FfnNorm,
    K::FfnGate,
    K::FfnUp,
    K::FfnDown,
];

static FUSED_TENSOR_TYPES: [TensorKind; 6] = [
    K::AttnNorm,
    K::AttnQkv,
    K::AttnOutput,
    K::FfnNorm,
    K::FfnUp,
    K::FfnDown,
];

/// Category colors shared by all built-in profiles
pub static CATEGORY_COLORS: [(Category, &str); 5] = [
    (C::Embedding, "#4a90d9"),
    (C::Attention, "#50c878"),
    (C::Feedforward, "#ff7f50"),
    (C::Normalization, "#ffd700"),
    (C::Output, "#da70d6"),
];

// ============================================================================
// ModelProfile
// ============================================================================

/// Immutable naming rules and metadata for one model family
#[derive(Debug, Clone)]
pub struct ModelProfile {
    /// Family label (`llama`, `phi`, ...)
    pub family: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Known model variants
    pub variants: &'static [&'static str],
    /// Q, K and V share one projection tensor
    pub fused_qkv: bool,
    /// Some variants route the FFN through experts
    pub mixture_of_experts: bool,
    /// Transformer block count keyed by size label
    pub layer_counts: &'static [(&'static str, usize)],
    /// Rule tables, tried in order; first match wins
    pub rule_tables: &'static [&'static [NamingRule]],
    /// Per-block kinds in execution order
    pub tensor_types: &'static [TensorKind],
    /// Display color per category
    pub category_colors: &'static [(Category, &'static str)],
}

/// Serializable catalogue entry for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Family label
    pub family: String,
    /// Human-readable description
    pub description: String,
    /// Known model variants
    pub variants: Vec<String>,
    /// Layer counts keyed by size label
    pub layer_counts: BTreeMap<String, usize>,
    /// Fused QKV projection
    pub fused_qkv: bool,
    /// Mixture-of-experts variants
    pub mixture_of_experts: bool,
}

impl ModelProfile {
    /// All naming rules in priority order
    pub fn rules(&self) -> impl Iterator<Item = &NamingRule> + '_ {
        self.rule_tables.iter().flat_map(|table| table.iter())
    }

    /// Number of transformer blocks for a size label
    ///
    /// # Errors
    ///
    /// Returns `UnknownSize` if the label is not in this family's table
    pub fn layer_count(&self, size_label: &str) -> Result<usize> {
        let size = normalize_label(size_label);
        self.layer_counts
            .iter()
            .find(|(label, _)| *label == size)
            .map(|&(_, count)| count)
            .ok_or_else(|| ObservarError::UnknownSize {
                family: self.family.to_string(),
                size: size_label.to_string(),
            })
    }

    /// Size labels in table order
    pub fn size_labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.layer_counts.iter().map(|&(label, _)| label)
    }

    /// Display color for a category
    #[must_use]
    pub fn color(&self, category: Category) -> &'static str {
        self.category_colors
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(FALLBACK_COLOR, |&(_, color)| color)
    }

    /// Whether the per-block kinds include a gate projection
    #[must_use]
    pub fn has_ffn_gate(&self) -> bool {
        self.tensor_types.contains(&TensorKind::FfnGate)
    }

    /// Catalogue entry for this profile
    #[must_use]
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            family: self.family.to_string(),
            description: self.description.to_string(),
            variants: self.variants.iter().map(ToString::to_string).collect(),
            layer_counts: self
                .layer_counts
                .iter()
                .map(|&(label, count)| (label.to_string(), count))
                .collect(),
            fused_qkv: self.fused_qkv,
            mixture_of_experts: self.mixture_of_experts,
        }
    }

    /// Static data-dependency edges for this profile's block structure
    ///
    /// Independent of observed counts; computed the same way on every call.
    #[must_use]
    pub fn flow_edges(&self) -> Vec<FlowEdge> {
        let mut edges = Vec::new();
        let mut push = |from: TensorKind, to: TensorKind, group: FlowGroup| {
            edges.push(FlowEdge { from, to, group });
        };

        push(K::Embedding, K::AttnNorm, FlowGroup::Attention);
        if self.fused_qkv {
            push(K::AttnNorm, K::AttnQkv, FlowGroup::Attention);
            push(K::AttnQkv, K::AttnOutput, FlowGroup::Attention);
        } else {
            for proj in [K::AttnQ, K::AttnK, K::AttnV] {
                push(K::AttnNorm, proj, FlowGroup::Attention);
            }
            for proj in [K::AttnQ, K::AttnK, K::AttnV] {
                push(proj, K::AttnOutput, FlowGroup::Attention);
            }
        }

        push(K::AttnOutput, K::FfnNorm, FlowGroup::Ffn);
        if self.has_ffn_gate() {
            push(K::FfnNorm, K::FfnGate, FlowGroup::Ffn);
            push(K::FfnNorm, K::FfnUp, FlowGroup::Ffn);
            push(K::FfnGate, K::FfnDown, FlowGroup::Ffn);
            push(K::FfnUp, K::FfnDown, FlowGroup::Ffn);
        } else {
            push(K::FfnNorm, K::FfnUp, FlowGroup::Ffn);
            push(K::FfnUp, K::FfnDown, FlowGroup::Ffn);
        }
        if self.mixture_of_experts {
            push(K::FfnNorm, K::FfnRouter, FlowGroup::Ffn);
            push(K::FfnRouter, K::FfnGateExperts, FlowGroup::Ffn);
            push(K::FfnRouter, K::FfnUpExperts, FlowGroup::Ffn);
            push(K::FfnGateExperts, K::FfnDownExperts, FlowGroup::Ffn);
            push(K::FfnUpExperts, K::FfnDownExperts, FlowGroup::Ffn);
        }

        push(K::FfnDown, K::AttnNorm, FlowGroup::Layer);
        push(K::FfnDown, K::OutputNorm, FlowGroup::Output);
        push(K::OutputNorm, K::Output, FlowGroup::Output);
        edges
    }
}

// ============================================================================
// Flow edges
// ============================================================================

/// Group a flow edge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowGroup {
    /// Within the attention sub-block
    #[serde(rename = "attention_flow")]
    Attention,
    /// Within the feed-forward sub-block
    #[serde(rename = "ffn_flow")]
    Ffn,
    /// Residual from one block into the next
    #[serde(rename = "layer_flow")]
    Layer,
    /// From the last block into the output head
    #[serde(rename = "output_flow")]
    Output,
}

impl FlowGroup {
    /// All groups in display order
    pub const ALL: [FlowGroup; 4] = [Self::Attention, Self::Ffn, Self::Layer, Self::Output];

    /// Serialized group name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attention => "attention_flow",
            Self::Ffn => "ffn_flow",
            Self::Layer => "layer_flow",
            Self::Output => "output_flow",
        }
    }

    /// Arrow color for the group
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Attention => "#50c878",
            Self::Ffn => "#ff7f50",
            Self::Layer => "#ffffff",
            Self::Output => "#da70d6",
        }
    }
}

/// Static dependency link between two tensor kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Producer kind
    pub from: TensorKind,
    /// Consumer kind
    pub to: TensorKind,
    /// Edge group
    pub group: FlowGroup,
}

impl FlowEdge {
    /// Arrow color, taken from the edge's group
    #[must_use]
    pub fn color(&self) -> &'static str {
        self.group.color()
    }
}

// ============================================================================
// Profile store
// ============================================================================

static LLAMA_RULES: [&[NamingRule]; 3] = [&GLOBAL_RULES, &DENSE_BLOCK_RULES, &DENSE_NODE_RULES];
static PHI_RULES: [&[NamingRule]; 3] = [&GLOBAL_RULES, &FUSED_BLOCK_RULES, &FUSED_NODE_RULES];
static MISTRAL_RULES: [&[NamingRule]; 4] = [
    &GLOBAL_RULES,
    &DENSE_BLOCK_RULES,
    &EXPERT_RULES,
    &DENSE_NODE_RULES,
];

static PROFILES: [ModelProfile; 5] = [
    ModelProfile {
        family: "llama",
        description: "Llama / Llama 2 / Llama 3 (Meta)",
        variants: &[
            "llama-7b",
            "llama-13b",
            "llama-2-7b",
            "llama-2-13b",
            "llama-3-8b",
            "llama-3.1-8b",
            "llama-3.2-1b",
            "llama-3.2-3b",
        ],
        fused_qkv: false,
        mixture_of_experts: false,
        layer_counts: &[
            ("1b", 16),
            ("3b", 28),
            ("7b", 32),
            ("8b", 32),
            ("13b", 40),
            ("70b", 80),
        ],
        rule_tables: &LLAMA_RULES,
        tensor_types: &DENSE_TENSOR_TYPES,
        category_colors: &CATEGORY_COLORS,
    },
    ModelProfile {
        family: "granite",
        description: "Granite (IBM)",
        variants: &[
            "granite-3b",
            "granite-8b",
            "granite-20b",
            "granite-3-2b",
            "granite-3-8b",
        ],
        fused_qkv: false,
        mixture_of_experts: false,
        layer_counts: &[("2b", 24), ("3b", 32), ("8b", 32), ("20b", 52)],
        rule_tables: &LLAMA_RULES,
        tensor_types: &DENSE_TENSOR_TYPES,
        category_colors: &CATEGORY_COLORS,
    },
    ModelProfile {
        family: "qwen",
        description: "Qwen / Qwen 2 (Alibaba)",
        variants: &[
            "qwen-7b",
            "qwen-14b",
            "qwen2-0.5b",
            "qwen2-1.5b",
            "qwen2-7b",
            "qwen2.5-7b",
            "qwen2.5-14b",
        ],
        fused_qkv: false,
        mixture_of_experts: false,
        layer_counts: &[
            ("0.5b", 24),
            ("1.5b", 28),
            ("7b", 32),
            ("14b", 40),
            ("72b", 80),
        ],
        rule_tables: &LLAMA_RULES,
        tensor_types: &DENSE_TENSOR_TYPES,
        category_colors: &CATEGORY_COLORS,
    },
    ModelProfile {
        family: "phi",
        description: "Phi / Phi-2 / Phi-3 (Microsoft)",
        variants: &["phi-2", "phi-3-mini", "phi-3-small", "phi-3-medium"],
        fused_qkv: true,
        mixture_of_experts: false,
        layer_counts: &[("phi-2", 32), ("mini", 32), ("small", 32), ("medium", 40)],
        rule_tables: &PHI_RULES,
        tensor_types: &FUSED_TENSOR_TYPES,
        category_colors: &CATEGORY_COLORS,
    },
    ModelProfile {
        family: "mistral",
        description: "Mistral / Mixtral (Mistral AI)",
        variants: &["mistral-7b", "mixtral-8x7b", "mixtral-8x22b"],
        fused_qkv: false,
        mixture_of_experts: true,
        layer_counts: &[("7b", 32), ("8x7b", 32), ("8x22b", 56)],
        rule_tables: &MISTRAL_RULES,
        tensor_types: &DENSE_TENSOR_TYPES,
        category_colors: &CATEGORY_COLORS,
    },
];

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Look up the profile for a family label (case-insensitive)
///
/// # Errors
///
/// Returns `UnknownFamily` if the label is not one of [`SUPPORTED_FAMILIES`]
pub fn get_profile(family_label: &str) -> Result<&'static ModelProfile> {
    let family = normalize_label(family_label);
    PROFILES
        .iter()
        .find(|p| p.family == family)
        .ok_or_else(|| ObservarError::UnknownFamily(family_label.to_string()))
}

/// All built-in profiles in catalogue order
#[must_use]
pub fn all_profiles() -> &'static [ModelProfile] {
    &PROFILES
}
