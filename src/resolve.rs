//! Tensor identity resolution
//!
//! Turns a raw tensor name into a [`ResolvedIdentity`] using a profile's
//! naming rules. The name is parsed once into a structural form (global,
//! block, per-expert block, or graph node) without allocating, then the rules
//! are tried in priority order. Anything that does not parse or match comes
//! back as [`Resolution::Unresolved`]; resolution never fails.
//!
//! ```rust
//! use observar::profile::{get_profile, TensorKind};
//! use observar::resolve::resolve;
//!
//! let llama = get_profile("llama").unwrap();
//! let id = resolve("blk.3.attn_q.weight", llama).identity().unwrap().clone();
//! assert_eq!(id.layer, 3);
//! assert_eq!(id.kind, TensorKind::AttnQ);
//! ```

use serde::{Deserialize, Serialize};

use crate::profile::{Category, ModelProfile, NamePattern, TensorKind, OUTPUT_NORM_LAYER};

/// Normalized semantic identity of a tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// Layer index (`-1`, `0..N-1`, `998`, `999`)
    pub layer: i32,
    /// Tensor kind
    pub kind: TensorKind,
    /// Category
    pub category: Category,
}

/// Outcome of resolving one raw name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A rule matched
    Resolved(ResolvedIdentity),
    /// No rule matched; carries the original name
    Unresolved(String),
}

impl Resolution {
    /// The identity, if resolved
    #[must_use]
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved(_) => None,
        }
    }

    /// Whether a rule matched
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Structural form of a raw tensor name, borrowing from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParsedName<'a> {
    /// No layer index: `token_embd`, `output_norm.weight`, `result_output`
    Global(&'a str),
    /// `blk.{layer}.{component}[.weight|.bias]`
    Block { layer: u32, component: &'a str },
    /// `blk.{layer}.{component}.{expert}[.weight|.bias]`
    BlockExpert { layer: u32, component: &'a str },
    /// `{stem}-{layer}`
    Node { stem: &'a str, layer: u32 },
}

fn strip_param_suffix(s: &str) -> &str {
    s.strip_suffix(".weight")
        .or_else(|| s.strip_suffix(".bias"))
        .unwrap_or(s)
}

fn parse_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = s.parse().ok()?;
    // Block indices must stay below the post-stack sentinels
    (i64::from(index) < i64::from(OUTPUT_NORM_LAYER)).then_some(index)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parse a raw name into its structural form
///
/// Trailing view annotations such as `"attn_norm-0 (reshaped)"` are ignored,
/// including chains like `"Kcur-0 (view) (permuted)"`.
pub(crate) fn parse_name(raw: &str) -> Option<ParsedName<'_>> {
    let mut name = raw.trim();
    while name.ends_with(')') {
        match name.rfind(" (") {
            Some(pos) => name = name[..pos].trim_end(),
            None => break,
        }
    }
    if name.is_empty() {
        return None;
    }

    if let Some(rest) = name.strip_prefix("blk.") {
        let (layer, tail) = rest.split_once('.')?;
        let layer = parse_index(layer)?;
        let tail = strip_param_suffix(tail);
        return match tail.rsplit_once('.') {
            None if is_token(tail) => Some(ParsedName::Block {
                layer,
                component: tail,
            }),
            Some((component, expert)) if is_token(component) && parse_index(expert).is_some() => {
                Some(ParsedName::BlockExpert { layer, component })
            },
            _ => None,
        };
    }

    if let Some((stem, layer)) = name.rsplit_once('-') {
        if is_token(stem) {
            return parse_index(layer).map(|layer| ParsedName::Node { stem, layer });
        }
        return None;
    }

    let stem = strip_param_suffix(name);
    is_token(stem).then_some(ParsedName::Global(stem))
}

impl NamePattern {
    /// Layer index if this pattern matches the parsed name
    fn match_layer(&self, kind: &TensorKind, parsed: &ParsedName<'_>) -> Option<i32> {
        match (*self, *parsed) {
            (Self::Global(token), ParsedName::Global(stem)) if token == stem => kind.fixed_layer(),
            (Self::Block(token), ParsedName::Block { layer, component })
            | (Self::BlockExpert(token), ParsedName::BlockExpert { layer, component })
                if token == component =>
            {
                i32::try_from(layer).ok()
            },
            (Self::Node(token), ParsedName::Node { stem, layer }) if token == stem => {
                i32::try_from(layer).ok()
            },
            _ => None,
        }
    }
}

/// Resolve a raw tensor name against a profile
///
/// Pure function of `(raw_name, profile)`; the first matching rule wins.
#[must_use]
pub fn resolve(raw_name: &str, profile: &ModelProfile) -> Resolution {
    match resolve_identity(raw_name, profile) {
        Some(id) => Resolution::Resolved(id),
        None => Resolution::Unresolved(raw_name.to_string()),
    }
}

/// Allocation-free variant of [`resolve`] for the recording hot path
#[must_use]
pub fn resolve_identity(raw_name: &str, profile: &ModelProfile) -> Option<ResolvedIdentity> {
    let parsed = parse_name(raw_name)?;
    profile.rules().find_map(|rule| {
        rule.pattern
            .match_layer(&rule.kind, &parsed)
            .map(|layer| ResolvedIdentity {
                layer,
                kind: rule.kind.clone(),
                category: rule.category,
            })
    })
}
