//! Grid/flow projection of captured trials
//!
//! Pure, stateless transformation from sealed trial stats plus a profile to a
//! layer-ordered grid of intensity-normalized cells. The layer axis always
//! contains `-1`, every block in `0..layer_count`, `998` and `999`, with
//! zero-count cells for the profile's expected kinds so absence is visible.
//!
//! Multiple trials are merged by summing counts per identity before
//! normalizing. Output ordering never depends on hash iteration order, so
//! projecting the same inputs twice yields identical results.

// Module-level clippy allows
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::capture::{Capture, Trial};
use crate::error::{ObservarError, Result};
use crate::profile::{
    Category, FlowEdge, FlowGroup, ModelProfile, TensorKind, EMBEDDING_LAYER, OUTPUT_LAYER,
    OUTPUT_NORM_LAYER,
};
use crate::recorder::TensorStat;
use crate::resolve::ResolvedIdentity;

/// One visualization-ready cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    /// Layer index
    pub layer: i32,
    /// Tensor kind
    pub kind: TensorKind,
    /// Category
    pub category: Category,
    /// `raw_count / max_count`, in `[0, 1]`
    pub intensity: f64,
    /// Category color from the profile
    pub color: &'static str,
    /// Observation count (summed across merged trials)
    pub raw_count: u64,
    /// Raw name of the first observation, if observed
    pub name: Option<String>,
    /// Merged first-seen order, if observed
    pub order: Option<u64>,
}

/// Projection output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridResult {
    /// Family of the profile used
    pub model_family: String,
    /// Size label used for the layer count
    pub model_size: String,
    /// Cells ordered by layer axis, then canonical kind order
    pub grid: Vec<GridCell>,
    /// Static flow edges of the profile
    pub flows: Vec<FlowEdge>,
    /// Transformer block count for the size label
    pub total_layers: usize,
    /// Layer axis in display order
    pub layers: Vec<i32>,
    /// Kinds present in the grid, canonical order
    pub tensor_types: Vec<String>,
    /// Largest cell count (0 if nothing observed)
    pub max_count: u64,
    /// Category colors
    pub colors: BTreeMap<String, &'static str>,
    /// Flow group colors
    pub flow_colors: BTreeMap<String, &'static str>,
}

impl GridResult {
    /// Cells of one layer
    pub fn cells_for_layer(&self, layer: i32) -> impl Iterator<Item = &GridCell> + '_ {
        self.grid.iter().filter(move |c| c.layer == layer)
    }

    /// Summed counts per layer, in axis order
    pub fn layer_totals(&self) -> Vec<(i32, u64)> {
        self.layers
            .iter()
            .map(|&layer| (layer, self.cells_for_layer(layer).map(|c| c.raw_count).sum()))
            .collect()
    }

    /// Cell for an exact layer and kind
    pub fn cell(&self, layer: i32, kind: &TensorKind) -> Option<&GridCell> {
        self.grid.iter().find(|c| c.layer == layer && &c.kind == kind)
    }
}

/// What to project
#[derive(Debug, Clone, Copy)]
pub enum ProjectionSource<'a> {
    /// One sealed trial
    Trial(&'a Trial),
    /// All trials of a capture, merged
    Capture(&'a Capture),
    /// Bare stats in computation order
    Stats(&'a [TensorStat]),
}

impl<'a> From<&'a Trial> for ProjectionSource<'a> {
    fn from(trial: &'a Trial) -> Self {
        Self::Trial(trial)
    }
}

impl<'a> From<&'a Capture> for ProjectionSource<'a> {
    fn from(capture: &'a Capture) -> Self {
        Self::Capture(capture)
    }
}

impl<'a> From<&'a [TensorStat]> for ProjectionSource<'a> {
    fn from(stats: &'a [TensorStat]) -> Self {
        Self::Stats(stats)
    }
}

#[derive(Debug)]
struct MergedStat<'a> {
    identity: ResolvedIdentity,
    name: &'a str,
    count: u64,
    order: u64,
}

/// Sum counts per `(layer, kind)`; the first-seen category wins on conflict
fn merge<'a>(groups: impl Iterator<Item = &'a [TensorStat]>) -> Vec<MergedStat<'a>> {
    let mut index: HashMap<(i32, &'a TensorKind), usize> = HashMap::new();
    let mut merged: Vec<MergedStat<'a>> = Vec::new();
    for stats in groups {
        for stat in stats {
            if let Some(&slot) = index.get(&(stat.layer, &stat.kind)) {
                merged[slot].count = merged[slot].count.saturating_add(stat.count);
                continue;
            }
            index.insert((stat.layer, &stat.kind), merged.len());
            merged.push(MergedStat {
                identity: stat.identity(),
                name: &stat.name,
                count: stat.count,
                order: merged.len() as u64,
            });
        }
    }
    merged
}

impl<'a> ProjectionSource<'a> {
    fn merged(&self) -> Vec<MergedStat<'a>> {
        match *self {
            Self::Trial(trial) => merge(std::iter::once(trial.tensor_stats())),
            Self::Capture(capture) => merge(capture.trials().iter().map(Trial::tensor_stats)),
            Self::Stats(stats) => merge(std::iter::once(stats)),
        }
    }
}

static EMBEDDING_KINDS: [TensorKind; 1] = [TensorKind::Embedding];
static OUTPUT_NORM_KINDS: [TensorKind; 1] = [TensorKind::OutputNorm];
static OUTPUT_KINDS: [TensorKind; 1] = [TensorKind::Output];

fn expected_kinds(layer: i32, profile: &ModelProfile) -> &'static [TensorKind] {
    match layer {
        EMBEDDING_LAYER => &EMBEDDING_KINDS,
        OUTPUT_NORM_LAYER => &OUTPUT_NORM_KINDS,
        OUTPUT_LAYER => &OUTPUT_KINDS,
        _ => profile.tensor_types,
    }
}

fn cell_sort_key(cell: &GridCell) -> (usize, String, Category) {
    (
        cell.kind.canonical_rank(),
        cell.kind.as_str().to_string(),
        cell.category,
    )
}

/// Project trial stats onto the profile's layer grid
///
/// # Errors
///
/// Returns `UnknownSize` if `size_label` is not in the profile's table, or
/// `InvalidDocument` if a stat's layer lies outside `-1..=999`
pub fn project<'a>(
    source: impl Into<ProjectionSource<'a>>,
    profile: &ModelProfile,
    size_label: &str,
) -> Result<GridResult> {
    let total_layers = profile.layer_count(size_label)?;
    let merged = source.into().merged();
    if let Some(stat) = merged
        .iter()
        .find(|s| !(EMBEDDING_LAYER..=OUTPUT_LAYER).contains(&s.identity.layer))
    {
        return Err(ObservarError::InvalidDocument(format!(
            "tensor '{}' has layer {} outside {EMBEDDING_LAYER}..={OUTPUT_LAYER}",
            stat.name, stat.identity.layer
        )));
    }

    let mut by_layer: BTreeMap<i32, Vec<&MergedStat<'_>>> = BTreeMap::new();
    for stat in &merged {
        by_layer.entry(stat.identity.layer).or_default().push(stat);
    }

    let block_end = i32::try_from(total_layers).unwrap_or(OUTPUT_NORM_LAYER);
    let overflow: Vec<i32> = by_layer
        .keys()
        .copied()
        .filter(|&l| l >= block_end && l < OUTPUT_NORM_LAYER)
        .collect();
    if !overflow.is_empty() {
        warn!(
            family = profile.family,
            size = size_label,
            total_layers,
            first = overflow[0],
            last = overflow[overflow.len() - 1],
            "observed block layers beyond layer count"
        );
    }

    let mut layers = Vec::with_capacity(total_layers + overflow.len() + 3);
    layers.push(EMBEDDING_LAYER);
    layers.extend(0..block_end.min(OUTPUT_NORM_LAYER));
    layers.extend(overflow);
    layers.push(OUTPUT_NORM_LAYER);
    layers.push(OUTPUT_LAYER);

    let mut grid = Vec::new();
    for &layer in &layers {
        let observed = by_layer.get(&layer).map_or(&[][..], Vec::as_slice);
        let mut cells: Vec<GridCell> = observed
            .iter()
            .map(|stat| GridCell {
                layer,
                kind: stat.identity.kind.clone(),
                category: stat.identity.category,
                intensity: 0.0,
                color: profile.color(stat.identity.category),
                raw_count: stat.count,
                name: Some(stat.name.to_string()),
                order: Some(stat.order),
            })
            .collect();

        for kind in expected_kinds(layer, profile) {
            if observed.iter().any(|s| &s.identity.kind == kind) {
                continue;
            }
            if let Some(category) = kind.default_category() {
                cells.push(GridCell {
                    layer,
                    kind: kind.clone(),
                    category,
                    intensity: 0.0,
                    color: profile.color(category),
                    raw_count: 0,
                    name: None,
                    order: None,
                });
            }
        }

        cells.sort_by_cached_key(cell_sort_key);
        grid.extend(cells);
    }

    let max_count = grid.iter().map(|c| c.raw_count).max().unwrap_or(0);
    if max_count > 0 {
        for cell in &mut grid {
            cell.intensity = cell.raw_count as f64 / max_count as f64;
        }
    }

    let tensor_types = grid
        .iter()
        .map(|c| (c.kind.canonical_rank(), c.kind.as_str().to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|(_, name)| name)
        .collect();

    let colors = Category::ALL
        .iter()
        .map(|&c| (c.as_str().to_string(), profile.color(c)))
        .collect();
    let flow_colors = FlowGroup::ALL
        .iter()
        .map(|g| (g.as_str().to_string(), g.color()))
        .collect();

    Ok(GridResult {
        model_family: profile.family.to_string(),
        model_size: size_label.to_string(),
        grid,
        flows: profile.flow_edges(),
        total_layers,
        layers,
        tensor_types,
        max_count,
        colors,
        flow_colors,
    })
}
