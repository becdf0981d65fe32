//! Property-based tests using proptest
//!
//! Invariants of the resolution and aggregation pipeline:
//! - Resolution is total and deterministic
//! - Resolution ignores parameter suffixes
//! - Capture documents round-trip counts and order exactly
//! - Projection intensities are normalized and reproducible

use observar::capture::{Capture, CaptureConfig, CaptureSession};
use observar::profile::{all_profiles, get_profile, OUTPUT_NORM_LAYER};
use observar::projector::project;
use observar::recorder::RawObservation;
use observar::resolve::{resolve, Resolution};
use proptest::prelude::*;

const BLOCK_COMPONENTS: [&str; 12] = [
    "attn_norm", "attn_q", "attn_k", "attn_v", "attn_qkv", "attn_output", "ffn_norm", "ffn_gate",
    "ffn_up", "ffn_down", "ffn_gate_inp", "ffn_up_exps",
];

fn family() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["llama", "granite", "qwen", "phi", "mistral"])
}

fn block_name() -> impl Strategy<Value = String> {
    (0u32..200, prop::sample::select(BLOCK_COMPONENTS.to_vec()))
        .prop_map(|(layer, component)| format!("blk.{layer}.{component}.weight"))
}

/// Names an engine might plausibly report, plus noise
fn raw_name() -> impl Strategy<Value = String> {
    prop_oneof![
        block_name(),
        (0u32..64, prop::sample::select(vec!["Qcur", "Kcur", "ffn_out", "kq", "l_out"]))
            .prop_map(|(layer, stem)| format!("{stem}-{layer}")),
        prop::sample::select(vec![
            "token_embd.weight".to_string(),
            "output_norm.weight".to_string(),
            "output.weight".to_string(),
            "result_output".to_string(),
        ]),
        ".*",
    ]
}

// ============================================================================
// RESOLUTION PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Same (name, profile) always yields the same resolution
    #[test]
    fn prop_resolve_deterministic(name in raw_name(), fam in family()) {
        let profile = get_profile(fam).expect("profile");
        prop_assert_eq!(resolve(&name, profile), resolve(&name, profile));
    }

    /// Arbitrary input never panics; unresolved keeps the raw name
    #[test]
    fn prop_resolve_total(name in ".*") {
        for profile in all_profiles() {
            match resolve(&name, profile) {
                Resolution::Resolved(id) => {
                    prop_assert!(id.layer >= -1 && id.layer <= 999);
                    prop_assert!(id.layer < OUTPUT_NORM_LAYER || id.kind.fixed_layer() == Some(id.layer));
                },
                Resolution::Unresolved(raw) => prop_assert_eq!(raw, name.clone()),
            }
        }
    }

    /// Block names resolve to their own index, with or without a suffix
    #[test]
    fn prop_block_layer_and_suffix(name in block_name(), fam in family()) {
        let profile = get_profile(fam).expect("profile");
        let bare = name.trim_end_matches(".weight");
        let bias = format!("{bare}.bias");
        let weight = resolve(&name, profile).identity().cloned();
        prop_assert_eq!(&weight, &resolve(bare, profile).identity().cloned());
        prop_assert_eq!(&weight, &resolve(&bias, profile).identity().cloned());

        if let Some(id) = weight {
            let layer: i32 = bare
                .split('.')
                .nth(1)
                .and_then(|s| s.parse().ok())
                .expect("layer");
            prop_assert_eq!(id.layer, layer);
        }
    }

    // ========================================================================
    // CAPTURE PROPERTIES
    // ========================================================================

    /// Document round-trip preserves trials, counts and order exactly
    #[test]
    fn prop_document_roundtrip(
        trials in prop::collection::vec(prop::collection::vec(raw_name(), 0..60), 0..4),
        fam in family(),
    ) {
        let mut session = CaptureSession::new(CaptureConfig::new("m.gguf", fam)).expect("session");
        for (i, names) in trials.iter().enumerate() {
            session.start_trial(format!("p{i}")).expect("start");
            for name in names {
                session.record(&RawObservation::new(name, 1));
            }
            session.end_trial("g").expect("end");
        }
        let capture = session.into_capture();
        let reloaded = Capture::from_document(capture.to_document()).expect("reload");

        prop_assert_eq!(reloaded.trials().len(), trials.len());
        for (a, b) in capture.trials().iter().zip(reloaded.trials()) {
            prop_assert_eq!(a.tensor_stats(), b.tensor_stats());
            prop_assert_eq!(a.unresolved_count(), b.unresolved_count());
        }
    }

    /// Counts sum to resolved events; orders are 0..n in first-seen order
    #[test]
    fn prop_counts_match_events(names in prop::collection::vec(raw_name(), 0..80)) {
        let llama = get_profile("llama").expect("profile");
        let mut session = CaptureSession::new(CaptureConfig::new("m.gguf", "llama")).expect("session");
        session.start_trial("p").expect("start");
        for name in &names {
            session.record(&RawObservation::new(name, 0));
        }
        let trial = session.end_trial("g").expect("end");

        let resolved = names.iter().filter(|n| resolve(n, llama).is_resolved()).count() as u64;
        let counted: u64 = trial.tensor_stats().iter().map(|s| s.count).sum();
        prop_assert_eq!(counted, resolved);
        prop_assert_eq!(trial.unresolved_count(), names.len() as u64 - resolved);
        for (i, stat) in trial.tensor_stats().iter().enumerate() {
            prop_assert_eq!(stat.order, i as u64);
        }
    }

    // ========================================================================
    // PROJECTION PROPERTIES
    // ========================================================================

    /// Intensities lie in [0, 1]; the max cell has intensity 1; all zero when empty
    #[test]
    fn prop_projection_normalized(
        names in prop::collection::vec(raw_name(), 0..120),
        size in prop::sample::select(vec!["1b", "3b", "7b"]),
    ) {
        let llama = get_profile("llama").expect("profile");
        let mut session = CaptureSession::new(CaptureConfig::new("m.gguf", "llama")).expect("session");
        session.start_trial("p").expect("start");
        for name in &names {
            session.record(&RawObservation::new(name, 0));
        }
        session.end_trial("g").expect("end");

        let result = project(session.capture(), llama, size).expect("project");
        for cell in &result.grid {
            prop_assert!((0.0..=1.0).contains(&cell.intensity));
        }
        if result.max_count > 0 {
            prop_assert!(result.grid.iter().any(|c| c.intensity == 1.0));
        } else {
            prop_assert!(result.grid.iter().all(|c| c.intensity == 0.0));
        }

        let total = llama.layer_count(size).expect("size") as i32;
        for layer in (-1..total).chain([998, 999]) {
            prop_assert!(result.layers.contains(&layer), "layer {} missing", layer);
            prop_assert!(result.cells_for_layer(layer).next().is_some());
        }

        // Projection is reproducible
        let again = project(session.capture(), llama, size).expect("project");
        prop_assert_eq!(result, again);
    }
}
