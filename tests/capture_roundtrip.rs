//! Capture document round-trip tests
//!
//! Live sessions are saved to disk and reloaded; the reloaded capture must
//! carry the same trials, per-identity counts and first-seen order, and must
//! project to the same grid as the live capture.

use observar::capture::{Capture, CaptureConfig, CaptureSession};
use observar::hook::{EvalObserver, TensorHandle};
use observar::profile::get_profile;
use observar::projector::project;
use observar::query::AnalysisSession;
use observar::recorder::RecorderConfig;
use observar::testing::{NameStyle, TraceGenerator};
use observar::ObservarError;
use tempfile::TempDir;

fn recorded_capture(family: &str, size: &str, trials: u64) -> Capture {
    let config = CaptureConfig::new(format!("models/{family}-{size}.gguf"), family)
        .with_recorder(RecorderConfig::new().with_max_unresolved_names(4));
    let mut session = CaptureSession::new(config).expect("session");
    let profile = session.profile().clone();
    let layers = profile.layer_count(size).expect("size");

    for seed in 0..trials {
        let trace = TraceGenerator::new(seed)
            .with_tokens(2 + seed as usize)
            .with_noise_rate(0.25)
            .with_experts(true)
            .generate(&profile, layers);
        session.start_trial(format!("prompt {seed}")).expect("start");
        TraceGenerator::replay(&trace, &mut session);
        session.end_trial(format!("output {seed}")).expect("end");
    }
    session.into_capture()
}

// ============================================================================
// FILE ROUND-TRIP
// ============================================================================

#[test]
fn test_save_load_preserves_trials() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("capture.json");

    let capture = recorded_capture("llama", "1b", 3);
    capture.save_json(&path).expect("save");
    let reloaded = Capture::load_json(&path).expect("load");

    assert_eq!(reloaded.model_path(), capture.model_path());
    assert_eq!(reloaded.model_family(), "llama");
    assert_eq!(reloaded.trials().len(), 3);
    for (a, b) in capture.trials().iter().zip(reloaded.trials()) {
        assert_eq!(a.prompt(), b.prompt());
        assert_eq!(a.generated_text(), b.generated_text());
        assert_eq!(a.duration_ms(), b.duration_ms());
        assert_eq!(a.unresolved_count(), b.unresolved_count());
        assert_eq!(a.tensor_stats(), b.tensor_stats());
    }
}

#[test]
fn test_reloaded_capture_projects_identically() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("mixtral.json");

    let capture = recorded_capture("mistral", "8x7b", 2);
    capture.save_json(&path).expect("save");
    let reloaded = Capture::load_json(&path).expect("load");

    let mistral = get_profile("mistral").expect("profile");
    let live = project(&capture, mistral, "8x7b").expect("project");
    let cold = project(&reloaded, mistral, "8x7b").expect("project");
    assert_eq!(live, cold);
}

#[test]
fn test_document_field_names() {
    let capture = recorded_capture("phi", "mini", 1);
    let json = capture.to_json().expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("value");

    let trial = &value["trials"][0];
    for field in ["prompt", "generated_text", "duration_ms", "unresolved_count", "tensor_counts"] {
        assert!(trial.get(field).is_some(), "missing {field}");
    }
    let stat = &trial["tensor_counts"][0];
    for field in ["name", "layer", "kind", "category", "count", "order"] {
        assert!(stat.get(field).is_some(), "missing {field}");
    }
    assert_eq!(stat["layer"], -1);
    assert_eq!(stat["kind"], "token_embd");
    assert_eq!(stat["category"], "embedding");
}

// ============================================================================
// RELOAD WITHOUT RE-RESOLUTION
// ============================================================================

#[test]
fn test_reload_keeps_embedded_identity() {
    // A name the current rules would not resolve still reloads as stored
    let json = r#"{
        "model_path": "m.gguf",
        "model_family": "llama",
        "trials": [{
            "prompt": "p",
            "generated_text": "g",
            "duration_ms": 1.0,
            "unresolved_count": 2,
            "tensor_counts": [
                {"name": "blk.3.ssm_in.weight", "layer": 3, "kind": "ssm_in",
                 "category": "feedforward", "count": 7, "order": 0}
            ]
        }]
    }"#;
    let capture = Capture::from_json(json).expect("load");
    let stat = &capture.trials()[0].tensor_stats()[0];
    assert_eq!(stat.kind.as_str(), "ssm_in");
    assert_eq!(stat.count, 7);
    assert_eq!(capture.trials()[0].unresolved_count(), 2);
}

#[test]
fn test_load_file_missing_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let mut session = AnalysisSession::new();
    let err = session.load_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ObservarError::Io(_)));
    assert!(!session.status().loaded);
}

#[test]
fn test_load_invalid_file_keeps_previous() {
    let dir = TempDir::new().expect("tempdir");
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    recorded_capture("qwen", "0.5b", 1).save_json(&good).expect("save");
    std::fs::write(&bad, r#"{"model_path": "x", "trials": []}"#).expect("write");

    let mut session = AnalysisSession::new();
    session.load_file(&good).expect("load good");
    assert!(matches!(
        session.load_file(&bad),
        Err(ObservarError::InvalidDocument(_))
    ));
    assert_eq!(
        session.status().model_path.as_deref(),
        Some("models/qwen-0.5b.gguf")
    );
}

// ============================================================================
// GRAPH NODE NAMES
// ============================================================================

#[test]
fn test_graph_node_capture_matches_weight_capture() {
    let llama = get_profile("llama").expect("profile");
    let mut counts = Vec::new();
    for style in [NameStyle::Weights, NameStyle::GraphNodes] {
        let mut session =
            CaptureSession::new(CaptureConfig::new("m.gguf", "llama")).expect("session");
        let trace = TraceGenerator::new(5)
            .with_style(style)
            .with_tokens(3)
            .generate(llama, 4);
        session.start_trial("p").expect("start");
        TraceGenerator::replay(&trace, &mut session);
        session.end_trial("g").expect("end");

        let grid = project(session.capture(), llama, "1b").expect("project");
        counts.push(
            grid.grid
                .iter()
                .map(|c| (c.layer, c.kind.clone(), c.raw_count))
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(counts[0], counts[1]);
}

#[test]
fn test_annotated_node_names_resolve() {
    let mut session = CaptureSession::new(CaptureConfig::new("m.gguf", "llama")).expect("session");
    session.start_trial("p").expect("start");
    for name in ["attn_norm-0 (reshaped)", "Qcur-0 (view)", "Qcur-0"] {
        session.on_eval(&TensorHandle::new(name, 8), false);
    }
    let trial = session.end_trial("g").expect("end");
    assert_eq!(trial.unresolved_count(), 0);
    assert_eq!(trial.tensor_stats().len(), 2);
    assert_eq!(trial.tensor_stats()[1].count, 2);
}
