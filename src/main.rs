//! Observar CLI - tensor observation captures for transformer inference
//!
//! # Commands
//!
//! - `models` - List supported model families
//! - `resolve` - Resolve raw tensor names against a family
//! - `analyze` - Project a saved capture onto the layer grid
//! - `flows` - Show static flow edges of a family
//! - `simulate` - Record a synthetic inference and save the capture

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use observar::{
    capture::{CaptureConfig, CaptureSession},
    error::Result,
    profile::{get_profile, EMBEDDING_LAYER, OUTPUT_LAYER, OUTPUT_NORM_LAYER},
    projector::GridResult,
    query::{self, AnalysisSession},
    recorder::{RecorderConfig, DEFAULT_MAX_UNRESOLVED_NAMES},
    resolve::{resolve, Resolution},
    testing::{NameStyle, TraceGenerator},
};
use serde::Serialize;
use tracing::Level;

/// Observar - tensor identity resolution and aggregation
#[derive(Parser)]
#[command(name = "observar")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    /// Declared weight names (blk.N.attn_q.weight)
    Weights,
    /// Compute-graph node names (Qcur-N)
    Nodes,
}

impl From<Style> for NameStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Weights => NameStyle::Weights,
            Style::Nodes => NameStyle::GraphNodes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List supported model families, sizes and colors
    Models {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Resolve raw tensor names
    ///
    /// Examples:
    ///   observar resolve --family llama blk.0.attn_q.weight Qcur-3
    Resolve {
        /// Model family
        #[arg(short = 'F', long)]
        family: String,

        /// Raw tensor names
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
    /// Project a saved capture onto the layer grid
    ///
    /// Examples:
    ///   observar analyze capture.json --size 1b
    ///   observar analyze capture.json --family phi --size mini --trial 0
    Analyze {
        /// Capture document
        #[arg(value_name = "CAPTURE")]
        capture: PathBuf,

        /// Model family (defaults to the capture's family)
        #[arg(short = 'F', long)]
        family: Option<String>,

        /// Model size label (e.g. 7b, mini, 8x7b)
        #[arg(short, long)]
        size: String,

        /// Project a single trial instead of merging all trials
        #[arg(short, long)]
        trial: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show static flow edges of a family
    Flows {
        /// Model family
        #[arg(short = 'F', long)]
        family: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Record a synthetic inference through a live capture session
    Simulate {
        /// Model family
        #[arg(short = 'F', long)]
        family: String,

        /// Model size label
        #[arg(short, long)]
        size: String,

        /// Output capture document
        #[arg(short, long)]
        output: PathBuf,

        /// Number of trials
        #[arg(long, default_value = "1")]
        trials: usize,

        /// Generated tokens per trial
        #[arg(short = 'n', long, default_value = "8")]
        tokens: usize,

        /// RNG seed (trial i uses seed + i)
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Reported naming style
        #[arg(long, value_enum, default_value = "weights")]
        style: Style,

        /// Probability of an unresolvable event after each block
        #[arg(long, default_value = "0.0")]
        noise: f64,

        /// Distinct unresolved names kept per trial
        #[arg(long, default_value_t = DEFAULT_MAX_UNRESOLVED_NAMES)]
        max_unresolved: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.command {
        Commands::Models { format } => list_models(format)?,
        Commands::Resolve { family, names } => resolve_names(&family, &names)?,
        Commands::Analyze {
            capture,
            family,
            size,
            trial,
            format,
        } => {
            let mut session = AnalysisSession::new();
            let loaded = session.load_file(&capture)?;
            let family = family.unwrap_or_else(|| loaded.model_family().to_string());
            let result = session.analyze(&family, &size, trial)?;
            match format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => print_grid(&result),
            }
        },
        Commands::Flows { family, format } => {
            let edges = query::flows(&family)?;
            match format {
                OutputFormat::Json => print_json(&edges)?,
                OutputFormat::Table => {
                    for edge in &edges {
                        println!(
                            "{:<16} -> {:<16} {:<15} {}",
                            edge.from.as_str(),
                            edge.to.as_str(),
                            edge.group.as_str(),
                            edge.color()
                        );
                    }
                },
            }
        },
        Commands::Simulate {
            family,
            size,
            output,
            trials,
            tokens,
            seed,
            style,
            noise,
            max_unresolved,
        } => {
            let config = CaptureConfig::new(format!("synthetic://{family}-{size}"), family)
                .with_recorder(RecorderConfig::new().with_max_unresolved_names(max_unresolved));
            let mut session = CaptureSession::new(config)?;
            let profile = session.profile().clone();
            let layer_count = profile.layer_count(&size)?;

            for i in 0..trials {
                let trace = TraceGenerator::new(seed.wrapping_add(i as u64))
                    .with_tokens(tokens)
                    .with_style(style.into())
                    .with_noise_rate(noise)
                    .with_experts(true)
                    .generate(&profile, layer_count);
                session.start_trial(format!("synthetic prompt {i}"))?;
                TraceGenerator::replay(&trace, &mut session);
                session.end_trial(format!("{tokens} synthetic tokens"))?;
            }

            let stats = session.statistics();
            session.capture().save_json(&output)?;
            println!("Saved {} trial(s) to {}", stats.total_trials, output.display());
            println!("  family:          {}", stats.model_family);
            println!("  callbacks:       {}", stats.total_callbacks);
            println!("  unique tensors:  {}", stats.unique_tensors);
        },
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_models(format: OutputFormat) -> Result<()> {
    let models = query::models();
    if let OutputFormat::Json = format {
        return print_json(&models);
    }

    println!("{:<10} {:<6} {:<4} SIZES", "FAMILY", "QKV", "MOE");
    for model in &models {
        let sizes: Vec<String> = model
            .layer_counts
            .iter()
            .map(|(size, layers)| format!("{size}({layers})"))
            .collect();
        println!(
            "{:<10} {:<6} {:<4} {}",
            model.family,
            if model.fused_qkv { "fused" } else { "split" },
            if model.mixture_of_experts { "yes" } else { "no" },
            sizes.join(" ")
        );
    }
    println!();
    let colors = query::colors();
    for (category, color) in colors.categories.iter().chain(colors.flows.iter()) {
        println!("  {:<15} {}", category, color);
    }
    Ok(())
}

fn resolve_names(family: &str, names: &[String]) -> Result<()> {
    let profile = get_profile(family)?;
    for name in names {
        match resolve(name, profile) {
            Resolution::Resolved(id) => println!(
                "{:<32} layer={:<4} kind={:<16} category={}",
                name,
                id.layer,
                id.kind.as_str(),
                id.category
            ),
            Resolution::Unresolved(raw) => println!("{:<32} UNRESOLVED", raw),
        }
    }
    Ok(())
}

fn layer_label(layer: i32) -> String {
    match layer {
        EMBEDDING_LAYER => "embd".to_string(),
        OUTPUT_NORM_LAYER => "norm".to_string(),
        OUTPUT_LAYER => "out".to_string(),
        n => n.to_string(),
    }
}

fn print_grid(result: &GridResult) {
    println!(
        "{} {} ({} layers, max count {})",
        result.model_family, result.model_size, result.total_layers, result.max_count
    );
    println!("kinds: {}", result.tensor_types.join(", "));
    println!();
    for (layer, total) in result.layer_totals() {
        let cells: Vec<String> = result
            .cells_for_layer(layer)
            .map(|c| format!("{}={:.2}", c.kind.as_str(), c.intensity))
            .collect();
        println!("{:>5} {:>8}  {}", layer_label(layer), total, cells.join(" "));
    }
}
