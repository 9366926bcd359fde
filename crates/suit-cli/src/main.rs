//! Site suitability front end: load processed GeoTIFF layers, weigh them,
//! write the weighted-sum surface as a GeoTIFF (plus an optional PNG preview).

mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use suit_core::{
    GeoTiffCodec, RasterSource, Session, SessionConfig, SessionError, WeightAssignment,
    WeightError,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "suit",
    about = "Calculate weighted suitability scores from processed raster layers"
)]
struct Args {
    /// Processed raster layers (GeoTIFF). Only band 1 is used.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Weight for a layer, as FILE_NAME=WEIGHT (repeatable). Omit to weigh all
    /// layers equally.
    #[arg(short, long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,

    /// Output GeoTIFF
    #[arg(short, long, default_value = "suitability.tif")]
    output: PathBuf,

    /// Also write a colour-mapped PNG preview here
    #[arg(long)]
    preview: Option<PathBuf>,

    /// JSON session config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of decoded layers kept in the cache
    #[arg(long)]
    cache_capacity: Option<usize>,
}

fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FILE_NAME=WEIGHT, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing layer name in `{s}`"));
    }
    let weight: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight `{value}`: {e}"))?;
    Ok((name.to_string(), weight))
}

/// Human-readable description of the constraint a weight assignment broke.
fn describe_weight_error(err: &WeightError) -> String {
    match err {
        WeightError::Incomplete { missing, unexpected } => {
            let mut parts = Vec::new();
            if !missing.is_empty() {
                parts.push(format!("no weight given for {}", missing.join(", ")));
            }
            if !unexpected.is_empty() {
                parts.push(format!("weights given for layers that are not loaded: {}", unexpected.join(", ")));
            }
            parts.join("; ")
        }
        WeightError::OutOfRange { id, weight } => {
            format!("weight for {id} is {weight}; weights must be between 0 and 1")
        }
        WeightError::NotNormalized { sum } => {
            format!("the sum of weights is {sum:.4}; it should equal 1. Please adjust them")
        }
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(cap) = args.cache_capacity {
        config.cache_capacity = cap;
    }
    Ok(config)
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    debug!(?config, "session config");
    let mut session = Session::new(config, GeoTiffCodec::new());

    // Step 1: load layers. Unreadable files are reported and skipped.
    let mut sources = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        match RasterSource::from_path(path) {
            Ok(source) => sources.push(source),
            Err(e) => eprintln!("Error loading {}: {e}", path.display()),
        }
    }
    let report = session.upload(&sources);
    for id in &report.loaded {
        if let Some(layer) = session.store().get(id) {
            let crs = layer
                .metadata
                .epsg()
                .map_or_else(|| "unknown".to_string(), |code| format!("EPSG:{code}"));
            println!("Loaded: {id} | Shape: {:?} | CRS: {crs}", layer.shape());
        }
    }
    for id in &report.shadowed {
        eprintln!("Warning: {id} was given more than once; using the last copy");
    }
    for failure in &report.failures {
        eprintln!("Error loading {}: {}", failure.id, failure.reason);
    }
    if session.store().is_empty() {
        bail!("no layers loaded; provide at least one readable GeoTIFF");
    }

    // Step 2: weights.
    let weights = if args.weights.is_empty() {
        session.default_weights()
    } else {
        args.weights.iter().cloned().collect::<WeightAssignment>()
    };
    for (id, w) in weights.iter() {
        println!("Weight for {id}: {w}");
    }
    session.set_weights(weights);

    // Step 3: suitability scores.
    let grid = match session.calculate() {
        Ok(grid) => grid,
        Err(SessionError::Weights(e)) => bail!(describe_weight_error(&e)),
        Err(e) => return Err(e).context("Suitability calculation failed"),
    };
    match (grid.min_value(), grid.max_value()) {
        (Some(lo), Some(hi)) => println!("Suitability scores calculated: range {lo} .. {hi}"),
        _ => println!("Suitability scores calculated: no finite cells"),
    }

    if let Some(preview) = &args.preview {
        render::write_preview(grid, preview)?;
        println!("Preview saved as {}.", preview.display());
    }

    // Step 4: export. Layers are no longer needed once the grid exists.
    session.release_layers();
    session
        .export(&GeoTiffCodec::new(), &args.output)
        .with_context(|| format!("Error saving GeoTIFF {}", args.output.display()))?;
    println!("GeoTIFF saved as {}.", args.output.display());

    session.finish();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
