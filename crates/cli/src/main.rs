use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tchart_core::{Bar, ChartData, Series};
use tchart_data::csv_loader;
use tchart_indicators::{ChartSettings, IndicatorSet};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "tchart")]
#[command(about = "Chart indicator engine: compute and replay technical indicators over OHLCV data")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Indicator settings file (TOML)
    #[arg(short, long, env = "TCHART_CONFIG")]
    config: Option<PathBuf>,

    /// Enable every indicator with default parameters (ignores --config)
    #[arg(long)]
    all: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute indicators over a CSV file in one pass
    Compute {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only emit the last N bars
        #[arg(long)]
        tail: Option<usize>,
    },

    /// Feed a CSV file bar by bar and compare against a full recompute
    Replay {
        /// Path to CSV data file
        #[arg(short, long)]
        data: PathBuf,

        /// Open each bar at its open price and revise the close afterwards
        #[arg(long)]
        revise: bool,

        /// Largest accepted difference between incremental and full results
        #[arg(long, default_value = "1e-6")]
        tolerance: f64,
    },

    /// Print the settings of every indicator with default parameters
    Indicators,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compute {
            data,
            format,
            output,
            tail,
        } => {
            let settings = load_settings(cli.config.as_deref(), cli.all)?;
            run_compute(&settings, &data, format, output, tail)?;
        }
        Commands::Replay {
            data,
            revise,
            tolerance,
        } => {
            let settings = load_settings(cli.config.as_deref(), cli.all)?;
            run_replay(&settings, &data, revise, tolerance)?;
        }
        Commands::Indicators => {
            let text = toml::to_string_pretty(&ChartSettings::all())
                .context("Failed to serialize default settings")?;
            println!("# Every indicator with its default parameters.");
            println!("# Remove a section to disable that indicator.\n");
            println!("{text}");
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>, all: bool) -> Result<ChartSettings> {
    if all {
        return Ok(ChartSettings::all());
    }
    let Some(path) = path else {
        return Ok(ChartSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    let settings = toml::from_str(&text)
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    tracing::info!(config = %path.display(), "Loaded indicator settings");
    Ok(settings)
}

fn load_chart(path: &Path) -> Result<ChartData> {
    let data = csv_loader::load_chart_from_csv(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::info!(bars = data.len(), data = %path.display(), "Loaded chart data");
    if data.is_empty() {
        anyhow::bail!("No bars loaded from CSV file");
    }
    Ok(data)
}

fn run_compute(
    settings: &ChartSettings,
    data_path: &Path,
    format: OutputFormat,
    output: Option<PathBuf>,
    tail: Option<usize>,
) -> Result<()> {
    let data = load_chart(data_path)?;
    let mut set = IndicatorSet::new();
    set.refresh(settings, &data, None)?;
    let columns = set.columns();
    let first = tail.map_or(0, |n| data.len().saturating_sub(n));

    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    match format {
        OutputFormat::Csv => write_csv(out, &data, &columns, first)?,
        OutputFormat::Json => write_json(out, &data, &columns, first)?,
    }
    tracing::info!(columns = columns.len(), rows = data.len() - first, "Wrote indicator values");
    Ok(())
}

/// One row per bar from `first`. Lines that run past the newest bar, like
/// the Ichimoku leading spans, get extra rows with an empty timestamp.
fn write_csv(
    out: Box<dyn Write>,
    data: &ChartData,
    columns: &[(String, Series)],
    first: usize,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["timestamp".to_string(), "close".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;

    let rows = columns
        .iter()
        .map(|(_, s)| s.len())
        .fold(data.len(), usize::max);
    for i in first..rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(
            data.times()
                .get(i)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        );
        record.push(format_sample(data.close().get(i)));
        record.extend(columns.iter().map(|(_, s)| format_sample(s.get(i))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(
    mut out: Box<dyn Write>,
    data: &ChartData,
    columns: &[(String, Series)],
    first: usize,
) -> Result<()> {
    let times: Vec<String> = data.times()[first..].iter().map(|t| t.to_rfc3339()).collect();
    let mut lines = serde_json::Map::new();
    for (name, series) in columns {
        let values = series.tail_from(first).unwrap_or_default();
        lines.insert(name.clone(), json!(values.as_slice()));
    }
    let doc = json!({
        "timestamps": times,
        "close": data.close().tail_from(first).unwrap_or_default().as_slice(),
        "indicators": lines,
    });
    serde_json::to_writer_pretty(&mut out, &doc)?;
    writeln!(out)?;
    Ok(())
}

fn format_sample(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn run_replay(settings: &ChartSettings, data_path: &Path, revise: bool, tolerance: f64) -> Result<()> {
    let full = load_chart(data_path)?;

    let mut live = ChartData::new();
    let mut incremental = IndicatorSet::new();
    for bar in full.bars() {
        if revise {
            let opening = Bar {
                close: bar.open,
                ..bar
            };
            let revised = live.merge(&ChartData::from_bars([opening])?);
            incremental.refresh(settings, &live, revised)?;
            let revised = live.update_latest_close(bar.close);
            incremental.refresh(settings, &live, revised)?;
        } else {
            let revised = live.merge(&ChartData::from_bars([bar])?);
            incremental.refresh(settings, &live, revised)?;
        }
    }

    let mut fresh = IndicatorSet::new();
    fresh.refresh(settings, &full, None)?;

    let drifts: Vec<Drift> = incremental
        .columns()
        .iter()
        .zip(fresh.columns().iter())
        .map(|((name, a), (_, b))| Drift::between(name, a, b))
        .collect();

    let sep = "=".repeat(60);
    println!("\n{sep}");
    println!("  REPLAY RESULTS ({} bars{})", full.len(), if revise { ", revised closes" } else { "" });
    println!("{sep}");
    for d in &drifts {
        let status = if d.within(tolerance) { "ok" } else { "DRIFT" };
        println!("  {:<28} {:>12.3e}  gaps differ: {:<4} {}", d.column, d.max_abs, d.gap_mismatches, status);
    }
    println!("{sep}\n");

    let failed = drifts.iter().filter(|d| !d.within(tolerance)).count();
    if failed > 0 {
        anyhow::bail!("{failed} indicator line(s) differ from a full recompute");
    }
    Ok(())
}

/// How far an incrementally maintained line strayed from a full recompute.
#[derive(Debug, PartialEq)]
struct Drift {
    column: String,
    max_abs: f64,
    gap_mismatches: usize,
}

impl Drift {
    fn between(column: &str, incremental: &Series, full: &Series) -> Self {
        let mut max_abs = 0.0_f64;
        let mut gap_mismatches = incremental.len().abs_diff(full.len());
        for (a, b) in incremental.iter().zip(full.iter()) {
            match (a, b) {
                (Some(a), Some(b)) => max_abs = max_abs.max((a - b).abs()),
                (None, None) => {}
                _ => gap_mismatches += 1,
            }
        }
        Self {
            column: column.to_string(),
            max_abs,
            gap_mismatches,
        }
    }

    fn within(&self, tolerance: f64) -> bool {
        self.gap_mismatches == 0 && self.max_abs <= tolerance
    }
}
