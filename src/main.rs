use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use widgetlens::Dashboard;
use widgetlens::aggregate::moving_average_points;
use widgetlens::config::Config;
use widgetlens::ingest::{
    BatchObserver, BatchOutcome, FileResult, ProcessingState, load_files,
};
use widgetlens::series::{InstallSeries, SeriesMetrics, TimeSeriesPoint};
use widgetlens::widget::Widget;

#[derive(Parser)]
#[command(
    name = "widgetlens",
    about = "Normalize analytics widget exports, drop duplicates, and rebuild installation series"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Load exports, filter duplicates, and print the accepted widgets
    Ingest {
        /// Export files or directories of `*.json` exports
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Widgets accepted earlier (output of a previous `ingest`)
        #[arg(long)]
        existing: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to config file
        #[arg(short, long, default_value = "widgetlens.toml", env = "WIDGETLENS_CONFIG")]
        config: PathBuf,
    },

    /// Rebuild daily installation series and their metrics
    Series {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Moving-average window in days (defaults to the config value)
        #[arg(long)]
        window: Option<usize>,

        /// Path to config file
        #[arg(short, long, default_value = "widgetlens.toml", env = "WIDGETLENS_CONFIG")]
        config: PathBuf,
    },

    /// Print the per-category digest handed to the analysis service
    Digest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Path to config file
        #[arg(short, long, default_value = "widgetlens.toml", env = "WIDGETLENS_CONFIG")]
        config: PathBuf,
    },
}

/// Logs batch progress as it happens.
struct LogProgress;

impl BatchObserver for LogProgress {
    fn on_progress(&mut self, state: &ProcessingState) {
        if let Some(file) = &state.current_file {
            info!(
                file = %file,
                done = state.processed_files,
                total = state.total_files,
                progress = %format!("{:.0}%", state.progress),
                "processing"
            );
        }
    }

    fn on_complete(&mut self, results: &[FileResult], duplicate_count: usize) {
        info!(files = results.len(), duplicates = duplicate_count, "batch complete");
    }
}

#[derive(Serialize)]
struct IngestReport<'a> {
    widgets: &'a [Widget],
    duplicates: &'a [widgetlens::widget::DuplicateEntry],
    errors: &'a [widgetlens::ingest::FileError],
    status: widgetlens::ingest::BatchStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesReport<'a> {
    series: &'a InstallSeries,
    metrics: SeriesMetrics,
    moving_average: Vec<TimeSeriesPoint>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "widgetlens=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            paths,
            existing,
            output,
            config,
        } => {
            let cfg = load_config(&config)?;
            let existing = match existing {
                Some(path) => read_existing(&path)?,
                None => Vec::new(),
            };
            let (dashboard, outcome) = run_batch(cfg, existing, &paths).await?;
            // The full accepted set, so the output can be fed back as --existing.
            let report = IngestReport {
                widgets: dashboard.widgets(),
                duplicates: &outcome.duplicates,
                errors: &outcome.state.errors,
                status: outcome.status,
            };
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &json)?;
                    println!(
                        "Accepted {} widgets ({} duplicates, {} failed files): {}",
                        dashboard.widgets().len(),
                        outcome.duplicate_count(),
                        outcome.state.errors.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        Command::Series {
            paths,
            window,
            config,
        } => {
            let cfg = load_config(&config)?;
            let window = window.unwrap_or(cfg.series.moving_average_window).max(1);
            let (dashboard, _) = run_batch(cfg, Vec::new(), &paths).await?;

            let Some(series) = dashboard.installation_series() else {
                println!("No installation data found.");
                return Ok(());
            };
            let reports: Vec<SeriesReport> = series
                .iter()
                .map(|s| SeriesReport {
                    series: s,
                    metrics: s.metrics(),
                    moving_average: moving_average_points(&s.points, window),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Command::Digest { paths, config } => {
            let cfg = load_config(&config)?;
            let (dashboard, _) = run_batch(cfg, Vec::new(), &paths).await?;
            println!("{}", serde_json::to_string_pretty(&dashboard.digest())?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let cfg = Config::load_or_default(path)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Accepts either a bare widget array or a previous ingest report.
fn read_existing(path: &Path) -> Result<Vec<Widget>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading existing widgets from {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)?;
    let widgets = match value {
        Value::Object(mut report) => report.remove("widgets").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    Ok(serde_json::from_value(widgets)?)
}

async fn run_batch(
    cfg: Config,
    existing: Vec<Widget>,
    paths: &[PathBuf],
) -> Result<(Dashboard, BatchOutcome)> {
    let files = load_files(paths)?;
    let mut dashboard = Dashboard::with_widgets(cfg, existing);

    let token = dashboard.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current file");
            token.cancel();
        }
    });

    let outcome = dashboard.load_files(files, &mut LogProgress).await;
    interrupt.abort();

    for err in &outcome.state.errors {
        warn!(file = %err.file_name, error = %err.error, "skipped file");
    }
    Ok((dashboard, outcome))
}
