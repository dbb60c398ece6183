use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod anomaly;
mod cleaner;
mod config;
mod drivers;
mod error;
mod forecast;
mod ingest;
mod insight;
mod kpi;
mod models;
mod pipeline;
mod report;
mod risk;
mod stats;
mod store;

use config::{OutputPaths, PipelineConfig};
use models::Metric;

#[derive(Parser)]
#[command(name = "decision-engine")]
#[command(about = "Retail KPI anomaly detection, forecasting and decision insights", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full batch pipeline over a raw transaction export
    Run {
        #[arg(long)]
        input: PathBuf,
        /// TOML file with pipeline settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        metric: Option<Metric>,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        z_threshold: Option<f64>,
        #[arg(long)]
        horizon: Option<usize>,
        #[arg(long, default_value = "data/processed")]
        processed_dir: PathBuf,
        #[arg(long, default_value = "data/kpi")]
        kpi_dir: PathBuf,
    },
    /// Print the persisted daily KPIs as JSON
    Kpis {
        #[arg(long, default_value = "data/kpi")]
        kpi_dir: PathBuf,
    },
    /// Print the persisted decision insights as JSON
    Insights {
        #[arg(long, default_value = "data/kpi")]
        kpi_dir: PathBuf,
    },
    /// Break down a day's revenue change by stock code
    Drivers {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "data/processed")]
        processed_dir: PathBuf,
    },
    /// Generate a markdown briefing from the persisted outputs
    Report {
        #[arg(long, default_value = "data/kpi")]
        kpi_dir: PathBuf,
        #[arg(long, default_value = "briefing.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Run {
            input,
            config,
            metric,
            window,
            z_threshold,
            horizon,
            processed_dir,
            kpi_dir,
        } => {
            let mut settings = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(value) = metric {
                settings.metric = value;
            }
            if let Some(value) = window {
                settings.detector.window = value;
            }
            if let Some(value) = z_threshold {
                settings.detector.z_threshold = value;
            }
            if let Some(value) = horizon {
                settings.forecast.horizon = value;
            }

            let paths = OutputPaths::new(processed_dir, kpi_dir);
            let summary = pipeline::run(&input, &settings, &paths)
                .context("pipeline run failed; no outputs were published")?;

            println!(
                "Run {} complete: {} rows kept ({} dropped), {} days, {} incidents.",
                summary.run_id,
                summary.clean.kept,
                summary.clean.dropped(),
                summary.days,
                summary.incidents
            );
            for insight in &summary.insights {
                println!(
                    "- {} {} (confidence {:.2}): {}",
                    insight.date,
                    insight.risk_level.as_str(),
                    insight.confidence_score,
                    insight.insight
                );
            }
            println!(
                "{} artifacts written; insights at {}.",
                summary.written.len(),
                paths.insights().display()
            );
        }
        Commands::Kpis { kpi_dir } => {
            let path = OutputPaths::new("", kpi_dir).kpis();
            let kpis = store::load_kpis(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&kpis)?);
        }
        Commands::Insights { kpi_dir } => {
            let path = OutputPaths::new("", kpi_dir).insights();
            let insights = store::load_insights(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "insights": insights }))?
            );
        }
        Commands::Drivers {
            date,
            limit,
            processed_dir,
        } => {
            let path = OutputPaths::new(processed_dir, "").cleaned();
            let transactions = store::load_clean_transactions(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let report = drivers::attribute_revenue_change(&transactions, date)?;

            println!(
                "Revenue drivers for {} compared to {}:",
                report.date, report.compared_to
            );
            for driver in report.drivers.iter().take(limit) {
                println!(
                    "- {}: {:.2} -> {:.2} ({:+.2})",
                    driver.stock_code, driver.before, driver.after, driver.change
                );
            }
        }
        Commands::Report { kpi_dir, out } => {
            let paths = OutputPaths::new("", kpi_dir);
            let kpis = store::load_kpis(&paths.kpis())?;
            let insights = store::load_insights(&paths.insights())?;
            let briefing = report::build_briefing(&kpis, &insights);
            std::fs::write(&out, briefing)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Briefing written to {}.", out.display());
        }
    }

    Ok(())
}
