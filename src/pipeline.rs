use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::anomaly;
use crate::cleaner::{self, CleanStats};
use crate::config::{OutputPaths, PipelineConfig};
use crate::error::Result;
use crate::forecast;
use crate::ingest;
use crate::insight::{self, RunContext};
use crate::kpi;
use crate::models::{Insight, RawTransaction};
use crate::report::{self, Artifacts};

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub clean: CleanStats,
    pub days: usize,
    pub incidents: usize,
    pub insights: Vec<Insight>,
    pub written: Vec<PathBuf>,
}

pub fn run(input: &Path, config: &PipelineConfig, paths: &OutputPaths) -> Result<RunSummary> {
    config.validate()?;
    tracing::info!(input = %input.display(), "Loading raw transactions");
    let raw = ingest::read_raw_transactions(input)?;
    run_rows(&raw, config, paths)
}

pub fn run_rows(
    raw: &[RawTransaction],
    config: &PipelineConfig,
    paths: &OutputPaths,
) -> Result<RunSummary> {
    config.validate()?;
    let run = RunContext::new(config.detector.window, config.forecast.horizon);
    tracing::info!(run_id = %run.run_id, metric = config.metric.as_str(), "Starting pipeline run");

    let (cleaned, clean_stats) = cleaner::clean(raw);
    let kpis = kpi::compute_daily_kpis(&cleaned)?;
    let anomalies = anomaly::detect_anomalies(&kpis, config.metric, &config.detector)?;
    let incidents = anomaly::incidents(&anomalies).len();
    let forecast = forecast::forecast_kpi(
        &kpis,
        config.metric,
        config.detector.window,
        &config.forecast,
    )?;
    let insights = insight::generate_insights(&anomalies, &forecast, &run, &config.insight)?;

    let written = report::write_artifacts(
        paths,
        &Artifacts {
            metric: config.metric,
            cleaned: &cleaned,
            kpis: &kpis,
            anomalies: &anomalies,
            forecast: &forecast,
            insights: &insights,
        },
    )?;

    tracing::info!(
        run_id = %run.run_id,
        days = kpis.len(),
        incidents,
        insights = insights.len(),
        "Pipeline completed"
    );

    Ok(RunSummary {
        run_id: run.run_id,
        clean: clean_stats,
        days: kpis.len(),
        incidents,
        insights,
        written,
    })
}
