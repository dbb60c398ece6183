use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::OutputPaths;
use crate::error::{PipelineError, Result};
use crate::models::{
    AnomalyRecord, CleanTransaction, DailyKpi, ForecastPoint, Insight, Metric, RiskLevel,
};
use crate::store::InsightRow;

const CLEANED_COLUMNS: [&str; 10] = [
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
    "Revenue",
    "date",
];
const KPI_COLUMNS: [&str; 6] = ["date", "revenue", "orders", "customers", "quantity", "aov"];
const FORECAST_COLUMNS: [&str; 4] = ["date", "forecast", "upper", "lower"];
const INSIGHT_COLUMNS: [&str; 8] = [
    "date",
    "risk_level",
    "confidence_score",
    "valid_until",
    "insight",
    "recommended_actions",
    "audit",
    "generated_at",
];

/// Everything one run persists.
pub struct Artifacts<'a> {
    pub metric: Metric,
    pub cleaned: &'a [CleanTransaction],
    pub kpis: &'a [DailyKpi],
    pub anomalies: &'a [AnomalyRecord],
    pub forecast: &'a [ForecastPoint],
    pub insights: &'a [Insight],
}

#[derive(Debug)]
struct StagedFile {
    file: NamedTempFile,
    dest: PathBuf,
}

/// Writes every artifact to a temporary file next to its destination, then
/// renames them into place. Nothing is replaced unless all files were staged.
pub fn write_artifacts(paths: &OutputPaths, artifacts: &Artifacts<'_>) -> Result<Vec<PathBuf>> {
    let metric = artifacts.metric;
    let insight_rows = artifacts
        .insights
        .iter()
        .map(InsightRow::encode)
        .collect::<Result<Vec<_>>>()?;

    let staged = vec![
        stage(&paths.cleaned(), |w| {
            write_rows(w, &CLEANED_COLUMNS, artifacts.cleaned)
        })?,
        stage(&paths.kpis(), |w| write_rows(w, &KPI_COLUMNS, artifacts.kpis))?,
        stage(&paths.anomalies(metric), |w| {
            write_anomalies(w, metric, artifacts.anomalies)
        })?,
        stage(&paths.incidents(metric), |w| {
            write_incidents(w, metric, artifacts.anomalies)
        })?,
        stage(&paths.forecast(metric), |w| {
            write_rows(w, &FORECAST_COLUMNS, artifacts.forecast)
        })?,
        stage(&paths.insights(), |w| {
            write_rows(w, &INSIGHT_COLUMNS, &insight_rows)
        })?,
    ];

    let mut written = Vec::with_capacity(staged.len());
    for StagedFile { file, dest } in staged {
        file.persist(&dest)
            .map_err(|err| PipelineError::persistence(&dest, err.error))?;
        tracing::debug!(path = %dest.display(), "Persisted artifact");
        written.push(dest);
    }

    tracing::info!(files = written.len(), "Wrote pipeline artifacts");
    Ok(written)
}

fn stage<F>(dest: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut csv::Writer<&mut File>) -> csv::Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|err| PipelineError::persistence(dir, err))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|err| PipelineError::persistence(dest, err))?;
    {
        // Headers are written explicitly so empty tables still carry them.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file.as_file_mut());
        write(&mut writer).map_err(|err| PipelineError::persistence(dest, err.into()))?;
        writer
            .flush()
            .map_err(|err| PipelineError::persistence(dest, err))?;
    }

    // Temp files are created owner-only; artifacts are shared like any other output.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|err| PipelineError::persistence(dest, err))?;
    }

    Ok(StagedFile {
        file,
        dest: dest.to_path_buf(),
    })
}

fn write_rows<T: Serialize>(
    writer: &mut csv::Writer<&mut File>,
    header: &[&str],
    rows: &[T],
) -> csv::Result<()> {
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_anomalies(
    writer: &mut csv::Writer<&mut File>,
    metric: Metric,
    records: &[AnomalyRecord],
) -> csv::Result<()> {
    let m = metric.as_str();
    writer.write_record([
        "date".to_string(),
        "revenue".to_string(),
        "orders".to_string(),
        "customers".to_string(),
        "quantity".to_string(),
        "aov".to_string(),
        format!("{m}_mean"),
        format!("{m}_std"),
        format!("{m}_zscore"),
        format!("{m}_anomaly"),
    ])?;

    for record in records {
        let kpi = &record.kpi;
        writer.write_record([
            kpi.date.to_string(),
            kpi.revenue.to_string(),
            kpi.orders.to_string(),
            kpi.customers.to_string(),
            kpi.quantity.to_string(),
            kpi.aov.to_string(),
            optional(record.rolling_mean),
            optional(record.rolling_std),
            optional(record.z_score),
            record.anomaly.to_string(),
        ])?;
    }
    Ok(())
}

fn write_incidents(
    writer: &mut csv::Writer<&mut File>,
    metric: Metric,
    records: &[AnomalyRecord],
) -> csv::Result<()> {
    let m = metric.as_str();
    writer.write_record(["date".to_string(), m.to_string(), format!("{m}_zscore")])?;

    for record in records.iter().filter(|r| r.anomaly) {
        writer.write_record([
            record.kpi.date.to_string(),
            record.value().to_string(),
            optional(record.z_score),
        ])?;
    }
    Ok(())
}

pub fn summarize_by_risk(insights: &[Insight]) -> BTreeMap<RiskLevel, usize> {
    let mut counts = BTreeMap::new();
    for insight in insights {
        *counts.entry(insight.risk_level).or_insert(0) += 1;
    }
    counts
}

/// Markdown briefing over persisted KPIs and insights.
pub fn build_briefing(kpis: &[DailyKpi], insights: &[Insight]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Decision Intelligence Briefing");
    match (kpis.first(), kpis.last()) {
        (Some(first), Some(last)) => {
            let revenue: f64 = kpis.iter().map(|k| k.revenue).sum();
            let orders: u64 = kpis.iter().map(|k| k.orders).sum();
            let _ = writeln!(
                output,
                "Covering {} to {} ({} trading days, revenue {:.2}, {} orders)",
                first.date,
                last.date,
                kpis.len(),
                revenue,
                orders
            );
        }
        _ => {
            let _ = writeln!(output, "No KPI history available.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");
    let counts = summarize_by_risk(insights);
    if counts.is_empty() {
        let _ = writeln!(output, "No incidents detected.");
    } else {
        for (level, count) in counts.iter().rev() {
            let _ = writeln!(output, "- {}: {} incidents", level.as_str(), count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Incidents");
    if insights.is_empty() {
        let _ = writeln!(output, "No incidents detected.");
    } else {
        let mut ordered: Vec<&Insight> = insights.iter().collect();
        ordered.sort_by(|a, b| b.date.cmp(&a.date));
        for insight in ordered {
            let _ = writeln!(
                output,
                "### {} ({}, confidence {:.2}, valid until {})",
                insight.date,
                insight.risk_level.as_str(),
                insight.confidence_score,
                insight.valid_until
            );
            let _ = writeln!(output, "{}", insight.insight);
            for action in &insight.recommended_actions {
                let _ = writeln!(
                    output,
                    "- **{}** ({:?}): {} ({})",
                    action.team, action.priority, action.action, action.expected_impact
                );
            }
            let _ = writeln!(output);
        }
    }

    let _ = writeln!(output, "## Recent Days");
    if kpis.is_empty() {
        let _ = writeln!(output, "No KPI history available.");
    } else {
        for kpi in kpis.iter().rev().take(7) {
            let _ = writeln!(
                output,
                "- {}: revenue {:.2}, {} orders, {} customers, aov {:.2}",
                kpi.date, kpi.revenue, kpi.orders, kpi.customers, kpi.aov
            );
        }
    }

    output
}
