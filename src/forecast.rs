use chrono::Duration;

use crate::config::ForecastConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::models::{DailyKpi, ForecastPoint, Metric};
use crate::stats;

/// Projects a flat band over the next `horizon` days.
///
/// The point estimate and band come from one trailing window ending at the
/// last observed day; every future date shares them. This is a naive
/// baseline, not a per-date extrapolation.
pub fn forecast_kpi(
    kpis: &[DailyKpi],
    metric: Metric,
    window: usize,
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>> {
    let insufficient = || PipelineError::InsufficientHistory {
        stage: Stage::Forecast,
        required: window,
        available: kpis.len(),
    };

    let mut ordered: Vec<&DailyKpi> = kpis.iter().collect();
    ordered.sort_by_key(|k| k.date);

    let last = ordered.last().ok_or_else(insufficient)?;
    let values: Vec<f64> = ordered.iter().map(|k| metric.value(k)).collect();
    let snapshot = stats::trailing(&values, values.len() - 1, window).ok_or_else(insufficient)?;

    let band = config.band_width * snapshot.std;
    let points: Vec<ForecastPoint> = (1..=config.horizon as i64)
        .map(|offset| ForecastPoint {
            date: last.date + Duration::days(offset),
            forecast: snapshot.mean,
            upper: snapshot.mean + band,
            lower: snapshot.mean - band,
        })
        .collect();

    tracing::info!(
        metric = metric.as_str(),
        horizon = config.horizon,
        forecast = snapshot.mean,
        std = snapshot.std,
        "Forecast generated"
    );

    Ok(points)
}
