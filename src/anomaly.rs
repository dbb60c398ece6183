use crate::config::DetectorConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::models::{AnomalyRecord, DailyKpi, Metric};
use crate::stats;

/// Attaches trailing-window statistics for `metric` to every KPI row and
/// flags rows whose |z| exceeds the configured threshold.
///
/// Rows without a full window keep `None` statistics. A window with zero
/// spread yields no z-score, so such rows are never flagged.
pub fn detect_anomalies(
    kpis: &[DailyKpi],
    metric: Metric,
    config: &DetectorConfig,
) -> Result<Vec<AnomalyRecord>> {
    if kpis.len() < config.window {
        return Err(PipelineError::InsufficientHistory {
            stage: Stage::Detect,
            required: config.window,
            available: kpis.len(),
        });
    }

    let values: Vec<f64> = kpis.iter().map(|k| metric.value(k)).collect();
    let mut records = Vec::with_capacity(kpis.len());

    for (idx, kpi) in kpis.iter().enumerate() {
        let window = stats::trailing(&values, idx, config.window);
        let z_score = match window {
            Some(s) if s.std > 0.0 => Some((values[idx] - s.mean) / s.std),
            _ => None,
        };

        if let Some(z) = z_score {
            if !z.is_finite() {
                return Err(PipelineError::computation(
                    Stage::Detect,
                    format!("non-finite z-score for {} on {}", metric.as_str(), kpi.date),
                ));
            }
        }

        records.push(AnomalyRecord {
            kpi: kpi.clone(),
            metric,
            rolling_mean: window.map(|s| s.mean),
            rolling_std: window.map(|s| s.std),
            z_score,
            anomaly: z_score.is_some_and(|z| z.abs() > config.z_threshold),
        });
    }

    let flagged = records.iter().filter(|r| r.anomaly).count();
    tracing::info!(
        metric = metric.as_str(),
        window = config.window,
        threshold = config.z_threshold,
        flagged,
        "Anomaly detection complete"
    );

    Ok(records)
}

pub fn incidents(records: &[AnomalyRecord]) -> Vec<&AnomalyRecord> {
    records.iter().filter(|r| r.anomaly).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(revenues: &[f64]) -> Vec<DailyKpi> {
        let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
        revenues
            .iter()
            .enumerate()
            .map(|(i, &revenue)| DailyKpi {
                date: start + Duration::days(i as i64),
                revenue,
                orders: 10,
                customers: 8,
                quantity: 100,
                aov: revenue / 10.0,
            })
            .collect()
    }

    #[test]
    fn statistics_are_null_until_window_is_full() {
        let kpis = series(&[10.0, 12.0, 9.0, 11.0, 10.0, 13.0, 8.0, 12.0, 10.0]);
        let records = detect_anomalies(&kpis, Metric::Revenue, &DetectorConfig::default()).unwrap();

        for record in &records[..6] {
            assert_eq!(record.rolling_mean, None);
            assert_eq!(record.rolling_std, None);
            assert_eq!(record.z_score, None);
            assert!(!record.anomaly);
        }
        for record in &records[6..] {
            assert!(record.rolling_mean.is_some());
            assert!(record.rolling_std.is_some());
            assert!(record.z_score.is_some());
        }
    }

    #[test]
    fn spike_after_flat_run_is_flagged() {
        let mut revenues = vec![1000.0; 10];
        revenues.push(5000.0);
        let records =
            detect_anomalies(&series(&revenues), Metric::Revenue, &DetectorConfig::default())
                .unwrap();

        let last = records.last().unwrap();
        let z = last.z_score.unwrap();
        // A single outlier in a 7-row window including itself peaks at 6/sqrt(7).
        assert!((z - 6.0 / 7f64.sqrt()).abs() < 1e-9);
        assert!(last.anomaly);
        assert_eq!(incidents(&records).len(), 1);
    }

    #[test]
    fn zero_spread_window_is_never_anomalous() {
        let records =
            detect_anomalies(&series(&[500.0; 12]), Metric::Revenue, &DetectorConfig::default())
                .unwrap();
        for record in &records[6..] {
            assert_eq!(record.rolling_std, Some(0.0));
            assert_eq!(record.z_score, None);
            assert!(!record.anomaly);
        }
    }

    #[test]
    fn flag_matches_threshold_exactly() {
        let kpis = series(&[10.0, 11.0, 9.0, 10.0, 12.0, 8.0, 30.0, 10.0, 9.0, 11.0]);
        let config = DetectorConfig::default();
        for record in detect_anomalies(&kpis, Metric::Revenue, &config).unwrap() {
            let expected = record.z_score.is_some_and(|z| z.abs() > config.z_threshold);
            assert_eq!(record.anomaly, expected);
        }
    }

    #[test]
    fn uses_the_selected_metric() {
        let mut kpis = series(&[100.0; 8]);
        kpis[7].orders = 60;
        let records = detect_anomalies(&kpis, Metric::Orders, &DetectorConfig::default()).unwrap();
        assert!(records[7].anomaly);
        assert_eq!(records[7].value(), 60.0);
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let err = detect_anomalies(&series(&[1.0; 6]), Metric::Revenue, &DetectorConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory {
                stage: Stage::Detect,
                required: 7,
                available: 6
            }
        ));
    }
}
