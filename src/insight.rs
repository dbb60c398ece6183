use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::InsightConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::models::{
    AnomalyRecord, Audit, ForecastPoint, Insight, Metric, Priority, RecommendedAction,
};
use crate::risk::{self, Baseline};
use crate::stats;

/// Run-level facts stamped into every insight's audit trail.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window: usize,
    pub horizon: usize,
}

impl RunContext {
    pub fn new(window: usize, horizon: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            window,
            horizon,
        }
    }
}

pub fn baseline(records: &[AnomalyRecord]) -> Option<Baseline> {
    let values: Vec<f64> = records.iter().map(AnomalyRecord::value).collect();
    Some(Baseline {
        mean: stats::mean(&values)?,
        volatility: stats::sample_std(&values),
    })
}

/// Builds one insight per flagged row. Unflagged rows only feed the baseline.
pub fn generate_insights(
    records: &[AnomalyRecord],
    forecast: &[ForecastPoint],
    run: &RunContext,
    config: &InsightConfig,
) -> Result<Vec<Insight>> {
    let baseline = baseline(records).ok_or(PipelineError::InsufficientHistory {
        stage: Stage::Insight,
        required: 1,
        available: 0,
    })?;
    let at_risk = risk::forecast_risk(forecast, baseline.mean, config);

    let mut insights = Vec::new();
    for record in records.iter().filter(|r| r.anomaly) {
        let z_score = record.z_score.ok_or_else(|| {
            PipelineError::computation(
                Stage::Insight,
                format!("incident on {} has no z-score", record.kpi.date),
            )
        })?;

        insights.push(Insight {
            date: record.kpi.date,
            risk_level: risk::classify_risk(z_score, at_risk, config),
            confidence_score: risk::confidence_score(z_score, baseline.volatility, config),
            valid_until: risk::validity_date(record.kpi.date, config),
            insight: explain(record, z_score, baseline.mean),
            recommended_actions: recommend_actions(z_score, at_risk, config),
            audit: Audit {
                metric: record.metric,
                baseline: round2(baseline.mean),
                z_score: round2(z_score),
                rolling_window_days: run.window,
                forecast_horizon_days: run.horizon,
                run_id: run.run_id,
            },
            generated_at: run.generated_at,
        });
    }

    tracing::info!(
        insights = insights.len(),
        forecast_risk = at_risk,
        baseline = baseline.mean,
        "Generated decision insights"
    );
    Ok(insights)
}

pub fn explain(record: &AnomalyRecord, z_score: f64, baseline: f64) -> String {
    let label = record.metric.label();
    let direction = if z_score < 0.0 { "decrease" } else { "increase" };
    let comparison = if record.value() < baseline {
        format!("{label} fell below historical baseline levels.")
    } else {
        format!(
            "{label} held at or above the historical baseline of {}.",
            format_value(record.metric, baseline)
        )
    };

    format!(
        "{label} showed an abnormal {direction} on {} with a z-score of {z_score:.2}. {comparison}",
        record.kpi.date
    )
}

/// Rule table mapping the incident signal to team actions. Rules can co-fire;
/// the monitoring fallback only applies when nothing else matched.
pub fn recommend_actions(
    z_score: f64,
    forecast_risk: bool,
    config: &InsightConfig,
) -> Vec<RecommendedAction> {
    let mut actions = Vec::new();

    if z_score < -config.medium_risk_z {
        actions.push(action(
            "Marketing",
            "Analyze conversion funnel and recent campaign performance",
            Priority::High,
            "Recover lost conversions and stabilize revenue",
        ));
        actions.push(action(
            "Product",
            "Check website/app errors, checkout failures, and UX regressions",
            Priority::High,
            "Prevent technical revenue leakage",
        ));
    }

    if z_score > config.medium_risk_z {
        actions.push(action(
            "Operations",
            "Ensure inventory and fulfillment capacity can handle demand",
            Priority::Medium,
            "Avoid stockouts and delivery delays",
        ));
    }

    if forecast_risk {
        actions.push(action(
            "Finance",
            "Re-evaluate short-term revenue projections and cash planning",
            Priority::High,
            "Reduce financial planning risk",
        ));
    }

    if actions.is_empty() {
        actions.push(action(
            "Analytics",
            "Continue monitoring KPIs for stability",
            Priority::Low,
            "Ensure sustained performance",
        ));
    }

    actions
}

fn action(team: &str, text: &str, priority: Priority, impact: &str) -> RecommendedAction {
    RecommendedAction {
        team: team.to_string(),
        action: text.to_string(),
        priority,
        expected_impact: impact.to_string(),
    }
}

fn format_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::Orders | Metric::Customers | Metric::Quantity => format!("{value:.1}"),
        Metric::Revenue | Metric::Aov => format!("{value:.2}"),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyKpi, RiskLevel};
    use chrono::{Duration, NaiveDate};

    fn record(day: i64, revenue: f64, z_score: Option<f64>, anomaly: bool) -> AnomalyRecord {
        let date = NaiveDate::from_ymd_opt(2011, 9, 1).unwrap() + Duration::days(day);
        AnomalyRecord {
            kpi: DailyKpi {
                date,
                revenue,
                orders: 5,
                customers: 5,
                quantity: 50,
                aov: revenue / 5.0,
            },
            metric: Metric::Revenue,
            rolling_mean: z_score.map(|_| 1000.0),
            rolling_std: z_score.map(|_| 100.0),
            z_score,
            anomaly,
        }
    }

    fn flat_forecast(lower: f64) -> Vec<ForecastPoint> {
        vec![ForecastPoint {
            date: NaiveDate::from_ymd_opt(2011, 10, 1).unwrap(),
            forecast: lower + 100.0,
            upper: lower + 200.0,
            lower,
        }]
    }

    fn run() -> RunContext {
        RunContext::new(7, 14)
    }

    #[test]
    fn drop_fires_marketing_and_product() {
        let actions = recommend_actions(-2.5, false, &InsightConfig::default());
        let teams: Vec<&str> = actions.iter().map(|a| a.team.as_str()).collect();
        assert_eq!(teams, vec!["Marketing", "Product"]);
        assert!(actions.iter().all(|a| a.priority == Priority::High));
    }

    #[test]
    fn spike_with_forecast_risk_co_fires() {
        let actions = recommend_actions(2.5, true, &InsightConfig::default());
        let teams: Vec<&str> = actions.iter().map(|a| a.team.as_str()).collect();
        assert_eq!(teams, vec!["Operations", "Finance"]);
    }

    #[test]
    fn default_action_only_when_nothing_fired() {
        let actions = recommend_actions(1.5, false, &InsightConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].team, "Analytics");
        assert_eq!(actions[0].priority, Priority::Low);

        let actions = recommend_actions(1.5, true, &InsightConfig::default());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].team, "Finance");
    }

    #[test]
    fn explanation_mentions_direction_and_baseline() {
        let rec = record(3, 400.0, Some(-2.5), true);
        let text = explain(&rec, -2.5, 1000.0);
        assert_eq!(
            text,
            "Revenue showed an abnormal decrease on 2011-09-04 with a z-score of -2.50. \
             Revenue fell below historical baseline levels."
        );

        let rec = record(3, 4000.0, Some(2.27), true);
        let text = explain(&rec, 2.27, 1000.0);
        assert!(text.contains("abnormal increase"));
        assert!(text.contains("baseline of 1000.00"));
    }

    #[test]
    fn one_insight_per_incident_with_audit() {
        let records = vec![
            record(0, 1000.0, None, false),
            record(1, 1000.0, Some(0.3), false),
            record(2, 1600.0, Some(2.4), true),
            record(3, 400.0, Some(-3.5), true),
        ];
        let run = run();
        let insights = generate_insights(
            &records,
            &flat_forecast(950.0),
            &run,
            &InsightConfig::default(),
        )
        .unwrap();

        assert_eq!(insights.len(), 2);

        let spike = &insights[0];
        assert_eq!(spike.risk_level, RiskLevel::Medium);
        assert_eq!(spike.valid_until, spike.date + Duration::days(2));
        assert_eq!(spike.audit.baseline, 1000.0);
        assert_eq!(spike.audit.z_score, 2.4);
        assert_eq!(spike.audit.rolling_window_days, 7);
        assert_eq!(spike.audit.forecast_horizon_days, 14);
        assert_eq!(spike.audit.run_id, run.run_id);
        assert_eq!(spike.generated_at, run.generated_at);
        assert_eq!(spike.recommended_actions[0].team, "Operations");

        let drop = &insights[1];
        assert_eq!(drop.risk_level, RiskLevel::High);
        assert_eq!(drop.recommended_actions.len(), 2);
    }

    #[test]
    fn forecast_risk_escalates_every_insight() {
        let records = vec![
            record(0, 1000.0, None, false),
            record(1, 1300.0, Some(2.1), true),
        ];
        let insights =
            generate_insights(&records, &flat_forecast(100.0), &run(), &InsightConfig::default())
                .unwrap();
        assert_eq!(insights[0].risk_level, RiskLevel::High);
        assert!(insights[0]
            .recommended_actions
            .iter()
            .any(|a| a.team == "Finance"));
    }

    #[test]
    fn flagged_row_without_z_score_is_a_defect() {
        let records = vec![record(0, 1000.0, None, true)];
        let err = generate_insights(&records, &[], &run(), &InsightConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Computation { stage: Stage::Insight, .. }
        ));
    }
}
