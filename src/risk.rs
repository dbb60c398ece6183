use chrono::{Duration, NaiveDate};

use crate::config::InsightConfig;
use crate::models::{ForecastPoint, RiskLevel};

/// Whole-series context an incident is judged against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Mean of the metric across every observed day.
    pub mean: f64,
    /// Sample standard deviation across every observed day, if defined.
    pub volatility: Option<f64>,
}

/// True when the lowest forecast bound falls below the configured share of baseline.
pub fn forecast_risk(forecast: &[ForecastPoint], baseline: f64, config: &InsightConfig) -> bool {
    forecast
        .iter()
        .map(|p| p.lower)
        .reduce(f64::min)
        .is_some_and(|lowest| lowest < baseline * config.forecast_risk_ratio)
}

pub fn classify_risk(z_score: f64, forecast_risk: bool, config: &InsightConfig) -> RiskLevel {
    let magnitude = z_score.abs();
    if magnitude > config.high_risk_z || forecast_risk {
        RiskLevel::High
    } else if magnitude > config.medium_risk_z {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Confidence in [min_confidence, 1.0], rounded to two decimals.
pub fn confidence_score(z_score: f64, volatility: Option<f64>, config: &InsightConfig) -> f64 {
    let base = (z_score.abs() / config.confidence_z_scale).min(1.0);
    let penalty = volatility
        .filter(|v| v.is_finite())
        .map(|v| (v.abs() / config.volatility_scale).min(config.max_volatility_penalty))
        .unwrap_or(0.0);
    let score = (base - penalty).max(config.min_confidence);
    (score * 100.0).round() / 100.0
}

pub fn validity_date(incident: NaiveDate, config: &InsightConfig) -> NaiveDate {
    incident + Duration::days(config.validity_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lower: f64) -> ForecastPoint {
        ForecastPoint {
            date: NaiveDate::from_ymd_opt(2011, 12, 10).unwrap(),
            forecast: lower + 10.0,
            upper: lower + 20.0,
            lower,
        }
    }

    #[test]
    fn forecast_risk_uses_lowest_bound() {
        let config = InsightConfig::default();
        assert!(forecast_risk(&[point(1000.0), point(899.0)], 1000.0, &config));
        assert!(!forecast_risk(&[point(900.0), point(950.0)], 1000.0, &config));
        assert!(!forecast_risk(&[], 1000.0, &config));
    }

    #[test]
    fn classification_tiers() {
        let config = InsightConfig::default();
        assert_eq!(classify_risk(3.5, false, &config), RiskLevel::High);
        assert_eq!(classify_risk(-3.01, false, &config), RiskLevel::High);
        assert_eq!(classify_risk(2.5, true, &config), RiskLevel::High);
        assert_eq!(classify_risk(0.5, true, &config), RiskLevel::High);
        assert_eq!(classify_risk(3.0, false, &config), RiskLevel::Medium);
        assert_eq!(classify_risk(-2.1, false, &config), RiskLevel::Medium);
        assert_eq!(classify_risk(2.0, false, &config), RiskLevel::Low);
        assert_eq!(classify_risk(-1.0, false, &config), RiskLevel::Low);
    }

    #[test]
    fn confidence_follows_formula() {
        let config = InsightConfig::default();
        // base 0.8, penalty 0.2
        assert_eq!(confidence_score(2.4, Some(20_000.0), &config), 0.6);
        // base capped at 1.0, penalty capped at 0.5
        assert_eq!(confidence_score(-9.0, Some(1e9), &config), 0.5);
        assert_eq!(confidence_score(6.0, None, &config), 1.0);
        assert_eq!(confidence_score(2.2, Some(12_345.0), &config), 0.61);
    }

    #[test]
    fn confidence_stays_within_bounds() {
        let config = InsightConfig::default();
        for z in [-50.0, -3.0, -2.01, 0.0, 0.4, 2.01, 3.0, 50.0] {
            for vol in [None, Some(0.0), Some(1.0), Some(75_000.0), Some(1e12)] {
                let score = confidence_score(z, vol, &config);
                assert!((0.3..=1.0).contains(&score), "z={z} vol={vol:?} score={score}");
            }
        }
    }

    #[test]
    fn volatility_scale_is_configurable() {
        let config = InsightConfig {
            volatility_scale: 1000.0,
            ..InsightConfig::default()
        };
        // 200 / 1000 = 0.2 penalty
        assert_eq!(confidence_score(3.0, Some(200.0), &config), 0.8);
    }

    #[test]
    fn validity_is_two_days_after_incident() {
        let incident = NaiveDate::from_ymd_opt(2011, 2, 27).unwrap();
        assert_eq!(
            validity_date(incident, &InsightConfig::default()),
            NaiveDate::from_ymd_opt(2011, 3, 1).unwrap()
        );
    }
}
