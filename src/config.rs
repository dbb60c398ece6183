use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::models::Metric;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub metric: Metric,
    pub detector: DetectorConfig,
    pub forecast: ForecastConfig,
    pub insight: InsightConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Trailing rows per rolling window, current row included.
    pub window: usize,
    /// Rows with |z| strictly above this are flagged.
    pub z_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon: usize,
    /// Band half-width in rolling standard deviations.
    pub band_width: f64,
}

/// Scale constants used when turning incidents into insights.
///
/// `volatility_scale` assumes the metric is measured in a currency unit where
/// a daily standard deviation of 100k is "very volatile". Datasets with a
/// different magnitude should set it explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub high_risk_z: f64,
    pub medium_risk_z: f64,
    /// Forecast risk fires when the lowest forecast bound drops below
    /// `baseline * forecast_risk_ratio`.
    pub forecast_risk_ratio: f64,
    pub confidence_z_scale: f64,
    pub volatility_scale: f64,
    pub max_volatility_penalty: f64,
    pub min_confidence: f64,
    pub validity_days: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: 7,
            z_threshold: 2.0,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 14,
            band_width: 2.0,
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            high_risk_z: 3.0,
            medium_risk_z: 2.0,
            forecast_risk_ratio: 0.9,
            confidence_z_scale: 3.0,
            volatility_scale: 100_000.0,
            max_volatility_penalty: 0.5,
            min_confidence: 0.3,
            validity_days: 2,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(raw).map_err(|err| PipelineError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        // Sample standard deviation needs at least two points.
        if self.detector.window < 2 {
            return Err(PipelineError::Config(format!(
                "detector.window must be at least 2, got {}",
                self.detector.window
            )));
        }
        if self.forecast.horizon == 0 {
            return Err(PipelineError::Config(
                "forecast.horizon must be at least 1".to_string(),
            ));
        }

        let positive = [
            ("detector.z_threshold", self.detector.z_threshold),
            ("forecast.band_width", self.forecast.band_width),
            ("insight.high_risk_z", self.insight.high_risk_z),
            ("insight.medium_risk_z", self.insight.medium_risk_z),
            ("insight.forecast_risk_ratio", self.insight.forecast_risk_ratio),
            ("insight.confidence_z_scale", self.insight.confidence_z_scale),
            ("insight.volatility_scale", self.insight.volatility_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.insight.max_volatility_penalty) {
            return Err(PipelineError::Config(format!(
                "insight.max_volatility_penalty must be within [0, 1], got {}",
                self.insight.max_volatility_penalty
            )));
        }
        if !(self.insight.min_confidence > 0.0 && self.insight.min_confidence <= 1.0) {
            return Err(PipelineError::Config(format!(
                "insight.min_confidence must be within (0, 1], got {}",
                self.insight.min_confidence
            )));
        }
        if self.insight.validity_days < 0 {
            return Err(PipelineError::Config(
                "insight.validity_days cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub processed_dir: PathBuf,
    pub kpi_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(processed_dir: impl Into<PathBuf>, kpi_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            kpi_dir: kpi_dir.into(),
        }
    }

    pub fn cleaned(&self) -> PathBuf {
        self.processed_dir.join("cleaned_transactions.csv")
    }

    pub fn kpis(&self) -> PathBuf {
        self.kpi_dir.join("daily_kpis.csv")
    }

    pub fn anomalies(&self, metric: Metric) -> PathBuf {
        self.kpi_dir
            .join(format!("daily_kpis_{}_anomalies.csv", metric.as_str()))
    }

    pub fn incidents(&self, metric: Metric) -> PathBuf {
        self.kpi_dir
            .join(format!("{}_incidents.csv", metric.as_str()))
    }

    pub fn forecast(&self, metric: Metric) -> PathBuf {
        self.kpi_dir.join(format!("{}_forecast.csv", metric.as_str()))
    }

    pub fn insights(&self) -> PathBuf {
        self.kpi_dir.join("decision_insights.csv")
    }
}
