use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result, Stage};
use crate::models::{CleanTransaction, DailyKpi, Insight, RiskLevel};

// Nested fields travel as JSON inside CSV cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRow {
    pub date: NaiveDate,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub valid_until: NaiveDate,
    pub insight: String,
    pub recommended_actions: String,
    pub audit: String,
    pub generated_at: DateTime<Utc>,
}

impl InsightRow {
    pub fn encode(insight: &Insight) -> Result<Self> {
        let json = |err: serde_json::Error| {
            PipelineError::computation(Stage::Report, format!("cannot encode insight: {err}"))
        };
        Ok(Self {
            date: insight.date,
            risk_level: insight.risk_level,
            confidence_score: insight.confidence_score,
            valid_until: insight.valid_until,
            insight: insight.insight.clone(),
            recommended_actions: serde_json::to_string(&insight.recommended_actions)
                .map_err(json)?,
            audit: serde_json::to_string(&insight.audit).map_err(json)?,
            generated_at: insight.generated_at,
        })
    }

    pub fn decode(self) -> Result<Insight> {
        let date = self.date;
        let json = |err: serde_json::Error| {
            PipelineError::data_quality(Stage::Store, format!("insight for {date}: {err}"))
        };
        Ok(Insight {
            date: self.date,
            risk_level: self.risk_level,
            confidence_score: self.confidence_score,
            valid_until: self.valid_until,
            insight: self.insight,
            recommended_actions: serde_json::from_str(&self.recommended_actions).map_err(json)?,
            audit: serde_json::from_str(&self.audit).map_err(json)?,
            generated_at: self.generated_at,
        })
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| {
        PipelineError::data_quality(Stage::Store, format!("cannot read {}: {err}", path.display()))
    })?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<T>() {
        rows.push(row.map_err(|err| {
            PipelineError::data_quality(Stage::Store, format!("{}: {err}", path.display()))
        })?);
    }
    Ok(rows)
}

pub fn load_kpis(path: &Path) -> Result<Vec<DailyKpi>> {
    read_rows(path)
}

pub fn load_insights(path: &Path) -> Result<Vec<Insight>> {
    read_rows::<InsightRow>(path)?
        .into_iter()
        .map(InsightRow::decode)
        .collect()
}

pub fn load_clean_transactions(path: &Path) -> Result<Vec<CleanTransaction>> {
    read_rows(path)
}
