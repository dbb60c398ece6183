use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One raw sale line as read from the export, before any validation.
#[derive(Debug, Clone, Default)]
pub struct RawTransaction {
    pub invoice_no: String,
    pub stock_code: String,
    pub description: Option<String>,
    pub quantity: String,
    pub invoice_date: String,
    pub unit_price: String,
    pub customer_id: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTransaction {
    #[serde(rename = "InvoiceNo")]
    pub invoice_no: String,
    #[serde(rename = "StockCode")]
    pub stock_code: String,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "InvoiceDate", with = "timestamp_format")]
    pub invoice_date: NaiveDateTime,
    #[serde(rename = "UnitPrice")]
    pub unit_price: f64,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Revenue")]
    pub revenue: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyKpi {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
    pub customers: u64,
    pub quantity: i64,
    pub aov: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Revenue,
    Orders,
    Customers,
    Quantity,
    Aov,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::Orders => "orders",
            Metric::Customers => "customers",
            Metric::Quantity => "quantity",
            Metric::Aov => "aov",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Revenue => "Revenue",
            Metric::Orders => "Order count",
            Metric::Customers => "Customer count",
            Metric::Quantity => "Units sold",
            Metric::Aov => "Average order value",
        }
    }

    pub fn value(&self, kpi: &DailyKpi) -> f64 {
        match self {
            Metric::Revenue => kpi.revenue,
            Metric::Orders => kpi.orders as f64,
            Metric::Customers => kpi.customers as f64,
            Metric::Quantity => kpi.quantity as f64,
            Metric::Aov => kpi.aov,
        }
    }
}

/// A daily KPI row with rolling statistics for one metric.
///
/// `rolling_mean`/`rolling_std` are `None` until a full window is available;
/// `z_score` is additionally `None` when the window has zero spread.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub kpi: DailyKpi,
    pub metric: Metric,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub z_score: Option<f64>,
    pub anomaly: bool,
}

impl AnomalyRecord {
    pub fn value(&self) -> f64 {
        self.metric.value(&self.kpi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub forecast: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub team: String,
    pub action: String,
    pub priority: Priority,
    pub expected_impact: String,
}

/// Inputs that justify an insight's classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub metric: Metric,
    #[serde(alias = "baseline_revenue")]
    pub baseline: f64,
    pub z_score: f64,
    pub rolling_window_days: usize,
    pub forecast_horizon_days: usize,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub date: NaiveDate,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub valid_until: NaiveDate,
    pub insight: String,
    pub recommended_actions: Vec<RecommendedAction>,
    pub audit: Audit,
    pub generated_at: DateTime<Utc>,
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
