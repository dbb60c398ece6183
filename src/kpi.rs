use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::error::{PipelineError, Result, Stage};
use crate::models::{CleanTransaction, DailyKpi};

#[derive(Default)]
struct DayAccumulator<'a> {
    revenue: f64,
    quantity: i64,
    invoices: HashSet<&'a str>,
    customers: HashSet<&'a str>,
}

/// Groups cleaned transactions into one KPI row per calendar date, oldest first.
pub fn compute_daily_kpis(transactions: &[CleanTransaction]) -> Result<Vec<DailyKpi>> {
    if transactions.is_empty() {
        return Err(PipelineError::InsufficientHistory {
            stage: Stage::Aggregate,
            required: 1,
            available: 0,
        });
    }

    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for tx in transactions {
        let day = days.entry(tx.date).or_default();
        day.revenue += tx.revenue;
        day.quantity = day.quantity.checked_add(tx.quantity).ok_or_else(|| {
            PipelineError::computation(
                Stage::Aggregate,
                format!("units sold on {} overflow a 64-bit total", tx.date),
            )
        })?;
        day.invoices.insert(tx.invoice_no.as_str());
        day.customers.insert(tx.customer_id.as_str());
    }

    let mut kpis = Vec::with_capacity(days.len());
    for (date, day) in days {
        if !day.revenue.is_finite() {
            return Err(PipelineError::computation(
                Stage::Aggregate,
                format!("revenue on {date} is not a finite number"),
            ));
        }
        let orders = day.invoices.len() as u64;
        if orders == 0 {
            return Err(PipelineError::computation(
                Stage::Aggregate,
                format!("no orders on {date}; average order value is undefined"),
            ));
        }

        kpis.push(DailyKpi {
            date,
            revenue: day.revenue,
            orders,
            customers: day.customers.len() as u64,
            quantity: day.quantity,
            aov: day.revenue / orders as f64,
        });
    }

    tracing::info!(days = kpis.len(), "Computed daily KPIs");
    Ok(kpis)
}
