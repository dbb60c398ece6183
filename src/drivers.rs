use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{PipelineError, Result, Stage};
use crate::models::CleanTransaction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueDriver {
    pub stock_code: String,
    pub before: f64,
    pub after: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub date: NaiveDate,
    pub compared_to: NaiveDate,
    pub drivers: Vec<RevenueDriver>,
}

// Largest drops first.
pub fn attribute_revenue_change(
    transactions: &[CleanTransaction],
    date: NaiveDate,
) -> Result<DriverReport> {
    if !transactions.iter().any(|tx| tx.date == date) {
        return Err(PipelineError::data_quality(
            Stage::Drivers,
            format!("no transactions on {date}"),
        ));
    }

    let previous = transactions
        .iter()
        .map(|tx| tx.date)
        .filter(|d| *d < date)
        .max()
        .ok_or(PipelineError::InsufficientHistory {
            stage: Stage::Drivers,
            required: 2,
            available: 1,
        })?;

    let mut by_code: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for tx in transactions {
        if tx.date == previous {
            by_code.entry(tx.stock_code.as_str()).or_default().0 += tx.revenue;
        } else if tx.date == date {
            by_code.entry(tx.stock_code.as_str()).or_default().1 += tx.revenue;
        }
    }

    let mut drivers: Vec<RevenueDriver> = by_code
        .into_iter()
        .map(|(code, (before, after))| RevenueDriver {
            stock_code: code.to_string(),
            before,
            after,
            change: after - before,
        })
        .collect();
    drivers.sort_by(|a, b| a.change.total_cmp(&b.change));

    tracing::debug!(%date, %previous, products = drivers.len(), "Attributed revenue change");

    Ok(DriverReport {
        date,
        compared_to: previous,
        drivers,
    })
}
