use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{CleanTransaction, RawTransaction};

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Counts of rows removed by the cleaning policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_in: usize,
    pub kept: usize,
    pub missing_customer: usize,
    pub non_positive_quantity: usize,
    pub non_positive_price: usize,
    pub malformed: usize,
}

impl CleanStats {
    pub fn dropped(&self) -> usize {
        self.rows_in - self.kept
    }
}

enum Rejection {
    MissingCustomer,
    NonPositiveQuantity,
    NonPositivePrice,
    Malformed,
}

/// Drops rows that cannot contribute to a sale and attaches revenue and date.
/// Invalid rows are excluded silently; only the counts are reported.
pub fn clean(rows: &[RawTransaction]) -> (Vec<CleanTransaction>, CleanStats) {
    let mut stats = CleanStats {
        rows_in: rows.len(),
        ..CleanStats::default()
    };
    let mut cleaned = Vec::with_capacity(rows.len());

    for row in rows {
        match clean_row(row) {
            Ok(tx) => cleaned.push(tx),
            Err(Rejection::MissingCustomer) => stats.missing_customer += 1,
            Err(Rejection::NonPositiveQuantity) => stats.non_positive_quantity += 1,
            Err(Rejection::NonPositivePrice) => stats.non_positive_price += 1,
            Err(Rejection::Malformed) => stats.malformed += 1,
        }
    }
    stats.kept = cleaned.len();

    if stats.dropped() > 0 {
        tracing::warn!(
            dropped = stats.dropped(),
            missing_customer = stats.missing_customer,
            non_positive_quantity = stats.non_positive_quantity,
            non_positive_price = stats.non_positive_price,
            malformed = stats.malformed,
            "Dropped invalid transaction rows"
        );
    }
    tracing::info!(rows_in = stats.rows_in, kept = stats.kept, "Cleaned transactions");

    (cleaned, stats)
}

fn clean_row(row: &RawTransaction) -> Result<CleanTransaction, Rejection> {
    let customer_id = match row.customer_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(Rejection::MissingCustomer),
    };

    let quantity = parse_quantity(&row.quantity).ok_or(Rejection::Malformed)?;
    if quantity <= 0 {
        return Err(Rejection::NonPositiveQuantity);
    }

    let unit_price: f64 = row
        .unit_price
        .trim()
        .parse()
        .map_err(|_| Rejection::Malformed)?;
    if !unit_price.is_finite() {
        return Err(Rejection::Malformed);
    }
    if unit_price <= 0.0 {
        return Err(Rejection::NonPositivePrice);
    }

    let invoice_date = parse_timestamp(&row.invoice_date).ok_or(Rejection::Malformed)?;

    let revenue = quantity as f64 * unit_price;
    if !revenue.is_finite() {
        return Err(Rejection::Malformed);
    }

    Ok(CleanTransaction {
        invoice_no: row.invoice_no.clone(),
        stock_code: row.stock_code.clone(),
        description: row.description.clone(),
        quantity,
        invoice_date,
        unit_price,
        customer_id,
        country: row.country.clone(),
        revenue,
        date: invoice_date.date(),
    })
}

// Some exports write integral quantities as "6.0".
fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value: f64 = raw.parse().ok()?;
    // `as` saturates; values outside the i64 range are rejected instead.
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    if in_range && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
