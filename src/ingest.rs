use std::io::Read;
use std::path::Path;

use csv::ByteRecord;

use crate::error::{PipelineError, Result, Stage};
use crate::models::RawTransaction;

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "InvoiceNo",
    "StockCode",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
];

struct ColumnMap {
    invoice_no: usize,
    stock_code: usize,
    quantity: usize,
    invoice_date: usize,
    unit_price: usize,
    customer_id: usize,
    description: Option<usize>,
    country: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &ByteRecord) -> Result<Self> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| decode(h).trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::data_quality(
                Stage::Ingest,
                format!("missing required columns: {}", missing.join(", ")),
            ));
        }

        let required = |name: &str| {
            find(name).ok_or_else(|| {
                PipelineError::data_quality(Stage::Ingest, format!("missing column {name}"))
            })
        };

        Ok(Self {
            invoice_no: required("InvoiceNo")?,
            stock_code: required("StockCode")?,
            quantity: required("Quantity")?,
            invoice_date: required("InvoiceDate")?,
            unit_price: required("UnitPrice")?,
            customer_id: required("CustomerID")?,
            description: find("Description"),
            country: find("Country"),
        })
    }
}

pub fn read_raw_transactions(path: &Path) -> Result<Vec<RawTransaction>> {
    let file = std::fs::File::open(path).map_err(|err| {
        PipelineError::data_quality(
            Stage::Ingest,
            format!("cannot open {}: {err}", path.display()),
        )
    })?;
    parse_raw(file)
}

/// Reads raw rows without validating values; the cleaner decides what survives.
pub fn parse_raw<R: Read>(reader: R) -> Result<Vec<RawTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let unreadable = |err: csv::Error| {
        PipelineError::data_quality(Stage::Ingest, format!("unreadable input: {err}"))
    };

    let headers = reader.byte_headers().map_err(unreadable)?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record).map_err(unreadable)? {
        let field = |idx: usize| record.get(idx).map(decode).unwrap_or_default();
        let optional = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(decode)
                .filter(|v| !v.trim().is_empty())
        };

        rows.push(RawTransaction {
            invoice_no: field(columns.invoice_no),
            stock_code: field(columns.stock_code),
            description: optional(columns.description),
            quantity: field(columns.quantity),
            invoice_date: field(columns.invoice_date),
            unit_price: field(columns.unit_price),
            customer_id: optional(Some(columns.customer_id)),
            country: optional(columns.country),
        });
    }

    tracing::debug!(rows = rows.len(), "Read raw transactions");
    Ok(rows)
}

// Retail exports are commonly Latin-1; every byte maps to the same code point.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_with_optional_columns() {
        let csv = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country\n\
                   536365,85123A,WHITE HANGING HEART,6,12/1/2010 8:26,2.55,17850,United Kingdom\n\
                   536366,22633,HAND WARMER,6,12/1/2010 8:28,1.85,,United Kingdom\n";
        let rows = parse_raw(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].invoice_no, "536365");
        assert_eq!(rows[0].description.as_deref(), Some("WHITE HANGING HEART"));
        assert_eq!(rows[0].customer_id.as_deref(), Some("17850"));
        assert_eq!(rows[1].customer_id, None);
    }

    #[test]
    fn missing_required_columns_is_a_data_quality_error() {
        let csv = "InvoiceNo,StockCode,Quantity,InvoiceDate\n1,A,2,2011-01-01\n";
        let err = parse_raw(csv.as_bytes()).unwrap_err();
        match err {
            PipelineError::DataQuality { stage, detail } => {
                assert_eq!(stage, Stage::Ingest);
                assert!(detail.contains("UnitPrice"));
                assert!(detail.contains("CustomerID"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decodes_latin1_fields() {
        let mut csv = b"InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID\n".to_vec();
        csv.extend_from_slice(b"1,A,CAF\xc9 MUG,1,2011-01-01 10:00:00,2.0,42\n");
        let rows = parse_raw(csv.as_slice()).unwrap();
        assert_eq!(rows[0].description.as_deref(), Some("CAF\u{c9} MUG"));
    }

    #[test]
    fn directory_input_is_a_data_quality_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_raw_transactions(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataQuality { stage: Stage::Ingest, .. }
        ));
        assert!(err.to_string().starts_with("[ingest]"));
    }

    #[test]
    fn short_rows_are_kept_for_the_cleaner() {
        let csv = "InvoiceNo,StockCode,Quantity,InvoiceDate,UnitPrice,CustomerID\n1,A,2\n";
        let rows = parse_raw(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unit_price, "");
        assert_eq!(rows[0].customer_id, None);
    }
}
