//! Normalizer: turns a [`RawTable`] into typed [`NormalizedRecord`]s.
//!
//! Steps, in order:
//!
//! 1. Column names are trimmed and matched case-insensitively against the
//!    fixed [`Field`] mapping. Unknown columns are ignored; mapped fields
//!    whose column is absent stay `None`.
//! 2. Rows without a loan number are dropped. Nothing else drops a row.
//! 3. Numeric fields are coerced from text; failures become `None`.
//! 4. Date fields are coerced from text; failures become `None`.
//! 5. Every flavor of missing value (blank cells, `NA`, `NaN`, `NULL`, out
//!    of range dates, ...) is represented as `None`.
//!
//! Normalization is total: no cell can make it fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{NormalizedRecord, RawTable};

/// Column carrying the natural key.
pub const IDENTIFIER_COLUMN: &str = "LoanNumber";

/// Cell values treated as "no value", in addition to blank cells.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "NaT", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Every source column the persisted record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    LoanNumber,
    DateApproved,
    ProcessingMethod,
    BorrowerName,
    BorrowerAddress,
    BorrowerCity,
    BorrowerState,
    BorrowerZip,
    LoanStatusDate,
    LoanStatus,
    Term,
    SbaGuarantyPercentage,
    InitialApprovalAmount,
    CurrentApprovalAmount,
    JobsReported,
    NaicsCode,
    BusinessType,
    ServicingLenderName,
    ForgivenessAmount,
    ForgivenessDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Decimal,
    Integer,
    Date,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::LoanNumber,
        Field::DateApproved,
        Field::ProcessingMethod,
        Field::BorrowerName,
        Field::BorrowerAddress,
        Field::BorrowerCity,
        Field::BorrowerState,
        Field::BorrowerZip,
        Field::LoanStatusDate,
        Field::LoanStatus,
        Field::Term,
        Field::SbaGuarantyPercentage,
        Field::InitialApprovalAmount,
        Field::CurrentApprovalAmount,
        Field::JobsReported,
        Field::NaicsCode,
        Field::BusinessType,
        Field::ServicingLenderName,
        Field::ForgivenessAmount,
        Field::ForgivenessDate,
    ];

    /// Column name as published in the dataset header.
    pub fn column(&self) -> &'static str {
        match self {
            Field::LoanNumber => IDENTIFIER_COLUMN,
            Field::DateApproved => "DateApproved",
            Field::ProcessingMethod => "ProcessingMethod",
            Field::BorrowerName => "BorrowerName",
            Field::BorrowerAddress => "BorrowerAddress",
            Field::BorrowerCity => "BorrowerCity",
            Field::BorrowerState => "BorrowerState",
            Field::BorrowerZip => "BorrowerZip",
            Field::LoanStatusDate => "LoanStatusDate",
            Field::LoanStatus => "LoanStatus",
            Field::Term => "Term",
            Field::SbaGuarantyPercentage => "SBAGuarantyPercentage",
            Field::InitialApprovalAmount => "InitialApprovalAmount",
            Field::CurrentApprovalAmount => "CurrentApprovalAmount",
            Field::JobsReported => "JobsReported",
            Field::NaicsCode => "NAICSCode",
            Field::BusinessType => "BusinessType",
            Field::ServicingLenderName => "ServicingLenderName",
            Field::ForgivenessAmount => "ForgivenessAmount",
            Field::ForgivenessDate => "ForgivenessDate",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::InitialApprovalAmount
            | Field::CurrentApprovalAmount
            | Field::ForgivenessAmount
            | Field::SbaGuarantyPercentage => FieldKind::Decimal,
            Field::JobsReported | Field::Term => FieldKind::Integer,
            Field::DateApproved | Field::LoanStatusDate | Field::ForgivenessDate => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }
}

/// Counters reported after a normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub rows_in: usize,
    pub rows_dropped: usize,
    /// Non-blank cells in typed columns that failed coercion.
    pub cells_coerced_absent: usize,
}

/// Normalize every row of `table`, preserving the order of survivors.
pub fn normalize(table: &RawTable) -> Vec<NormalizedRecord> {
    normalize_with_summary(table).0
}

pub fn normalize_with_summary(table: &RawTable) -> (Vec<NormalizedRecord>, NormalizeSummary) {
    let layout = ColumnLayout::resolve(&table.columns);
    let mut summary = NormalizeSummary {
        rows_in: table.len(),
        ..Default::default()
    };

    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let loan_number = match layout.cell(row, Field::LoanNumber).and_then(clean_text) {
            Some(id) => id,
            None => {
                summary.rows_dropped += 1;
                continue;
            }
        };

        let mut record = NormalizedRecord::new(loan_number);
        for field in Field::ALL {
            if field == Field::LoanNumber {
                continue;
            }
            if let Some(cell) = layout.cell(row, field) {
                if !assign(&mut record, field, cell) {
                    summary.cells_coerced_absent += 1;
                }
            }
        }
        records.push(record);
    }

    tracing::info!(
        rows_in = summary.rows_in,
        rows_kept = records.len(),
        rows_dropped = summary.rows_dropped,
        cells_coerced_absent = summary.cells_coerced_absent,
        "cleaned and formatted data"
    );

    (records, summary)
}

/// Position of each [`Field`] in the table, if present.
struct ColumnLayout {
    indices: [Option<usize>; Field::ALL.len()],
}

impl ColumnLayout {
    fn resolve(columns: &[String]) -> Self {
        let mut indices = [None; Field::ALL.len()];
        for (slot, field) in indices.iter_mut().zip(Field::ALL) {
            *slot = columns
                .iter()
                .position(|c| c.trim().eq_ignore_ascii_case(field.column()));
        }
        Self { indices }
    }

    fn cell<'a>(&self, row: &'a [String], field: Field) -> Option<&'a str> {
        let slot = Field::ALL.iter().position(|f| *f == field)?;
        let idx = self.indices[slot]?;
        row.get(idx).map(String::as_str)
    }
}

/// Store `cell` into `field`. Returns false when a non-missing cell could
/// not be coerced and was recorded as absent.
fn assign(record: &mut NormalizedRecord, field: Field, cell: &str) -> bool {
    let present = !is_missing(cell);
    match field.kind() {
        FieldKind::Text => {
            let value = clean_text(cell);
            match field {
                Field::ProcessingMethod => record.processing_method = value,
                Field::BorrowerName => record.borrower_name = value,
                Field::BorrowerAddress => record.borrower_address = value,
                Field::BorrowerCity => record.borrower_city = value,
                Field::BorrowerState => record.borrower_state = value,
                Field::BorrowerZip => record.borrower_zip = value,
                Field::LoanStatus => record.loan_status = value,
                Field::NaicsCode => record.naics_code = value,
                Field::BusinessType => record.business_type = value,
                Field::ServicingLenderName => record.servicing_lender_name = value,
                _ => {}
            }
            true
        }
        FieldKind::Decimal => {
            let value = parse_decimal(cell);
            match field {
                Field::SbaGuarantyPercentage => record.sba_guaranty_percentage = value,
                Field::InitialApprovalAmount => record.initial_approval_amount = value,
                Field::CurrentApprovalAmount => record.current_approval_amount = value,
                Field::ForgivenessAmount => record.forgiveness_amount = value,
                _ => {}
            }
            value.is_some() || !present
        }
        FieldKind::Integer => {
            let value = parse_integer(cell);
            match field {
                Field::Term => record.term = value,
                Field::JobsReported => record.jobs_reported = value,
                _ => {}
            }
            value.is_some() || !present
        }
        FieldKind::Date => {
            let value = parse_date(cell);
            match field {
                Field::DateApproved => record.date_approved = value,
                Field::LoanStatusDate => record.loan_status_date = value,
                Field::ForgivenessDate => record.forgiveness_date = value,
                _ => {}
            }
            value.is_some() || !present
        }
    }
}

pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed)
}

/// Trimmed text, or `None` for a missing value.
pub fn clean_text(cell: &str) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.trim().to_string())
    }
}

/// Plain or scientific decimal notation. Non-finite and malformed values
/// are `None`, as are magnitudes `Decimal` cannot hold (more than 28
/// fractional digits, or beyond roughly ±7.9e28).
pub fn parse_decimal(cell: &str) -> Option<Decimal> {
    if is_missing(cell) {
        return None;
    }
    let s = cell.trim();
    // rust_decimal tolerates digit separators; the publisher never uses them.
    if s.contains('_') {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// A decimal with no fractional part that fits in `i64`.
pub fn parse_integer(cell: &str) -> Option<i64> {
    let d = parse_decimal(cell)?;
    if d.fract().is_zero() {
        d.to_i64()
    } else {
        None
    }
}

/// A calendar date in one of the accepted layouts, within the range
/// representable by nanosecond timestamps.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    if is_missing(cell) {
        return None;
    }
    let s = cell.trim();

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))?;

    in_timestamp_range(date).then_some(date)
}

fn in_timestamp_range(date: NaiveDate) -> bool {
    let (Some(min), Some(max)) = (
        NaiveDate::from_ymd_opt(1677, 9, 22),
        NaiveDate::from_ymd_opt(2262, 4, 11),
    ) else {
        return false;
    };
    (min..=max).contains(&date)
}
