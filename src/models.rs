//! Core data models used throughout the ingestion pipeline.
//!
//! These types follow a record from the publisher's raw artifacts to the
//! typed row handed to the persistence writer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// A locally retrieved source artifact.
///
/// Owned by the fetcher and consumed by the loader (dataset) or the
/// reconciler (dictionary). Lives for a single ingestion run.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub path: PathBuf,
    pub location: String,
    pub retrieved_at: DateTime<Utc>,
    pub bytes: u64,
    pub sha256: String,
}

pub type RawDatasetHandle = ArtifactHandle;
pub type RawDictionaryHandle = ArtifactHandle;

/// Field names the dictionary declares authoritative, in dictionary order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedFieldSet {
    fields: Vec<String>,
}

impl ExpectedFieldSet {
    /// Builds the set from raw names. Names are trimmed; empty names and
    /// repeats are skipped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || fields.iter().any(|f| f == name) {
                continue;
            }
            fields.push(name.to_string());
        }
        Self { fields }
    }

    /// Returns a copy that also requires `field`.
    pub fn with_required(&self, field: &str) -> Self {
        Self::new(self.fields.iter().map(String::as_str).chain([field]))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The dataset as read from disk: verbatim header plus string cells.
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One cleaned borrower-loan entity, ready for persistence.
///
/// Optional fields are `None` when the source cell was missing or could
/// not be coerced to the field's type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub loan_number: String,
    pub date_approved: Option<NaiveDate>,
    pub processing_method: Option<String>,
    pub borrower_name: Option<String>,
    pub borrower_address: Option<String>,
    pub borrower_city: Option<String>,
    pub borrower_state: Option<String>,
    pub borrower_zip: Option<String>,
    pub loan_status_date: Option<NaiveDate>,
    pub loan_status: Option<String>,
    pub term: Option<i64>,
    pub sba_guaranty_percentage: Option<Decimal>,
    pub initial_approval_amount: Option<Decimal>,
    pub current_approval_amount: Option<Decimal>,
    pub jobs_reported: Option<i64>,
    pub naics_code: Option<String>,
    pub business_type: Option<String>,
    pub servicing_lender_name: Option<String>,
    pub forgiveness_amount: Option<Decimal>,
    pub forgiveness_date: Option<NaiveDate>,
}

impl NormalizedRecord {
    pub fn new(loan_number: impl Into<String>) -> Self {
        Self {
            loan_number: loan_number.into(),
            ..Default::default()
        }
    }
}
