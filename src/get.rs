//! Record retrieval by loan number.
//!
//! Used by the `ppp get` CLI command and the `GET /business/{tin}` endpoint.
//! Loan numbers are not unique across loads; the earliest stored row wins.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::config::Config;
use crate::db;

/// Columns selected for every read of `ppp_loans`.
pub(crate) const RECORD_COLUMNS: &str = "id, batch_id, loaded_at, loan_number, date_approved, \
    processing_method, borrower_name, borrower_address, borrower_city, borrower_state, \
    borrower_zip, loan_status_date, loan_status, term, sba_guaranty_percentage, \
    initial_approval_amount, current_approval_amount, jobs_reported, naics_code, \
    business_type, servicing_lender_name, forgiveness_amount, forgiveness_date";

/// A persisted loan record.
///
/// The loan number is published as `tin` to match the public API shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoanRecord {
    pub id: i64,
    pub batch_id: String,
    pub loaded_at: String, // ISO8601
    #[serde(rename = "tin")]
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

impl LoanRecord {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            batch_id: row.get("batch_id"),
            loaded_at: format_ts_iso(row.get("loaded_at")),
            loan_number: row.get("loan_number"),
            date_approved: read_date(row, "date_approved"),
            processing_method: row.get("processing_method"),
            borrower_name: row.get("borrower_name"),
            borrower_address: row.get("borrower_address"),
            borrower_city: row.get("borrower_city"),
            borrower_state: row.get("borrower_state"),
            borrower_zip: row.get("borrower_zip"),
            loan_status_date: read_date(row, "loan_status_date"),
            loan_status: row.get("loan_status"),
            term: row.get("term"),
            sba_guaranty_percentage: read_decimal(row, "sba_guaranty_percentage"),
            initial_approval_amount: read_decimal(row, "initial_approval_amount"),
            current_approval_amount: read_decimal(row, "current_approval_amount"),
            jobs_reported: row.get("jobs_reported"),
            naics_code: row.get("naics_code"),
            business_type: row.get("business_type"),
            servicing_lender_name: row.get("servicing_lender_name"),
            forgiveness_amount: read_decimal(row, "forgiveness_amount"),
            forgiveness_date: read_date(row, "forgiveness_date"),
        }
    }
}

fn read_date(row: &SqliteRow, column: &str) -> Option<NaiveDate> {
    let text: Option<String> = row.get(column);
    text.and_then(|t| NaiveDate::parse_from_str(&t, "%Y-%m-%d").ok())
}

fn read_decimal(row: &SqliteRow, column: &str) -> Option<Decimal> {
    let text: Option<String> = row.get(column);
    text.and_then(|t| Decimal::from_str(&t).ok())
}

/// Look up the first stored record with `loan_number`.
pub async fn find_loan(pool: &SqlitePool, loan_number: &str) -> Result<Option<LoanRecord>> {
    let sql = format!(
        "SELECT {} FROM ppp_loans WHERE loan_number = ? ORDER BY id ASC LIMIT 1",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(loan_number)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(LoanRecord::from_row))
}

/// Like [`find_loan`] but a missing record is an error.
pub async fn get_loan(pool: &SqlitePool, loan_number: &str) -> Result<LoanRecord> {
    match find_loan(pool, loan_number).await? {
        Some(record) => Ok(record),
        None => bail!("business not found: {}", loan_number),
    }
}

/// CLI entry point: prints one record to stdout, as text or JSON.
pub async fn run_get(config: &Config, loan_number: &str, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = get_loan(&pool, loan_number).await;
    pool.close().await;
    let record = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Loan {} ---", record.loan_number);
    print_field("borrower", record.borrower_name.as_deref());
    print_field("address", record.borrower_address.as_deref());
    print_field("city", record.borrower_city.as_deref());
    print_field("state", record.borrower_state.as_deref());
    print_field("zip", record.borrower_zip.as_deref());
    print_field("status", record.loan_status.as_deref());
    print_field("approved", record.date_approved.map(|d| d.to_string()).as_deref());
    print_field(
        "initial amount",
        record.initial_approval_amount.map(|d| d.to_string()).as_deref(),
    );
    print_field(
        "current amount",
        record.current_approval_amount.map(|d| d.to_string()).as_deref(),
    );
    print_field(
        "forgiven",
        record.forgiveness_amount.map(|d| d.to_string()).as_deref(),
    );
    print_field(
        "forgiven on",
        record.forgiveness_date.map(|d| d.to_string()).as_deref(),
    );
    print_field("jobs", record.jobs_reported.map(|j| j.to_string()).as_deref());
    print_field("lender", record.servicing_lender_name.as_deref());
    println!("{:<16}{}", "batch:", record.batch_id);
    println!("{:<16}{}", "loaded at:", record.loaded_at);

    Ok(())
}

fn print_field(label: &str, value: Option<&str>) {
    println!("{:<16}{}", format!("{}:", label), value.unwrap_or("-"));
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
