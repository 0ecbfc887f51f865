//! Persistence writer: commits a batch of records in one transaction.
//!
//! The commit is the publication point. Until it succeeds no reader sees
//! any row of the batch; if any insert fails the transaction is rolled
//! back and the batch leaves no trace.
//!
//! Rows are appended. Loading overlapping loan numbers twice stores them
//! twice, each tagged with the `batch_id` of the run that wrote it.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::error::IngestError;
use crate::models::NormalizedRecord;

const INSERT_SQL: &str = r#"
INSERT INTO ppp_loans (
    batch_id, loaded_at, loan_number, date_approved, processing_method,
    borrower_name, borrower_address, borrower_city, borrower_state, borrower_zip,
    loan_status_date, loan_status, term, sba_guaranty_percentage,
    initial_approval_amount, current_approval_amount, jobs_reported,
    naics_code, business_type, servicing_lender_name,
    forgiveness_amount, forgiveness_date
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Insert all `records` under `batch_id`, all or nothing.
///
/// Returns the number of rows committed.
pub async fn persist_records(
    pool: &SqlitePool,
    batch_id: &str,
    records: &[NormalizedRecord],
) -> Result<usize, IngestError> {
    let loaded_at = Utc::now().timestamp();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| IngestError::persist(None, e))?;

    for (idx, record) in records.iter().enumerate() {
        let inserted = sqlx::query(INSERT_SQL)
            .bind(batch_id)
            .bind(loaded_at)
            .bind(&record.loan_number)
            .bind(date_text(record.date_approved))
            .bind(&record.processing_method)
            .bind(&record.borrower_name)
            .bind(&record.borrower_address)
            .bind(&record.borrower_city)
            .bind(&record.borrower_state)
            .bind(&record.borrower_zip)
            .bind(date_text(record.loan_status_date))
            .bind(&record.loan_status)
            .bind(record.term)
            .bind(decimal_text(record.sba_guaranty_percentage))
            .bind(decimal_text(record.initial_approval_amount))
            .bind(decimal_text(record.current_approval_amount))
            .bind(record.jobs_reported)
            .bind(&record.naics_code)
            .bind(&record.business_type)
            .bind(&record.servicing_lender_name)
            .bind(decimal_text(record.forgiveness_amount))
            .bind(date_text(record.forgiveness_date))
            .execute(&mut *tx)
            .await;

        if let Err(e) = inserted {
            tracing::error!(row = idx, loan_number = %record.loan_number, error = %e, "insert failed, rolling back batch");
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback reported an error");
            }
            return Err(IngestError::persist(Some(idx), e));
        }
    }

    tx.commit()
        .await
        .map_err(|e| IngestError::persist(None, e))?;

    tracing::info!(batch_id, records = records.len(), "inserted records into ppp_loans");
    Ok(records.len())
}

fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimals_are_stored_canonically() {
        assert_eq!(
            decimal_text(Some(Decimal::from_str("1500.00").unwrap())).as_deref(),
            Some("1500")
        );
        assert_eq!(
            decimal_text(Some(Decimal::from_str("0.50").unwrap())).as_deref(),
            Some("0.5")
        );
        assert_eq!(decimal_text(None), None);
    }

    #[test]
    fn dates_are_iso() {
        assert_eq!(
            date_text(NaiveDate::from_ymd_opt(2020, 5, 1)).as_deref(),
            Some("2020-05-01")
        );
    }
}
