use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an already-open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Append-only: loan_number is deliberately not UNIQUE.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ppp_loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            loaded_at INTEGER NOT NULL,
            loan_number TEXT NOT NULL CHECK (length(loan_number) > 0),
            date_approved TEXT,
            processing_method TEXT,
            borrower_name TEXT,
            borrower_address TEXT,
            borrower_city TEXT,
            borrower_state TEXT,
            borrower_zip TEXT,
            loan_status_date TEXT,
            loan_status TEXT,
            term INTEGER,
            sba_guaranty_percentage TEXT,
            initial_approval_amount TEXT,
            current_approval_amount TEXT,
            jobs_reported INTEGER,
            naics_code TEXT,
            business_type TEXT,
            servicing_lender_name TEXT,
            forgiveness_amount TEXT,
            forgiveness_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ppp_loans_loan_number ON ppp_loans(loan_number)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ppp_loans_borrower_name ON ppp_loans(borrower_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ppp_loans_batch_id ON ppp_loans(batch_id)")
        .execute(pool)
        .await?;

    Ok(())
}
