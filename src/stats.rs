//! Database statistics.
//!
//! Summarizes what has been loaded: row counts, distinct loan numbers, and
//! a per-batch breakdown. Rows are appended on every run, so the duplicate
//! count shows how much overlap repeated loads have produced.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub batch_id: String,
    pub records: i64,
    pub loaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanStats {
    pub total_records: i64,
    pub distinct_loan_numbers: i64,
    pub batches: Vec<BatchStats>,
}

impl LoanStats {
    /// Rows whose loan number was already stored by another row.
    pub fn duplicate_records(&self) -> i64 {
        self.total_records - self.distinct_loan_numbers
    }
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<LoanStats> {
    let total_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ppp_loans")
        .fetch_one(pool)
        .await?;

    let distinct_loan_numbers: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT loan_number) FROM ppp_loans")
            .fetch_one(pool)
            .await?;

    let batch_rows = sqlx::query(
        r#"
        SELECT batch_id, COUNT(*) AS records, MIN(loaded_at) AS loaded_at
        FROM ppp_loans
        GROUP BY batch_id
        ORDER BY loaded_at DESC, batch_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let batches = batch_rows
        .iter()
        .map(|row| BatchStats {
            batch_id: row.get("batch_id"),
            records: row.get("records"),
            loaded_at: row.get("loaded_at"),
        })
        .collect();

    Ok(LoanStats {
        total_records,
        distinct_loan_numbers,
        batches,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = collect_stats(&pool).await;
    pool.close().await;
    let stats = result?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("PPP Harness — Database Stats");
    println!("============================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Records:       {}", stats.total_records);
    println!("  Loan numbers:  {}", stats.distinct_loan_numbers);
    println!("  Duplicates:    {}", stats.duplicate_records());

    if !stats.batches.is_empty() {
        println!();
        println!("  By batch:");
        println!("  {:<38} {:>8}   LOADED", "BATCH", "RECORDS");
        println!("  {}", "-".repeat(68));
        for b in &stats.batches {
            println!(
                "  {:<38} {:>8}   {}",
                b.batch_id,
                b.records,
                format_ts(b.loaded_at)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
