//! Borrower search over persisted records.
//!
//! Partial, case-insensitive match on borrower name, optional exact match
//! on state and city, capped result count. Read-only.

use anyhow::{bail, Result};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::get::{LoanRecord, RECORD_COLUMNS};

/// Filters for [`search_loans`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Run a search. `limit` defaults to `query.default_limit` and is clamped
/// to `[1, query.max_limit]`.
pub async fn search_loans(
    pool: &SqlitePool,
    config: &Config,
    query: &SearchQuery,
) -> Result<Vec<LoanRecord>> {
    let name = query.name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }

    let limit = query
        .limit
        .unwrap_or(config.query.default_limit)
        .clamp(1, config.query.max_limit.max(1));

    let mut sql = format!(
        "SELECT {} FROM ppp_loans WHERE borrower_name LIKE ? ESCAPE '\\'",
        RECORD_COLUMNS
    );
    let state = non_empty(query.state.as_deref());
    let city = non_empty(query.city.as_deref());
    if state.is_some() {
        sql.push_str(" AND borrower_state = ?");
    }
    if city.is_some() {
        sql.push_str(" AND borrower_city = ?");
    }
    sql.push_str(" ORDER BY id ASC LIMIT ?");

    let mut q = sqlx::query(&sql).bind(format!("%{}%", escape_like(name)));
    if let Some(state) = state {
        q = q.bind(state);
    }
    if let Some(city) = city {
        q = q.bind(city);
    }
    let rows = q.bind(limit).fetch_all(pool).await?;

    tracing::debug!(
        name,
        state = ?state,
        city = ?city,
        results = rows.len(),
        "search executed"
    );

    Ok(rows.iter().map(LoanRecord::from_row).collect())
}

/// CLI entry point: prints matches to stdout.
///
/// With `json`, prints the matches as one JSON array (empty when nothing
/// matches) so the output can be piped.
pub async fn run_search(config: &Config, query: &SearchQuery, json: bool) -> Result<()> {
    let records = if query.name.trim().is_empty() {
        Vec::new()
    } else {
        let pool = db::connect(config).await?;
        let result = search_loans(&pool, config, query).await;
        pool.close().await;
        result?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in records.iter().enumerate() {
        println!(
            "{}. {}",
            i + 1,
            r.borrower_name.as_deref().unwrap_or("(unnamed)")
        );
        println!("    tin: {}", r.loan_number);
        println!(
            "    location: {}, {}",
            r.borrower_city.as_deref().unwrap_or("-"),
            r.borrower_state.as_deref().unwrap_or("-")
        );
        if let Some(amount) = r.initial_approval_amount {
            println!("    approved: {}", amount);
        }
        if let Some(status) = &r.loan_status {
            println!("    status: {}", status);
        }
        println!();
    }

    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("Acme"), "Acme");
    }

    #[test]
    fn blank_filters_are_ignored() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" TX ")), Some("TX"));
        assert_eq!(non_empty(None), None);
    }
}
