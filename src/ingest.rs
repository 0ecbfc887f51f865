//! Ingestion pipeline orchestration.
//!
//! One run walks a fixed sequence of states:
//!
//! ```text
//! Idle → Fetching → LoadingParsing → Reconciling → Normalizing → Persisting → Succeeded
//!            └──────────────┴──────────────┴─────────────┴────────────┴──→ Failed
//! ```
//!
//! Any stage error moves the run straight to `Failed` carrying that error.
//! Nothing is retried. A schema mismatch is not an exception in the
//! reconciler but still fails the run with [`IngestError::SchemaMismatch`].

use sqlx::SqlitePool;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::fetch;
use crate::loader::{self, LoaderOptions};
use crate::migrate;
use crate::normalize::{self, IDENTIFIER_COLUMN};
use crate::persist;
use crate::reconcile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Fetching,
    LoadingParsing,
    Reconciling,
    Normalizing,
    Persisting,
    Succeeded { persisted: usize },
    Failed { stage: &'static str, category: &'static str },
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestState::Idle => "idle",
            IngestState::Fetching => "fetching",
            IngestState::LoadingParsing => "loading",
            IngestState::Reconciling => "reconciling",
            IngestState::Normalizing => "normalizing",
            IngestState::Persisting => "persisting",
            IngestState::Succeeded { .. } => "succeeded",
            IngestState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestState::Succeeded { .. } | IngestState::Failed { .. }
        )
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub batch_id: String,
    pub rows_loaded: usize,
    pub rows_dropped: usize,
    pub records_persisted: usize,
    pub elapsed: Duration,
}

/// A single ingestion run and its state history.
#[derive(Debug)]
pub struct IngestRun {
    batch_id: String,
    state: IngestState,
    history: Vec<IngestState>,
}

impl Default for IngestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestRun {
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            state: IngestState::Idle,
            history: vec![IngestState::Idle],
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Every state the run has been in, oldest first.
    pub fn history(&self) -> &[IngestState] {
        &self.history
    }

    fn advance(&mut self, next: IngestState) {
        tracing::info!(
            batch_id = %self.batch_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "ingest state transition"
        );
        self.state = next.clone();
        self.history.push(next);
    }

    fn fail(&mut self, err: IngestError) -> IngestError {
        let stage = self.state.as_str();
        tracing::error!(
            batch_id = %self.batch_id,
            stage,
            category = err.category(),
            error = %err,
            "ingest failed"
        );
        self.advance(IngestState::Failed {
            stage,
            category: err.category(),
        });
        err
    }

    /// Drive the run to a terminal state using `pool` for persistence.
    pub async fn execute(
        &mut self,
        config: &Config,
        pool: &SqlitePool,
    ) -> Result<IngestSummary, IngestError> {
        debug_assert_eq!(self.state, IngestState::Idle, "an ingest run executes once");
        let started = Instant::now();

        self.advance(IngestState::Fetching);
        let (dataset, dictionary) = fetch::fetch_artifacts(&config.source)
            .await
            .map_err(|e| self.fail(e))?;

        self.advance(IngestState::LoadingParsing);
        let options = LoaderOptions::from(&config.loader);
        let table = run_blocking(move || loader::load_dataset(&dataset, options))
            .await
            .map_err(|e| self.fail(e))?;
        let rows_loaded = table.len();

        self.advance(IngestState::Reconciling);
        let expected = run_blocking(move || reconcile::read_dictionary(&dictionary))
            .await
            .map_err(|e| self.fail(e))?
            .with_required(IDENTIFIER_COLUMN);
        if !reconcile::reconcile(&expected, &table.columns) {
            let missing = reconcile::missing_fields(&expected, &table.columns);
            return Err(self.fail(IngestError::SchemaMismatch { missing }));
        }

        self.advance(IngestState::Normalizing);
        let (records, summary) =
            run_blocking(move || Ok(normalize::normalize_with_summary(&table)))
                .await
                .map_err(|e| self.fail(e))?;

        self.advance(IngestState::Persisting);
        let persisted = persist::persist_records(pool, &self.batch_id, &records)
            .await
            .map_err(|e| self.fail(e))?;

        self.advance(IngestState::Succeeded { persisted });

        Ok(IngestSummary {
            batch_id: self.batch_id.clone(),
            rows_loaded,
            rows_dropped: summary.rows_dropped,
            records_persisted: persisted,
            elapsed: started.elapsed(),
        })
    }
}

/// Run a file-bound stage on the blocking pool so the async workers (and
/// the query server sharing them) stay responsive.
async fn run_blocking<T, F>(stage: F) -> Result<T, IngestError>
where
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(stage)
        .await
        .map_err(|e| IngestError::Load(format!("worker task failed: {}", e)))?
}

/// Run one ingestion pass against an already-open pool.
pub async fn ingest_with_pool(
    config: &Config,
    pool: &SqlitePool,
) -> Result<IngestSummary, IngestError> {
    IngestRun::new().execute(config, pool).await
}

/// Run one ingestion pass with its own pool, closed before returning.
pub async fn run_ingest(config: &Config) -> Result<IngestSummary, IngestError> {
    let pool = db::connect(config)
        .await
        .map_err(|e| IngestError::persist(None, format!("{:#}", e)))?;

    let result = match migrate::apply(&pool).await {
        Ok(()) => ingest_with_pool(config, &pool).await,
        Err(e) => Err(IngestError::persist(None, format!("{:#}", e))),
    };

    pool.close().await;
    result
}

/// CLI entry point: prints the run summary to stdout.
pub async fn run_ingest_cli(config: &Config) -> anyhow::Result<()> {
    let summary = run_ingest(config)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.category(), e))?;

    println!("ingest");
    println!("  batch: {}", summary.batch_id);
    println!("  rows loaded: {}", summary.rows_loaded);
    println!("  rows dropped: {}", summary.rows_dropped);
    println!("  records persisted: {}", summary.records_persisted);
    println!("  elapsed: {:.1?}", summary.elapsed);
    println!("ok");

    Ok(())
}
