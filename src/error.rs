//! Failure taxonomy for an ingestion run.
//!
//! Every variant is fatal to the run that raised it. Per-cell coercion
//! problems in the normalizer are not errors and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Download or local copy of a source artifact failed.
    #[error("failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    /// The dataset or dictionary could not be decoded or parsed.
    #[error("failed to load: {0}")]
    Load(String),

    /// The dataset is missing fields the dictionary declares.
    #[error(
        "schema validation failed: missing {count} column(s): {list}",
        count = .missing.len(),
        list = .missing.join(", ")
    )]
    SchemaMismatch { missing: Vec<String> },

    /// Mapping or transactional commit failed; nothing from the batch was kept.
    #[error("failed to persist records{suffix}: {message}", suffix = row_suffix(.row))]
    Persist { row: Option<usize>, message: String },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" (row {})", r),
        None => String::new(),
    }
}

impl IngestError {
    /// Short machine-readable cause category.
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::Fetch { .. } => "fetch",
            IngestError::Load(_) => "load",
            IngestError::SchemaMismatch { .. } => "schema_invalid",
            IngestError::Persist { .. } => "persist",
        }
    }

    pub(crate) fn fetch(location: &str, err: impl std::fmt::Display) -> Self {
        IngestError::Fetch {
            location: location.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn persist(row: Option<usize>, err: impl std::fmt::Display) -> Self {
        IngestError::Persist {
            row,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_lists_missing_fields() {
        let err = IngestError::SchemaMismatch {
            missing: vec!["ForgivenessAmount".to_string(), "Term".to_string()],
        };
        assert_eq!(err.category(), "schema_invalid");
        assert_eq!(
            err.to_string(),
            "schema validation failed: missing 2 column(s): ForgivenessAmount, Term"
        );
    }

    #[test]
    fn persist_message_names_row_when_known() {
        let err = IngestError::persist(Some(3), "CHECK constraint failed");
        assert_eq!(
            err.to_string(),
            "failed to persist records (row 3): CHECK constraint failed"
        );
        let err = IngestError::persist(None, "database is locked");
        assert_eq!(err.to_string(), "failed to persist records: database is locked");
    }
}
