//! Schema reconciliation: the dictionary against the dataset header.
//!
//! The publisher's field dictionary is a small table whose first column is
//! the field name and whose second is a description. Its header row is
//! skipped. The dictionary may be a workbook (`.xlsx`, `.xls`, `.xlsb`,
//! `.ods`, first worksheet) or delimited text.
//!
//! Reconciliation is a structural gate, not a type checker: it passes iff
//! every expected field appears among the table's columns. Column order
//! and extra columns never matter.

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::Path;

use crate::error::IngestError;
use crate::loader;
use crate::models::{ExpectedFieldSet, RawDictionaryHandle};

/// A dictionary entry: field name and its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub field: String,
    pub description: Option<String>,
}

pub fn read_dictionary(handle: &RawDictionaryHandle) -> Result<ExpectedFieldSet, IngestError> {
    let entries = read_entries(&handle.path)?;
    let set = ExpectedFieldSet::new(entries.iter().map(|e| e.field.as_str()));
    tracing::info!(
        path = %handle.path.display(),
        fields = set.len(),
        "dictionary parsed"
    );
    Ok(set)
}

/// Read every dictionary entry with a non-empty field name.
pub fn read_entries(path: &Path) -> Result<Vec<DictionaryEntry>, IngestError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let rows = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook_rows(path)?,
        _ => read_delimited_rows(path)?,
    };

    Ok(rows
        .into_iter()
        .skip(1)
        .filter_map(|(field, description)| {
            let field = field.trim();
            if field.is_empty() {
                return None;
            }
            Some(DictionaryEntry {
                field: field.to_string(),
                description: description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
            })
        })
        .collect())
}

fn read_workbook_rows(path: &Path) -> Result<Vec<(String, Option<String>)>, IngestError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IngestError::Load(format!("opening dictionary {}: {}", path.display(), e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::Load("dictionary workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IngestError::Load(format!("reading sheet '{}': {}", sheet_name, e)))?;

    Ok(range
        .rows()
        .map(|row| {
            let field = row.first().map(cell_text).unwrap_or_default();
            let description = row.get(1).map(cell_text);
            (field, description)
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn read_delimited_rows(path: &Path) -> Result<Vec<(String, Option<String>)>, IngestError> {
    let bytes = std::fs::read(path)
        .map_err(|e| IngestError::Load(format!("reading dictionary {}: {}", path.display(), e)))?;
    let (text, _) = loader::decode(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| IngestError::Load(format!("parsing dictionary: {}", e)))?;
        let field = record.get(0).unwrap_or_default().to_string();
        let description = record.get(1).map(str::to_string);
        rows.push((field, description));
    }
    Ok(rows)
}

/// Expected fields absent from `columns`, in dictionary order.
///
/// Column names are compared after trimming surrounding whitespace, the
/// same way the normalizer reads them.
pub fn missing_fields(expected: &ExpectedFieldSet, columns: &[String]) -> Vec<String> {
    let present: HashSet<&str> = columns.iter().map(|c| c.trim()).collect();
    expected
        .fields()
        .iter()
        .filter(|f| !present.contains(f.as_str()))
        .cloned()
        .collect()
}

/// True iff every expected field is among `columns`.
///
/// The missing list is logged for operators but not returned; callers
/// needing it use [`missing_fields`].
pub fn reconcile(expected: &ExpectedFieldSet, columns: &[String]) -> bool {
    let missing = missing_fields(expected, columns);
    if missing.is_empty() {
        tracing::info!(fields = expected.len(), "dataset matches the data dictionary");
        true
    } else {
        tracing::warn!(
            missing_count = missing.len(),
            missing = ?missing,
            "dataset is missing dictionary fields"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extra_columns_are_ignored() {
        let expected = ExpectedFieldSet::new(["LoanNumber", "BorrowerName"]);
        let columns = cols(&["LoanNumber", "BorrowerName", "BorrowerCity"]);
        assert!(reconcile(&expected, &columns));
        assert!(missing_fields(&expected, &columns).is_empty());
    }

    #[test]
    fn absent_field_fails() {
        let expected = ExpectedFieldSet::new(["LoanNumber", "ForgivenessAmount"]);
        let columns = cols(&["LoanNumber"]);
        assert!(!reconcile(&expected, &columns));
        assert_eq!(missing_fields(&expected, &columns), vec!["ForgivenessAmount"]);
    }

    #[test]
    fn column_order_does_not_matter() {
        let expected = ExpectedFieldSet::new(["A", "B", "C"]);
        assert!(reconcile(&expected, &cols(&["C", "A", "B"])));
    }

    #[test]
    fn adding_extra_columns_never_changes_the_result() {
        let expected = ExpectedFieldSet::new(["A", "B"]);
        for base in [cols(&["A"]), cols(&["A", "B"]), cols(&["B"])] {
            let before = reconcile(&expected, &base);
            let mut widened = base.clone();
            widened.extend(cols(&["X", "Y", "Z"]));
            assert_eq!(before, reconcile(&expected, &widened));
        }
    }

    #[test]
    fn header_whitespace_is_tolerated() {
        let expected = ExpectedFieldSet::new(["LoanNumber"]);
        assert!(reconcile(&expected, &cols(&[" LoanNumber "])));
    }

    #[test]
    fn empty_expected_set_always_passes() {
        assert!(reconcile(&ExpectedFieldSet::default(), &[]));
    }

    #[test]
    fn delimited_dictionary_skips_header_and_blank_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dictionary.csv");
        std::fs::write(
            &path,
            "Field Name,Description\nLoanNumber,Loan identifier\n,orphan description\nBorrowerName , Borrower\nTerm\n",
        )
        .unwrap();

        let entries = read_entries(&path).unwrap();
        let fields: Vec<&str> = entries.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["LoanNumber", "BorrowerName", "Term"]);
        assert_eq!(entries[1].description.as_deref(), Some("Borrower"));
        assert_eq!(entries[2].description, None);
    }

    #[test]
    fn unreadable_workbook_is_a_load_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dictionary.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        let err = read_entries(&path).unwrap_err();
        assert_eq!(err.category(), "load");
    }
}
