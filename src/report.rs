// 📋 Import Reports - what an import tells its caller
// Business outcomes are values, not errors: a rejected upload is still a
// successful run of the pipeline.

use crate::import::ImportMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based spreadsheet row (header is row 1)
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// Which record a duplicate row collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ExistingRecord {
    /// Already in the store
    Stored { id: i64, name: String },
    /// An earlier row of the same upload
    EarlierRow { row: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub row: usize,
    pub business_identifier: String,
    /// Empty for datasets without years
    pub conflicting_years: Vec<i32>,
    pub existing: ExistingRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportReport {
    /// The sheet had no data rows at all
    NoData,

    HeaderMismatch {
        missing: Vec<String>,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    ValidationFailed {
        /// Capped for display; `total_errors` has the full count
        errors: Vec<RowError>,
        total_errors: usize,
        total_rows: usize,
    },

    DuplicatesFound {
        duplicates: Vec<DuplicateEntry>,
        total_duplicates: usize,
    },

    /// Every data row was blank
    NothingToImport { total_rows: usize },

    Success {
        mode: ImportMode,
        inserted: usize,
        updated: usize,
        total_rows: usize,
        blank_rows: usize,
        persisted: usize,
    },
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        matches!(self, ImportReport::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            ImportReport::NoData => "no_data",
            ImportReport::HeaderMismatch { .. } => "header_mismatch",
            ImportReport::ValidationFailed { .. } => "validation_failed",
            ImportReport::DuplicatesFound { .. } => "duplicates_found",
            ImportReport::NothingToImport { .. } => "nothing_to_import",
            ImportReport::Success { .. } => "success",
        }
    }

    /// One line for logs and the CLI.
    pub fn summary(&self) -> String {
        match self {
            ImportReport::NoData => "File contains no data rows".to_string(),
            ImportReport::HeaderMismatch { missing, .. } => {
                format!("Missing required columns: {}", missing.join(", "))
            }
            ImportReport::ValidationFailed {
                total_errors,
                total_rows,
                ..
            } => format!(
                "{} validation error(s) in {} row(s); nothing was imported",
                total_errors, total_rows
            ),
            ImportReport::DuplicatesFound {
                total_duplicates, ..
            } => format!(
                "{} duplicate row(s) found; nothing was imported",
                total_duplicates
            ),
            ImportReport::NothingToImport { total_rows } => {
                format!("All {} row(s) were blank; nothing to import", total_rows)
            }
            ImportReport::Success {
                mode,
                inserted,
                updated,
                persisted,
                ..
            } => format!(
                "Imported {} record(s) in {} mode ({} inserted, {} updated)",
                persisted, mode, inserted, updated
            ),
        }
    }
}
