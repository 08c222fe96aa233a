// ⚠️ Import Errors - operational and precondition failures
// Business outcomes (bad rows, duplicates, missing headers) are NOT errors:
// they travel as ImportReport values. Only what the caller must fix in the
// transport, or what broke underneath us, lands here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported file type '{content_type}' (allowed: xlsx, xls, csv)")]
    UnsupportedFileType { content_type: String },

    #[error("file is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    #[error("uploaded file is empty")]
    EmptyFile,

    #[error("could not read spreadsheet: {0}")]
    Unreadable(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Precondition failures are the caller's to fix; everything else is operational.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedFileType { .. }
                | ImportError::FileTooLarge { .. }
                | ImportError::EmptyFile
                | ImportError::Unreadable(_)
        )
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Unreadable(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Unreadable(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
