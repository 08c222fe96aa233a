// Company Directory - Core Library
// Bulk spreadsheet import, single-record edits and region reference data.
// Used by the CLI, the API server, and tests.

pub mod config;
pub mod db;
pub mod deduplication;
pub mod entities;
pub mod error;
pub mod import;
pub mod logging;
pub mod lookup;
pub mod persistence;
pub mod report;
pub mod sanitize;
pub mod tabular;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use db::{get_events_for_entity, insert_event, open_database, setup_database, Event};
pub use deduplication::{find_year_conflicts, YearConflict};
pub use entities::{
    Company, CompanyCandidate, CompanyDataset, CompanyFilter, EditOutcome, MapMarker,
    Pcl, PclCandidate, PclDataset,
    District, SeedSummary, Village,
};
pub use error::{ImportError, ImportResult};
pub use import::{Dataset, ImportMode, ImportSource, Importer, PersistOutcome};
pub use lookup::{resolve_region, LookupError, RegionIds};
pub use report::{DuplicateEntry, ExistingRecord, ImportReport, RowError};
pub use tabular::{RawRow, RawValue, Sheet, UploadedFile};
pub use validation::Violation;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
