// 📥 Batch Import - one upload, one transaction, all or nothing
//
// parse → header check → BEGIN → per-row fold → decision → persist → COMMIT
//
// A single bad row anywhere rejects the whole file. Rows are folded into
// independent `RowOutcome`s first; batch-wide questions (in-file duplicates,
// the commit decision) are answered afterwards over the collected outcomes.

use crate::config::Config;
use crate::db::{insert_event, Event};
use crate::error::ImportResult;
use crate::report::{DuplicateEntry, ExistingRecord, ImportReport, RowError};
use crate::tabular::{check_preconditions, read_sheet, RawRow, Sheet, SheetRow, UploadedFile};
use crate::validation::Violation;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

// ============================================================================
// MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Update records whose identity already exists, insert the rest
    #[default]
    Append,
    /// Wipe the dataset's table, then insert every row
    Replace,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(ImportMode::Append),
            "replace" => Ok(ImportMode::Replace),
            other => Err(format!("unknown import mode '{}' (expected append or replace)", other)),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Append => write!(f, "append"),
            ImportMode::Replace => write!(f, "replace"),
        }
    }
}

// ============================================================================
// DATASET SEAM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted(i64),
    Updated(i64),
}

/// A stored record that a row collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConflict {
    /// None for datasets keyed on identity alone
    pub year: Option<i32>,
    pub record_id: i64,
    pub record_name: String,
}

/// Everything the orchestrator needs to know about one importable table.
///
/// `Candidate` is a sanitized row; `Record` is a candidate whose references
/// have been resolved against the store and is ready to validate and persist.
pub trait Dataset {
    type Candidate;
    type Record;

    fn name(&self) -> &'static str;

    /// Required headers, case-exact, any order
    fn headers(&self) -> &'static [&'static str];

    fn sanitize(&self, row: &RawRow) -> Self::Candidate;

    /// Inner `Err` is a row-level miss; outer `Err` is a store failure.
    fn resolve(
        &self,
        conn: &Connection,
        candidate: Self::Candidate,
    ) -> ImportResult<Result<Self::Record, Vec<Violation>>>;

    fn validate(&self, record: &Self::Record) -> Vec<Violation>;

    /// Business identifier; at most one row per upload may carry it.
    fn identity(&self, record: &Self::Record) -> String;

    fn years(&self, _record: &Self::Record) -> BTreeSet<i32> {
        BTreeSet::new()
    }

    fn display_name(&self, record: &Self::Record) -> String;

    /// Stored collisions, consulted in append mode only.
    fn find_conflicts(
        &self,
        conn: &Connection,
        record: &Self::Record,
    ) -> ImportResult<Vec<StoredConflict>>;

    fn wipe(&self, conn: &Connection) -> ImportResult<()>;

    fn upsert(&self, conn: &Connection, record: &Self::Record) -> ImportResult<PersistOutcome>;

    fn insert(&self, conn: &Connection, record: &Self::Record) -> ImportResult<i64>;
}

// ============================================================================
// ROW FOLD
// ============================================================================

/// Result of running one row through sanitize → resolve → validate → store check.
#[derive(Debug)]
enum RowOutcome<R> {
    Blank,
    Invalid(Vec<RowError>),
    Conflicting(Vec<DuplicateEntry>),
    Valid(R),
}

fn row_errors(row: usize, violations: Vec<Violation>) -> Vec<RowError> {
    violations
        .into_iter()
        .map(|v| RowError {
            row,
            field: v.field,
            message: v.message,
        })
        .collect()
}

fn fold_row<D: Dataset>(
    conn: &Connection,
    dataset: &D,
    row: &SheetRow,
    mode: ImportMode,
) -> ImportResult<RowOutcome<D::Record>> {
    if row.is_blank() {
        return Ok(RowOutcome::Blank);
    }

    let candidate = dataset.sanitize(&row.values);

    let record = match dataset.resolve(conn, candidate)? {
        Ok(record) => record,
        Err(violations) => return Ok(RowOutcome::Invalid(row_errors(row.number, violations))),
    };

    let violations = dataset.validate(&record);
    if !violations.is_empty() {
        return Ok(RowOutcome::Invalid(row_errors(row.number, violations)));
    }

    if mode == ImportMode::Append {
        let conflicts = dataset.find_conflicts(conn, &record)?;
        if !conflicts.is_empty() {
            let identity = dataset.identity(&record);
            return Ok(RowOutcome::Conflicting(group_conflicts(row.number, &identity, conflicts)));
        }
    }

    Ok(RowOutcome::Valid(record))
}

/// One entry per stored record, carrying every year it collides on.
fn group_conflicts(row: usize, identity: &str, conflicts: Vec<StoredConflict>) -> Vec<DuplicateEntry> {
    let mut by_record: BTreeMap<i64, (String, Vec<i32>)> = BTreeMap::new();
    for conflict in conflicts {
        let entry = by_record
            .entry(conflict.record_id)
            .or_insert_with(|| (conflict.record_name.clone(), Vec::new()));
        entry.1.extend(conflict.year);
    }

    by_record
        .into_iter()
        .map(|(id, (name, years))| DuplicateEntry {
            row,
            business_identifier: identity.to_string(),
            conflicting_years: years,
            existing: ExistingRecord::Stored { id, name },
        })
        .collect()
}

/// Partitioned view over every row outcome of a batch.
struct Partition<R> {
    valid: Vec<R>,
    errors: Vec<RowError>,
    duplicates: Vec<DuplicateEntry>,
    blank_rows: usize,
}

fn partition<D: Dataset>(dataset: &D, outcomes: Vec<(usize, RowOutcome<D::Record>)>) -> Partition<D::Record> {
    let mut parts = Partition {
        valid: Vec::new(),
        errors: Vec::new(),
        duplicates: Vec::new(),
        blank_rows: 0,
    };

    // identity → (first row, its name, its years)
    let mut seen: HashMap<String, (usize, String, BTreeSet<i32>)> = HashMap::new();

    for (row, outcome) in outcomes {
        match outcome {
            RowOutcome::Blank => parts.blank_rows += 1,
            RowOutcome::Invalid(errors) => parts.errors.extend(errors),
            RowOutcome::Conflicting(entries) => parts.duplicates.extend(entries),
            RowOutcome::Valid(record) => {
                let identity = dataset.identity(&record);
                let years = dataset.years(&record);

                if let Some((first_row, first_name, first_years)) = seen.get(&identity) {
                    parts.duplicates.push(DuplicateEntry {
                        row,
                        business_identifier: identity,
                        conflicting_years: first_years.intersection(&years).copied().collect(),
                        existing: ExistingRecord::EarlierRow {
                            row: *first_row,
                            name: first_name.clone(),
                        },
                    });
                    continue;
                }

                seen.insert(identity, (row, dataset.display_name(&record), years));
                parts.valid.push(record);
            }
        }
    }

    parts
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Where the rows came from, for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct ImportSource {
    pub file_name: String,
    pub sha256: Option<String>,
}

impl ImportSource {
    pub fn named(file_name: impl Into<String>) -> Self {
        ImportSource {
            file_name: file_name.into(),
            sha256: None,
        }
    }
}

enum Decision {
    Commit(ImportReport),
    Abort(ImportReport),
}

#[derive(Debug, Clone)]
pub struct Importer {
    pub max_upload_bytes: usize,
    pub max_reported_errors: usize,
    pub actor: String,
}

impl Default for Importer {
    fn default() -> Self {
        Importer::from_config(&Config::default())
    }
}

impl Importer {
    pub fn from_config(config: &Config) -> Self {
        Importer {
            max_upload_bytes: config.max_upload_bytes,
            max_reported_errors: config.max_reported_errors,
            actor: "importer".to_string(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Check the upload, decode it, then import it.
    ///
    /// Precondition failures come back as `Err` before anything touches the
    /// store; everything after that is reported through [`ImportReport`].
    pub fn import_upload<D: Dataset>(
        &self,
        conn: &mut Connection,
        dataset: &D,
        file: &UploadedFile,
        mode: ImportMode,
    ) -> ImportResult<ImportReport> {
        check_preconditions(file, self.max_upload_bytes)?;
        let sheet = read_sheet(file)?;

        let source = ImportSource {
            file_name: file.file_name.clone(),
            sha256: Some(file.sha256_hex()),
        };

        self.import_sheet(conn, dataset, &sheet, mode, &source)
    }

    pub fn import_sheet<D: Dataset>(
        &self,
        conn: &mut Connection,
        dataset: &D,
        sheet: &Sheet,
        mode: ImportMode,
        source: &ImportSource,
    ) -> ImportResult<ImportReport> {
        if sheet.rows.is_empty() {
            info!(dataset = dataset.name(), file = %source.file_name, "no data rows");
            return Ok(ImportReport::NoData);
        }

        let missing: Vec<String> = dataset
            .headers()
            .iter()
            .filter(|h| !sheet.headers.iter().any(|actual| actual == *h))
            .map(|h| h.to_string())
            .collect();

        if !missing.is_empty() {
            info!(dataset = dataset.name(), missing = missing.len(), "header mismatch");
            return Ok(ImportReport::HeaderMismatch {
                missing,
                expected: dataset.headers().iter().map(|h| h.to_string()).collect(),
                actual: sheet.headers.clone(),
            });
        }

        let tx = conn.transaction()?;
        info!(
            dataset = dataset.name(),
            %mode,
            rows = sheet.rows.len(),
            file = %source.file_name,
            "import transaction opened"
        );

        match self.run_batch(&tx, dataset, sheet, mode, source) {
            Ok(Decision::Commit(report)) => {
                tx.commit()?;
                info!(dataset = dataset.name(), "{}", report.summary());
                Ok(report)
            }
            Ok(Decision::Abort(report)) => {
                tx.rollback()?;
                info!(dataset = dataset.name(), status = report.status(), "import rolled back");
                Ok(report)
            }
            Err(e) => {
                warn!(dataset = dataset.name(), error = %e, "import failed, rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn run_batch<D: Dataset>(
        &self,
        tx: &Transaction<'_>,
        dataset: &D,
        sheet: &Sheet,
        mode: ImportMode,
        source: &ImportSource,
    ) -> ImportResult<Decision> {
        let total_rows = sheet.rows.len();

        let outcomes = sheet
            .rows
            .iter()
            .map(|row| fold_row(tx, dataset, row, mode).map(|outcome| (row.number, outcome)))
            .collect::<ImportResult<Vec<_>>>()?;

        let parts = partition(dataset, outcomes);
        debug!(
            valid = parts.valid.len(),
            errors = parts.errors.len(),
            duplicates = parts.duplicates.len(),
            blank = parts.blank_rows,
            "rows folded"
        );

        if !parts.errors.is_empty() {
            let total_errors = parts.errors.len();
            let mut errors = parts.errors;
            errors.truncate(self.max_reported_errors);
            return Ok(Decision::Abort(ImportReport::ValidationFailed {
                errors,
                total_errors,
                total_rows,
            }));
        }

        if !parts.duplicates.is_empty() {
            return Ok(Decision::Abort(ImportReport::DuplicatesFound {
                total_duplicates: parts.duplicates.len(),
                duplicates: parts.duplicates,
            }));
        }

        if parts.valid.is_empty() {
            return Ok(Decision::Abort(ImportReport::NothingToImport { total_rows }));
        }

        let (inserted, updated) = persist(tx, dataset, &parts.valid, mode)?;

        insert_event(
            tx,
            &Event::new(
                "import_committed",
                "import",
                dataset.name(),
                serde_json::json!({
                    "mode": mode,
                    "file_name": source.file_name,
                    "sha256": source.sha256,
                    "total_rows": total_rows,
                    "inserted": inserted,
                    "updated": updated,
                }),
                &self.actor,
            ),
        )?;

        Ok(Decision::Commit(ImportReport::Success {
            mode,
            inserted,
            updated,
            total_rows,
            blank_rows: parts.blank_rows,
            persisted: inserted + updated,
        }))
    }
}

/// Write every record per mode; returns (inserted, updated).
fn persist<D: Dataset>(
    conn: &Connection,
    dataset: &D,
    records: &[D::Record],
    mode: ImportMode,
) -> ImportResult<(usize, usize)> {
    let mut inserted = 0;
    let mut updated = 0;

    match mode {
        ImportMode::Replace => {
            dataset.wipe(conn)?;
            for record in records {
                dataset.insert(conn, record)?;
                inserted += 1;
            }
        }
        ImportMode::Append => {
            for record in records {
                match dataset.upsert(conn, record)? {
                    PersistOutcome::Inserted(_) => inserted += 1,
                    PersistOutcome::Updated(_) => updated += 1,
                }
            }
        }
    }

    Ok((inserted, updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_companies, count_events, count_year_associations, get_events_for_entity};
    use crate::entities::company::{company_years, headers, list_companies, CompanyDataset, CompanyFilter};
    use crate::persistence::find_company_id_by_kip;
    use crate::tabular::RawValue;
    use crate::test_support::{company_row, company_sheet, memory_db, seed_xy};

    fn run(conn: &mut Connection, sheet: &Sheet, mode: ImportMode) -> ImportReport {
        Importer::default()
            .import_sheet(conn, &CompanyDataset, sheet, mode, &ImportSource::named("test.csv"))
            .unwrap()
    }

    fn store_snapshot(conn: &Connection) -> (i64, i64, i64) {
        (
            count_companies(conn).unwrap(),
            count_year_associations(conn).unwrap(),
            count_events(conn).unwrap(),
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("append".parse::<ImportMode>().unwrap(), ImportMode::Append);
        assert_eq!(" Replace ".parse::<ImportMode>().unwrap(), ImportMode::Replace);
        assert!("merge".parse::<ImportMode>().is_err());
        assert_eq!(ImportMode::default(), ImportMode::Append);
    }

    #[test]
    fn test_one_invalid_row_blocks_the_valid_one() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let valid = company_row("1000000001", "PT Satu", "2023,2024");
        let mut missing_product = company_row("1000000002", "PT Dua", "2024");
        missing_product.insert(headers::PRODUCT.to_string(), RawValue::Empty);

        let report = run(&mut conn, &company_sheet(vec![valid, missing_product]), ImportMode::Append);

        match report {
            ImportReport::ValidationFailed {
                errors,
                total_errors,
                total_rows,
            } => {
                assert_eq!(total_errors, 1);
                assert_eq!(total_rows, 2);
                assert_eq!(errors[0].row, 3);
                assert_eq!(errors[0].field, headers::PRODUCT);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }

        assert_eq!(count_companies(&conn).unwrap(), 0);
        assert_eq!(find_company_id_by_kip(&conn, "1000000001").unwrap(), None);
    }

    #[test]
    fn test_rejected_batch_leaves_store_untouched() {
        let mut conn = memory_db();
        seed_xy(&conn);
        run(&mut conn, &company_sheet(vec![company_row("1000000001", "PT Satu", "2023")]), ImportMode::Append);
        let before = store_snapshot(&conn);

        let mut bad = company_row("1000000009", "PT Rusak", "2024");
        bad.insert(headers::LATITUDE.to_string(), RawValue::from("91"));
        let sheet = company_sheet(vec![company_row("1000000002", "PT Dua", "2024"), bad]);

        for mode in [ImportMode::Append, ImportMode::Replace] {
            let report = run(&mut conn, &sheet, mode);
            assert!(matches!(report, ImportReport::ValidationFailed { .. }));
            assert_eq!(store_snapshot(&conn), before);
        }
    }

    #[test]
    fn test_empty_district_does_not_hide_other_missing_fields() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let mut row = company_row("1000000001", "PT Satu", "2024");
        for header in [headers::DISTRICT, headers::PRODUCT, headers::KBLI] {
            row.insert(header.to_string(), RawValue::Empty);
        }

        match run(&mut conn, &company_sheet(vec![row]), ImportMode::Append) {
            ImportReport::ValidationFailed { errors, total_errors, .. } => {
                assert_eq!(total_errors, 3);
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec![headers::DISTRICT, headers::PRODUCT, headers::KBLI]);
                assert!(errors.iter().all(|e| e.row == 2));
                assert_eq!(errors[0].message, "Kecamatan is required");
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(count_companies(&conn).unwrap(), 0);
    }

    #[test]
    fn test_lookup_miss_is_a_row_error() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let mut row = company_row("1000000001", "PT Satu", "2024");
        row.insert(headers::VILLAGE.to_string(), RawValue::from("Z"));

        match run(&mut conn, &company_sheet(vec![row]), ImportMode::Append) {
            ImportReport::ValidationFailed { errors, .. } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, headers::VILLAGE);
                assert_eq!(errors[0].row, 2);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_error_list_is_capped_but_counted() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let rows = (0..5)
            .map(|i| company_row(&format!("10000000{:02}", i), "", "2024"))
            .collect();

        let importer = Importer {
            max_reported_errors: 2,
            ..Importer::default()
        };
        let report = importer
            .import_sheet(&mut conn, &CompanyDataset, &company_sheet(rows), ImportMode::Append, &ImportSource::default())
            .unwrap();

        match report {
            ImportReport::ValidationFailed { errors, total_errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(total_errors, 5);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_append_twice_replaces_years() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let first = run(&mut conn, &company_sheet(vec![company_row("1000000001", "PT Satu", "2023,2024")]), ImportMode::Append);
        assert!(matches!(first, ImportReport::Success { inserted: 1, updated: 0, .. }));

        let second = run(&mut conn, &company_sheet(vec![company_row("1000000001", "PT Satu Baru", "2025")]), ImportMode::Append);
        assert!(matches!(second, ImportReport::Success { inserted: 0, updated: 1, .. }));

        let id = find_company_id_by_kip(&conn, "1000000001").unwrap().unwrap();
        assert_eq!(count_companies(&conn).unwrap(), 1);
        assert_eq!(company_years(&conn, id).unwrap(), vec![2025]);
    }

    #[test]
    fn test_identical_rerun_reports_duplicates() {
        let mut conn = memory_db();
        seed_xy(&conn);
        let sheet = company_sheet(vec![company_row("1000000001", "PT Satu", "2023,2024")]);

        assert!(run(&mut conn, &sheet, ImportMode::Append).is_success());
        let before = store_snapshot(&conn);

        match run(&mut conn, &sheet, ImportMode::Append) {
            ImportReport::DuplicatesFound { duplicates, total_duplicates } => {
                assert_eq!(total_duplicates, 1);
                assert_eq!(duplicates[0].conflicting_years, vec![2023, 2024]);
            }
            other => panic!("expected duplicates, got {:?}", other),
        }
        assert_eq!(store_snapshot(&conn), before);
    }

    #[test]
    fn test_stored_year_collision() {
        let mut conn = memory_db();
        seed_xy(&conn);
        run(&mut conn, &company_sheet(vec![company_row("1234567890", "PT Lama", "2024")]), ImportMode::Append);
        let existing_id = find_company_id_by_kip(&conn, "1234567890").unwrap().unwrap();

        let colliding = run(&mut conn, &company_sheet(vec![company_row("1234567890", "PT Baru", "2024")]), ImportMode::Append);
        match colliding {
            ImportReport::DuplicatesFound { duplicates, .. } => {
                assert_eq!(duplicates.len(), 1);
                assert_eq!(duplicates[0].row, 2);
                assert_eq!(duplicates[0].business_identifier, "1234567890");
                assert_eq!(duplicates[0].conflicting_years, vec![2024]);
                assert_eq!(
                    duplicates[0].existing,
                    ExistingRecord::Stored {
                        id: existing_id,
                        name: "PT Lama".to_string()
                    }
                );
            }
            other => panic!("expected duplicates, got {:?}", other),
        }

        let next_year = run(&mut conn, &company_sheet(vec![company_row("1234567890", "PT Baru", "2025")]), ImportMode::Append);
        assert!(next_year.is_success());
    }

    #[test]
    fn test_same_kip_twice_in_one_file() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let sheet = company_sheet(vec![
            company_row("1000000001", "PT Satu", "2023,2024"),
            company_row("1000000001", "PT Satu Lagi", "2024,2025"),
        ]);

        for mode in [ImportMode::Append, ImportMode::Replace] {
            match run(&mut conn, &sheet, mode) {
                ImportReport::DuplicatesFound { duplicates, .. } => {
                    assert_eq!(duplicates[0].row, 3);
                    assert_eq!(duplicates[0].conflicting_years, vec![2024]);
                    assert_eq!(
                        duplicates[0].existing,
                        ExistingRecord::EarlierRow {
                            row: 2,
                            name: "PT Satu".to_string()
                        }
                    );
                }
                other => panic!("expected duplicates, got {:?}", other),
            }
        }
        assert_eq!(count_companies(&conn).unwrap(), 0);
    }

    #[test]
    fn test_replace_leaves_exactly_n_records() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let old: Vec<_> = (0..4)
            .map(|i| company_row(&format!("20000000{:02}", i), "PT Lama", "2020"))
            .collect();
        run(&mut conn, &company_sheet(old), ImportMode::Append);
        assert_eq!(count_companies(&conn).unwrap(), 4);

        // same KIP as a stored one: replace mode does not consult the store
        let fresh = company_sheet(vec![
            company_row("2000000000", "PT Baru", "2020"),
            company_row("3000000001", "PT Baru Dua", "2024"),
        ]);
        let report = run(&mut conn, &fresh, ImportMode::Replace);

        assert!(matches!(report, ImportReport::Success { inserted: 2, updated: 0, persisted: 2, .. }));
        assert_eq!(count_companies(&conn).unwrap(), 2);
        assert_eq!(count_year_associations(&conn).unwrap(), 2);
        assert_eq!(list_companies(&conn, &CompanyFilter::default()).unwrap()[0].name, "PT Baru");
    }

    #[test]
    fn test_header_mismatch_opens_no_transaction() {
        let mut conn = memory_db();
        let mut sheet = company_sheet(vec![company_row("1000000001", "PT Satu", "2024")]);
        sheet.headers.retain(|h| h != headers::KBLI && h != headers::SCALE);

        match run(&mut conn, &sheet, ImportMode::Append) {
            ImportReport::HeaderMismatch { missing, expected, actual } => {
                assert_eq!(missing, vec![headers::SCALE.to_string(), headers::KBLI.to_string()]);
                assert_eq!(expected.len(), 28);
                assert_eq!(actual.len(), 26);
            }
            other => panic!("expected header mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_headers_are_case_exact() {
        let mut conn = memory_db();
        let mut sheet = company_sheet(vec![company_row("1000000001", "PT Satu", "2024")]);
        for h in sheet.headers.iter_mut() {
            if h == headers::KIP {
                *h = "kip".to_string();
            }
        }

        assert!(matches!(
            run(&mut conn, &sheet, ImportMode::Append),
            ImportReport::HeaderMismatch { ref missing, .. } if missing == &vec!["KIP".to_string()]
        ));
    }

    #[test]
    fn test_no_rows_and_blank_rows() {
        let mut conn = memory_db();
        assert_eq!(run(&mut conn, &company_sheet(vec![]), ImportMode::Append), ImportReport::NoData);

        let blank: RawRow = crate::entities::company::COMPANY_HEADERS
            .iter()
            .map(|h| (h.to_string(), RawValue::Empty))
            .collect();

        assert_eq!(
            run(&mut conn, &company_sheet(vec![blank.clone(), blank.clone()]), ImportMode::Append),
            ImportReport::NothingToImport { total_rows: 2 }
        );

        seed_xy(&conn);
        let report = run(
            &mut conn,
            &company_sheet(vec![blank, company_row("1000000001", "PT Satu", "2024")]),
            ImportMode::Append,
        );
        assert!(matches!(report, ImportReport::Success { blank_rows: 1, persisted: 1, total_rows: 2, .. }));
    }

    #[test]
    fn test_commit_writes_audit_event() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let source = ImportSource {
            file_name: "direktori.xlsx".to_string(),
            sha256: Some("abc".to_string()),
        };
        Importer::default()
            .with_actor("admin")
            .import_sheet(
                &mut conn,
                &CompanyDataset,
                &company_sheet(vec![company_row("1000000001", "PT Satu", "2024")]),
                ImportMode::Append,
                &source,
            )
            .unwrap();

        let events = get_events_for_entity(&conn, "import", "companies").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "admin");
        assert_eq!(events[0].data["file_name"], "direktori.xlsx");
        assert_eq!(events[0].data["inserted"], 1);
    }

    #[test]
    fn test_upload_preconditions_come_first() {
        let mut conn = memory_db();
        let file = UploadedFile::new("x.pdf", "application/pdf", b"%PDF".to_vec());

        let err = Importer::default()
            .import_upload(&mut conn, &CompanyDataset, &file, ImportMode::Append)
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_csv_upload_end_to_end() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let header = crate::entities::company::COMPANY_HEADERS.join(",");
        // KIP, name, legal form, address, district, village, postal, scale, location,
        // estate, lat, lon, distance, product, kbli, phone, email, website, workforce,
        // investment, turnover, 4 contact fields, pcl, notes, years
        let row = "1000000001,PT Satu,1,Jl. A,X,Y,40111,Sedang,1,,\"-6,9\",107.6,,Kain,13111,,,,2,2,2,,,,,,,\"2023, 2024\"";
        let body = format!("{}\n{}\n", header, row);
        let file = UploadedFile::new("direktori.csv", "text/csv", body.into_bytes());

        let report = Importer::default()
            .import_upload(&mut conn, &CompanyDataset, &file, ImportMode::Append)
            .unwrap();
        assert!(report.is_success(), "{:?}", report);

        let id = find_company_id_by_kip(&conn, "1000000001").unwrap().unwrap();
        assert_eq!(company_years(&conn, id).unwrap(), vec![2023, 2024]);

        let events = get_events_for_entity(&conn, "import", "companies").unwrap();
        assert_eq!(events[0].data["sha256"].as_str().map(str::len), Some(64));
    }
}
