// 🏭 Company Entity - directory records, their appearance years, admin CRUD
//
// Candidate  = one sanitized spreadsheet row (nothing checked yet)
// Resolved   = candidate + district/village ids from the lookup resolver
// Company    = persisted row, joined with region names and years

use crate::db::{insert_event, Event};
use crate::deduplication::{find_year_conflicts, YearConflict};
use crate::error::ImportResult;
use crate::import::{Dataset, PersistOutcome, StoredConflict};
use crate::lookup::{resolve_region, RegionIds};
use crate::persistence;
use crate::sanitize::sanitize_company;
use crate::tabular::RawRow;
use crate::validation::{validate_company, Violation};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// HEADERS
// ============================================================================

pub mod headers {
    pub const KIP: &str = "KIP";
    pub const NAME: &str = "Nama Perusahaan";
    pub const LEGAL_FORM: &str = "Badan Usaha";
    pub const ADDRESS: &str = "Alamat";
    pub const DISTRICT: &str = "Kecamatan";
    pub const VILLAGE: &str = "Desa";
    pub const POSTAL_CODE: &str = "Kode Pos";
    pub const SCALE: &str = "Skala";
    pub const LOCATION_TYPE: &str = "Lokasi Perusahaan";
    pub const ESTATE_NAME: &str = "Nama Kawasan";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const DISTANCE: &str = "Jarak";
    pub const PRODUCT: &str = "Produk";
    pub const KBLI: &str = "KBLI";
    pub const PHONE: &str = "Telepon Perusahaan";
    pub const EMAIL: &str = "Email Perusahaan";
    pub const WEBSITE: &str = "Website";
    pub const WORKFORCE: &str = "Tenaga Kerja";
    pub const INVESTMENT: &str = "Investasi";
    pub const TURNOVER: &str = "Omset";
    pub const CONTACT_NAME: &str = "Nama Narahubung";
    pub const CONTACT_TITLE: &str = "Jabatan Narahubung";
    pub const CONTACT_EMAIL: &str = "Email Narahubung";
    pub const CONTACT_PHONE: &str = "HP Narahubung";
    pub const PRIMARY_PCL: &str = "PCL Utama";
    pub const NOTES: &str = "Catatan";
    pub const YEARS: &str = "Tahun Direktori";
}

/// Every header a company upload must carry (order-independent, case-exact)
pub const COMPANY_HEADERS: [&str; 28] = [
    headers::KIP,
    headers::NAME,
    headers::LEGAL_FORM,
    headers::ADDRESS,
    headers::DISTRICT,
    headers::VILLAGE,
    headers::POSTAL_CODE,
    headers::SCALE,
    headers::LOCATION_TYPE,
    headers::ESTATE_NAME,
    headers::LATITUDE,
    headers::LONGITUDE,
    headers::DISTANCE,
    headers::PRODUCT,
    headers::KBLI,
    headers::PHONE,
    headers::EMAIL,
    headers::WEBSITE,
    headers::WORKFORCE,
    headers::INVESTMENT,
    headers::TURNOVER,
    headers::CONTACT_NAME,
    headers::CONTACT_TITLE,
    headers::CONTACT_EMAIL,
    headers::CONTACT_PHONE,
    headers::PRIMARY_PCL,
    headers::NOTES,
    headers::YEARS,
];

// ============================================================================
// CODED VALUES
// ============================================================================

/// Integer category code after coercion.
///
/// `Missing` and `Unparsable` both map to [`CodeValue::SENTINEL`] when a plain
/// integer is needed, but the validator reports them on their own, so the
/// sentinel never passes as a real answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CodeValue {
    Parsed(i64),
    Missing,
    Unparsable(String),
}

impl CodeValue {
    pub const SENTINEL: i64 = 1;

    pub fn parsed(&self) -> Option<i64> {
        match self {
            CodeValue::Parsed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn value_or_sentinel(&self) -> i64 {
        self.parsed().unwrap_or(Self::SENTINEL)
    }
}

// ============================================================================
// CANDIDATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyCandidate {
    pub kip: String,
    pub name: String,
    pub legal_form: CodeValue,
    pub address: String,
    pub district_name: String,
    pub village_name: String,
    pub postal_code: String,
    pub scale: String,
    pub location_type: CodeValue,
    pub estate_name: String,
    /// NaN when absent or unparsable
    pub latitude: f64,
    /// NaN when absent or unparsable
    pub longitude: f64,
    /// None when empty, Some(NaN) when unparsable
    pub distance: Option<f64>,
    pub product: String,
    pub kbli: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub workforce: CodeValue,
    pub investment: CodeValue,
    pub turnover: CodeValue,
    pub contact_name: String,
    pub contact_title: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub primary_pcl: String,
    pub notes: String,
    pub years: BTreeSet<i32>,
    /// Year cell as typed, kept so "unparsable" is not mistaken for "missing"
    pub year_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCompany {
    pub candidate: CompanyCandidate,
    pub region: RegionIds,
}

// ============================================================================
// PERSISTED COMPANY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub kip: String,
    pub name: String,
    pub legal_form: i64,
    pub address: String,
    pub district_id: i64,
    pub district_name: String,
    pub village_id: i64,
    pub village_name: String,
    pub postal_code: Option<String>,
    pub scale: String,
    pub location_type: i64,
    pub estate_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: Option<f64>,
    pub product: String,
    pub kbli: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub workforce: i64,
    pub investment: i64,
    pub turnover: i64,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub primary_pcl: Option<String>,
    pub notes: Option<String>,
    pub years: Vec<i32>,
    pub created_at: String,
    pub updated_at: String,
}

/// Minimal projection for the map view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub id: i64,
    pub kip: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    pub district_id: Option<i64>,
    pub year: Option<i32>,
}

const COMPANY_SELECT: &str = "SELECT c.id, c.kip, c.name, c.legal_form, c.address,
        c.district_id, d.name, c.village_id, v.name, c.postal_code, c.scale,
        c.location_type, c.estate_name, c.latitude, c.longitude, c.distance,
        c.product, c.kbli, c.phone, c.email, c.website, c.workforce,
        c.investment, c.turnover, c.contact_name, c.contact_title,
        c.contact_email, c.contact_phone, c.primary_pcl, c.notes,
        c.created_at, c.updated_at
     FROM companies c
     JOIN districts d ON d.id = c.district_id
     JOIN villages v ON v.id = c.village_id";

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        kip: row.get(1)?,
        name: row.get(2)?,
        legal_form: row.get(3)?,
        address: row.get(4)?,
        district_id: row.get(5)?,
        district_name: row.get(6)?,
        village_id: row.get(7)?,
        village_name: row.get(8)?,
        postal_code: row.get(9)?,
        scale: row.get(10)?,
        location_type: row.get(11)?,
        estate_name: row.get(12)?,
        latitude: row.get(13)?,
        longitude: row.get(14)?,
        distance: row.get(15)?,
        product: row.get(16)?,
        kbli: row.get(17)?,
        phone: row.get(18)?,
        email: row.get(19)?,
        website: row.get(20)?,
        workforce: row.get(21)?,
        investment: row.get(22)?,
        turnover: row.get(23)?,
        contact_name: row.get(24)?,
        contact_title: row.get(25)?,
        contact_email: row.get(26)?,
        contact_phone: row.get(27)?,
        primary_pcl: row.get(28)?,
        notes: row.get(29)?,
        years: Vec::new(),
        created_at: row.get(30)?,
        updated_at: row.get(31)?,
    })
}

pub fn company_years(conn: &Connection, company_id: i64) -> rusqlite::Result<Vec<i32>> {
    let mut stmt =
        conn.prepare("SELECT year FROM company_years WHERE company_id = ?1 ORDER BY year")?;
    let years = stmt
        .query_map([company_id], |row| row.get(0))?
        .collect::<Result<Vec<i32>, _>>()?;
    Ok(years)
}

pub fn get_company(conn: &Connection, id: i64) -> rusqlite::Result<Option<Company>> {
    let sql = format!("{} WHERE c.id = ?1", COMPANY_SELECT);
    let company = conn.query_row(&sql, [id], company_from_row).optional()?;

    match company {
        Some(mut company) => {
            company.years = company_years(conn, company.id)?;
            Ok(Some(company))
        }
        None => Ok(None),
    }
}

pub fn list_companies(conn: &Connection, filter: &CompanyFilter) -> rusqlite::Result<Vec<Company>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR c.district_id = ?1)
           AND (?2 IS NULL OR EXISTS (
                SELECT 1 FROM company_years y WHERE y.company_id = c.id AND y.year = ?2))
         ORDER BY c.name, c.id",
        COMPANY_SELECT
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut companies = stmt
        .query_map(params![filter.district_id, filter.year], company_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for company in &mut companies {
        company.years = company_years(conn, company.id)?;
    }

    Ok(companies)
}

pub fn map_markers(conn: &Connection) -> rusqlite::Result<Vec<MapMarker>> {
    let mut stmt = conn.prepare(
        "SELECT id, kip, name, latitude, longitude FROM companies ORDER BY id",
    )?;

    let markers = stmt
        .query_map([], |row| {
            Ok(MapMarker {
                id: row.get(0)?,
                kip: row.get(1)?,
                name: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(markers)
}

// ============================================================================
// SINGLE-RECORD EDITS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    Saved { company: Company },
    Rejected { errors: Vec<Violation> },
    Conflict { conflicts: Vec<YearConflict> },
    NotFound,
}

/// Empty names are left to the validator, which reports them with every
/// other problem on the row; only a name that is given but unknown stops early.
fn has_region_names(candidate: &CompanyCandidate) -> bool {
    !candidate.district_name.is_empty() && !candidate.village_name.is_empty()
}

/// Run one header-keyed row through the same checks as a bulk import row.
fn check_row(
    conn: &Connection,
    row: &RawRow,
    exclude_id: Option<i64>,
) -> ImportResult<Result<ResolvedCompany, EditOutcome>> {
    let candidate = sanitize_company(row);

    if !has_region_names(&candidate) {
        return Ok(Err(EditOutcome::Rejected {
            errors: validate_company(&candidate),
        }));
    }

    let region = match resolve_region(conn, &candidate.district_name, &candidate.village_name) {
        Ok(region) => region,
        Err(e) => {
            let errors = vec![e.into_violation()?];
            return Ok(Err(EditOutcome::Rejected { errors }));
        }
    };

    let errors = validate_company(&candidate);
    if !errors.is_empty() {
        return Ok(Err(EditOutcome::Rejected { errors }));
    }

    let conflicts = find_year_conflicts(conn, &candidate.kip, &candidate.years, exclude_id)?;
    if !conflicts.is_empty() {
        return Ok(Err(EditOutcome::Conflict { conflicts }));
    }

    Ok(Ok(ResolvedCompany { candidate, region }))
}

pub fn create_company(conn: &mut Connection, row: &RawRow, actor: &str) -> ImportResult<EditOutcome> {
    let tx = conn.transaction()?;

    let resolved = match check_row(&tx, row, None)? {
        Ok(resolved) => resolved,
        Err(outcome) => return Ok(outcome),
    };

    let id = persistence::insert_company(&tx, &resolved)?;
    insert_event(
        &tx,
        &Event::new(
            "company_created",
            "company",
            &id.to_string(),
            serde_json::json!({ "kip": resolved.candidate.kip }),
            actor,
        ),
    )?;

    let company = get_company(&tx, id)?;
    tx.commit()?;

    Ok(match company {
        Some(company) => EditOutcome::Saved { company },
        None => EditOutcome::NotFound,
    })
}

pub fn update_company(
    conn: &mut Connection,
    id: i64,
    row: &RawRow,
    actor: &str,
) -> ImportResult<EditOutcome> {
    let tx = conn.transaction()?;

    if get_company(&tx, id)?.is_none() {
        return Ok(EditOutcome::NotFound);
    }

    let resolved = match check_row(&tx, row, Some(id))? {
        Ok(resolved) => resolved,
        Err(outcome) => return Ok(outcome),
    };

    persistence::update_company(&tx, id, &resolved)?;
    persistence::replace_years(&tx, id, &resolved.candidate.years)?;
    insert_event(
        &tx,
        &Event::new(
            "company_updated",
            "company",
            &id.to_string(),
            serde_json::json!({ "kip": resolved.candidate.kip }),
            actor,
        ),
    )?;

    let company = get_company(&tx, id)?;
    tx.commit()?;

    Ok(match company {
        Some(company) => EditOutcome::Saved { company },
        None => EditOutcome::NotFound,
    })
}

/// Returns false when no such company exists.
pub fn delete_company(conn: &mut Connection, id: i64, actor: &str) -> ImportResult<bool> {
    let tx = conn.transaction()?;

    let deleted = tx.execute("DELETE FROM companies WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Ok(false);
    }

    insert_event(
        &tx,
        &Event::new("company_deleted", "company", &id.to_string(), serde_json::json!({}), actor),
    )?;
    tx.commit()?;

    Ok(true)
}

// ============================================================================
// BULK IMPORT DATASET
// ============================================================================

pub struct CompanyDataset;

impl Dataset for CompanyDataset {
    type Candidate = CompanyCandidate;
    type Record = ResolvedCompany;

    fn name(&self) -> &'static str {
        "companies"
    }

    fn headers(&self) -> &'static [&'static str] {
        &COMPANY_HEADERS
    }

    fn sanitize(&self, row: &RawRow) -> CompanyCandidate {
        sanitize_company(row)
    }

    fn resolve(
        &self,
        conn: &Connection,
        candidate: CompanyCandidate,
    ) -> ImportResult<Result<ResolvedCompany, Vec<Violation>>> {
        if !has_region_names(&candidate) {
            return Ok(Err(validate_company(&candidate)));
        }

        match resolve_region(conn, &candidate.district_name, &candidate.village_name) {
            Ok(region) => Ok(Ok(ResolvedCompany { candidate, region })),
            Err(e) => Ok(Err(vec![e.into_violation()?])),
        }
    }

    fn validate(&self, record: &ResolvedCompany) -> Vec<Violation> {
        validate_company(&record.candidate)
    }

    fn identity(&self, record: &ResolvedCompany) -> String {
        record.candidate.kip.clone()
    }

    fn years(&self, record: &ResolvedCompany) -> BTreeSet<i32> {
        record.candidate.years.clone()
    }

    fn display_name(&self, record: &ResolvedCompany) -> String {
        record.candidate.name.clone()
    }

    fn find_conflicts(
        &self,
        conn: &Connection,
        record: &ResolvedCompany,
    ) -> ImportResult<Vec<StoredConflict>> {
        let conflicts = find_year_conflicts(conn, &record.candidate.kip, &record.candidate.years, None)?;

        Ok(conflicts
            .into_iter()
            .map(|c| StoredConflict {
                year: Some(c.year),
                record_id: c.company_id,
                record_name: c.company_name,
            })
            .collect())
    }

    fn wipe(&self, conn: &Connection) -> ImportResult<()> {
        persistence::wipe_companies(conn)?;
        Ok(())
    }

    fn upsert(&self, conn: &Connection, record: &ResolvedCompany) -> ImportResult<PersistOutcome> {
        Ok(persistence::upsert_company(conn, record)?)
    }

    fn insert(&self, conn: &Connection, record: &ResolvedCompany) -> ImportResult<i64> {
        let id = persistence::insert_company(conn, record)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::get_events_for_entity;
    use crate::entities::region::insert_district;
    use crate::tabular::RawValue;
    use crate::test_support::{company_row, memory_db, seed_xy};

    fn saved_id(outcome: EditOutcome) -> i64 {
        match outcome {
            EditOutcome::Saved { company } => company.id,
            other => panic!("expected saved, got {:?}", other),
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut conn = memory_db();
        let region = seed_xy(&conn);

        let id = saved_id(create_company(&mut conn, &company_row("1000000001", "PT Satu", "2023,2024"), "admin").unwrap());
        let company = get_company(&conn, id).unwrap().unwrap();

        assert_eq!(company.district_id, region.district_id);
        assert_eq!(company.years, vec![2023, 2024]);
        assert_eq!(get_events_for_entity(&conn, "company", &id.to_string()).unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_invalid_row() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let mut row = company_row("1000000001", "PT Satu", "2024");
        row.insert(headers::KBLI.to_string(), RawValue::from("12"));

        match create_company(&mut conn, &row, "admin").unwrap() {
            EditOutcome::Rejected { errors } => assert_eq!(errors[0].field, headers::KBLI),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(list_companies(&conn, &CompanyFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_create_with_empty_village_reports_every_problem() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let mut row = company_row("1000000001", "PT Satu", "2024");
        row.insert(headers::VILLAGE.to_string(), RawValue::Empty);
        row.insert(headers::SCALE.to_string(), RawValue::from("Kecil"));

        match create_company(&mut conn, &row, "admin").unwrap() {
            EditOutcome::Rejected { errors } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec![headers::VILLAGE, headers::SCALE]);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_create_reports_year_conflict() {
        let mut conn = memory_db();
        seed_xy(&conn);
        create_company(&mut conn, &company_row("1234567890", "PT Satu", "2024"), "admin").unwrap();

        match create_company(&mut conn, &company_row("1234567890", "PT Dua", "2024"), "admin").unwrap() {
            EditOutcome::Conflict { conflicts } => assert_eq!(conflicts[0].year, 2024),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_update_does_not_collide_with_itself() {
        let mut conn = memory_db();
        seed_xy(&conn);
        let id = saved_id(create_company(&mut conn, &company_row("1000000001", "PT Satu", "2023,2024"), "admin").unwrap());

        let outcome = update_company(&mut conn, id, &company_row("1000000001", "PT Satu Baru", "2024,2025"), "admin").unwrap();
        assert_eq!(saved_id(outcome), id);

        let company = get_company(&conn, id).unwrap().unwrap();
        assert_eq!(company.name, "PT Satu Baru");
        assert_eq!(company.years, vec![2024, 2025]);
    }

    #[test]
    fn test_update_and_delete_missing_company() {
        let mut conn = memory_db();
        seed_xy(&conn);

        let outcome = update_company(&mut conn, 42, &company_row("1000000001", "PT", "2024"), "admin").unwrap();
        assert_eq!(outcome, EditOutcome::NotFound);
        assert!(!delete_company(&mut conn, 42, "admin").unwrap());
    }

    #[test]
    fn test_delete_removes_years() {
        let mut conn = memory_db();
        seed_xy(&conn);
        let id = saved_id(create_company(&mut conn, &company_row("1000000001", "PT Satu", "2024"), "admin").unwrap());

        assert!(delete_company(&mut conn, id, "admin").unwrap());
        assert_eq!(get_company(&conn, id).unwrap(), None);
        assert!(company_years(&conn, id).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_and_markers() {
        let mut conn = memory_db();
        seed_xy(&conn);
        let other = insert_district(&conn, "Other").unwrap();

        create_company(&mut conn, &company_row("1000000001", "PT Satu", "2023"), "admin").unwrap();
        create_company(&mut conn, &company_row("1000000002", "PT Dua", "2024"), "admin").unwrap();

        let by_year = list_companies(&conn, &CompanyFilter { district_id: None, year: Some(2024) }).unwrap();
        assert_eq!(by_year.len(), 1);
        assert_eq!(by_year[0].name, "PT Dua");

        let elsewhere = list_companies(&conn, &CompanyFilter { district_id: Some(other), year: None }).unwrap();
        assert!(elsewhere.is_empty());

        let markers = map_markers(&conn).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].kip, "1000000001");
        assert_eq!(markers[0].latitude, -6.9);
    }
}
