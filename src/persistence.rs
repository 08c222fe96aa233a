// 💾 Company Persistence - write side of the directory tables
// Every function takes a plain &Connection so it runs inside whatever
// transaction the caller opened; none of them commit.

use crate::entities::company::ResolvedCompany;
use crate::import::PersistOutcome;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Optional text columns store NULL rather than "".
fn nullable(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn find_company_id_by_kip(conn: &Connection, kip: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM companies WHERE kip = ?1 ORDER BY id LIMIT 1",
        [kip],
        |row| row.get(0),
    )
    .optional()
}

/// Insert the company row and its years; returns the new id.
pub fn insert_company(conn: &Connection, company: &ResolvedCompany) -> rusqlite::Result<i64> {
    let c = &company.candidate;
    let now = Utc::now().to_rfc3339();

    let mut stmt = conn.prepare_cached(
        "INSERT INTO companies (
            kip, name, legal_form, address, district_id, village_id, postal_code,
            scale, location_type, estate_name, latitude, longitude, distance,
            product, kbli, phone, email, website, workforce, investment, turnover,
            contact_name, contact_title, contact_email, contact_phone, primary_pcl,
            notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                  ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
    )?;

    stmt.execute(params![
        c.kip,
        c.name,
        c.legal_form.value_or_sentinel(),
        c.address,
        company.region.district_id,
        company.region.village_id,
        nullable(&c.postal_code),
        c.scale,
        c.location_type.value_or_sentinel(),
        nullable(&c.estate_name),
        c.latitude,
        c.longitude,
        c.distance,
        c.product,
        c.kbli,
        nullable(&c.phone),
        nullable(&c.email),
        nullable(&c.website),
        c.workforce.value_or_sentinel(),
        c.investment.value_or_sentinel(),
        c.turnover.value_or_sentinel(),
        nullable(&c.contact_name),
        nullable(&c.contact_title),
        nullable(&c.contact_email),
        nullable(&c.contact_phone),
        nullable(&c.primary_pcl),
        nullable(&c.notes),
        now,
        now,
    ])?;

    let id = conn.last_insert_rowid();
    insert_years(conn, id, &c.years)?;
    Ok(id)
}

/// Overwrite every column except id and created_at. Years are left alone.
pub fn update_company(conn: &Connection, id: i64, company: &ResolvedCompany) -> rusqlite::Result<()> {
    let c = &company.candidate;

    let mut stmt = conn.prepare_cached(
        "UPDATE companies SET
            kip = ?2, name = ?3, legal_form = ?4, address = ?5, district_id = ?6,
            village_id = ?7, postal_code = ?8, scale = ?9, location_type = ?10,
            estate_name = ?11, latitude = ?12, longitude = ?13, distance = ?14,
            product = ?15, kbli = ?16, phone = ?17, email = ?18, website = ?19,
            workforce = ?20, investment = ?21, turnover = ?22, contact_name = ?23,
            contact_title = ?24, contact_email = ?25, contact_phone = ?26,
            primary_pcl = ?27, notes = ?28, updated_at = ?29
         WHERE id = ?1",
    )?;

    stmt.execute(params![
        id,
        c.kip,
        c.name,
        c.legal_form.value_or_sentinel(),
        c.address,
        company.region.district_id,
        company.region.village_id,
        nullable(&c.postal_code),
        c.scale,
        c.location_type.value_or_sentinel(),
        nullable(&c.estate_name),
        c.latitude,
        c.longitude,
        c.distance,
        c.product,
        c.kbli,
        nullable(&c.phone),
        nullable(&c.email),
        nullable(&c.website),
        c.workforce.value_or_sentinel(),
        c.investment.value_or_sentinel(),
        c.turnover.value_or_sentinel(),
        nullable(&c.contact_name),
        nullable(&c.contact_title),
        nullable(&c.contact_email),
        nullable(&c.contact_phone),
        nullable(&c.primary_pcl),
        nullable(&c.notes),
        Utc::now().to_rfc3339(),
    ])?;

    Ok(())
}

fn insert_years(conn: &Connection, company_id: i64, years: &BTreeSet<i32>) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO company_years (company_id, year) VALUES (?1, ?2)",
    )?;
    for year in years {
        stmt.execute(params![company_id, year])?;
    }
    Ok(())
}

/// The stored year set becomes exactly `years`.
pub fn replace_years(conn: &Connection, company_id: i64, years: &BTreeSet<i32>) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM company_years WHERE company_id = ?1", [company_id])?;
    insert_years(conn, company_id, years)
}

/// Update the company holding this KIP, or insert it when none does.
pub fn upsert_company(conn: &Connection, company: &ResolvedCompany) -> rusqlite::Result<PersistOutcome> {
    match find_company_id_by_kip(conn, &company.candidate.kip)? {
        Some(id) => {
            update_company(conn, id, company)?;
            replace_years(conn, id, &company.candidate.years)?;
            Ok(PersistOutcome::Updated(id))
        }
        None => insert_company(conn, company).map(PersistOutcome::Inserted),
    }
}

/// Delete every company and year association; returns the companies removed.
pub fn wipe_companies(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM company_years", [])?;
    conn.execute("DELETE FROM companies", [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_companies, count_year_associations};
    use crate::entities::company::{company_years, get_company};
    use crate::test_support::{memory_db, seed_xy, valid_candidate};

    fn resolved(conn: &Connection) -> ResolvedCompany {
        ResolvedCompany {
            candidate: valid_candidate(),
            region: seed_xy(conn),
        }
    }

    #[test]
    fn test_insert_stores_row_and_years() {
        let conn = memory_db();
        let company = resolved(&conn);

        let id = insert_company(&conn, &company).unwrap();
        let stored = get_company(&conn, id).unwrap().unwrap();

        assert_eq!(stored.kip, "1000000001");
        assert_eq!(stored.district_name, "X");
        assert_eq!(stored.village_name, "Y");
        assert_eq!(stored.years, vec![2023, 2024]);
        assert_eq!(stored.distance, Some(1.5));
        // empty optional text is stored as NULL
        assert_eq!(stored.phone, None);
        assert_eq!(stored.email.as_deref(), Some("info@maju.co.id"));
    }

    #[test]
    fn test_missing_code_persists_sentinel() {
        let conn = memory_db();
        let mut company = resolved(&conn);
        company.candidate.investment = crate::entities::company::CodeValue::Missing;

        let id = insert_company(&conn, &company).unwrap();
        assert_eq!(get_company(&conn, id).unwrap().unwrap().investment, 1);
    }

    #[test]
    fn test_upsert_updates_and_replaces_years() {
        let conn = memory_db();
        let mut company = resolved(&conn);

        let first = upsert_company(&conn, &company).unwrap();
        let id = match first {
            PersistOutcome::Inserted(id) => id,
            other => panic!("expected insert, got {:?}", other),
        };

        company.candidate.name = "PT Maju Jaya Baru".to_string();
        company.candidate.years = BTreeSet::from([2025]);

        assert_eq!(upsert_company(&conn, &company).unwrap(), PersistOutcome::Updated(id));
        assert_eq!(count_companies(&conn).unwrap(), 1);
        assert_eq!(company_years(&conn, id).unwrap(), vec![2025]);
        assert_eq!(get_company(&conn, id).unwrap().unwrap().name, "PT Maju Jaya Baru");
    }

    #[test]
    fn test_wipe_removes_everything() {
        let conn = memory_db();
        let mut company = resolved(&conn);
        insert_company(&conn, &company).unwrap();
        company.candidate.kip = "1000000002".to_string();
        insert_company(&conn, &company).unwrap();

        assert_eq!(wipe_companies(&conn).unwrap(), 2);
        assert_eq!(count_companies(&conn).unwrap(), 0);
        assert_eq!(count_year_associations(&conn).unwrap(), 0);
    }
}
