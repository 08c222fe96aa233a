// 🗺️ Region Entities - districts (kecamatan) and their villages (desa)
// Read-only for the import pipeline; loaded from a reference CSV.

use crate::entities::company::headers;
use crate::error::{ImportError, ImportResult};
use crate::lookup::{find_district_id, find_village_id};
use crate::tabular::read_csv;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Village {
    pub id: i64,
    pub district_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedSummary {
    pub rows: usize,
    pub districts_added: usize,
    pub villages_added: usize,
}

/// Insert if absent; returns the id either way.
pub fn insert_district(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    if let Some(id) = find_district_id(conn, name)? {
        return Ok(id);
    }
    conn.execute("INSERT INTO districts (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

/// Insert if absent; returns the id either way.
pub fn insert_village(conn: &Connection, district_id: i64, name: &str) -> rusqlite::Result<i64> {
    if let Some(id) = find_village_id(conn, district_id, name)? {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO villages (district_id, name) VALUES (?1, ?2)",
        params![district_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_districts(conn: &Connection) -> rusqlite::Result<Vec<District>> {
    let mut stmt = conn.prepare("SELECT id, name FROM districts ORDER BY name")?;
    let districts = stmt
        .query_map([], |row| {
            Ok(District {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(districts)
}

pub fn list_villages(conn: &Connection, district_id: i64) -> rusqlite::Result<Vec<Village>> {
    let mut stmt = conn.prepare(
        "SELECT id, district_id, name FROM villages WHERE district_id = ?1 ORDER BY name",
    )?;
    let villages = stmt
        .query_map([district_id], |row| {
            Ok(Village {
                id: row.get(0)?,
                district_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(villages)
}

/// Load `Kecamatan,Desa` pairs from CSV in one transaction. Re-running is a no-op.
pub fn seed_regions(conn: &mut Connection, csv_bytes: &[u8]) -> ImportResult<SeedSummary> {
    let sheet = read_csv(csv_bytes)?;

    for required in [headers::DISTRICT, headers::VILLAGE] {
        if !sheet.headers.iter().any(|h| h == required) {
            return Err(ImportError::Unreadable(format!(
                "region file is missing the '{}' column",
                required
            )));
        }
    }

    let tx = conn.transaction()?;
    let mut summary = SeedSummary::default();

    for row in &sheet.rows {
        let district = crate::sanitize::text(&row.values, headers::DISTRICT);
        let village = crate::sanitize::text(&row.values, headers::VILLAGE);
        if district.is_empty() || village.is_empty() {
            continue;
        }
        summary.rows += 1;

        let district_id = match find_district_id(&tx, &district)? {
            Some(id) => id,
            None => {
                summary.districts_added += 1;
                insert_district(&tx, &district)?
            }
        };

        if find_village_id(&tx, district_id, &village)?.is_none() {
            insert_village(&tx, district_id, &village)?;
            summary.villages_added += 1;
        }
    }

    tx.commit()?;
    info!(
        rows = summary.rows,
        districts = summary.districts_added,
        villages = summary.villages_added,
        "region reference data seeded"
    );

    Ok(summary)
}
