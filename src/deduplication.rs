// 🔁 Year Collision Detection
// A company may appear in many directory years, but one KIP may hold a given
// year only once across the whole table.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearConflict {
    pub year: i32,
    pub company_id: i64,
    pub company_name: String,
}

/// Stored (KIP, year) pairs that collide with `years`.
///
/// `exclude_id` skips one company, so an edit does not collide with itself.
/// Results come back ordered by year, then company id.
pub fn find_year_conflicts(
    conn: &Connection,
    kip: &str,
    years: &BTreeSet<i32>,
    exclude_id: Option<i64>,
) -> rusqlite::Result<Vec<YearConflict>> {
    if years.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare_cached(
        "SELECT y.year, c.id, c.name
         FROM company_years y
         JOIN companies c ON c.id = y.company_id
         WHERE c.kip = ?1 AND y.year = ?2 AND (?3 IS NULL OR c.id != ?3)
         ORDER BY c.id",
    )?;

    let mut conflicts = Vec::new();
    for year in years {
        let found = stmt
            .query_map(params![kip, year, exclude_id], |row| {
                Ok(YearConflict {
                    year: row.get(0)?,
                    company_id: row.get(1)?,
                    company_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        conflicts.extend(found);
    }

    Ok(conflicts)
}
