// 🧭 Lookup Resolver - district/village names → ids
// Village names repeat across districts, so the village lookup is always
// scoped to the district id resolved first.

use crate::entities::company::headers;
use crate::error::{ImportError, ImportResult};
use crate::validation::Violation;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionIds {
    pub district_id: i64,
    pub village_id: i64,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("district '{0}' not found")]
    DistrictNotFound(String),

    #[error("village '{village}' not found within district '{district}'")]
    VillageNotFound { district: String, village: String },

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl LookupError {
    /// Row-level misses become violations; store failures stay errors.
    pub fn into_violation(self) -> ImportResult<Violation> {
        match self {
            LookupError::Missing { field } => Ok(Violation::required(field)),
            LookupError::DistrictNotFound(_) => Ok(Violation::new(headers::DISTRICT, self.to_string())),
            LookupError::VillageNotFound { .. } => Ok(Violation::new(headers::VILLAGE, self.to_string())),
            LookupError::Store(e) => Err(ImportError::Store(e)),
        }
    }
}

pub fn find_district_id(conn: &Connection, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT id FROM districts WHERE name = ?1", [name], |row| row.get(0))
        .optional()
}

pub fn find_village_id(
    conn: &Connection,
    district_id: i64,
    name: &str,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM villages WHERE district_id = ?1 AND name = ?2",
        params![district_id, name],
        |row| row.get(0),
    )
    .optional()
}

/// Exact-name district lookup, then village lookup within that district.
pub fn resolve_region(
    conn: &Connection,
    district: &str,
    village: &str,
) -> Result<RegionIds, LookupError> {
    if district.is_empty() {
        return Err(LookupError::Missing { field: headers::DISTRICT });
    }

    let district_id = find_district_id(conn, district)?
        .ok_or_else(|| LookupError::DistrictNotFound(district.to_string()))?;

    if village.is_empty() {
        return Err(LookupError::Missing { field: headers::VILLAGE });
    }

    let village_id = find_village_id(conn, district_id, village)?.ok_or_else(|| {
        LookupError::VillageNotFound {
            district: district.to_string(),
            village: village.to_string(),
        }
    })?;

    Ok(RegionIds {
        district_id,
        village_id,
    })
}
