// 👷 PCL Entity - field officers (petugas cacah lapangan)
// Keyed on email, compared case-insensitively. No years, no region lookup.

use crate::error::ImportResult;
use crate::import::{Dataset, PersistOutcome, StoredConflict};
use crate::sanitize::sanitize_pcl;
use crate::tabular::RawRow;
use crate::validation::{validate_pcl, Violation};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

pub mod headers {
    pub const NAME: &str = "Nama";
    pub const EMAIL: &str = "Email";
    pub const PHONE: &str = "No HP";
}

pub const PCL_HEADERS: [&str; 3] = [headers::NAME, headers::EMAIL, headers::PHONE];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PclCandidate {
    pub name: String,
    pub email: String,
    /// Separators stripped; empty when not given
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pcl {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

pub fn find_pcl_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Pcl>> {
    conn.query_row(
        "SELECT id, name, email, phone FROM pcl WHERE email = ?1",
        [email],
        |row| {
            Ok(Pcl {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn list_pcl(conn: &Connection) -> rusqlite::Result<Vec<Pcl>> {
    let mut stmt = conn.prepare("SELECT id, name, email, phone FROM pcl ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Pcl {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn phone_column(phone: &str) -> Option<&str> {
    if phone.is_empty() {
        None
    } else {
        Some(phone)
    }
}

fn insert_pcl(conn: &Connection, p: &PclCandidate) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO pcl (name, email, phone) VALUES (?1, ?2, ?3)",
        params![p.name, p.email, phone_column(&p.phone)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct PclDataset;

impl Dataset for PclDataset {
    type Candidate = PclCandidate;
    type Record = PclCandidate;

    fn name(&self) -> &'static str {
        "pcl"
    }

    fn headers(&self) -> &'static [&'static str] {
        &PCL_HEADERS
    }

    fn sanitize(&self, row: &RawRow) -> PclCandidate {
        sanitize_pcl(row)
    }

    fn resolve(
        &self,
        _conn: &Connection,
        candidate: PclCandidate,
    ) -> ImportResult<Result<PclCandidate, Vec<Violation>>> {
        Ok(Ok(candidate))
    }

    fn validate(&self, record: &PclCandidate) -> Vec<Violation> {
        validate_pcl(record)
    }

    fn identity(&self, record: &PclCandidate) -> String {
        record.email.to_lowercase()
    }

    fn display_name(&self, record: &PclCandidate) -> String {
        record.name.clone()
    }

    fn find_conflicts(&self, conn: &Connection, record: &PclCandidate) -> ImportResult<Vec<StoredConflict>> {
        Ok(find_pcl_by_email(conn, &record.email)?
            .map(|existing| StoredConflict {
                year: None,
                record_id: existing.id,
                record_name: existing.name,
            })
            .into_iter()
            .collect())
    }

    fn wipe(&self, conn: &Connection) -> ImportResult<()> {
        conn.execute("DELETE FROM pcl", [])?;
        Ok(())
    }

    fn upsert(&self, conn: &Connection, record: &PclCandidate) -> ImportResult<PersistOutcome> {
        match find_pcl_by_email(conn, &record.email)? {
            Some(existing) => {
                conn.execute(
                    "UPDATE pcl SET name = ?2, phone = ?3 WHERE id = ?1",
                    params![existing.id, record.name, phone_column(&record.phone)],
                )?;
                Ok(PersistOutcome::Updated(existing.id))
            }
            None => Ok(PersistOutcome::Inserted(insert_pcl(conn, record)?)),
        }
    }

    fn insert(&self, conn: &Connection, record: &PclCandidate) -> ImportResult<i64> {
        Ok(insert_pcl(conn, record)?)
    }
}
