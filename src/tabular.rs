// 📄 Tabular I/O - uploads in, header-keyed rows out
// CSV through the csv crate, XLSX/XLS through calamine.

use crate::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;

pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_CSV: &str = "text/csv";

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = [MIME_XLSX, MIME_XLS, MIME_CSV];

// ============================================================================
// RAW VALUES
// ============================================================================

/// One cell as it came out of the reader, before any coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl RawValue {
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::from_text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// Header name → cell.
pub type RawRow = HashMap<String, RawValue>;

/// A data row with its 1-based spreadsheet row number (header is row 1).
#[derive(Debug, Clone)]
pub struct SheetRow {
    pub number: usize,
    pub values: RawRow,
}

impl SheetRow {
    pub fn is_blank(&self) -> bool {
        self.values.values().all(RawValue::is_blank)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    /// Build a sheet from in-memory rows; row numbers start at 2.
    pub fn from_rows(headers: &[&str], rows: Vec<Vec<RawValue>>) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| SheetRow {
                number: i + 2,
                values: headers.iter().cloned().zip(cells).collect(),
            })
            .collect();

        Sheet { headers, rows }
    }
}

// ============================================================================
// UPLOADS
// ============================================================================

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadedFile {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// MIME essence without parameters ("text/csv; charset=utf-8" → "text/csv")
    pub fn mime_essence(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase()
    }

    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }

    fn looks_like_csv(&self) -> bool {
        self.mime_essence() == MIME_CSV || self.file_name.to_lowercase().ends_with(".csv")
    }
}

/// Reject wrong type, empty and oversize uploads before anything is opened.
pub fn check_preconditions(file: &UploadedFile, max_bytes: usize) -> ImportResult<()> {
    let essence = file.mime_essence();
    if !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
        return Err(ImportError::UnsupportedFileType {
            content_type: file.content_type.clone(),
        });
    }

    if file.bytes.is_empty() {
        return Err(ImportError::EmptyFile);
    }

    if file.bytes.len() > max_bytes {
        return Err(ImportError::FileTooLarge {
            size: file.bytes.len(),
            limit: max_bytes,
        });
    }

    Ok(())
}

// ============================================================================
// READERS
// ============================================================================

/// Decode an upload into a header row plus numbered data rows.
pub fn read_sheet(file: &UploadedFile) -> ImportResult<Sheet> {
    if file.looks_like_csv() {
        read_csv(&file.bytes)
    } else {
        read_workbook(&file.bytes)
    }
}

pub fn read_csv(bytes: &[u8]) -> ImportResult<Sheet> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        let values = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| {
                let value = record.get(i).map(RawValue::from_text).unwrap_or(RawValue::Empty);
                (h.clone(), value)
            })
            .collect();

        rows.push(SheetRow { number, values });
    }

    Ok(Sheet { headers, rows })
}

pub fn read_workbook(bytes: &[u8]) -> ImportResult<Sheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Unreadable("workbook has no sheets".to_string()))??;

    // Range starts at the first used cell, not necessarily A1
    let origin_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(cells) => cells.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => return Ok(Sheet::default()),
    };

    let rows = row_iter
        .enumerate()
        .map(|(i, cells)| {
            let values = headers
                .iter()
                .zip(cells.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, c)| (h.clone(), cell_value(c)))
                .collect();

            SheetRow {
                number: origin_row + i + 2,
                values,
            }
        })
        .collect();

    Ok(Sheet { headers, rows })
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::from_text(s),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        other => RawValue::from_text(&other.to_string()),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// WRITER
// ============================================================================

/// CSV with just the header row, handed out as an import template.
pub fn write_template(headers: &[&str]) -> ImportResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(headers)?;
    wtr.into_inner().map_err(|e| ImportError::Io(e.into_error()))
}
