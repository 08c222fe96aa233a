// 🧼 Field Sanitizer - raw cells → typed candidate
// Pure and infallible: every correctness question is left to the validator.

use crate::entities::company::{headers, CodeValue, CompanyCandidate};
use crate::entities::pcl::{self, PclCandidate};
use crate::tabular::{RawRow, RawValue};
use std::collections::BTreeSet;

// ============================================================================
// CELL COERCION
// ============================================================================

/// Trimmed text; absent or empty → "". Integral numbers lose their ".0".
pub fn text(row: &RawRow, header: &str) -> String {
    match row.get(header) {
        Some(RawValue::Text(s)) => s.trim().to_string(),
        Some(RawValue::Number(n)) => format_number(*n),
        Some(RawValue::Empty) | None => String::new(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Integer category code with an explicit missing/unparsable state.
pub fn code(row: &RawRow, header: &str) -> CodeValue {
    match row.get(header) {
        Some(RawValue::Number(n)) => integral(*n)
            .map(CodeValue::Parsed)
            .unwrap_or_else(|| CodeValue::Unparsable(n.to_string())),
        Some(RawValue::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return CodeValue::Missing;
            }
            if let Ok(v) = s.parse::<i64>() {
                return CodeValue::Parsed(v);
            }
            s.parse::<f64>()
                .ok()
                .and_then(integral)
                .map(CodeValue::Parsed)
                .unwrap_or_else(|| CodeValue::Unparsable(s.to_string()))
        }
        Some(RawValue::Empty) | None => CodeValue::Missing,
    }
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 {
        Some(n as i64)
    } else {
        None
    }
}

/// Floating point; absent or unparsable → NaN.
/// A lone comma is read as the decimal separator ("-6,914" → -6.914).
pub fn float(row: &RawRow, header: &str) -> f64 {
    match row.get(header) {
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Text(s)) => parse_decimal(s.trim()),
        Some(RawValue::Empty) | None => f64::NAN,
    }
}

fn parse_decimal(s: &str) -> f64 {
    let normalized = if !s.contains('.') && s.matches(',').count() == 1 {
        s.replace(',', ".")
    } else {
        s.to_string()
    };
    normalized.parse().unwrap_or(f64::NAN)
}

/// Like [`float`] but empty means "not given" rather than NaN.
pub fn optional_float(row: &RawRow, header: &str) -> Option<f64> {
    match row.get(header) {
        Some(value) if !value.is_blank() => Some(float(row, header)),
        _ => None,
    }
}

/// "2023, 2024,abc" → {2023, 2024}; non-numeric tokens are dropped.
pub fn years(row: &RawRow, header: &str) -> BTreeSet<i32> {
    match row.get(header) {
        Some(RawValue::Number(n)) => integral(*n)
            .and_then(|y| i32::try_from(y).ok())
            .into_iter()
            .collect(),
        Some(RawValue::Text(s)) => s
            .split(',')
            .filter_map(|token| token.trim().parse::<i32>().ok())
            .collect(),
        Some(RawValue::Empty) | None => BTreeSet::new(),
    }
}

// ============================================================================
// COMPANY ROW
// ============================================================================

pub fn sanitize_company(row: &RawRow) -> CompanyCandidate {
    CompanyCandidate {
        kip: text(row, headers::KIP),
        name: text(row, headers::NAME),
        legal_form: code(row, headers::LEGAL_FORM),
        address: text(row, headers::ADDRESS),
        district_name: text(row, headers::DISTRICT),
        village_name: text(row, headers::VILLAGE),
        postal_code: text(row, headers::POSTAL_CODE),
        scale: text(row, headers::SCALE),
        location_type: code(row, headers::LOCATION_TYPE),
        estate_name: text(row, headers::ESTATE_NAME),
        latitude: float(row, headers::LATITUDE),
        longitude: float(row, headers::LONGITUDE),
        distance: optional_float(row, headers::DISTANCE),
        product: text(row, headers::PRODUCT),
        kbli: text(row, headers::KBLI),
        phone: text(row, headers::PHONE),
        email: text(row, headers::EMAIL),
        website: text(row, headers::WEBSITE),
        workforce: code(row, headers::WORKFORCE),
        investment: code(row, headers::INVESTMENT),
        turnover: code(row, headers::TURNOVER),
        contact_name: text(row, headers::CONTACT_NAME),
        contact_title: text(row, headers::CONTACT_TITLE),
        contact_email: text(row, headers::CONTACT_EMAIL),
        contact_phone: text(row, headers::CONTACT_PHONE),
        primary_pcl: text(row, headers::PRIMARY_PCL),
        notes: text(row, headers::NOTES),
        years: years(row, headers::YEARS),
        year_text: text(row, headers::YEARS),
    }
}

pub fn sanitize_pcl(row: &RawRow) -> PclCandidate {
    PclCandidate {
        name: text(row, pcl::headers::NAME),
        email: text(row, pcl::headers::EMAIL),
        // spaces and dashes are common in typed numbers
        phone: text(row, pcl::headers::PHONE)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect(),
    }
}
