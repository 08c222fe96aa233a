// 📐 Field Validator - business rules over a sanitized candidate
// Never fails: every violation is collected, not just the first one.

use crate::entities::company::{headers, CodeValue, CompanyCandidate};
use crate::entities::pcl::{self, PclCandidate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ALLOWED_SCALES: [&str; 2] = ["Besar", "Sedang"];
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
pub const MAX_KIP_DIGITS: usize = 10;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").expect("scheme regex"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("phone regex"));

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}(?::\d+)?(?:/\S*)?$")
        .expect("domain regex")
});

// ============================================================================
// VIOLATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Violation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Violation::new(field, format!("{} is required", field))
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ============================================================================
// SHARED RULES
// ============================================================================

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_website(value: &str) -> bool {
    DOMAIN_RE.is_match(&SCHEME_RE.replace(value, ""))
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

pub fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn require(errors: &mut Vec<Violation>, field: &str, value: &str) -> bool {
    if value.is_empty() {
        errors.push(Violation::required(field));
        false
    } else {
        true
    }
}

fn check_code(errors: &mut Vec<Violation>, field: &str, value: &CodeValue, min: i64, max: i64) {
    match value {
        CodeValue::Missing => errors.push(Violation::required(field)),
        CodeValue::Unparsable(raw) => errors.push(Violation::new(
            field,
            format!("{} must be a whole number, got '{}'", field, raw),
        )),
        CodeValue::Parsed(v) if *v < min || *v > max => errors.push(Violation::new(
            field,
            format!("{} must be between {} and {}, got {}", field, min, max, v),
        )),
        CodeValue::Parsed(_) => {}
    }
}

fn check_coordinate(errors: &mut Vec<Violation>, field: &str, value: f64, limit: f64) {
    if value.is_nan() {
        errors.push(Violation::new(
            field,
            format!("{} is required and must be a number", field),
        ));
    } else if value < -limit || value > limit {
        errors.push(Violation::new(
            field,
            format!("{} must be between {} and {}, got {}", field, -limit, limit, value),
        ));
    }
}

fn check_optional_email(errors: &mut Vec<Violation>, field: &str, value: &str) {
    if !value.is_empty() && !is_valid_email(value) {
        errors.push(Violation::new(field, format!("{} is not a valid email address", field)));
    }
}

// ============================================================================
// COMPANY RULES
// ============================================================================

pub fn validate_company(c: &CompanyCandidate) -> Vec<Violation> {
    let mut errors = Vec::new();

    if require(&mut errors, headers::KIP, &c.kip) {
        if !is_all_digits(&c.kip) {
            errors.push(Violation::new(headers::KIP, "KIP must contain digits only"));
        }
        if c.kip.chars().count() > MAX_KIP_DIGITS {
            errors.push(Violation::new(
                headers::KIP,
                format!("KIP must be at most {} digits", MAX_KIP_DIGITS),
            ));
        }
    }

    require(&mut errors, headers::NAME, &c.name);
    check_code(&mut errors, headers::LEGAL_FORM, &c.legal_form, 1, 8);
    require(&mut errors, headers::ADDRESS, &c.address);
    require(&mut errors, headers::DISTRICT, &c.district_name);
    require(&mut errors, headers::VILLAGE, &c.village_name);

    if !c.postal_code.is_empty() && !(c.postal_code.len() == 5 && is_all_digits(&c.postal_code)) {
        errors.push(Violation::new(headers::POSTAL_CODE, "Kode Pos must be exactly 5 digits"));
    }

    if require(&mut errors, headers::SCALE, &c.scale) && !ALLOWED_SCALES.contains(&c.scale.as_str()) {
        errors.push(Violation::new(
            headers::SCALE,
            format!("Skala must be one of {}, got '{}'", ALLOWED_SCALES.join(", "), c.scale),
        ));
    }

    check_code(&mut errors, headers::LOCATION_TYPE, &c.location_type, 1, 4);
    check_coordinate(&mut errors, headers::LATITUDE, c.latitude, 90.0);
    check_coordinate(&mut errors, headers::LONGITUDE, c.longitude, 180.0);

    match c.distance {
        Some(d) if !d.is_finite() => {
            errors.push(Violation::new(headers::DISTANCE, "Jarak must be a finite number"))
        }
        Some(d) if d < 0.0 => {
            errors.push(Violation::new(headers::DISTANCE, "Jarak must not be negative"))
        }
        _ => {}
    }

    require(&mut errors, headers::PRODUCT, &c.product);

    if require(&mut errors, headers::KBLI, &c.kbli) && !(c.kbli.len() == 5 && is_all_digits(&c.kbli)) {
        errors.push(Violation::new(headers::KBLI, "KBLI must be exactly 5 digits"));
    }

    check_optional_email(&mut errors, headers::EMAIL, &c.email);

    if !c.website.is_empty() && !is_valid_website(&c.website) {
        errors.push(Violation::new(headers::WEBSITE, "Website is not a valid domain"));
    }

    check_code(&mut errors, headers::WORKFORCE, &c.workforce, 1, 4);
    check_code(&mut errors, headers::INVESTMENT, &c.investment, 1, 4);
    check_code(&mut errors, headers::TURNOVER, &c.turnover, 1, 4);
    check_optional_email(&mut errors, headers::CONTACT_EMAIL, &c.contact_email);

    if c.years.is_empty() && c.year_text.is_empty() {
        errors.push(Violation::required(headers::YEARS));
    } else if c.years.is_empty() {
        errors.push(Violation::new(
            headers::YEARS,
            format!("Tahun Direktori has no valid year in '{}'", c.year_text),
        ));
    } else {
        let out_of_range: Vec<String> = c
            .years
            .iter()
            .filter(|y| **y < MIN_YEAR || **y > MAX_YEAR)
            .map(|y| y.to_string())
            .collect();

        if !out_of_range.is_empty() {
            errors.push(Violation::new(
                headers::YEARS,
                format!(
                    "Tahun Direktori must be between {} and {}, got {}",
                    MIN_YEAR,
                    MAX_YEAR,
                    out_of_range.join(", ")
                ),
            ));
        }
    }

    errors
}

// ============================================================================
// PCL RULES
// ============================================================================

pub fn validate_pcl(p: &PclCandidate) -> Vec<Violation> {
    let mut errors = Vec::new();

    require(&mut errors, pcl::headers::NAME, &p.name);

    if require(&mut errors, pcl::headers::EMAIL, &p.email) && !is_valid_email(&p.email) {
        errors.push(Violation::new(pcl::headers::EMAIL, "Email is not a valid email address"));
    }

    if !p.phone.is_empty() && !is_valid_phone(&p.phone) {
        errors.push(Violation::new(
            pcl::headers::PHONE,
            "No HP must be 8 to 15 digits, optionally starting with +",
        ));
    }

    errors
}
