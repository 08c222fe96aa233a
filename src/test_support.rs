// Shared fixtures for unit tests

use crate::db::setup_database;
use crate::entities::company::{headers, CodeValue, CompanyCandidate, COMPANY_HEADERS};
use crate::entities::region::{insert_district, insert_village};
use crate::lookup::RegionIds;
use crate::tabular::{RawRow, RawValue, Sheet, SheetRow};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

/// District "X" with village "Y", the region every fixture row points at.
pub fn seed_xy(conn: &Connection) -> RegionIds {
    let district_id = insert_district(conn, "X").unwrap();
    let village_id = insert_village(conn, district_id, "Y").unwrap();
    RegionIds {
        district_id,
        village_id,
    }
}

pub fn valid_candidate() -> CompanyCandidate {
    CompanyCandidate {
        kip: "1000000001".to_string(),
        name: "PT Maju Jaya".to_string(),
        legal_form: CodeValue::Parsed(1),
        address: "Jl. Merdeka 1".to_string(),
        district_name: "X".to_string(),
        village_name: "Y".to_string(),
        postal_code: "40111".to_string(),
        scale: "Besar".to_string(),
        location_type: CodeValue::Parsed(2),
        estate_name: String::new(),
        latitude: -6.9,
        longitude: 107.6,
        distance: Some(1.5),
        product: "Tekstil".to_string(),
        kbli: "13111".to_string(),
        phone: String::new(),
        email: "info@maju.co.id".to_string(),
        website: "https://maju.co.id".to_string(),
        workforce: CodeValue::Parsed(1),
        investment: CodeValue::Parsed(2),
        turnover: CodeValue::Parsed(3),
        contact_name: String::new(),
        contact_title: String::new(),
        contact_email: String::new(),
        contact_phone: String::new(),
        primary_pcl: String::new(),
        notes: String::new(),
        years: BTreeSet::from([2023, 2024]),
        year_text: "2023,2024".to_string(),
    }
}

/// A complete, valid company row as it would come out of a spreadsheet.
pub fn company_row(kip: &str, name: &str, years: &str) -> RawRow {
    let mut row: RawRow = COMPANY_HEADERS
        .iter()
        .map(|h| (h.to_string(), RawValue::Empty))
        .collect();

    let mut set = |header: &str, value: RawValue| {
        row.insert(header.to_string(), value);
    };

    set(headers::KIP, RawValue::from(kip));
    set(headers::NAME, RawValue::from(name));
    set(headers::LEGAL_FORM, RawValue::Number(1.0));
    set(headers::ADDRESS, RawValue::from("Jl. Merdeka 1"));
    set(headers::DISTRICT, RawValue::from("X"));
    set(headers::VILLAGE, RawValue::from("Y"));
    set(headers::POSTAL_CODE, RawValue::from("40111"));
    set(headers::SCALE, RawValue::from("Besar"));
    set(headers::LOCATION_TYPE, RawValue::Number(2.0));
    set(headers::LATITUDE, RawValue::from("-6.9"));
    set(headers::LONGITUDE, RawValue::from("107.6"));
    set(headers::PRODUCT, RawValue::from("Tekstil"));
    set(headers::KBLI, RawValue::from("13111"));
    set(headers::EMAIL, RawValue::from("info@maju.co.id"));
    set(headers::WORKFORCE, RawValue::Number(1.0));
    set(headers::INVESTMENT, RawValue::Number(2.0));
    set(headers::TURNOVER, RawValue::Number(3.0));
    set(headers::YEARS, RawValue::from(years));

    row
}

/// Sheet with the full company header row and the given rows, numbered from 2.
pub fn company_sheet(rows: Vec<RawRow>) -> Sheet {
    Sheet {
        headers: COMPANY_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| SheetRow {
                number: i + 2,
                values,
            })
            .collect(),
    }
}
