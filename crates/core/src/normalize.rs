//! Numeric and date normalization for dirty export cells.
//!
//! Everything here is never-fail by contract: one bad cell must not abort
//! a batch, so amounts fall back to 0.0 and dates to a caller-supplied
//! fallback (for ingestion: today).

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime};

/// Strip currency symbols, thousands separators and stray text; parse what
/// survives. Returns 0.0 for anything unparseable. Accepts parenthesized
/// negatives ("(123.45)") as seen in accounting exports.
pub fn sanitize_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let (body, negate) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    };

    let mut cleaned = String::with_capacity(body.len());
    for ch in body.chars() {
        match ch {
            '0'..='9' | '.' | '-' | '+' => cleaned.push(ch),
            // ₹, Rs, INR, $, commas, spaces and any other noise
            _ => {}
        }
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => {
            if negate {
                -n
            } else {
                n
            }
        }
        _ => 0.0,
    }
}

/// Excel 1900-system serial to calendar date.
///
/// Anchored at 1899-12-30 = serial 0 so modern serials line up with real
/// dates despite the workbook format's fake 1900-02-29.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Eight-digit date-like numbers ("20240105") are not serials.
    if !serial.is_finite() || serial < 1.0 || serial > 100_000.0 {
        return None;
    }
    let days = serial.floor() as u64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a date cell: Excel serials, ISO dates/datetimes, `DD/MM/YYYY`,
/// `DD-MM-YYYY`. `None` when nothing matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serial) = trimmed.parse::<f64>() {
        return excel_serial_to_date(serial);
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    None
}

/// [`parse_date`] with a fallback.
pub fn parse_date_or(raw: &str, fallback: NaiveDate) -> NaiveDate {
    parse_date(raw).unwrap_or(fallback)
}

/// The ingestion never-fail policy: unparseable dates become today.
pub fn parse_date_or_today(raw: &str) -> NaiveDate {
    parse_date_or(raw, Local::now().date_naive())
}
