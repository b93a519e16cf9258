//! Column-structure inference for generically-typed files.
//!
//! Types are decided by majority vote over a bounded sample; required-ness
//! is measured over all rows. The result is persisted on the upload so
//! readers of the current version know the file's shape.

use hisab_core::{parse_date, ColumnSpec, ColumnType, RawRow};
use regex::Regex;

const SAMPLE_ROWS: usize = 100;
const TYPE_MAJORITY: f64 = 0.8;
const REQUIRED_RATIO: f64 = 0.9;

/// Ordered patterns for primary-key detection; first match wins.
const PRIMARY_KEY_PATTERNS: &[&str] = &["^id$", "sub.*order.*no", "order.*id", "sku$", "product.*id"];

/// Infer one [`ColumnSpec`] per header.
pub fn infer_columns(headers: &[String], rows: &[RawRow]) -> Vec<ColumnSpec> {
    headers.iter().map(|h| infer_one(h, rows)).collect()
}

fn infer_one(header: &str, rows: &[RawRow]) -> ColumnSpec {
    let all: Vec<&str> = rows
        .iter()
        .map(|r| r.get(header).unwrap_or("").trim())
        .collect();
    let non_empty_all = all.iter().filter(|v| !v.is_empty()).count();
    let required =
        !rows.is_empty() && non_empty_all as f64 >= REQUIRED_RATIO * rows.len() as f64;

    let samples: Vec<&str> = all
        .iter()
        .copied()
        .take(SAMPLE_ROWS)
        .filter(|v| !v.is_empty())
        .collect();

    let ty = if samples.is_empty() {
        ColumnType::Text
    } else {
        let n = samples.len() as f64;
        let bools = samples.iter().filter(|v| is_bool(v)).count() as f64;
        let numbers = samples.iter().filter(|v| is_number(v)).count() as f64;
        let dates = samples.iter().filter(|v| parse_date(v).is_some()).count() as f64;

        // Ladder: boolean, then number, then date (which additionally needs
        // a date-ish header so numeric id columns don't masquerade), then text.
        if bools / n >= TYPE_MAJORITY {
            ColumnType::Boolean
        } else if numbers / n >= TYPE_MAJORITY {
            ColumnType::Number
        } else if dates / n >= TYPE_MAJORITY && header.to_ascii_lowercase().contains("date") {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    };

    ColumnSpec {
        name: header.to_string(),
        ty,
        required,
        description: format!("auto-detected {ty} column"),
    }
}

fn is_bool(v: &str) -> bool {
    v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")
}

fn is_number(v: &str) -> bool {
    v.replace(',', "")
        .parse::<f64>()
        .map(|n| n.is_finite())
        .unwrap_or(false)
}

/// Pick the primary-key header: ordered regex ladder, else first header.
pub fn detect_primary_key(headers: &[String]) -> Option<String> {
    for pattern in PRIMARY_KEY_PATTERNS {
        if let Ok(re) = Regex::new(&format!("(?i){pattern}")) {
            if let Some(h) = headers.iter().find(|h| re.is_match(h.trim())) {
                return Some(h.clone());
            }
        }
    }
    headers.first().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_from(header: &str, values: &[&str]) -> (Vec<String>, Vec<RawRow>) {
        let headers = vec![header.to_string()];
        let rows = values
            .iter()
            .map(|v| RawRow::new(vec![(header.to_string(), v.to_string())]))
            .collect();
        (headers, rows)
    }

    fn infer_single(header: &str, values: &[&str]) -> ColumnSpec {
        let (headers, rows) = rows_from(header, values);
        infer_columns(&headers, &rows).remove(0)
    }

    #[test]
    fn majority_numeric_column_is_number() {
        let spec = infer_single("Price", &["100", "200.5", "1,300", "x", "500"]);
        assert_eq!(spec.ty, ColumnType::Number);
    }

    #[test]
    fn below_majority_is_text() {
        let spec = infer_single("Price", &["100", "200", "x"]);
        assert_eq!(spec.ty, ColumnType::Text);
    }

    #[test]
    fn boolean_wins_the_ladder() {
        let spec = infer_single("Active", &["true", "FALSE", "true", "true"]);
        assert_eq!(spec.ty, ColumnType::Boolean);
    }

    #[test]
    fn date_type_needs_a_date_ish_header() {
        let dates = ["2024-01-05", "2024-01-06", "05/01/2024"];
        assert_eq!(infer_single("Order Date", &dates).ty, ColumnType::Date);
        assert_eq!(infer_single("Created", &dates).ty, ColumnType::Text);
    }

    #[test]
    fn numeric_serials_type_as_number_even_under_a_date_header() {
        let spec = infer_single("Payment Date", &["45292", "45293", "45294"]);
        assert_eq!(spec.ty, ColumnType::Number);
    }

    #[test]
    fn required_measures_all_rows() {
        let mut values = vec!["x"; 9];
        values.push("");
        let spec = infer_single("Name", &values);
        assert!(spec.required);

        let mut values = vec!["x"; 8];
        values.extend(["", ""]);
        let spec = infer_single("Name", &values);
        assert!(!spec.required);
    }

    #[test]
    fn type_samples_are_capped_but_required_is_not() {
        // First 100 rows numeric, the next 100 text: the sample decides
        // number, required still sees all 200 non-empty rows.
        let mut values: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        values.extend((0..100).map(|i| format!("text{i}")));
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let spec = infer_single("Mixed", &refs);
        assert_eq!(spec.ty, ColumnType::Number);
        assert!(spec.required);
    }

    #[test]
    fn empty_column_is_optional_text() {
        let spec = infer_single("Notes", &["", "", ""]);
        assert_eq!(spec.ty, ColumnType::Text);
        assert!(!spec.required);
    }

    #[test]
    fn primary_key_ladder_ordering() {
        let h = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            detect_primary_key(&h(&["Name", "SKU"])),
            Some("SKU".to_string())
        );
        assert_eq!(
            detect_primary_key(&h(&["SKU", "Sub Order No"])),
            Some("Sub Order No".to_string())
        );
        assert_eq!(
            detect_primary_key(&h(&["Order ID", "id"])),
            Some("id".to_string())
        );
        assert_eq!(
            detect_primary_key(&h(&["foo", "bar"])),
            Some("foo".to_string())
        );
        assert_eq!(detect_primary_key(&[]), None);
    }
}
