//! Settlement-workbook parser.
//!
//! Reads the vendor payment export: prefer a sheet named "Order Payments",
//! else sheet 0. The header row is not assumed to be row 0 (exports carry
//! banner rows); it is found by scanning the first few rows. Column binding
//! is by exact header string, no fuzzy matching: settlement exports use a
//! fixed vendor schema, unlike the seller-authored order manifests.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use hisab_core::{parse_date, sanitize_amount, Payment};

use crate::text;

// ---------------------------------------------------------------------------
// Vendor vocabulary
// ---------------------------------------------------------------------------

const COL_SUB_ORDER_NO: &str = "Sub Order No";
const COL_SETTLEMENT_AMOUNT: &str = "Final Settlement Amount";
const COL_PAYMENT_DATE: &str = "Payment Date";
const COL_ORDER_VALUE: &str = "Total Sale Amount (Incl. Shipping & GST)";
const COL_COMMISSION: &str = "Meesho Commission (Incl. GST)";
const COL_FIXED_FEE: &str = "Fixed Fee (Incl. GST)";
const COL_GATEWAY_FEE: &str = "Payment Gateway Fee (Incl. GST)";
const COL_ADS_FEE: &str = "Ads Fee (Incl. GST)";
const COL_GST_PERCENT: &str = "Product GST %";
const COL_LIVE_STATUS: &str = "Live Order Status";
const COL_SUPPLIER_SKU: &str = "Supplier SKU";

const PREFERRED_SHEET: &str = "Order Payments";
const HEADER_SCAN_ROWS: usize = 5;
const HEADER_MIN_CELLS: usize = 5;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One settlement row, before identity stamping.
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub sub_order_no: String,
    pub settlement_date: Option<NaiveDate>,
    pub settlement_amount: f64,
    pub order_value: f64,
    pub commission_fee: f64,
    pub fixed_fee: f64,
    pub gateway_fee: f64,
    pub ads_fee: f64,
}

impl PaymentDraft {
    /// Stamp identity; a missing payment date falls back to `fallback_date`
    /// (ingestion passes today).
    pub fn into_payment(self, seller_id: &str, upload_id: &str, fallback_date: NaiveDate) -> Payment {
        Payment {
            seller_id: seller_id.to_string(),
            sub_order_no: self.sub_order_no,
            settlement_date: self.settlement_date.unwrap_or(fallback_date),
            settlement_amount: self.settlement_amount,
            order_value: self.order_value,
            commission_fee: self.commission_fee,
            fixed_fee: self.fixed_fee,
            gateway_fee: self.gateway_fee,
            ads_fee: self.ads_fee,
            upload_id: upload_id.to_string(),
        }
    }
}

/// Parse result for one settlement sheet, including the two side channels
/// harvested per row: sku to GST%, and sub order to live status.
#[derive(Debug, Default)]
pub struct ParsedSettlements {
    pub payments: Vec<PaymentDraft>,
    pub gst_updates: Vec<(String, f64)>,
    pub status_updates: Vec<(String, String)>,
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a settlement workbook (xlsx/xls) from raw bytes.
pub fn parse_settlement_workbook(bytes: &[u8]) -> ParsedSettlements {
    let mut out = ParsedSettlements::default();

    let mut workbook = match open_workbook_auto_from_rs(Cursor::new(bytes)) {
        Ok(wb) => wb,
        Err(e) => {
            out.errors.push(format!("cannot open workbook: {e}"));
            return out;
        }
    };
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        out.errors.push("workbook has no sheets".to_string());
        return out;
    }
    let target = sheet_names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(PREFERRED_SHEET))
        .cloned()
        .unwrap_or_else(|| sheet_names[0].clone());

    let range = match workbook.worksheet_range(&target) {
        Ok(r) => r,
        Err(e) => {
            out.errors.push(format!("cannot read sheet '{target}': {e}"));
            return out;
        }
    };

    parse_settlement_grid(&target, &range_to_grid(&range))
}

/// Parse a settlement CSV member (some archives ship CSV instead of xlsx;
/// same vendor schema, same header heuristic).
pub fn parse_settlement_csv(bytes: &[u8]) -> ParsedSettlements {
    let content = text::decode(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut csv_errors = Vec::new();
    for (i, result) in reader.records().enumerate() {
        match result {
            Ok(r) => grid.push(r.iter().map(str::to_string).collect()),
            Err(e) => csv_errors.push(format!("row {}: {e}", i + 1)),
        }
    }

    let mut parsed = parse_settlement_grid("settlement csv", &grid);
    parsed.errors.extend(csv_errors);
    parsed
}

// ---------------------------------------------------------------------------
// Grid core
// ---------------------------------------------------------------------------

/// Parse a settlement grid: header-row search, exact column binding, then
/// row extraction. The Sub-Order-No column is the one hard requirement;
/// every other column defaults to zero/empty when absent.
pub fn parse_settlement_grid(sheet: &str, grid: &[Vec<String>]) -> ParsedSettlements {
    let mut out = ParsedSettlements::default();

    let header_row = grid.iter().take(HEADER_SCAN_ROWS).position(|row| {
        let non_empty = row.iter().filter(|c| !c.trim().is_empty()).count();
        non_empty >= HEADER_MIN_CELLS
            && row
                .iter()
                .any(|c| c.to_ascii_lowercase().contains("sub order"))
    });
    let Some(header_row) = header_row else {
        out.errors.push(format!("sheet '{sheet}': no header row found"));
        return out;
    };

    let headers = &grid[header_row];
    let col = |name: &str| headers.iter().position(|h| h.trim() == name);

    let Some(sub_col) = col(COL_SUB_ORDER_NO) else {
        out.errors.push(format!(
            "sheet '{sheet}': missing required column '{COL_SUB_ORDER_NO}'"
        ));
        return out;
    };
    let amount_col = col(COL_SETTLEMENT_AMOUNT);
    let date_col = col(COL_PAYMENT_DATE);
    let order_value_col = col(COL_ORDER_VALUE);
    let commission_col = col(COL_COMMISSION);
    let fixed_col = col(COL_FIXED_FEE);
    let gateway_col = col(COL_GATEWAY_FEE);
    let ads_col = col(COL_ADS_FEE);
    let gst_col = col(COL_GST_PERCENT);
    let status_col = col(COL_LIVE_STATUS);
    let sku_col = col(COL_SUPPLIER_SKU);

    for (offset, row) in grid[header_row + 1..].iter().enumerate() {
        let line = header_row + offset + 2; // 1-based sheet row
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let text_at = |i: usize| -> &str { row.get(i).map(String::as_str).unwrap_or("") };
        let opt_text = |c: Option<usize>| -> &str { c.map(|i| text_at(i)).unwrap_or("") };
        let amount = |c: Option<usize>| sanitize_amount(opt_text(c));

        let sub_order_no = text_at(sub_col).trim().to_string();
        if sub_order_no.is_empty() {
            out.errors.push(format!(
                "sheet '{sheet}' row {line}: missing '{COL_SUB_ORDER_NO}'"
            ));
            continue;
        }

        let sku = opt_text(sku_col).trim();
        let gst = amount(gst_col);
        if !sku.is_empty() && gst > 0.0 {
            out.gst_updates.push((sku.to_string(), gst));
        }
        let live_status = opt_text(status_col).trim();
        if !live_status.is_empty() {
            out.status_updates
                .push((sub_order_no.clone(), live_status.to_string()));
        }

        out.payments.push(PaymentDraft {
            sub_order_no,
            settlement_date: parse_date(opt_text(date_col)),
            settlement_amount: amount(amount_col),
            order_value: amount(order_value_col),
            commission_fee: amount(commission_col),
            fixed_fee: amount(fixed_col),
            gateway_fee: amount(gateway_col),
            ads_fee: amount(ads_col),
        });
    }

    out
}

fn range_to_grid(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => format_number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    }
}

/// Integers print without decimals so ids do not grow ".0" suffixes.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
