//! Order-manifest CSV parser.
//!
//! Header-driven with per-field alias lists (seller exports disagree on
//! column names), streaming row-by-row. One bad row never aborts the file.
//! Product cost/GST columns present in the manifest are harvested in the
//! same pass to seed catalog entries, so no second file is needed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use hisab_core::{
    derive_payment_status, normalize_order_status, parse_date, sanitize_amount, Order, RawRow,
};

use crate::text;

// ---------------------------------------------------------------------------
// Column aliases (priority order, first present wins)
// ---------------------------------------------------------------------------

const SUB_ORDER_NO: &[&str] = &[
    "sub order no",
    "suborderno",
    "sub order id",
    "sub_order_no",
    "sub order number",
];
const ORDER_DATE: &[&str] = &["order date", "order_date", "orderdate", "date"];
const CUSTOMER_STATE: &[&str] = &[
    "customer state",
    "customer_state",
    "end customer state",
    "state",
];
const PRODUCT_NAME: &[&str] = &[
    "product name",
    "product_name",
    "productname",
    "item name",
    "product",
];
const SKU: &[&str] = &["sku", "supplier sku", "sku id", "seller sku"];
const SIZE: &[&str] = &["size", "variation", "product size"];
const QUANTITY: &[&str] = &["quantity", "qty", "units"];
const LISTED_PRICE: &[&str] = &[
    "listed price",
    "listed_price",
    "supplier listed price",
    "supplier listed price (incl. gst + commission)",
    "mrp",
];
const DISCOUNTED_PRICE: &[&str] = &[
    "discounted price",
    "discounted_price",
    "supplier discounted price",
    // Exact header seen in the wild, typo included.
    "supplier discounted price (incl gst and commision)",
    "selling price",
];
const PACKET_ID: &[&str] = &["packet id", "packet_id", "packetid", "awb", "awb number"];
const REASON_FOR_CREDIT: &[&str] = &[
    "reason for credit entry",
    "reason for credit",
    "order status",
    "live order status",
    "status",
];
const PAYMENT_STATUS: &[&str] = &["payment status", "payment_status"];
const COST_PRICE: &[&str] = &["cost price", "cost_price", "product cost"];
const GST_PERCENT: &[&str] = &["product gst %", "gst %", "gst percent", "gst"];

pub(crate) fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    for alias in aliases {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(alias))
        {
            return Some(idx);
        }
    }
    None
}

struct OrderColumns {
    sub_order_no: Option<usize>,
    order_date: Option<usize>,
    customer_state: Option<usize>,
    product_name: Option<usize>,
    sku: Option<usize>,
    size: Option<usize>,
    quantity: Option<usize>,
    listed_price: Option<usize>,
    discounted_price: Option<usize>,
    packet_id: Option<usize>,
    reason_for_credit: Option<usize>,
    payment_status: Option<usize>,
    cost_price: Option<usize>,
    gst_percent: Option<usize>,
}

impl OrderColumns {
    fn bind(headers: &[String]) -> Self {
        Self {
            sub_order_no: find_column(headers, SUB_ORDER_NO),
            order_date: find_column(headers, ORDER_DATE),
            customer_state: find_column(headers, CUSTOMER_STATE),
            product_name: find_column(headers, PRODUCT_NAME),
            sku: find_column(headers, SKU),
            size: find_column(headers, SIZE),
            quantity: find_column(headers, QUANTITY),
            listed_price: find_column(headers, LISTED_PRICE),
            discounted_price: find_column(headers, DISCOUNTED_PRICE),
            packet_id: find_column(headers, PACKET_ID),
            reason_for_credit: find_column(headers, REASON_FOR_CREDIT),
            payment_status: find_column(headers, PAYMENT_STATUS),
            cost_price: find_column(headers, COST_PRICE),
            gst_percent: find_column(headers, GST_PERCENT),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Catalog seed harvested from order rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSeed {
    pub name: String,
    pub cost_price: f64,
    pub gst_percent: f64,
}

/// One structurally valid order row, before identity stamping.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub sub_order_no: String,
    pub order_date: Option<NaiveDate>,
    pub customer_state: String,
    pub product_name: String,
    pub sku: String,
    pub size: String,
    pub quantity: u32,
    pub listed_price: f64,
    pub discounted_price: f64,
    pub packet_id: String,
    /// Raw status string, preserved verbatim.
    pub reason_for_credit: String,
    pub explicit_payment_status: Option<String>,
    /// The original row, for dynamic storage.
    pub raw: RawRow,
}

impl OrderDraft {
    /// Stamp identity and resolve the payment status. Unparseable order
    /// dates fall back to `fallback_date` (ingestion passes today).
    pub fn into_order(self, seller_id: &str, upload_id: &str, fallback_date: NaiveDate) -> Order {
        let canonical = normalize_order_status(&self.reason_for_credit);
        let payment_status =
            derive_payment_status(canonical, None, self.explicit_payment_status.as_deref());
        Order {
            seller_id: seller_id.to_string(),
            sub_order_no: self.sub_order_no,
            order_date: self.order_date.unwrap_or(fallback_date),
            customer_state: self.customer_state,
            product_name: self.product_name,
            sku: self.sku,
            size: self.size,
            quantity: self.quantity,
            listed_price: self.listed_price,
            discounted_price: self.discounted_price,
            packet_id: self.packet_id,
            reason_for_credit: self.reason_for_credit,
            payment_status,
            payment_date: None,
            upload_id: upload_id.to_string(),
        }
    }
}

/// Full parse result for one order manifest.
#[derive(Debug, Default)]
pub struct ParsedOrders {
    pub headers: Vec<String>,
    /// Every non-blank row, including rejected ones (schema inference wants
    /// the full row set).
    pub rows: Vec<RawRow>,
    pub orders: Vec<OrderDraft>,
    pub product_seeds: BTreeMap<String, ProductSeed>,
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an order-manifest CSV. Rows missing any of {Sub Order No, Product
/// Name, SKU} are rejected into the error list; a required column missing
/// entirely fails the whole file with one error per column.
pub fn parse_orders_csv(bytes: &[u8]) -> ParsedOrders {
    let content = text::decode(bytes);
    let mut parsed = ParsedOrders::default();

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            parsed.errors.push(format!("cannot read header row: {e}"));
            return parsed;
        }
    };
    let cols = OrderColumns::bind(&headers);
    parsed.headers = headers.clone();

    // A required column missing entirely is a file-level failure: every
    // row would be rejected anyway.
    for (idx, label) in [
        (cols.sub_order_no, "Sub Order No"),
        (cols.product_name, "Product Name"),
        (cols.sku, "SKU"),
    ] {
        if idx.is_none() {
            parsed
                .errors
                .push(format!("missing required column '{label}'"));
        }
    }
    if !parsed.errors.is_empty() {
        return parsed;
    }

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2; // 1-based, after the header row
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                parsed.errors.push(format!("row {line}: {e}"));
                continue;
            }
        };
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let raw = raw_row(&headers, &record);
        parsed.rows.push(raw.clone());

        let field = |col: Option<usize>| -> String {
            col.and_then(|i| record.get(i))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let sub_order_no = field(cols.sub_order_no);
        let product_name = field(cols.product_name);
        let sku = field(cols.sku);

        let missing = if sub_order_no.is_empty() {
            Some("Sub Order No")
        } else if product_name.is_empty() {
            Some("Product Name")
        } else if sku.is_empty() {
            Some("SKU")
        } else {
            None
        };
        if let Some(name) = missing {
            parsed
                .errors
                .push(format!("row {line}: missing required field '{name}'"));
            continue;
        }

        let quantity = sanitize_amount(&field(cols.quantity)).round();
        let quantity = if quantity < 1.0 { 1 } else { quantity as u32 };

        let cost_price = sanitize_amount(&field(cols.cost_price));
        let gst_percent = sanitize_amount(&field(cols.gst_percent));
        let seed = parsed
            .product_seeds
            .entry(sku.clone())
            .or_insert_with(|| ProductSeed {
                name: product_name.clone(),
                cost_price: 0.0,
                gst_percent: 0.0,
            });
        if seed.cost_price == 0.0 && cost_price > 0.0 {
            seed.cost_price = cost_price;
        }
        if seed.gst_percent == 0.0 && gst_percent > 0.0 {
            seed.gst_percent = gst_percent;
        }

        let explicit = field(cols.payment_status);
        parsed.orders.push(OrderDraft {
            sub_order_no,
            order_date: parse_date(&field(cols.order_date)),
            customer_state: field(cols.customer_state),
            product_name,
            sku,
            size: field(cols.size),
            quantity,
            listed_price: sanitize_amount(&field(cols.listed_price)),
            discounted_price: sanitize_amount(&field(cols.discounted_price)),
            packet_id: field(cols.packet_id),
            reason_for_credit: field(cols.reason_for_credit),
            explicit_payment_status: if explicit.is_empty() {
                None
            } else {
                Some(explicit)
            },
            raw,
        });
    }

    parsed
}

pub(crate) fn raw_row(headers: &[String], record: &csv::StringRecord) -> RawRow {
    let cells = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").trim().to_string()))
        .collect();
    RawRow::new(cells)
}
