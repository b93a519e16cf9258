//! Record types for the seller ledger.
//!
//! Identity rules live here as doc'd invariants; enforcement is split
//! between the store (SQL constraints) and ingestion (upsert policy).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One parsed row before typing: ordered (header, cell) pairs exactly as
/// they appeared in the source file. Consumed by normalization, schema
/// inference and dynamic storage; never persisted as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Case-insensitive lookup by header name.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(header))
            .map(|(_, v)| v.as_str())
    }

    /// True when every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Enums (wire strings are load-bearing: they are persisted and exposed)
// ---------------------------------------------------------------------------

/// Kind of source file an upload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    OrdersCsv,
    PaymentZip,
    ProductsCsv,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrdersCsv => "orders_csv",
            Self::PaymentZip => "payment_zip",
            Self::ProductsCsv => "products_csv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "orders_csv" => Some(Self::OrdersCsv),
            "payment_zip" => Some(Self::PaymentZip),
            "products_csv" => Some(Self::ProductsCsv),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an upload job. Terminal states are `Processed` and `Failed`;
/// `Processed` means ran-to-completion, not zero errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Processing,
    Processed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of matching one order against its settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconStatus {
    Reconciled,
    Mismatch,
    Unreconciled,
}

impl ReconStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconciled => "reconciled",
            Self::Mismatch => "mismatch",
            Self::Unreconciled => "unreconciled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reconciled" => Some(Self::Reconciled),
            "mismatch" => Some(Self::Mismatch),
            "unreconciled" => Some(Self::Unreconciled),
            _ => None,
        }
    }
}

impl fmt::Display for ReconStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical order status vocabulary. Raw marketplace strings are mapped
/// onto this set by [`crate::status::normalize_order_status`]; the raw
/// string itself is kept on the order (`reason_for_credit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Delivered,
    Shipped,
    Return,
    #[serde(rename = "RTO")]
    Rto,
    Cancelled,
    Exchanged,
    Unknown,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "Delivered",
            Self::Shipped => "Shipped",
            Self::Return => "Return",
            Self::Rto => "RTO",
            Self::Cancelled => "Cancelled",
            Self::Exchanged => "Exchanged",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Delivered" => Some(Self::Delivered),
            "Shipped" => Some(Self::Shipped),
            "Return" => Some(Self::Return),
            "RTO" => Some(Self::Rto),
            "Cancelled" => Some(Self::Cancelled),
            "Exchanged" => Some(Self::Exchanged),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Stock came back to the seller (customer return or RTO).
    pub fn is_return_like(&self) -> bool {
        matches!(self, Self::Return | Self::Rto)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment resolution for one order, derived by
/// [`crate::status::derive_payment_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Refunded,
    #[serde(rename = "NA")]
    Na,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Refunded => "Refunded",
            Self::Na => "NA",
            Self::Pending => "Pending",
        }
    }

    /// Lenient parse for explicit payment-status cells in source files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" | "settled" => Some(Self::Paid),
            "refunded" | "refund" => Some(Self::Refunded),
            "na" | "n/a" => Some(Self::Na),
            "pending" | "unpaid" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// One order line item. Identity is `sub_order_no` within a seller scope;
/// re-ingesting the same sub order upserts fields, never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub seller_id: String,
    pub sub_order_no: String,
    pub order_date: NaiveDate,
    pub customer_state: String,
    pub product_name: String,
    pub sku: String,
    pub size: String,
    pub quantity: u32,
    pub listed_price: f64,
    pub discounted_price: f64,
    pub packet_id: String,
    /// Raw status string from the source file, preserved verbatim.
    pub reason_for_credit: String,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
    /// Upload that created or last touched this row.
    pub upload_id: String,
}

/// One settlement event. Keyed by (`sub_order_no`, `settlement_date`);
/// an order may settle more than once over time. Append-only: rows are
/// never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub seller_id: String,
    pub sub_order_no: String,
    pub settlement_date: NaiveDate,
    /// Net amount paid out; negative for claw-backs/refunds.
    pub settlement_amount: f64,
    /// Gross sale value the settlement refers to.
    pub order_value: f64,
    pub commission_fee: f64,
    pub fixed_fee: f64,
    pub gateway_fee: f64,
    pub ads_fee: f64,
    pub upload_id: String,
}

/// Catalog entry, keyed by (`seller_id`, `sku`). Auto-discovered from order
/// rows; cost fields are seller-editable afterwards and ingestion must not
/// clobber a non-default value with a default one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub seller_id: String,
    pub sku: String,
    pub title: String,
    pub cost_price: f64,
    pub packaging_cost: f64,
    pub gst_percent: f64,
    /// Running count of order rows seen for this sku.
    pub total_orders: u32,
    /// Seller has confirmed/edited the cost fields.
    pub is_processed: bool,
}

impl Product {
    /// Sale-side unit cost: cost + GST on cost + packaging.
    pub fn final_price(&self) -> f64 {
        self.cost_price + self.cost_price * self.gst_percent / 100.0 + self.packaging_cost
    }
}

/// One file-processing job. At most one upload per (seller, file type) holds
/// `is_current_version`; the flip is atomic in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: String,
    pub seller_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub status: UploadStatus,
    pub records_processed: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    pub is_current_version: bool,
    /// Inferred schema of the source file, when inference ran.
    #[serde(default)]
    pub column_structure: Vec<ColumnSpec>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Inferred schema
// ---------------------------------------------------------------------------

/// Inferred type of one source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of an inferred file schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub required: bool,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Dynamic records
// ---------------------------------------------------------------------------

/// A single dynamic cell value.
///
/// Untagged on the wire, so variant order matters for deserialization:
/// bool before number before text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Type a raw cell: blank is `None`, then bool, then number, then text.
    /// Leading-zero codes ("007") stay text so identifiers survive.
    pub fn from_cell(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => return Some(Self::Bool(true)),
            "false" => return Some(Self::Bool(false)),
            _ => {}
        }
        let zero_padded =
            trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.starts_with("0.");
        if !zero_padded {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return Some(Self::Number(n));
                }
            }
        }
        Some(Self::Text(trimmed.to_string()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Typed subset of dynamic-row fields common across seller exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// Schema-flexible row captured from a source file whose column set is not
/// fixed at design time. `key` is the natural key (sub order no or sku);
/// the common fields get types, everything else rides in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicRecord {
    pub key: String,
    pub upload_id: String,
    #[serde(default)]
    pub known: KnownFields,
    #[serde(default)]
    pub extra: BTreeMap<String, Scalar>,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Per-order reconciliation outcome. Fully derived from
/// Order + Payment + Product; regenerated wholesale each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    pub seller_id: String,
    pub sub_order_no: String,
    pub status: ReconStatus,
    pub order_value: f64,
    pub settlement_amount: f64,
    pub product_cost: f64,
    pub packaging_cost: f64,
    pub ads_cost: f64,
    pub gross_profit: f64,
    pub net_profit: f64,
}
