//! File ingestion for the Hisab ledger.
//!
//! Turns uploaded bytes into typed drafts plus raw rows: ZIP extraction,
//! the order-manifest CSV parser, the settlement-workbook parser and
//! generic schema inference. Parsers never panic on dirty input; row-level
//! problems go into per-file error lists and processing continues.

pub mod archive;
pub mod orders_csv;
pub mod products_csv;
pub mod schema;
pub mod settlement_xlsx;
pub mod text;

pub use archive::{extract_archive, ArchiveListing, ExtractedFile, FileKind};
pub use orders_csv::{parse_orders_csv, OrderDraft, ParsedOrders, ProductSeed};
pub use products_csv::{parse_products_csv, ParsedProducts, ProductDraft};
pub use schema::{detect_primary_key, infer_columns};
pub use settlement_xlsx::{
    parse_settlement_csv, parse_settlement_workbook, ParsedSettlements, PaymentDraft,
};
