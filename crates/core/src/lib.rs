//! Core domain types for the Hisab seller ledger.
//!
//! Pure data shapes and field normalization shared by every other crate:
//! no I/O, no database handles, no clocks. Ingestion produces these types,
//! the store persists them, reconciliation and reporting consume them.

pub mod model;
pub mod normalize;
pub mod status;

pub use model::{
    CanonicalStatus, ColumnSpec, ColumnType, DynamicRecord, FileType, KnownFields, Order,
    Payment, PaymentStatus, Product, RawRow, Reconciliation, ReconStatus, Scalar, Upload,
    UploadStatus,
};
pub use normalize::{
    excel_serial_to_date, parse_date, parse_date_or, parse_date_or_today, sanitize_amount,
};
pub use status::{derive_payment_status, normalize_order_status};
