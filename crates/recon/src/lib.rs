//! Order, settlement and catalog-cost reconciliation.
//!
//! Pure engine crate: receives pre-loaded records, returns classified rows
//! and run counters. No storage or IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod policy;

pub use config::ReconConfig;
pub use engine::{latest_by_sub_order, run, ReconInput, ReconOutcome, ReconSummary};
pub use error::ReconError;
pub use policy::{order_profit, ProfitBreakdown, ProfitPolicy};
