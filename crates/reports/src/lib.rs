//! Dashboard aggregation over order, payment and product slices.
//!
//! Every report is a pure function: callers load the rows, the report folds
//! them into a serde-serializable value. Caching, staleness and persistence
//! live in the pipeline crate; this one never touches the store.
//!
//! Report structs serialize with camelCase keys. That is the dashboard wire
//! contract and is kept distinct from the snake_case used for config and
//! persisted rows.

pub mod breakdown;
pub mod distribution;
pub mod metrics;
pub mod overview;
pub mod products;
pub mod trend;

pub use breakdown::{settlement_breakdown, SettlementLine};
pub use distribution::{status_distribution, StatusSlice};
pub use metrics::{live_metrics, LiveMetrics};
pub use overview::{orders_overview, OrdersOverview};
pub use products::{top_products, top_returns, ProductRank};
pub use trend::{revenue_trend, TrendPoint};
