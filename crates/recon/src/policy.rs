//! Profit calculation shared by the batch engine and per-order display.
//!
//! Historically these were two separate formulas that drifted apart; one
//! function parameterized by [`ProfitPolicy`] keeps both views honest.

use hisab_core::CanonicalStatus;
use serde::Serialize;

/// Cost-treatment flags for one profit view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitPolicy {
    /// Subtract the ads fee when computing net profit.
    pub include_ads_cost: bool,
    /// Drop product cost from COGS for returned/RTO/clawed-back orders.
    /// Packaging is still charged; the packet was consumed either way.
    pub exclude_product_cost_on_return: bool,
}

impl ProfitPolicy {
    /// Batch reconciliation view: ads counted, full COGS always.
    pub fn batch() -> Self {
        Self {
            include_ads_cost: true,
            exclude_product_cost_on_return: false,
        }
    }

    /// Per-order display view: ads ignored, COGS waived on returns.
    pub fn display() -> Self {
        Self {
            include_ads_cost: false,
            exclude_product_cost_on_return: true,
        }
    }
}

/// Cost and profit figures for one order under one policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProfitBreakdown {
    /// Product cost actually charged (zero when waived by policy).
    pub product_cost: f64,
    pub packaging_cost: f64,
    /// Ads fee on the settlement row, reported even when the policy
    /// leaves it out of net profit.
    pub ads_cost: f64,
    pub gross_profit: f64,
    pub net_profit: f64,
}

/// Compute profit for one order.
///
/// `settlement_amount` is the picked settlement's net figure, zero when the
/// order has not settled; `ads_cost` comes from the same settlement row.
pub fn order_profit(
    policy: ProfitPolicy,
    status: CanonicalStatus,
    settlement_amount: f64,
    product_cost: f64,
    packaging_cost: f64,
    ads_cost: f64,
) -> ProfitBreakdown {
    let waive_product = policy.exclude_product_cost_on_return
        && (status.is_return_like() || settlement_amount < 0.0);
    let product_cost = if waive_product { 0.0 } else { product_cost };

    let gross_profit = settlement_amount - (product_cost + packaging_cost);
    let net_profit = if policy.include_ads_cost {
        gross_profit - ads_cost
    } else {
        gross_profit
    };

    ProfitBreakdown {
        product_cost,
        packaging_cost,
        ads_cost,
        gross_profit,
        net_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_charges_full_cogs_and_ads() {
        let p = order_profit(
            ProfitPolicy::batch(),
            CanonicalStatus::Delivered,
            870.0,
            400.0,
            20.0,
            30.0,
        );
        assert_eq!(p.gross_profit, 450.0);
        assert_eq!(p.net_profit, 420.0);
        assert_eq!(p.product_cost, 400.0);
    }

    #[test]
    fn display_waives_product_cost_on_rto() {
        let p = order_profit(
            ProfitPolicy::display(),
            CanonicalStatus::Rto,
            0.0,
            400.0,
            20.0,
            30.0,
        );
        // Packaging is lost, stock came back.
        assert_eq!(p.product_cost, 0.0);
        assert_eq!(p.gross_profit, -20.0);
        assert_eq!(p.net_profit, -20.0);
    }

    #[test]
    fn display_waives_product_cost_on_clawback() {
        // Delivered on paper but the settlement is negative: treated like a
        // return for COGS purposes.
        let p = order_profit(
            ProfitPolicy::display(),
            CanonicalStatus::Delivered,
            -150.0,
            400.0,
            20.0,
            0.0,
        );
        assert_eq!(p.product_cost, 0.0);
        assert_eq!(p.gross_profit, -170.0);
    }

    #[test]
    fn batch_never_waives_product_cost() {
        let p = order_profit(
            ProfitPolicy::batch(),
            CanonicalStatus::Return,
            -150.0,
            400.0,
            20.0,
            10.0,
        );
        assert_eq!(p.product_cost, 400.0);
        assert_eq!(p.gross_profit, -570.0);
        assert_eq!(p.net_profit, -580.0);
    }

    #[test]
    fn display_reports_ads_without_charging_it() {
        let p = order_profit(
            ProfitPolicy::display(),
            CanonicalStatus::Delivered,
            870.0,
            400.0,
            20.0,
            30.0,
        );
        assert_eq!(p.ads_cost, 30.0);
        assert_eq!(p.net_profit, p.gross_profit);
    }
}
