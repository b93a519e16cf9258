//! Product leaderboards: most ordered and most returned.

use std::collections::{BTreeMap, HashMap};

use hisab_core::{normalize_order_status, Order, Product};
use serde::Serialize;

const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRank {
    pub sku: String,
    pub title: String,
    pub count: u32,
}

/// Top products by order count.
pub fn top_products(orders: &[Order], products: &[Product]) -> Vec<ProductRank> {
    rank(orders.iter(), products)
}

/// Top products by combined return + RTO count. Products without a single
/// such event are left out entirely.
pub fn top_returns(orders: &[Order], products: &[Product]) -> Vec<ProductRank> {
    rank(
        orders
            .iter()
            .filter(|o| normalize_order_status(&o.reason_for_credit).is_return_like()),
        products,
    )
}

/// Count per sku, highest first, sku ascending on ties, cut to ten. The
/// catalog title wins when present; otherwise the name seen on the order.
fn rank<'a>(orders: impl Iterator<Item = &'a Order>, products: &[Product]) -> Vec<ProductRank> {
    let titles: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.sku.as_str(), p.title.as_str()))
        .collect();

    let mut counts: BTreeMap<&str, (u32, &str)> = BTreeMap::new();
    for order in orders {
        let entry = counts
            .entry(order.sku.as_str())
            .or_insert((0, order.product_name.as_str()));
        entry.0 += 1;
    }

    let mut ranked: Vec<ProductRank> = counts
        .into_iter()
        .map(|(sku, (count, fallback))| ProductRank {
            sku: sku.to_string(),
            title: titles
                .get(sku)
                .copied()
                .filter(|t| !t.is_empty())
                .unwrap_or(fallback)
                .to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sku.cmp(&b.sku)));
    ranked.truncate(TOP_N);
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use hisab_core::PaymentStatus;

    use super::*;

    fn order(sub: &str, sku: &str, name: &str, raw_status: &str) -> Order {
        Order {
            seller_id: "s1".into(),
            sub_order_no: sub.into(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            customer_state: "Punjab".into(),
            product_name: name.into(),
            sku: sku.into(),
            size: "L".into(),
            quantity: 1,
            listed_price: 700.0,
            discounted_price: 500.0,
            packet_id: String::new(),
            reason_for_credit: raw_status.into(),
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            upload_id: "u1".into(),
        }
    }

    fn product(sku: &str, title: &str) -> Product {
        Product {
            seller_id: "s1".into(),
            sku: sku.into(),
            title: title.into(),
            cost_price: 200.0,
            packaging_cost: 20.0,
            gst_percent: 5.0,
            total_orders: 0,
            is_processed: false,
        }
    }

    #[test]
    fn ranks_by_count_then_sku() {
        let orders = vec![
            order("S1", "B-SKU", "B", "DELIVERED"),
            order("S2", "B-SKU", "B", "DELIVERED"),
            order("S3", "A-SKU", "A", "DELIVERED"),
            order("S4", "A-SKU", "A", "SHIPPED"),
            order("S5", "C-SKU", "C", "DELIVERED"),
        ];

        let ranked = top_products(&orders, &[]);

        let skus: Vec<&str> = ranked.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, ["A-SKU", "B-SKU", "C-SKU"]);
        assert_eq!(ranked[0].count, 2);
        assert_eq!(ranked[2].count, 1);
    }

    #[test]
    fn leaderboard_cuts_at_ten() {
        let orders: Vec<Order> = (0..12)
            .map(|i| {
                order(
                    &format!("S{i}"),
                    &format!("SKU-{i:02}"),
                    "Item",
                    "DELIVERED",
                )
            })
            .collect();

        let ranked = top_products(&orders, &[]);

        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].sku, "SKU-00");
        assert_eq!(ranked[9].sku, "SKU-09");
    }

    #[test]
    fn returns_board_only_counts_return_like_orders() {
        let orders = vec![
            order("S1", "KURTA-M", "Kurta", "RETURN"),
            order("S2", "KURTA-M", "Kurta", "RTO_COMPLETE"),
            order("S3", "KURTA-M", "Kurta", "DELIVERED"),
            order("S4", "SAREE-R", "Saree", "CANCELLED"),
        ];

        let ranked = top_returns(&orders, &[]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].sku, "KURTA-M");
        assert_eq!(ranked[0].count, 2);
    }

    #[test]
    fn catalog_title_wins_over_the_order_name() {
        let orders = vec![order("S1", "KURTA-M", "kurta m size", "DELIVERED")];
        let catalog = vec![product("KURTA-M", "Cotton Kurta (M)")];

        let ranked = top_products(&orders, &catalog);

        assert_eq!(ranked[0].title, "Cotton Kurta (M)");

        let bare = top_products(&orders, &[]);
        assert_eq!(bare[0].title, "kurta m size");
    }
}
