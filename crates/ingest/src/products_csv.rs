//! Product-catalog CSV parser.
//!
//! Seller-maintained cost sheet: sku, title, cost price, packaging cost,
//! GST%. Header aliases like the order manifest; sku is the one required
//! column. The store applies the cost-preservation rule on merge, so the
//! parser just reports what the file says.

use csv::ReaderBuilder;
use hisab_core::{sanitize_amount, RawRow};

use crate::orders_csv::{find_column, raw_row};
use crate::text;

const SKU: &[&str] = &["sku", "sku id", "supplier sku", "seller sku", "product id"];
const TITLE: &[&str] = &["title", "product name", "name", "product title"];
const COST_PRICE: &[&str] = &["cost price", "cost_price", "cost", "purchase price"];
const PACKAGING_COST: &[&str] = &[
    "packaging cost",
    "packaging_cost",
    "packaging",
    "packing cost",
];
const GST_PERCENT: &[&str] = &["product gst %", "gst %", "gst percent", "gst"];

/// One catalog row.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub sku: String,
    pub title: String,
    pub cost_price: f64,
    pub packaging_cost: f64,
    pub gst_percent: f64,
    pub raw: RawRow,
}

/// Full parse result for one product catalog file.
#[derive(Debug, Default)]
pub struct ParsedProducts {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub products: Vec<ProductDraft>,
    pub errors: Vec<String>,
}

/// Parse a product-catalog CSV. Rows without a sku are rejected into the
/// error list; a missing sku column fails the whole file.
pub fn parse_products_csv(bytes: &[u8]) -> ParsedProducts {
    let content = text::decode(bytes);
    let mut parsed = ParsedProducts::default();

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
    parsed.headers = headers.clone();

    let sku_col = find_column(&headers, SKU);
    if sku_col.is_none() {
        parsed
            .errors
            .push("missing required column 'SKU'".to_string());
        return parsed;
    }
    let title_col = find_column(&headers, TITLE);
    let cost_col = find_column(&headers, COST_PRICE);
    let packaging_col = find_column(&headers, PACKAGING_COST);
    let gst_col = find_column(&headers, GST_PERCENT);

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
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

        let sku = field(sku_col);
        if sku.is_empty() {
            parsed
                .errors
                .push(format!("row {line}: missing required field 'SKU'"));
            continue;
        }

        parsed.products.push(ProductDraft {
            sku,
            title: field(title_col),
            cost_price: sanitize_amount(&field(cost_col)),
            packaging_cost: sanitize_amount(&field(packaging_col)),
            gst_percent: sanitize_amount(&field(gst_col)),
            raw,
        });
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_cost_sheet() {
        let csv = "SKU,Product Name,Cost Price,Packaging Cost,GST %\n\
                   K1,Blue Kurti,\"₹120.00\",10,5\n\
                   S1,Red Saree,450,15,12\n";
        let parsed = parse_products_csv(csv.as_bytes());
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.products.len(), 2);
        let p = &parsed.products[0];
        assert_eq!(p.sku, "K1");
        assert_eq!(p.title, "Blue Kurti");
        assert_eq!(p.cost_price, 120.0);
        assert_eq!(p.packaging_cost, 10.0);
        assert_eq!(p.gst_percent, 5.0);
    }

    #[test]
    fn row_without_sku_is_rejected() {
        let csv = "SKU,Cost Price\nK1,100\n,200\n";
        let parsed = parse_products_csv(csv.as_bytes());
        assert_eq!(parsed.products.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].contains("'SKU'"));
    }

    #[test]
    fn missing_sku_column_fails_the_file() {
        let csv = "Product Name,Cost Price\nKurti,100\n";
        let parsed = parse_products_csv(csv.as_bytes());
        assert!(parsed.products.is_empty());
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn duplicate_skus_are_kept_for_the_store_to_merge() {
        let csv = "SKU,Cost Price\nK1,100\nK1,200\n";
        let parsed = parse_products_csv(csv.as_bytes());
        assert_eq!(parsed.products.len(), 2);
    }
}
