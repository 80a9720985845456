/*!
 * # Sales Trends
 *
 * Cross-catalog view of recorded sales: per-product growth and average daily
 * sales, per-day totals, per-category totals, and a stock-health summary.
 *
 * Per-product work runs in parallel; the merge and every sort afterwards are
 * sequential so the report does not depend on scheduling.
 */

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use strum::Display;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::ml::series::{self, DayLabel};
use crate::models::product::Product;

/// Observations needed before a growth rate is computed.
pub const GROWTH_WINDOW: usize = 5;

pub const TOP_SELLING_LIMIT: usize = 10;
pub const TRENDING_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
pub enum StockStatus {
    Low,
    Good,
}

impl StockStatus {
    pub fn of(product: &Product) -> Self {
        if product.current_stock < product.reorder_level {
            StockStatus::Low
        } else {
            StockStatus::Good
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub current_stock: u32,
    /// Percent change of the last five observations over the five before.
    pub growth_rate: f64,
    pub avg_daily_sales: f64,
    pub stock_status: StockStatus,
    pub has_sales_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryTrend {
    pub name: String,
    pub total_sales: f64,
    pub avg_growth: f64,
    /// Members that contributed a growth rate.
    pub product_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalesTrendPoint {
    pub day: String,
    pub sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub top_selling_products: Vec<TrendRecord>,
    pub sales_trend: Vec<SalesTrendPoint>,
    pub category_trends: Vec<CategoryTrend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LowStockItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub current_stock: u32,
    pub reorder_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendingProduct {
    pub id: String,
    pub name: String,
    pub category: String,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InventorySummary {
    pub total_products: usize,
    /// Product count per category.
    pub categories: BTreeMap<String, usize>,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub low_stock_items: Vec<LowStockItem>,
    pub trending_products: Vec<TrendingProduct>,
}

/// Per-product figures before merging.
struct ProductSummary {
    record: TrendRecord,
    daily: Vec<(String, f64)>,
    total: f64,
    growth: Option<f64>,
}

/// Builds the trend report for a catalog. Never fails and never drops a product.
#[instrument(skip_all, fields(products = products.len()))]
pub fn aggregate(products: &[Product]) -> TrendReport {
    let summaries: Vec<ProductSummary> = products.par_iter().map(summarize).collect();

    let mut daily_totals: HashMap<String, f64> = HashMap::new();
    let mut categories: HashMap<String, CategoryTrend> = HashMap::new();
    let mut records = Vec::with_capacity(summaries.len());

    for summary in summaries {
        if !summary.daily.is_empty() {
            for (day, quantity) in &summary.daily {
                *daily_totals.entry(day.clone()).or_insert(0.0) += quantity;
            }

            let category = categories
                .entry(summary.record.category.clone())
                .or_insert_with(|| CategoryTrend {
                    name: summary.record.category.clone(),
                    total_sales: 0.0,
                    avg_growth: 0.0,
                    product_count: 0,
                });
            category.total_sales += summary.total;
            if let Some(growth) = summary.growth {
                category.avg_growth += growth;
                category.product_count += 1;
            }
        }
        records.push(summary.record);
    }

    let mut category_trends: Vec<CategoryTrend> = categories
        .into_values()
        .map(|mut category| {
            if category.product_count > 0 {
                category.avg_growth = round2(category.avg_growth / category.product_count as f64);
            }
            category
        })
        .collect();
    category_trends.sort_by(|a, b| {
        b.total_sales
            .total_cmp(&a.total_sales)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut sales_trend: Vec<SalesTrendPoint> = daily_totals
        .into_iter()
        .map(|(day, sales)| SalesTrendPoint { day, sales })
        .collect();
    sales_trend.sort_by(|a, b| day_order(&a.day, &b.day));

    // stable: equal averages keep catalog order
    records.sort_by(|a, b| b.avg_daily_sales.total_cmp(&a.avg_daily_sales));
    records.truncate(TOP_SELLING_LIMIT);

    TrendReport {
        top_selling_products: records,
        sales_trend,
        category_trends,
    }
}

/// Stock-health overview: category counts, low and empty stock, best sellers.
#[instrument(skip_all, fields(products = products.len()))]
pub fn summarize_inventory(products: &[Product]) -> InventorySummary {
    let mut categories = BTreeMap::new();
    for product in products {
        *categories.entry(product.category.clone()).or_insert(0) += 1;
    }

    let low_stock_items: Vec<LowStockItem> = products
        .iter()
        .filter(|p| p.is_low_stock())
        .map(|p| LowStockItem {
            id: p.id.clone(),
            name: p.name.clone(),
            category: p.category.clone(),
            current_stock: p.current_stock,
            reorder_level: p.reorder_level,
        })
        .collect();

    let mut trending_products: Vec<TrendingProduct> = products
        .par_iter()
        .filter_map(|p| {
            let mapping = series::sales_mapping(&p.historical_sales)?;
            if mapping.is_empty() {
                return None;
            }
            let total_sales: f64 = mapping.values().filter_map(series::parse_quantity).sum();
            Some(TrendingProduct {
                id: p.id.clone(),
                name: p.name.clone(),
                category: p.category.clone(),
                total_sales,
            })
        })
        .collect();
    trending_products.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));
    trending_products.truncate(TRENDING_LIMIT);

    InventorySummary {
        total_products: products.len(),
        categories,
        low_stock_count: low_stock_items.len(),
        out_of_stock_count: products.iter().filter(|p| p.current_stock == 0).count(),
        low_stock_items,
        trending_products,
    }
}

/// Growth of the last five observations over the previous five (or the first
/// five when fewer than ten exist), in percent. `None` below five points.
pub fn growth_rate(quantities: &[f64]) -> Option<f64> {
    let n = quantities.len();
    if n < GROWTH_WINDOW {
        return None;
    }

    let mean = |window: &[f64]| window.iter().sum::<f64>() / window.len() as f64;
    let last = mean(&quantities[n - GROWTH_WINDOW..]);
    let previous = if n >= 2 * GROWTH_WINDOW {
        mean(&quantities[n - 2 * GROWTH_WINDOW..n - GROWTH_WINDOW])
    } else {
        mean(&quantities[..GROWTH_WINDOW])
    };

    Some(if previous > 0.0 {
        (last - previous) / previous * 100.0
    } else {
        0.0
    })
}

fn summarize(product: &Product) -> ProductSummary {
    let mapping = series::sales_mapping(&product.historical_sales).unwrap_or_default();
    let daily: Vec<(String, f64)> = mapping
        .iter()
        .filter_map(|(day, quantity)| series::parse_quantity(quantity).map(|q| (day.clone(), q)))
        .collect();
    let quantities: Vec<f64> = daily.iter().map(|(_, q)| *q).collect();

    let total: f64 = quantities.iter().sum();
    let avg = if quantities.is_empty() {
        0.0
    } else {
        total / quantities.len() as f64
    };
    let growth = growth_rate(&quantities);

    let mut record = TrendRecord {
        id: product.id.clone(),
        name: product.name.clone(),
        category: product.category.clone(),
        current_stock: product.current_stock,
        growth_rate: 0.0,
        avg_daily_sales: 0.0,
        stock_status: StockStatus::of(product),
        has_sales_data: false,
    };

    if !total.is_finite() || !avg.is_finite() || growth.is_some_and(|g| !g.is_finite()) {
        warn!(product_id = %product.id, "sales summary not finite, reporting zeros");
        return ProductSummary {
            record,
            daily: Vec::new(),
            total: 0.0,
            growth: None,
        };
    }

    record.growth_rate = round2(growth.unwrap_or(0.0));
    record.avg_daily_sales = round2(avg);
    record.has_sales_data = !mapping.is_empty();

    ProductSummary {
        record,
        daily,
        total,
        growth,
    }
}

/// Parsed day ordinals first, ascending; unparsable labels after, by label.
fn day_order(a: &str, b: &str) -> Ordering {
    match (DayLabel::parse(a).ordinal(), DayLabel::parse(b).ordinal()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
