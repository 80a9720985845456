/*!
 * # Restock Recommendations
 *
 * Turns a two-week demand forecast into an order quantity: safety stock covers
 * the whole horizon, the reorder point adds a week of lead demand on top, and
 * whatever the current stock does not cover is ordered. Trending products get
 * a 20% uplift.
 */

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::ml::forecasting::{ForecastEngine, ForecastMethod};
use crate::models::product::Product;

/// Days forecast when sizing an order.
pub const RESTOCK_HORIZON_DAYS: usize = 14;

/// Days of average demand held as safety stock.
pub const SAFETY_STOCK_DAYS: f64 = 14.0;

/// Days of average demand expected to sell while an order is in transit.
pub const LEAD_WINDOW_DAYS: f64 = 7.0;

pub const TRENDING_MULTIPLIER: f64 = 1.2;

/// Intermediate figures behind a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RestockPlan {
    pub product_id: String,
    pub current_stock: u32,
    pub avg_daily_demand: f64,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub is_trending: bool,
    pub recommended_quantity: u64,
    pub forecast_tier: ForecastMethod,
}

#[derive(Clone)]
pub struct RestockAdvisor {
    engine: Arc<ForecastEngine>,
}

impl RestockAdvisor {
    pub fn new(engine: Arc<ForecastEngine>) -> Self {
        Self { engine }
    }

    /// Units to order now. Never fails; zero when stock already covers demand.
    pub fn recommend(&self, product: &Product, is_trending: bool) -> u64 {
        self.recommend_detailed(product, is_trending).recommended_quantity
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn recommend_detailed(&self, product: &Product, is_trending: bool) -> RestockPlan {
        let forecast = self
            .engine
            .forecast_product(product, RESTOCK_HORIZON_DAYS, ForecastMethod::Seasonal);
        let avg_daily_demand = forecast.mean();
        let safety_stock = avg_daily_demand * SAFETY_STOCK_DAYS;
        let reorder_point = avg_daily_demand * LEAD_WINDOW_DAYS + safety_stock;
        let recommended_quantity = order_quantity(avg_daily_demand, product.current_stock, is_trending);

        debug!(
            avg_daily_demand,
            reorder_point,
            recommended_quantity,
            tier = %forecast.tier,
            "restock computed"
        );

        RestockPlan {
            product_id: product.id.clone(),
            current_stock: product.current_stock,
            avg_daily_demand,
            safety_stock,
            reorder_point,
            is_trending,
            recommended_quantity,
            forecast_tier: forecast.tier,
        }
    }
}

/// Order size for a given average daily demand and stock level.
pub fn order_quantity(avg_daily_demand: f64, current_stock: u32, is_trending: bool) -> u64 {
    let avg = if avg_daily_demand.is_finite() {
        avg_daily_demand.max(0.0)
    } else {
        0.0
    };
    let safety_stock = avg * SAFETY_STOCK_DAYS;
    let reorder_point = avg * LEAD_WINDOW_DAYS + safety_stock;

    let mut quantity = (reorder_point - f64::from(current_stock)).round_ties_even().max(0.0);
    if is_trending {
        quantity = (quantity * TRENDING_MULTIPLIER).round_ties_even();
    }
    quantity as u64
}
