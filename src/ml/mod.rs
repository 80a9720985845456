/*!
 * # Machine Learning Module
 *
 * Demand forecasting, restock sizing and sales trend analysis over product
 * sales histories.
 *
 * The free functions below run with default settings and are convenient for
 * one-off calls; services hold a configured [`forecasting::ForecastEngine`]
 * instead.
 */

pub mod clock;
pub mod forecasting;
pub mod restock;
pub mod series;
pub mod trends;

use std::sync::Arc;

use crate::models::product::Product;
use forecasting::{ForecastEngine, ForecastMethod};
use restock::RestockAdvisor;
use trends::TrendReport;

/// Daily demand for the next `days` days; `method` defaults to seasonal.
/// Always `days` long, every value non-negative.
pub fn forecast_demand(product: &Product, days: usize, method: Option<ForecastMethod>) -> Vec<f64> {
    ForecastEngine::default()
        .forecast_product(product, days, method.unwrap_or_default())
        .values
}

/// Units to reorder now.
pub fn recommend_restock(product: &Product, is_trending: bool) -> u64 {
    RestockAdvisor::new(Arc::new(ForecastEngine::default())).recommend(product, is_trending)
}

pub fn get_trend_data(products: &[Product]) -> TrendReport {
    trends::aggregate(products)
}
