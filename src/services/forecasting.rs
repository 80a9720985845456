use serde::Serialize;
use std::sync::Arc;
use tokio::task;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    config::ForecastConfig,
    errors::ServiceError,
    ml::{
        forecasting::{ForecastEngine, ForecastMethod},
        restock::{RestockAdvisor, RestockPlan},
        trends::{self, InventorySummary, TrendReport},
    },
    services::catalog::ProductCatalog,
    tracing::with_metrics,
};

/// Forecast for one product as returned to callers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductForecast {
    pub product_id: String,
    pub days: usize,
    /// Method the caller asked for
    pub requested_method: ForecastMethod,
    /// Tier that actually produced the values
    pub method_used: ForecastMethod,
    pub forecast: Vec<f64>,
    pub total_demand: f64,
    pub avg_daily_demand: f64,
}

/// Service answering forecast, restock and trend questions over a product catalog
pub struct ForecastingService {
    catalog: Arc<dyn ProductCatalog>,
    engine: Arc<ForecastEngine>,
    advisor: RestockAdvisor,
    default_forecast_days: usize,
    max_forecast_days: usize,
}

impl ForecastingService {
    /// Creates a new forecasting service instance
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        engine: Arc<ForecastEngine>,
        default_forecast_days: usize,
        max_forecast_days: usize,
    ) -> Self {
        Self {
            catalog,
            advisor: RestockAdvisor::new(engine.clone()),
            engine,
            default_forecast_days,
            max_forecast_days,
        }
    }

    pub fn from_config(catalog: Arc<dyn ProductCatalog>, config: &ForecastConfig) -> Self {
        Self::new(
            catalog,
            Arc::new(ForecastEngine::new(config.engine_settings())),
            config.default_forecast_days,
            config.max_forecast_days,
        )
    }

    pub fn max_forecast_days(&self) -> usize {
        self.max_forecast_days
    }

    /// Checks a requested horizon against `0..=max_forecast_days`
    pub fn resolve_days(&self, days: Option<i64>) -> Result<usize, ServiceError> {
        let Some(days) = days else {
            return Ok(self.default_forecast_days);
        };
        usize::try_from(days)
            .ok()
            .filter(|d| *d <= self.max_forecast_days)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "days must be between 0 and {}, got {}",
                    self.max_forecast_days, days
                ))
            })
    }

    /// Demand forecast for one product
    #[instrument(skip(self))]
    pub async fn forecast(
        &self,
        product_id: &str,
        days: Option<i64>,
        method: Option<ForecastMethod>,
    ) -> Result<ProductForecast, ServiceError> {
        let days = self.resolve_days(days)?;
        let requested_method = method.unwrap_or_default();
        let product = self.catalog.product(product_id).await?;
        let engine = self.engine.clone();

        with_metrics("forecast", || async move {
            let result = task::spawn_blocking(move || {
                let result = engine.forecast_product(&product, days, requested_method);
                (product.id, result)
            })
            .await?;
            let (product_id, result) = result;

            info!(%product_id, days, tier = %result.tier, "forecast served");
            Ok::<_, ServiceError>(ProductForecast {
                product_id,
                days,
                requested_method,
                method_used: result.tier,
                total_demand: result.values.iter().sum(),
                avg_daily_demand: result.mean(),
                forecast: result.values,
            })
        })
        .await
    }

    /// Restock recommendation with its intermediate figures
    #[instrument(skip(self))]
    pub async fn restock(&self, product_id: &str, is_trending: bool) -> Result<RestockPlan, ServiceError> {
        let product = self.catalog.product(product_id).await?;
        let advisor = self.advisor.clone();

        with_metrics("restock", || async move {
            let plan =
                task::spawn_blocking(move || advisor.recommend_detailed(&product, is_trending)).await?;
            Ok::<_, ServiceError>(plan)
        })
        .await
    }

    /// Sales trends across the whole catalog
    #[instrument(skip(self))]
    pub async fn trends(&self) -> Result<TrendReport, ServiceError> {
        let products = self.catalog.all_products().await?;
        with_metrics("trends", || async move {
            Ok::<_, ServiceError>(task::spawn_blocking(move || trends::aggregate(&products)).await?)
        })
        .await
    }

    /// Stock-health summary across the whole catalog
    #[instrument(skip(self))]
    pub async fn inventory_summary(&self) -> Result<InventorySummary, ServiceError> {
        let products = self.catalog.all_products().await?;
        Ok(task::spawn_blocking(move || trends::summarize_inventory(&products)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forecasting::moving_average::MovingAverage;
    use crate::models::product::Product;
    use crate::services::catalog::InMemoryCatalog;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn service() -> ForecastingService {
        let catalog = InMemoryCatalog::from_products(vec![
            Product::new("SKU-1", "Drill", "Tools")
                .with_stock(10, 5)
                .with_sales(json!({"Day-1": 6, "Day-2": 6, "Day-3": 6})),
            Product::new("SKU-2", "Rake", "Garden").with_stock(0, 3),
        ]);
        let engine = ForecastEngine::with_tiers(vec![Box::new(MovingAverage)]).with_seed(Some(1));
        ForecastingService::new(Arc::new(catalog), Arc::new(engine), 30, 365)
    }

    #[tokio::test]
    async fn forecast_uses_default_horizon() {
        let forecast = service().forecast("SKU-1", None, None).await.unwrap();
        assert_eq!(forecast.days, 30);
        assert_eq!(forecast.forecast, vec![6.0; 30]);
        assert_eq!(forecast.total_demand, 180.0);
        assert_eq!(forecast.requested_method, ForecastMethod::Seasonal);
        assert_eq!(forecast.method_used, ForecastMethod::MovingAverage);
    }

    #[tokio::test]
    async fn horizon_outside_range_is_rejected() {
        let service = service();
        assert_matches!(
            service.forecast("SKU-1", Some(366), None).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service.forecast("SKU-1", Some(-1), None).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(service.forecast("SKU-1", Some(0), None).await.unwrap().forecast.is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        assert_matches!(
            service().restock("SKU-404", false).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn restock_and_catalog_views() {
        let service = service();
        let plan = service.restock("SKU-1", false).await.unwrap();
        // 6/day over 21 days less 10 on hand
        assert_eq!(plan.recommended_quantity, 116);

        let report = service.trends().await.unwrap();
        assert_eq!(report.top_selling_products.len(), 2);

        let summary = service.inventory_summary().await.unwrap();
        assert_eq!(summary.out_of_stock_count, 1);
        assert_eq!(summary.low_stock_count, 1);
    }
}
