use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

use crate::{
    errors::ErrorResponse,
    handlers::{health, predictions},
    ml::{
        forecasting::ForecastMethod,
        restock::RestockPlan,
        trends::{
            CategoryTrend, InventorySummary, LowStockItem, SalesTrendPoint, StockStatus,
            TrendRecord, TrendReport, TrendingProduct,
        },
    },
    services::forecasting::ProductForecast,
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StateSet Forecast API",
        version = "0.2.1",
        description = r#"
# StateSet Demand Forecasting API

Demand forecasts, restock recommendations and sales trends computed from each
product's recorded daily sales.

Forecasts walk a fixed chain of models (seasonal decomposition, recurrent
sequence model, moving average) and report which one produced the values.
        "#,
        contact(
            name = "StateSet Support",
            email = "support@stateset.io",
            url = "https://stateset.io"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Predictions", description = "Forecast, restock and trend endpoints"),
        (name = "Health", description = "Service liveness")
    ),
    paths(
        predictions::get_forecast,
        predictions::get_restock,
        predictions::get_trends,
        predictions::get_inventory_summary,
        health::liveness_check,
    ),
    components(schemas(
        ErrorResponse,
        ForecastMethod,
        ProductForecast,
        RestockPlan,
        TrendReport,
        TrendRecord,
        StockStatus,
        CategoryTrend,
        SalesTrendPoint,
        InventorySummary,
        LowStockItem,
        TrendingProduct,
        health::HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Serves the OpenAPI document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
