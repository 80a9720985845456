use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    ml::{
        forecasting::ForecastMethod,
        restock::RestockPlan,
        trends::{InventorySummary, TrendReport},
    },
    services::forecasting::ProductForecast,
    ApiResponse, AppState,
};

/// Build the predictions Router scoped under `/api/v1/predictions`.
pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/forecast/:product_id", get(get_forecast))
        .route("/restock/:product_id", get(get_restock))
        .route("/trends", get(get_trends))
        .route("/inventory-summary", get(get_inventory_summary))
}

/// Query parameters for demand forecasts
#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastQuery {
    /// Days to forecast (default: 30)
    #[param(minimum = 0, maximum = 365)]
    pub days: Option<i64>,
    /// `seasonal`, `sequence` or `moving-average`; unknown names use the moving average
    pub method: Option<String>,
}

/// Query parameters for restock recommendations
#[derive(Debug, Deserialize, IntoParams)]
pub struct RestockQuery {
    /// Apply the trending uplift
    #[serde(default)]
    pub trending: bool,
}

/// Daily demand forecast for a product
#[utoipa::path(
    get,
    path = "/api/v1/predictions/forecast/{product_id}",
    params(
        ("product_id" = String, Path, description = "Product identifier"),
        ForecastQuery
    ),
    responses(
        (status = 200, description = "Forecast computed", body = ApiResponse<ProductForecast>),
        (status = 400, description = "Forecast horizon out of range", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Predictions"
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ApiResponse<ProductForecast>>, ServiceError> {
    let method = params.method.as_deref().map(ForecastMethod::parse_lenient);
    let forecast = state
        .forecasting
        .forecast(&product_id, params.days, method)
        .await?;

    Ok(Json(ApiResponse::success(forecast)))
}

/// Restock recommendation for a product
#[utoipa::path(
    get,
    path = "/api/v1/predictions/restock/{product_id}",
    params(
        ("product_id" = String, Path, description = "Product identifier"),
        RestockQuery
    ),
    responses(
        (status = 200, description = "Recommendation computed", body = ApiResponse<RestockPlan>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Predictions"
)]
pub async fn get_restock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<RestockQuery>,
) -> Result<Json<ApiResponse<RestockPlan>>, ServiceError> {
    let plan = state
        .forecasting
        .restock(&product_id, params.trending)
        .await?;

    Ok(Json(ApiResponse::success(plan)))
}

/// Sales trends across the catalog
#[utoipa::path(
    get,
    path = "/api/v1/predictions/trends",
    responses(
        (status = 200, description = "Trend report", body = ApiResponse<TrendReport>)
    ),
    tag = "Predictions"
)]
pub async fn get_trends(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TrendReport>>, ServiceError> {
    let report = state.forecasting.trends().await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Stock-health summary across the catalog
#[utoipa::path(
    get,
    path = "/api/v1/predictions/inventory-summary",
    responses(
        (status = 200, description = "Inventory summary", body = ApiResponse<InventorySummary>)
    ),
    tag = "Predictions"
)]
pub async fn get_inventory_summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InventorySummary>>, ServiceError> {
    let summary = state.forecasting.inventory_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
