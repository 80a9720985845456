//! StateSet Forecast Library
//!
//! Demand forecasting, restock recommendations and sales trend aggregation
//! over product sales histories, with the HTTP surface that serves them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod ml;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::Router;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use services::{catalog::ProductCatalog, forecasting::ForecastingService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::ForecastConfig,
    pub forecasting: Arc<ForecastingService>,
}

impl AppState {
    pub fn new(config: config::ForecastConfig, catalog: Arc<dyn ProductCatalog>) -> Self {
        let forecasting = Arc::new(ForecastingService::from_config(catalog, &config));
        Self {
            config,
            forecasting,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Routes under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new().nest("/predictions", handlers::predictions::prediction_routes())
}

/// Full application router with tracing, request IDs, CORS and timeouts
pub fn app(state: AppState) -> Router {
    let timeout = state.config.request_timeout();
    let cors = if state.config.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(handlers::health::health_routes())
        .merge(openapi::openapi_routes())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}
