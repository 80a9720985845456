use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use stateset_forecast::{
    config::ForecastConfig, models::product::Product, services::catalog::InMemoryCatalog,
    AppState,
};
use tower::ServiceExt;

/// Noise seed shared by every test app so forecasts are reproducible.
pub const TEST_SEED: u64 = 7;

/// Router over an in-memory catalog, no network involved.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_products(sample_products())
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let config = test_config();
        let catalog = Arc::new(InMemoryCatalog::from_products(products));
        let state = AppState::new(config, catalog);
        let router = stateset_forecast::app(state.clone());
        Self { router, state }
    }

    /// Send a request against the router with optional extra headers.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(Body::empty()).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// GET `uri` and decode the JSON body.
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.request(Method::GET, uri, &[]).await;
        let status = response.status();
        (status, response_json(response).await)
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

/// Seeded configuration with a short sequence-model budget.
pub fn test_config() -> ForecastConfig {
    ForecastConfig {
        environment: "test".to_string(),
        noise_seed: Some(TEST_SEED),
        sequence_epochs: 2,
        sequence_deadline_ms: 500,
        ..ForecastConfig::default()
    }
}

/// `{"Day-1": q1, "Day-2": q2, ...}` for the given quantities.
pub fn day_sales(quantities: &[f64]) -> Value {
    let map: Map<String, Value> = quantities
        .iter()
        .enumerate()
        .map(|(i, q)| (format!("Day-{}", i + 1), json!(q)))
        .collect();
    Value::Object(map)
}

/// Three products: a steady seller, a fast grower and one without history.
pub fn sample_products() -> Vec<Product> {
    vec![
        Product::new("SKU-1", "Hammer", "Tools")
            .with_stock(40, 10)
            .with_sales(day_sales(&[10.0, 12.0, 11.0, 9.0, 10.0, 10.0, 11.0, 10.0, 9.0, 10.0])),
        Product::new("SKU-2", "Drill", "Tools")
            .with_stock(2, 5)
            .with_sales(day_sales(&[1.0, 1.0, 2.0, 1.0, 1.0, 4.0, 5.0, 6.0, 5.0, 5.0])),
        Product::new("SKU-3", "Lamp", "Lighting").with_stock(0, 3),
    ]
}
