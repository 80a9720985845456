mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::Value;

#[tokio::test]
async fn forecast_returns_requested_horizon() {
    let app = TestApp::new();

    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-1?days=14")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["product_id"], "SKU-1");
    assert_eq!(data["days"], 14);
    assert_eq!(data["requested_method"], "seasonal");
    // ten points is too short for either model tier
    assert_eq!(data["method_used"], "moving-average");

    let values = data["forecast"].as_array().expect("forecast array");
    assert_eq!(values.len(), 14);
    for value in values {
        let v = value.as_f64().expect("numeric forecast value");
        assert!(v >= 0.0);
        assert_eq!(v, v.round());
    }
}

#[tokio::test]
async fn forecast_is_reproducible_with_a_seed() {
    let app = TestApp::new();
    let uri = "/api/v1/predictions/forecast/SKU-2?days=10&method=lstm";

    let (_, first) = app.get_json(uri).await;
    let (_, second) = app.get_json(uri).await;

    assert_eq!(first["data"]["forecast"], second["data"]["forecast"]);
    assert_eq!(first["data"]["requested_method"], "sequence");
}

#[tokio::test]
async fn forecast_defaults_to_thirty_days() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/api/v1/predictions/forecast/SKU-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["forecast"].as_array().map(Vec::len), Some(30));
}

#[tokio::test]
async fn product_without_history_forecasts_zero() {
    let app = TestApp::new();
    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-3?days=5")
        .await;

    assert_eq!(status, StatusCode::OK);
    let values: Vec<f64> = body["data"]["forecast"]
        .as_array()
        .expect("forecast array")
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    assert_eq!(values, vec![0.0; 5]);
    assert_eq!(body["data"]["total_demand"], 0.0);
}

#[tokio::test]
async fn unknown_method_falls_back_to_moving_average() {
    let app = TestApp::new();
    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-1?days=3&method=crystal-ball")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["requested_method"], "moving-average");
    assert_eq!(body["data"]["method_used"], "moving-average");
}

#[tokio::test]
async fn zero_day_forecast_is_empty() {
    let app = TestApp::new();
    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-1?days=0")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["forecast"], serde_json::json!([]));
    assert_eq!(body["data"]["avg_daily_demand"], 0.0);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-404")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("SKU-404")));
}

#[tokio::test]
async fn horizon_beyond_maximum_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .get_json("/api/v1/predictions/forecast/SKU-1?days=400")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let (status, _) = app
        .get_json("/api/v1/predictions/forecast/SKU-1?days=-3")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restock_reports_plan_and_trending_uplift() {
    let app = TestApp::new();

    let (status, plain) = app.get_json("/api/v1/predictions/restock/SKU-2").await;
    assert_eq!(status, StatusCode::OK);
    let (_, trending) = app
        .get_json("/api/v1/predictions/restock/SKU-2?trending=true")
        .await;

    let plain = &plain["data"];
    let trending = &trending["data"];
    assert_eq!(plain["product_id"], "SKU-2");
    assert_eq!(plain["current_stock"], 2);
    assert_eq!(plain["is_trending"], false);
    assert_eq!(trending["is_trending"], true);
    assert_eq!(plain["forecast_tier"], "moving-average");

    let base = plain["recommended_quantity"].as_u64().expect("quantity");
    let uplifted = trending["recommended_quantity"].as_u64().expect("quantity");
    assert!(base > 0);
    assert_eq!(uplifted, ((base as f64) * 1.2).round_ties_even() as u64);
}

#[tokio::test]
async fn restock_for_product_without_history_is_zero() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/api/v1/predictions/restock/SKU-3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recommended_quantity"], 0);
    assert_eq!(body["data"]["avg_daily_demand"], 0.0);
}

#[tokio::test]
async fn trends_use_camel_case_sections() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/api/v1/predictions/trends").await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    let top = report["topSellingProducts"].as_array().expect("top sellers");
    assert_eq!(top.len(), 3);
    assert_eq!(top[0]["id"], "SKU-1");
    assert_eq!(top[2]["has_sales_data"], false);

    let trend = report["salesTrend"].as_array().expect("sales trend");
    assert_eq!(trend.len(), 10);
    assert_eq!(trend[0]["day"], "Day-1");
    assert_eq!(trend[0]["sales"], 11.0);
    assert_eq!(trend[9]["day"], "Day-10");

    let categories = report["categoryTrends"].as_array().expect("categories");
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["name"], "Tools");
    assert_eq!(categories[0]["total_sales"], 133.0);
}

#[tokio::test]
async fn inventory_summary_counts_stock_health() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/api/v1/predictions/inventory-summary").await;

    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"];
    assert_eq!(summary["total_products"], 3);
    assert_eq!(summary["categories"]["Tools"], 2);
    assert_eq!(summary["categories"]["Lighting"], 1);
    assert_eq!(summary["low_stock_count"], 2);
    assert_eq!(summary["out_of_stock_count"], 1);

    let trending = summary["trending_products"].as_array().expect("trending");
    assert_eq!(trending.len(), 2);
    assert_eq!(trending[0]["id"], "SKU-1");
    assert_eq!(trending[0]["total_sales"], 102.0);
}

#[tokio::test]
async fn empty_catalog_still_answers_catalog_views() {
    let app = TestApp::with_products(Vec::new());

    let (status, body) = app.get_json("/api/v1/predictions/trends").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["topSellingProducts"], serde_json::json!([]));

    let (status, body) = app.get_json("/api/v1/predictions/inventory-summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_products"], 0);
}

#[tokio::test]
async fn health_reports_up() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn request_id_is_echoed_on_success_and_error() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::GET,
            "/api/v1/predictions/forecast/SKU-1?days=2",
            &[("x-request-id", "req-forecast-1")],
        )
        .await;
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-forecast-1")
    );
    let body = common::response_json(response).await;
    assert_eq!(body["meta"]["request_id"], "req-forecast-1");

    let response = app
        .request(
            Method::GET,
            "/api/v1/predictions/restock/nope",
            &[("x-request-id", "req-missing")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::response_json(response).await;
    assert_eq!(body["request_id"], "req-missing");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/predictions/trends"].is_object());
}
