mod common;

use axum::http::{header, Method, StatusCode};
use chrono::Duration;
use common::TestApp;
use forecast_api::entities::forecast;
use sea_orm::EntityTrait;
use serde_json::Value;

#[tokio::test]
async fn demand_endpoint_returns_a_forecast_array() {
    let app = TestApp::new().await;
    let d0 = TestApp::days_ago(3);
    app.seed_order(Some(d0), &[("p1", Some(4.0))]).await;
    app.seed_order(Some(d0 + Duration::days(2)), &[("p1", Some(8.0))])
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/forecasts/demand",
            Some(r#"{"window": 4}"#),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let items = body.as_array().expect("response should be a JSON array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], "p1");
    assert!((items[0]["predicted"].as_f64().unwrap() - 12.0).abs() < 1e-9);
    assert!((items[0]["historical_avg"].as_f64().unwrap() - 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_body_uses_the_default_window() {
    let app = TestApp::new().await;
    app.seed_order(Some(TestApp::days_ago(2)), &[("p1", Some(5.0))])
        .await;

    let (status, body) = app
        .request_json(Method::POST, "/api/v1/forecasts/demand", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_body_is_treated_as_empty_configuration() {
    let app = TestApp::new().await;
    app.seed_order(Some(TestApp::days_ago(2)), &[("p1", Some(5.0))])
        .await;

    let (status, body) = app
        .request_json(Method::POST, "/api/v1/forecasts/demand", Some("{not json"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn non_positive_window_is_a_validation_error() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/forecasts/demand",
            Some(r#"{"window": 0}"#),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("window must be between"));
}

#[tokio::test]
async fn absurdly_large_window_is_a_validation_error() {
    let app = TestApp::new().await;

    // Large enough to overflow chrono's day arithmetic if it ever got
    // past validation; the request must fail cleanly instead
    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/forecasts/demand",
            Some(r#"{"window": 200000000000000}"#),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("window must be between"));
}

#[tokio::test]
async fn sales_endpoint_returns_the_total_sales_document() {
    let app = TestApp::new().await;
    let d0 = TestApp::days_ago(3);
    app.seed_order(Some(d0), &[("p1", Some(4.0)), ("p2", Some(2.0))])
        .await;
    app.seed_order(Some(d0 + Duration::days(2)), &[("p1", Some(8.0))])
        .await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/forecasts/sales",
            Some(r#"{"window": 4}"#),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "total_sales");
    assert!(body["historical_average"].is_null());
    // p1 trend predicts 12, p2 flat-fits to 2
    assert!((body["predicted"].as_f64().unwrap() - 14.0).abs() < 1e-9);
}

#[tokio::test]
async fn sales_endpoint_reports_zero_with_no_history() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(Method::POST, "/api/v1/forecasts/sales", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn retrain_endpoint_persists_forecasts_and_acknowledges() {
    let app = TestApp::new().await;
    app.seed_order(
        Some(TestApp::days_ago(2)),
        &[("p1", Some(5.0)), ("p2", Some(3.0))],
    )
    .await;

    let response = app
        .request(Method::POST, "/api/v1/forecasts/retrain", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Forecasts updated");

    let all = forecast::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(all.len(), 3); // p1, p2, total_sales

    let total = all
        .iter()
        .find(|f| f.id == forecast::TOTAL_SALES_ID)
        .expect("total_sales row persisted");
    assert_eq!(total.kind, forecast::KIND_SALES);
    assert!((total.predicted - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn status_and_health_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.request_json(Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "forecast-api");

    let (status, body) = app.request_json(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "healthy");
}
