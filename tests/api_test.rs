/// HTTP API tests
///
/// Drive the router in-process with `oneshot`, with and without a resident
/// model.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::train_model;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use vehicle_predictive_maintenance::api::{build_router, AppState};

fn ready_app() -> Router {
    let dir = TempDir::new().unwrap();
    let (model, _) = train_model(dir.path(), 600, 42);
    let state = AppState::new("pm-test").with_model(Arc::new(model.into_serving().unwrap()));
    build_router(state)
}

fn unready_app() -> Router {
    build_router(AppState::new("pm-test"))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn telemetry(engine_temp: f64, oil_level: f64) -> Value {
    json!({
        "vehicle_id": "V-1001",
        "engine_temp": engine_temp,
        "brake_health": 88.0,
        "battery_health": 92.0,
        "vibration_level": 0.3,
        "oil_level": oil_level,
    })
}

#[tokio::test]
async fn test_health_with_model() {
    let (status, body) = send(ready_app(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pm-test");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_without_model() {
    let (status, body) = send(unready_app(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Model not loaded");

    let (status, _) = send(unready_app(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(unready_app(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_predict_high_risk() {
    let (status, body) = send(ready_app(), post_json("/predict", telemetry(115.0, 0.2))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vehicle_id"], "V-1001");
    assert_eq!(body["predicted_risk"], "high");
    assert_eq!(body["status"], "success");
    let confidence = body["confidence_score"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&confidence));
}

#[tokio::test]
async fn test_predict_rejects_out_of_range() {
    let (status, body) = send(ready_app(), post_json("/predict", telemetry(250.0, 0.5))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Validation error"));

    let (status, _) = send(ready_app(), post_json("/predict", telemetry(90.0, 1.2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_without_model() {
    let (status, body) = send(unready_app(), post_json("/predict", telemetry(90.0, 0.5))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["detail"], "Model not loaded");
}

#[tokio::test]
async fn test_model_metadata() {
    let (status, body) = send(ready_app(), get("/model")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_type"], "random_forest");
    assert_eq!(body["classes"], json!(["high", "low", "medium"]));
    assert_eq!(body["feature_names"].as_array().unwrap().len(), 5);
    assert_eq!(body["hyperparameters"]["n_estimators"], 30);
}
