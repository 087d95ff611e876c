//! Integration tests for efq-mv HTTP endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use efq_common::db::{access, materials};
use efq_common::MaterialRecord;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

use efq_mv::services::{
    NotificationDispatcher, RunnerConfig, SqliteAuthorizer, SqliteMaterialStore, ValidationRunner,
};
use efq_mv::validation::MaterialValidator;
use efq_mv::{build_router, AppState};

const SERVICE_KEY: &str = "test-service-key";

/// Test helper: in-memory store with a few materials and two users
async fn setup_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    materials::create_materials_table(&pool).await.unwrap();
    access::create_access_tables(&pool).await.unwrap();

    let records = [
        MaterialRecord::new("m1", "Rebar", "Steel")
            .with_factor(1500.0)
            .with_unit("tonne")
            .with_source("ICE V4"),
        MaterialRecord::new("m2", "Slab 32MPa", "Concrete")
            .with_factor(320.0)
            .with_unit("m³")
            .with_source("EPD Australasia")
            .with_epd_number("S-P-01234"),
        MaterialRecord::new("m3", "Unknown", "Glass").with_unit("m²"),
    ];
    for record in &records {
        materials::insert_material(&pool, record).await.unwrap();
    }

    access::insert_token(&pool, "admin-token", "user-admin").await.unwrap();
    access::grant_role(&pool, "user-admin", "admin").await.unwrap();
    access::insert_token(&pool, "viewer-token", "user-viewer").await.unwrap();

    pool
}

/// Test helper: router over a pool, email disabled, fixed clock
fn setup_app(pool: SqlitePool) -> Router {
    let runner = ValidationRunner::new(
        Arc::new(SqliteMaterialStore::new(pool.clone())),
        Arc::new(SqliteAuthorizer::new(pool)),
        Arc::new(NotificationDispatcher::new(None, None, None)),
        MaterialValidator::default(),
        RunnerConfig {
            batch_size: 2,
            service_key: Some(SERVICE_KEY.to_string()),
            ..RunnerConfig::default()
        },
    )
    .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap()));

    build_router(AppState::new(runner))
}

fn validate_request(authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/validate");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn extract_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "efq-mv");
    assert!(json.get("last_run").is_none());
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_health_reports_last_run() {
    let app = setup_app(setup_pool().await);

    let response = app
        .clone()
        .oneshot(validate_request(Some("Bearer admin-token"), ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = extract_json(health).await;

    assert_eq!(json["status"], "ok");
    assert_eq!(json["last_run"]["timestamp"], "2026-03-01T02:00:00.000Z");
    assert_eq!(json["last_run"]["total_materials"], 3);
    assert_eq!(json["last_run"]["pass_rate"], 66.7);
    assert_eq!(json["last_run"]["critical_issues"], 1);
}

#[tokio::test]
async fn test_blank_bearer_header_is_missing_authorization() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(Some("Bearer "), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = extract_json(response).await;
    assert_eq!(json["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_missing_authorization_is_401() {
    let app = setup_app(setup_pool().await);

    let response = app.oneshot(validate_request(None, "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = extract_json(response).await;
    assert_eq!(json["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_malformed_body_is_not_scheduled() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(None, "{scheduled: true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_token_is_401() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(Some("Bearer nope"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = extract_json(response).await;
    assert_eq!(json["error"], "Unauthorized");
}

#[tokio::test]
async fn test_non_admin_is_403() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(Some("Bearer viewer-token"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = extract_json(response).await;
    assert_eq!(json["error"], "Admin access required");
}

#[tokio::test]
async fn test_admin_run_returns_report() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(Some("Bearer admin-token"), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response).await;

    assert_eq!(json["version"], "v1.0");
    assert_eq!(json["timestamp"], "2026-03-01T02:00:00.000Z");
    assert_eq!(json["totalMaterials"], 3);
    assert_eq!(json["confidenceLevelCounts"]["verified"], 1);
    assert_eq!(json["confidenceLevelCounts"]["industry_average"], 1);
    assert_eq!(json["confidenceLevelCounts"]["needs_review"], 1);
    assert_eq!(json["sourceTierCounts"]["tier3"], 1);
    assert_eq!(json["issueCounts"]["critical"], 1);
    assert_eq!(json["passRate"], 66.7);

    let flagged = json["flaggedMaterials"].as_array().unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0]["id"], "m3");
    assert_eq!(flagged[0]["confidenceColor"], "red");
    assert_eq!(flagged[0]["issues"][0]["code"], "NULL_EF_TOTAL");

    assert_eq!(json["categoryStats"]["Steel"]["count"], 1);
    assert!(json["categoryStats"].get("Glass").is_none());
}

#[tokio::test]
async fn test_service_key_caller() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(Some(&format!("Bearer {}", SERVICE_KEY)), ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_scheduled_caller() {
    let app = setup_app(setup_pool().await);

    let response = app
        .oneshot(validate_request(None, r#"{"scheduled": true}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response).await;
    assert_eq!(json["totalMaterials"], 3);
}

#[tokio::test]
async fn test_fetch_failure_is_500_and_reported_by_health() {
    // No materials table: every fetch fails
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let app = setup_app(pool);

    let response = app
        .clone()
        .oneshot(validate_request(None, r#"{"scheduled": true}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = extract_json(response).await;
    assert_eq!(json["error"], "Validation failed");

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = extract_json(health).await;
    assert_eq!(json["status"], "degraded");
    assert!(json["last_error"].as_str().unwrap().contains("Fetch failed"));
}
