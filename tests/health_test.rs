//! Integration tests for the health and system endpoints.
//!
//! The database is unreachable, so health reports it as unhealthy while the
//! endpoint itself still answers.

mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn test_health_returns_200_without_database() {
    let app = TestApp::spawn();
    let (status, body) = app.get("/api/health", &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "unhealthy");
}

#[tokio::test]
async fn test_health_returns_version() {
    let app = TestApp::spawn();
    let (_, body) = app.get("/api/health", &[]).await;

    assert!(!body["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_system_info_reports_limits_and_connectors() {
    let app = TestApp::spawn();
    let (status, body) = app.get("/api/system/info", &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_success!(body);
    assert_eq!(body["data"]["limits"]["chunk_size"], 2000);
    assert_eq!(body["data"]["llm"]["configured"], false);
    assert_eq!(body["data"]["connectors"].as_array().unwrap().len(), 8);
    assert!(body["data"]["supported_file_types"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "pdf"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = TestApp::spawn();
    let (status, _) = app.get("/api/nonexistent", &[]).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
