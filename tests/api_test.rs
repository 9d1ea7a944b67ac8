//! Request handling that completes before any database access: tenant
//! headers, role checks, payload validation and rate limiting.

mod common;

use axum::http::StatusCode;
use common::{test_config, TestApp, MANAGER, USER};
use serde_json::json;

#[tokio::test]
async fn test_missing_tenant_headers_rejected() {
    let app = TestApp::spawn();
    let (status, body) = app.get("/api/enterprise/stats", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error!(body);
    assert!(body["error"].as_str().unwrap().contains("x-enterprise-id"));
}

#[tokio::test]
async fn test_unknown_role_rejected() {
    let app = TestApp::spawn();
    let headers = [
        ("x-enterprise-id", "1"),
        ("x-user-id", "2"),
        ("x-user-role", "root"),
    ];
    let (status, body) = app.get("/api/connectors/available", &headers).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error!(body);
}

#[tokio::test]
async fn test_available_connectors() {
    let app = TestApp::spawn();
    let (status, body) = app.get("/api/connectors/available", USER).await;

    assert_eq!(status, StatusCode::OK);
    assert_success!(body);
    let connectors = body["data"].as_array().unwrap();
    assert_eq!(connectors.len(), 8);
    let endpoint = connectors
        .iter()
        .find(|c| c["connector_type"] == "api_endpoint")
        .unwrap();
    assert_eq!(endpoint["sync_supported"], true);
}

#[tokio::test]
async fn test_connector_setup_requires_manager() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post("/api/connectors/setup/box", USER, json!({"configuration": {}}))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error!(body);
}

#[tokio::test]
async fn test_connector_setup_unknown_type() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post("/api/connectors/setup/ftp", MANAGER, json!({"configuration": {}}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ftp"));
}

#[tokio::test]
async fn test_connector_setup_missing_fields() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post(
            "/api/connectors/setup/salesforce",
            MANAGER,
            json!({"configuration": {"client_id": "abc"}}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error!(body);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("security_token"));
    assert!(message.contains("password"));
}

#[tokio::test]
async fn test_connector_remove_requires_manager() {
    let app = TestApp::spawn();
    let (status, _) = app.delete("/api/connectors/box", USER).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_settings_update_requires_manager() {
    let app = TestApp::spawn();
    let (status, body) = app
        .put("/api/enterprise/settings", USER, json!({"name": "Acme"}))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error!(body);
}

#[tokio::test]
async fn test_department_validation() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post(
            "/api/enterprise/departments",
            MANAGER,
            json!({"name": "", "code": "FIN"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_query_too_short_rejected() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post("/api/enterprise/query", USER, json!({"query": "hi"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error!(body);
}

#[tokio::test]
async fn test_query_invalid_priority_rejected() {
    let app = TestApp::spawn();
    let (status, _) = app
        .post(
            "/api/enterprise/query",
            USER,
            json!({"query": "What was Q3 revenue?", "priority": "critical"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_score_out_of_range() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post(
            "/api/enterprise/query/1/feedback",
            USER,
            json!({"satisfaction_score": 9}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1-5"));
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post_bytes(
            "/api/documents?filename=payload.exe",
            USER,
            b"MZ binary".to_vec(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".exe"));
}

#[tokio::test]
async fn test_upload_rejects_empty_body() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post_bytes("/api/documents?filename=notes.txt", USER, Vec::new())
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File is empty");
}

#[tokio::test]
async fn test_upload_over_body_limit() {
    let mut config = test_config();
    config.max_file_size = 16;
    let app = TestApp::with_config(config);
    let (status, _) = app
        .post_bytes("/api/documents?filename=big.txt", USER, vec![b'a'; 64])
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_report_rejects_non_json_format() {
    let app = TestApp::spawn();
    let (status, body) = app
        .post(
            "/api/analytics/reports/generate",
            USER,
            json!({"report_type": "executive", "format": "pdf"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error!(body);
}

#[tokio::test]
async fn test_rate_limit_per_enterprise() {
    let mut config = test_config();
    config.rate_limit_per_minute = 2;
    let app = TestApp::with_config(config);

    for _ in 0..2 {
        let (status, _) = app.get("/api/connectors/available", USER).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.get("/api/connectors/available", USER).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_error!(body);
    assert_eq!(body["retry_after"], 60);

    // A different enterprise has its own window
    let other = [("x-enterprise-id", "2"), ("x-user-id", "10")];
    let (status, _) = app.get("/api/connectors/available", &other).await;
    assert_eq!(status, StatusCode::OK);
}
