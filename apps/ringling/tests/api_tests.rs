//! Integration tests for the Ringling HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use ringling::api::{
    AppState, CreateParameterSetResponse, CreateTrainedModelResponse, ErrorResponse,
    HealthResponse, ParameterSetListResponse, StatusResponse, TrainedModelListResponse,
    TrainedModelResponse, create_router,
};
use ringling::config::ApiConfig;
use ringling_core::StorageBackend;
use serde_json::{Value, json};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a test server over a fresh in-memory store, without rate limiting.
fn create_test_server() -> TestServer {
    let api = ApiConfig {
        rate_limit: 0,
        ..ApiConfig::default()
    };
    let router = create_router(AppState::new(StorageBackend::memory()), &api);
    TestServer::new(router).unwrap()
}

fn parameter_set_body(project_id: u64, active_from: &str, active_until: Option<&str>) -> Value {
    json!({
        "project_id": project_id,
        "training_parameters": {"param1": 1, "param2": "2"},
        "minimum_software_version": 1,
        "active_from": active_from,
        "active_until": active_until,
    })
}

async fn create_parameter_set(
    server: &TestServer,
    project_id: u64,
    active_from: &str,
    active_until: Option<&str>,
) -> u64 {
    let response = server
        .post("/v1/parameter_sets")
        .json(&parameter_set_body(project_id, active_from, active_until))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<CreateParameterSetResponse>().parameter_set_id
}

fn trained_model_body(project_id: u64, parameter_set_id: u64) -> Value {
    json!({
        "project_id": project_id,
        "parameter_set_id": parameter_set_id,
        "training_data_from": "2024-01-01T00:00:00",
        "training_data_until": "2024-02-01T00:00:00",
        "model_object": "deadbeef",
        "train_timestamp": "2024-02-02T08:30:00",
    })
}

async fn create_trained_model(server: &TestServer, project_id: u64, parameter_set_id: u64) -> u64 {
    let response = server
        .post("/v1/trained_models")
        .json(&trained_model_body(project_id, parameter_set_id))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<CreateTrainedModelResponse>().model_id
}

async fn record_backtest(server: &TestServer, model_id: u64, passed: bool) {
    server
        .put(&format!("/v1/trained_models/{}/backtest", model_id))
        .json(&json!({
            "backtest_timestamp": "2024-02-03T00:00:00",
            "backtest_metrics": {"rmse": 0.25, "mae": 0.125},
            "passed_backtesting": passed,
        }))
        .await
        .assert_status_ok();
}

async fn promote(server: &TestServer, model_id: u64, stage: &str) -> axum_test::TestResponse {
    server
        .patch(&format!("/v1/trained_models/{}", model_id))
        .json(&json!({"deployment_stage": stage}))
        .await
}

fn error_kind(response: &axum_test::TestResponse) -> String {
    response.json::<ErrorResponse>().error
}

// =============================================================================
// HEALTH & STATUS TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_counts_rows() {
    let server = create_test_server();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.backend, "memory");
    assert_eq!(status.parameter_sets, 0);
    assert_eq!(status.trained_models, 0);

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    create_trained_model(&server, 1, set_id).await;

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.parameter_sets, 1);
    assert_eq!(status.trained_models, 1);
}

// =============================================================================
// PARAMETER SET TESTS
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_parameter_set() {
    let server = create_test_server();

    let id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    assert_eq!(id, 1);

    let response = server.get("/v1/parameter_sets/1").await;
    response.assert_status_ok();
    assert!(
        response
            .text()
            .contains(r#""training_parameters":{"param1":1,"param2":"2"}"#)
    );
    let body: Value = response.json();
    assert_eq!(body["parameter_set_id"], 1);
    assert_eq!(body["project_id"], 1);
    assert_eq!(body["training_parameters"], json!({"param1": 1, "param2": "2"}));
    assert_eq!(body["minimum_software_version"], 1);
    assert_eq!(body["active_from"], "2024-01-01T00:00:00");
    assert_eq!(body["active_until"], Value::Null);
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn test_documents_are_echoed_verbatim() {
    let server = create_test_server();
    let body = r#"{"project_id": 4, "training_parameters": {"b": 1,  "a": [1.50, 2]}, "minimum_software_version": 2, "active_from": "2024-01-01T00:00:00", "metadata": {"note": "first"}}"#;

    server
        .post("/v1/parameter_sets")
        .bytes(bytes::Bytes::from(body))
        .content_type("application/json")
        .await
        .assert_status(StatusCode::CREATED);

    let text = server.get("/v1/parameter_sets/1").await.text();
    assert!(text.contains(r#""training_parameters":{"b": 1,  "a": [1.50, 2]}"#));
    assert!(text.contains(r#""metadata":{"note": "first"}"#));
}

#[tokio::test]
async fn test_new_parameter_set_supersedes_open_ended() {
    let server = create_test_server();

    let first = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let second = create_parameter_set(&server, 1, "2024-06-01T00:00:00", None).await;

    let body: Value = server
        .get(&format!("/v1/parameter_sets/{}", first))
        .await
        .json();
    assert_eq!(body["active_until"], "2024-06-01T00:00:00");

    let active: Value = server
        .get("/v1/projects/1/active_parameter_set")
        .add_query_param("at", "2024-03-01T00:00:00")
        .await
        .json();
    assert_eq!(active["parameter_set_id"], first);

    let active: Value = server
        .get("/v1/projects/1/active_parameter_set")
        .add_query_param("at", "2024-06-01T00:00:00")
        .await
        .json();
    assert_eq!(active["parameter_set_id"], second);
}

#[tokio::test]
async fn test_overlapping_bounded_window_conflicts() {
    let server = create_test_server();

    create_parameter_set(
        &server,
        1,
        "2024-01-01T00:00:00",
        Some("2024-12-31T00:00:00"),
    )
    .await;

    let response = server
        .post("/v1/parameter_sets")
        .json(&parameter_set_body(1, "2024-06-01T00:00:00", None))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_kind(&response), "conflict");
}

#[tokio::test]
async fn test_other_projects_do_not_conflict() {
    let server = create_test_server();

    create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    create_parameter_set(&server, 2, "2024-01-01T00:00:00", None).await;

    let list: ParameterSetListResponse = server
        .get("/v1/parameter_sets")
        .add_query_param("project_id", 2)
        .await
        .json();
    assert_eq!(list.parameter_sets.len(), 1);
    assert_eq!(list.parameter_sets[0].project_id, 2);
    assert!(list.parameter_sets[0].active_until.is_none());
}

#[tokio::test]
async fn test_inverted_window_is_rejected() {
    let server = create_test_server();

    let response = server
        .post("/v1/parameter_sets")
        .json(&parameter_set_body(
            1,
            "2024-06-01T00:00:00",
            Some("2024-01-01T00:00:00"),
        ))
        .await;

    response.assert_status_bad_request();
    assert_eq!(error_kind(&response), "validation");
}

#[tokio::test]
async fn test_null_training_parameters_are_rejected() {
    let server = create_test_server();

    let response = server
        .post("/v1/parameter_sets")
        .json(&json!({
            "project_id": 1,
            "training_parameters": null,
            "minimum_software_version": 1,
            "active_from": "2024-01-01T00:00:00",
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let server = create_test_server();

    let response = server
        .post("/v1/parameter_sets")
        .bytes(bytes::Bytes::from("{\"project_id\": 1,"))
        .content_type("application/json")
        .await;

    response.assert_status_bad_request();
    assert_eq!(error_kind(&response), "validation");
}

#[tokio::test]
async fn test_missing_parameter_set_is_not_found() {
    let server = create_test_server();

    let response = server.get("/v1/parameter_sets/99").await;
    response.assert_status_not_found();
    assert_eq!(error_kind(&response), "not_found");

    let response = server
        .put("/v1/parameter_sets/99")
        .json(&json!({"active_from": "2024-01-01T00:00:00"}))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_non_numeric_id_is_validation_error() {
    let server = create_test_server();

    let response = server.get("/v1/parameter_sets/abc").await;
    response.assert_status_bad_request();
    assert_eq!(error_kind(&response), "validation");
}

#[tokio::test]
async fn test_update_activation_window() {
    let server = create_test_server();

    let id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;

    let response = server
        .patch(&format!("/v1/parameter_sets/{}", id))
        .json(&json!({
            "active_from": "2024-01-01T00:00:00",
            "active_until": "2024-02-01T00:00:00",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["active_until"], "2024-02-01T00:00:00");
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn test_update_into_sibling_conflicts() {
    let server = create_test_server();

    create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let second = create_parameter_set(&server, 1, "2024-06-01T00:00:00", None).await;

    let response = server
        .put(&format!("/v1/parameter_sets/{}", second))
        .json(&json!({"active_from": "2024-03-01T00:00:00"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_no_active_parameter_set_is_not_found() {
    let server = create_test_server();

    create_parameter_set(&server, 1, "2030-01-01T00:00:00", None).await;

    let response = server
        .get("/v1/projects/1/active_parameter_set")
        .add_query_param("at", "2024-01-01T00:00:00")
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_list_filters_by_active_at_and_limit() {
    let server = create_test_server();

    create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    create_parameter_set(&server, 1, "2024-06-01T00:00:00", None).await;
    create_parameter_set(&server, 2, "2024-01-01T00:00:00", None).await;

    let list: ParameterSetListResponse = server
        .get("/v1/parameter_sets")
        .add_query_param("active_at", "2024-02-01T00:00:00")
        .await
        .json();
    let ids: Vec<u64> = list
        .parameter_sets
        .iter()
        .map(|set| set.parameter_set_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);

    let list: ParameterSetListResponse = server
        .get("/v1/parameter_sets")
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(list.parameter_sets.len(), 2);
}

// =============================================================================
// TRAINED MODEL TESTS
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_trained_model() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;

    let model: TrainedModelResponse = server
        .get(&format!("/v1/trained_models/{}", model_id))
        .await
        .json();
    assert_eq!(model.model_object, "deadbeef");
    assert_eq!(model.deployment_stage.as_str(), "training");
    assert!(!model.passed_backtesting);
    assert!(model.backtest_metrics.is_none());
}

#[tokio::test]
async fn test_trained_model_requires_existing_parameter_set() {
    let server = create_test_server();

    let response = server
        .post("/v1/trained_models")
        .json(&trained_model_body(1, 42))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_trained_model_project_must_match_parameter_set() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let response = server
        .post("/v1/trained_models")
        .json(&trained_model_body(2, set_id))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_invalid_hex_model_object_is_rejected() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let mut body = trained_model_body(1, set_id);
    body["model_object"] = json!("not-hex");

    let response = server.post("/v1/trained_models").json(&body).await;
    response.assert_status_bad_request();
    assert_eq!(error_kind(&response), "validation");
}

#[tokio::test]
async fn test_promotion_is_gated_by_backtest() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;

    promote(&server, model_id, "testing").await.assert_status_ok();

    let response = promote(&server, model_id, "staging").await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    assert_eq!(error_kind(&response), "backtest_required");

    record_backtest(&server, model_id, false).await;
    promote(&server, model_id, "staging")
        .await
        .assert_status(StatusCode::PRECONDITION_FAILED);

    record_backtest(&server, model_id, true).await;
    promote(&server, model_id, "staging").await.assert_status_ok();

    let response = promote(&server, model_id, "production").await;
    response.assert_status_ok();
    let model: TrainedModelResponse = response.json();
    assert_eq!(model.deployment_stage.as_str(), "production");
    assert!(model.passed_backtesting);
}

#[tokio::test]
async fn test_skipping_stages_is_invalid_transition() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;

    let response = promote(&server, model_id, "production").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kind(&response), "invalid_transition");
}

#[tokio::test]
async fn test_retired_is_terminal() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;

    promote(&server, model_id, "retired").await.assert_status_ok();
    promote(&server, model_id, "retired").await.assert_status_ok();
    promote(&server, model_id, "testing")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_stage_is_validation_error() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;

    let response = promote(&server, model_id, "shipping").await;
    response.assert_status_bad_request();
    assert_eq!(error_kind(&response), "validation");
}

#[tokio::test]
async fn test_backtest_locked_after_staging() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let model_id = create_trained_model(&server, 1, set_id).await;
    promote(&server, model_id, "testing").await.assert_status_ok();
    record_backtest(&server, model_id, true).await;
    promote(&server, model_id, "staging").await.assert_status_ok();

    let response = server
        .put(&format!("/v1/trained_models/{}/backtest", model_id))
        .json(&json!({
            "backtest_timestamp": "2024-03-01T00:00:00",
            "backtest_metrics": {"rmse": 0.5},
            "passed_backtesting": false,
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kind(&response), "invalid_transition");
}

#[tokio::test]
async fn test_model_created_with_passing_backtest() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let mut body = trained_model_body(1, set_id);
    body["backtest_timestamp"] = json!("2024-02-03T00:00:00");
    body["backtest_metrics"] = json!({"rmse": 0.25});
    body["passed_backtesting"] = json!(true);

    let response = server.post("/v1/trained_models").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    let model_id = response.json::<CreateTrainedModelResponse>().model_id;

    promote(&server, model_id, "testing").await.assert_status_ok();
    promote(&server, model_id, "staging").await.assert_status_ok();
}

#[tokio::test]
async fn test_model_created_in_testing_points_to_patch() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let mut body = trained_model_body(1, set_id);
    body["deployment_stage"] = json!("testing");
    body["backtest_timestamp"] = json!("2024-02-03T00:00:00");
    body["backtest_metrics"] = json!({"rmse": 0.25});
    body["passed_backtesting"] = json!(true);

    let response = server.post("/v1/trained_models").json(&body).await;
    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "validation");
    assert!(error.message.contains("PATCH /v1/trained_models/{id}"));

    body["deployment_stage"] = json!("training");
    let response = server.post("/v1/trained_models").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    let model_id = response.json::<CreateTrainedModelResponse>().model_id;
    promote(&server, model_id, "testing").await.assert_status_ok();
}

#[tokio::test]
async fn test_partial_backtest_on_create_is_rejected() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let mut body = trained_model_body(1, set_id);
    body["passed_backtesting"] = json!(true);

    let response = server.post("/v1/trained_models").json(&body).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_list_trained_models_omits_artifact() {
    let server = create_test_server();

    let set_id = create_parameter_set(&server, 1, "2024-01-01T00:00:00", None).await;
    let first = create_trained_model(&server, 1, set_id).await;
    let second = create_trained_model(&server, 1, set_id).await;
    promote(&server, second, "testing").await.assert_status_ok();

    let response = server.get("/v1/trained_models").await;
    response.assert_status_ok();
    assert!(!response.text().contains("model_object"));
    let list: TrainedModelListResponse = response.json();
    let ids: Vec<u64> = list.trained_models.iter().map(|m| m.model_id).collect();
    assert_eq!(ids, vec![first, second]);

    let list: TrainedModelListResponse = server
        .get("/v1/trained_models")
        .add_query_param("deployment_stage", "testing")
        .await
        .json();
    assert_eq!(list.trained_models.len(), 1);
    assert_eq!(list.trained_models[0].model_id, second);
}

#[tokio::test]
async fn test_missing_trained_model_is_not_found() {
    let server = create_test_server();

    server
        .get("/v1/trained_models/7")
        .await
        .assert_status_not_found();
    promote(&server, 7, "testing")
        .await
        .assert_status_not_found();
}
