//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Extractors are taken as `Result<_, Rejection>` so malformed bodies, query
//! strings and path segments come back as `validation` errors in the common
//! error body instead of axum's plain-text rejections.

use super::{
    AppState,
    error::ApiError,
    types::{
        ActiveParameterSetQuery, CreateParameterSetRequest, CreateParameterSetResponse,
        CreateTrainedModelRequest, CreateTrainedModelResponse, HealthResponse,
        ListParameterSetsQuery, ListTrainedModelsQuery, ParameterSetListResponse,
        ParameterSetResponse, PromoteRequest, RecordBacktestRequest, StatusResponse,
        TrainedModelListResponse, TrainedModelResponse, TrainedModelSummary,
        UpdateActivationRequest,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use ringling_core::{ParameterSetId, ProjectId, Timestamp, TrainedModelId};

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Row counts of both registries.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.registry.status()?;
    Ok(Json(StatusResponse::new(state.backend_name(), status)))
}

// =============================================================================
// PARAMETER SET HANDLERS
// =============================================================================

/// Register a parameter set.
pub async fn create_parameter_set_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateParameterSetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateParameterSetResponse>), ApiError> {
    let Json(request) = payload?;
    let id = state
        .registry
        .parameter_sets()
        .create(request.into_input()?)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateParameterSetResponse {
            parameter_set_id: id.0,
        }),
    ))
}

/// List parameter sets in creation order.
pub async fn list_parameter_sets_handler(
    State(state): State<AppState>,
    query: Result<Query<ListParameterSetsQuery>, QueryRejection>,
) -> Result<Json<ParameterSetListResponse>, ApiError> {
    let Query(query) = query?;
    let sets = state.registry.parameter_sets().list(&query.into_filter())?;

    let now = Timestamp::now();
    let parameter_sets = sets
        .iter()
        .map(|set| ParameterSetResponse::from_record(set, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ParameterSetListResponse { parameter_sets }))
}

/// Fetch one parameter set.
pub async fn get_parameter_set_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ParameterSetResponse>, ApiError> {
    let Path(id) = id?;
    let set = state.registry.parameter_sets().get(ParameterSetId(id))?;
    Ok(Json(ParameterSetResponse::from_record(&set, Timestamp::now())?))
}

/// Replace the activation window of a parameter set.
pub async fn update_parameter_set_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<UpdateActivationRequest>, JsonRejection>,
) -> Result<Json<ParameterSetResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let set = state
        .registry
        .parameter_sets()
        .update_activation_window(ParameterSetId(id), request.into_window()?)?;
    Ok(Json(ParameterSetResponse::from_record(&set, Timestamp::now())?))
}

/// The parameter set of a project active at `?at=` (default: now).
pub async fn active_parameter_set_handler(
    State(state): State<AppState>,
    project_id: Result<Path<u64>, PathRejection>,
    query: Result<Query<ActiveParameterSetQuery>, QueryRejection>,
) -> Result<Json<ParameterSetResponse>, ApiError> {
    let Path(project_id) = project_id?;
    let Query(query) = query?;
    let now = Timestamp::now();
    let at = query.at.unwrap_or(now);

    let set = state
        .registry
        .parameter_sets()
        .active_at(ProjectId(project_id), at)?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "No parameter set of project {} is active at {}",
                project_id, at
            ))
        })?;
    Ok(Json(ParameterSetResponse::from_record(&set, now)?))
}

// =============================================================================
// TRAINED MODEL HANDLERS
// =============================================================================

/// Register a trained model in stage `training`.
pub async fn create_trained_model_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateTrainedModelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateTrainedModelResponse>), ApiError> {
    let Json(request) = payload?;
    let id = state
        .registry
        .trained_models()
        .create(request.into_input()?)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTrainedModelResponse { model_id: id.0 }),
    ))
}

/// List trained model summaries in creation order.
pub async fn list_trained_models_handler(
    State(state): State<AppState>,
    query: Result<Query<ListTrainedModelsQuery>, QueryRejection>,
) -> Result<Json<TrainedModelListResponse>, ApiError> {
    let Query(query) = query?;
    let models = state.registry.trained_models().list(&query.into_filter())?;
    Ok(Json(TrainedModelListResponse {
        trained_models: models.iter().map(TrainedModelSummary::from).collect(),
    }))
}

/// Fetch one trained model, including its artifact.
pub async fn get_trained_model_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<TrainedModelResponse>, ApiError> {
    let Path(id) = id?;
    let model = state.registry.trained_models().get(TrainedModelId(id))?;
    Ok(Json(TrainedModelResponse::from(&model)))
}

/// Attach backtest results to a model.
pub async fn record_backtest_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<RecordBacktestRequest>, JsonRejection>,
) -> Result<Json<TrainedModelResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let model = state
        .registry
        .trained_models()
        .record_backtest(TrainedModelId(id), request.into_backtest())?;
    Ok(Json(TrainedModelResponse::from(&model)))
}

/// Move a model to another deployment stage.
pub async fn promote_trained_model_handler(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<PromoteRequest>, JsonRejection>,
) -> Result<Json<TrainedModelResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let model = state
        .registry
        .trained_models()
        .promote(TrainedModelId(id), request.deployment_stage)?;
    Ok(Json(TrainedModelResponse::from(&model)))
}
