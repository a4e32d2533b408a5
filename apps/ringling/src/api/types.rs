//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Opaque JSON documents (`training_parameters`, `metadata`) travel as
//! [`RawValue`] so they are echoed back byte-for-byte. `model_object` travels
//! as a lowercase hex string.

use ringling_core::{
    ActivationWindow, Backtest, DeploymentStage, Document, NewParameterSet, NewTrainedModel,
    ParameterSet, ParameterSetFilter, ParameterSetId, ProjectId, RegistryError, RegistryStatus,
    Timestamp, TrainedModel, TrainedModelFilter,
};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

fn raw_from_document(document: &Document) -> Result<Box<RawValue>, RegistryError> {
    RawValue::from_string(document.as_str().to_string())
        .map_err(|e| RegistryError::Serialization(format!("stored document: {}", e)))
}

fn document_from_raw(field: &'static str, raw: &RawValue) -> Result<Document, RegistryError> {
    Document::parse(raw.get()).map_err(|e| RegistryError::validation(field, e.to_string()))
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Registry status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub backend: String,
    pub parameter_sets: usize,
    pub trained_models: usize,
}

impl StatusResponse {
    pub fn new(backend: &str, status: RegistryStatus) -> Self {
        Self {
            backend: backend.to_string(),
            parameter_sets: status.parameter_sets,
            trained_models: status.trained_models,
        }
    }
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable kind, e.g. `conflict`.
    pub error: String,
    pub message: String,
}

// =============================================================================
// PARAMETER SETS
// =============================================================================

/// `POST /v1/parameter_sets` body.
#[derive(Debug, Deserialize)]
pub struct CreateParameterSetRequest {
    pub project_id: u64,
    pub training_parameters: Box<RawValue>,
    pub minimum_software_version: u32,
    pub active_from: Timestamp,
    #[serde(default)]
    pub active_until: Option<Timestamp>,
    #[serde(default)]
    pub metadata: Option<Box<RawValue>>,
}

impl CreateParameterSetRequest {
    /// Convert to registry input, validating fields.
    pub fn into_input(self) -> Result<NewParameterSet, RegistryError> {
        let training_parameters =
            document_from_raw("training_parameters", &self.training_parameters)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(|raw| document_from_raw("metadata", raw))
            .transpose()?;

        Ok(NewParameterSet {
            project_id: ProjectId(self.project_id),
            training_parameters,
            minimum_software_version: self.minimum_software_version,
            activation: ActivationWindow::new(self.active_from, self.active_until)?,
            metadata,
        })
    }
}

/// `POST /v1/parameter_sets` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateParameterSetResponse {
    pub parameter_set_id: u64,
}

/// `PUT|PATCH /v1/parameter_sets/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateActivationRequest {
    pub active_from: Timestamp,
    #[serde(default)]
    pub active_until: Option<Timestamp>,
}

impl UpdateActivationRequest {
    pub fn into_window(self) -> Result<ActivationWindow, RegistryError> {
        ActivationWindow::new(self.active_from, self.active_until)
    }
}

/// A parameter set as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterSetResponse {
    pub parameter_set_id: u64,
    pub project_id: u64,
    pub training_parameters: Box<RawValue>,
    pub minimum_software_version: u32,
    pub active_from: Timestamp,
    pub active_until: Option<Timestamp>,
    pub metadata: Option<Box<RawValue>>,
    /// Whether the window contains the instant the response was built.
    pub is_active: bool,
}

impl ParameterSetResponse {
    /// Render a stored set, evaluating `is_active` at `now`.
    pub fn from_record(set: &ParameterSet, now: Timestamp) -> Result<Self, RegistryError> {
        Ok(Self {
            parameter_set_id: set.id.0,
            project_id: set.project_id.0,
            training_parameters: raw_from_document(&set.training_parameters)?,
            minimum_software_version: set.minimum_software_version,
            active_from: set.activation.active_from,
            active_until: set.activation.active_until,
            metadata: set.metadata.as_ref().map(raw_from_document).transpose()?,
            is_active: set.is_active_at(now),
        })
    }
}

/// `GET /v1/parameter_sets` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterSetListResponse {
    pub parameter_sets: Vec<ParameterSetResponse>,
}

/// `GET /v1/parameter_sets` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParameterSetsQuery {
    pub project_id: Option<u64>,
    pub active_at: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl ListParameterSetsQuery {
    pub fn into_filter(self) -> ParameterSetFilter {
        ParameterSetFilter {
            project_id: self.project_id.map(ProjectId),
            active_at: self.active_at,
            limit: self.limit,
        }
    }
}

/// `GET /v1/projects/{project_id}/active_parameter_set` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveParameterSetQuery {
    /// Instant to evaluate; defaults to now.
    pub at: Option<Timestamp>,
}

// =============================================================================
// TRAINED MODELS
// =============================================================================

/// `POST /v1/trained_models` body.
///
/// The three `backtest_*`/`passed_backtesting` fields are optional but must be
/// given together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrainedModelRequest {
    pub project_id: u64,
    pub parameter_set_id: u64,
    pub training_data_from: Timestamp,
    pub training_data_until: Timestamp,
    /// Hex-encoded artifact bytes.
    pub model_object: String,
    pub train_timestamp: Timestamp,
    /// Accepted for compatibility; only `training` is allowed.
    #[serde(default)]
    pub deployment_stage: Option<DeploymentStage>,
    #[serde(default)]
    pub backtest_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub backtest_metrics: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub passed_backtesting: Option<bool>,
}

impl CreateTrainedModelRequest {
    /// Convert to registry input, validating fields.
    pub fn into_input(self) -> Result<NewTrainedModel, RegistryError> {
        if let Some(stage) = self
            .deployment_stage
            .filter(|stage| *stage != DeploymentStage::INITIAL)
        {
            return Err(RegistryError::validation(
                "deployment_stage",
                format!(
                    "new models start in {}, got {}; advance the stage with PATCH /v1/trained_models/{{id}}",
                    DeploymentStage::INITIAL,
                    stage
                ),
            ));
        }

        let model_object = decode_model_object(&self.model_object)?;

        let backtest = match (
            self.backtest_timestamp,
            self.backtest_metrics,
            self.passed_backtesting,
        ) {
            (None, None, None) => None,
            (Some(timestamp), Some(metrics), Some(passed)) => Some(Backtest {
                timestamp,
                metrics,
                passed,
            }),
            _ => {
                return Err(RegistryError::validation(
                    "backtest",
                    "backtest_timestamp, backtest_metrics and passed_backtesting must be given together",
                ));
            }
        };

        Ok(NewTrainedModel {
            project_id: ProjectId(self.project_id),
            parameter_set_id: ParameterSetId(self.parameter_set_id),
            training_data_from: self.training_data_from,
            training_data_until: self.training_data_until,
            model_object,
            train_timestamp: self.train_timestamp,
            backtest,
        })
    }
}

/// Decode a hex `model_object`, rejecting empty or malformed input.
pub fn decode_model_object(text: &str) -> Result<Vec<u8>, RegistryError> {
    let bytes = hex::decode(text.trim())
        .map_err(|e| RegistryError::validation("model_object", format!("invalid hex: {}", e)))?;
    if bytes.is_empty() {
        return Err(RegistryError::validation("model_object", "must not be empty"));
    }
    Ok(bytes)
}

/// `POST /v1/trained_models` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrainedModelResponse {
    pub model_id: u64,
}

/// `PUT /v1/trained_models/{id}/backtest` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBacktestRequest {
    pub backtest_timestamp: Timestamp,
    pub backtest_metrics: BTreeMap<String, f64>,
    pub passed_backtesting: bool,
}

impl RecordBacktestRequest {
    pub fn into_backtest(self) -> Backtest {
        Backtest {
            timestamp: self.backtest_timestamp,
            metrics: self.backtest_metrics,
            passed: self.passed_backtesting,
        }
    }
}

/// `PATCH /v1/trained_models/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub deployment_stage: DeploymentStage,
}

/// A full trained model, including the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelResponse {
    pub model_id: u64,
    pub project_id: u64,
    pub parameter_set_id: u64,
    pub training_data_from: Timestamp,
    pub training_data_until: Timestamp,
    pub model_object: String,
    pub train_timestamp: Timestamp,
    pub deployment_stage: DeploymentStage,
    pub backtest_timestamp: Option<Timestamp>,
    pub backtest_metrics: Option<BTreeMap<String, f64>>,
    pub passed_backtesting: bool,
}

impl From<&TrainedModel> for TrainedModelResponse {
    fn from(model: &TrainedModel) -> Self {
        Self {
            model_id: model.id.0,
            project_id: model.project_id.0,
            parameter_set_id: model.parameter_set_id.0,
            training_data_from: model.training_data_from,
            training_data_until: model.training_data_until,
            model_object: hex::encode(&model.model_object),
            train_timestamp: model.train_timestamp,
            deployment_stage: model.deployment_stage,
            backtest_timestamp: model.backtest.as_ref().map(|b| b.timestamp),
            backtest_metrics: model.backtest.as_ref().map(|b| b.metrics.clone()),
            passed_backtesting: model.passed_backtesting(),
        }
    }
}

/// A trained model in list results, without the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainedModelSummary {
    pub model_id: u64,
    pub project_id: u64,
    pub parameter_set_id: u64,
    pub training_data_from: Timestamp,
    pub training_data_until: Timestamp,
    pub deployment_stage: DeploymentStage,
    pub passed_backtesting: bool,
}

impl From<&TrainedModel> for TrainedModelSummary {
    fn from(model: &TrainedModel) -> Self {
        Self {
            model_id: model.id.0,
            project_id: model.project_id.0,
            parameter_set_id: model.parameter_set_id.0,
            training_data_from: model.training_data_from,
            training_data_until: model.training_data_until,
            deployment_stage: model.deployment_stage,
            passed_backtesting: model.passed_backtesting(),
        }
    }
}

/// `GET /v1/trained_models` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainedModelListResponse {
    pub trained_models: Vec<TrainedModelSummary>,
}

/// `GET /v1/trained_models` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTrainedModelsQuery {
    pub project_id: Option<u64>,
    pub parameter_set_id: Option<u64>,
    pub deployment_stage: Option<DeploymentStage>,
    pub limit: Option<usize>,
}

impl ListTrainedModelsQuery {
    pub fn into_filter(self) -> TrainedModelFilter {
        TrainedModelFilter {
            project_id: self.project_id.map(ProjectId),
            parameter_set_id: self.parameter_set_id.map(ParameterSetId),
            deployment_stage: self.deployment_stage,
            limit: self.limit,
        }
    }
}
