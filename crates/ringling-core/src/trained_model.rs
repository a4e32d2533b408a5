//! # Trained Model Registry
//!
//! Model artifacts trained against a parameter set, and their promotion
//! through the deployment stages described in [`crate::stage`].
//!
//! The registry records backtest results produced elsewhere; it never runs a
//! backtest itself. A model must carry a passing backtest before it may move
//! into `staging` or `production`.

use crate::parameter_set;
use crate::stage::{DeploymentStage, Transition};
use crate::storage::{Record, Store, StoreRead, StoreWrite, Table};
use crate::{ParameterSetId, ProjectId, RegistryError, Timestamp, TrainedModelId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RECORDS
// =============================================================================

/// Result of an offline backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtest {
    /// When the backtest was run.
    pub timestamp: Timestamp,
    /// Metric name to value, e.g. `accuracy`.
    pub metrics: BTreeMap<String, f64>,
    /// Verdict of the evaluation workload.
    pub passed: bool,
}

impl Backtest {
    /// Reject empty metric names and non-finite values.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (name, value) in &self.metrics {
            if name.trim().is_empty() {
                return Err(RegistryError::validation(
                    "backtest_metrics",
                    "metric names must not be empty",
                ));
            }
            if !value.is_finite() {
                return Err(RegistryError::validation(
                    "backtest_metrics",
                    format!("metric '{}' must be a finite number", name),
                ));
            }
        }
        Ok(())
    }
}

/// A stored trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: TrainedModelId,
    pub project_id: ProjectId,
    pub parameter_set_id: ParameterSetId,
    pub training_data_from: Timestamp,
    pub training_data_until: Timestamp,
    /// Serialized model artifact. Opaque to the registry.
    pub model_object: Vec<u8>,
    pub train_timestamp: Timestamp,
    pub deployment_stage: DeploymentStage,
    pub backtest: Option<Backtest>,
}

impl TrainedModel {
    /// Whether the latest recorded backtest passed (`false` if none).
    #[must_use]
    pub fn passed_backtesting(&self) -> bool {
        self.backtest.as_ref().is_some_and(|b| b.passed)
    }
}

impl Record for TrainedModel {
    const TABLE: Table = Table::TrainedModels;

    fn id(&self) -> u64 {
        self.id.0
    }

    fn assign_id(&mut self, id: u64) {
        self.id = TrainedModelId(id);
    }
}

/// Input for [`TrainedModels::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrainedModel {
    pub project_id: ProjectId,
    pub parameter_set_id: ParameterSetId,
    pub training_data_from: Timestamp,
    pub training_data_until: Timestamp,
    pub model_object: Vec<u8>,
    pub train_timestamp: Timestamp,
    /// Backtest already run by the training job, if any.
    pub backtest: Option<Backtest>,
}

impl NewTrainedModel {
    fn validate(&self) -> Result<(), RegistryError> {
        if self.training_data_until <= self.training_data_from {
            return Err(RegistryError::validation(
                "training_data_until",
                format!(
                    "{} must be after training_data_from {}",
                    self.training_data_until, self.training_data_from
                ),
            ));
        }
        if self.model_object.is_empty() {
            return Err(RegistryError::validation("model_object", "must not be empty"));
        }
        match &self.backtest {
            Some(backtest) => backtest.validate(),
            None => Ok(()),
        }
    }

    fn into_record(self) -> TrainedModel {
        TrainedModel {
            id: TrainedModelId(0),
            project_id: self.project_id,
            parameter_set_id: self.parameter_set_id,
            training_data_from: self.training_data_from,
            training_data_until: self.training_data_until,
            model_object: self.model_object,
            train_timestamp: self.train_timestamp,
            deployment_stage: DeploymentStage::INITIAL,
            backtest: self.backtest,
        }
    }
}

/// Criteria for [`TrainedModels::list`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainedModelFilter {
    pub project_id: Option<ProjectId>,
    pub parameter_set_id: Option<ParameterSetId>,
    pub deployment_stage: Option<DeploymentStage>,
    pub limit: Option<usize>,
}

impl TrainedModelFilter {
    fn matches(&self, model: &TrainedModel) -> bool {
        self.project_id.is_none_or(|p| model.project_id == p)
            && self.parameter_set_id.is_none_or(|p| model.parameter_set_id == p)
            && self.deployment_stage.is_none_or(|s| model.deployment_stage == s)
    }
}

fn load<R: StoreRead>(reader: &R, id: TrainedModelId) -> Result<TrainedModel, RegistryError> {
    reader
        .find_by_id(id.0)?
        .ok_or(RegistryError::TrainedModelNotFound(id))
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Trained model operations over a borrowed store.
#[derive(Debug)]
pub struct TrainedModels<'s, S: Store> {
    store: &'s S,
}

impl<'s, S: Store> TrainedModels<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Register a model in stage `training`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the parameter set does not exist
    /// - `Validation` if the project differs from the parameter set's project,
    ///   the training data range is empty, the artifact is empty or the
    ///   initial backtest is malformed
    pub fn create(&self, new: NewTrainedModel) -> Result<TrainedModelId, RegistryError> {
        new.validate()?;

        let mut txn = self.store.begin()?;
        let parameter_set = parameter_set::load(&txn, new.parameter_set_id)?;
        if parameter_set.project_id != new.project_id {
            return Err(RegistryError::validation(
                "project_id",
                format!(
                    "parameter set {} belongs to project {}, not {}",
                    parameter_set.id, parameter_set.project_id, new.project_id
                ),
            ));
        }

        let mut record = new.into_record();
        let id = TrainedModelId(txn.insert(&mut record)?);
        txn.commit()?;

        tracing::info!(
            model_id = %id,
            project_id = %record.project_id,
            parameter_set_id = %record.parameter_set_id,
            model_object_bytes = record.model_object.len(),
            "trained_model_created"
        );
        Ok(id)
    }

    /// Fetch a trained model by id.
    pub fn get(&self, id: TrainedModelId) -> Result<TrainedModel, RegistryError> {
        load(&self.store.snapshot()?, id)
    }

    /// Every trained model matching `filter`, in creation order.
    pub fn list(&self, filter: &TrainedModelFilter) -> Result<Vec<TrainedModel>, RegistryError> {
        let snapshot = self.store.snapshot()?;
        let mut models: Vec<TrainedModel> =
            snapshot.find_where(|model: &TrainedModel| filter.matches(model))?;
        if let Some(limit) = filter.limit {
            models.truncate(limit);
        }
        Ok(models)
    }

    /// Attach backtest results, replacing any earlier ones.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the model does not exist
    /// - `Validation` if a metric is malformed
    /// - `StageLocked` once the model has left `training` and `testing`
    pub fn record_backtest(
        &self,
        id: TrainedModelId,
        backtest: Backtest,
    ) -> Result<TrainedModel, RegistryError> {
        backtest.validate()?;

        let mut txn = self.store.begin()?;
        let mut model = load(&txn, id)?;
        if !model.deployment_stage.accepts_backtest() {
            return Err(RegistryError::StageLocked {
                model_id: id,
                stage: model.deployment_stage,
            });
        }

        model.backtest = Some(backtest);
        txn.update(&model)?
            .ok_or(RegistryError::TrainedModelNotFound(id))?;
        txn.commit()?;

        tracing::info!(
            model_id = %id,
            project_id = %model.project_id,
            passed = model.passed_backtesting(),
            "backtest_recorded"
        );
        Ok(model)
    }

    /// Move a model to `target` along the stage machine.
    ///
    /// Moving to the current stage returns the model unchanged.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the model does not exist
    /// - `InvalidTransition` if `target` is not reachable from the current stage
    /// - `BacktestRequired` if `target` is gated and no passing backtest exists
    pub fn promote(
        &self,
        id: TrainedModelId,
        target: DeploymentStage,
    ) -> Result<TrainedModel, RegistryError> {
        let mut txn = self.store.begin()?;
        let mut model = load(&txn, id)?;
        let from = model.deployment_stage;

        let transition = from
            .transition_to(target)
            .ok_or(RegistryError::InvalidTransition {
                model_id: id,
                from,
                to: target,
            })?;

        match transition {
            Transition::Stay => return Ok(model),
            Transition::Advance {
                requires_backtest: true,
            } if !model.passed_backtesting() => {
                return Err(RegistryError::BacktestRequired {
                    model_id: id,
                    target,
                });
            }
            Transition::Advance { .. } | Transition::Retire => {}
        }

        model.deployment_stage = target;
        txn.update(&model)?
            .ok_or(RegistryError::TrainedModelNotFound(id))?;
        txn.commit()?;

        tracing::info!(
            model_id = %id,
            project_id = %model.project_id,
            from = %from,
            to = %target,
            "deployment_stage_changed"
        );
        Ok(model)
    }

    /// Number of stored trained models.
    pub fn count(&self) -> Result<usize, RegistryError> {
        self.store.snapshot()?.count(Table::TrainedModels)
    }
}

// =============================================================================
// TESTS
// =============================================================================
