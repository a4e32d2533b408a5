//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! JSON mode prints the same bodies the HTTP API returns.

use crate::api::{
    self, ParameterSetListResponse, ParameterSetResponse, StatusResponse,
    TrainedModelListResponse, TrainedModelResponse, TrainedModelSummary,
};
use crate::config::{BackendKind, Config};
use crate::error::AppError;
use ringling_core::{
    DeploymentStage, ParameterSet, ParameterSetFilter, ParameterSetId, ProjectId, RegistryError,
    RegistryService, StorageBackend, Timestamp, TrainedModel, TrainedModelFilter, TrainedModelId,
};
use serde::Serialize;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), AppError> {
    let store = config.storage.open()?;

    println!("Ringling Registry Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", config.server.addr());
    println!("  Backend:  {}", config.storage.backend);
    if config.storage.backend == BackendKind::Redb {
        println!("  Database: {:?}", config.storage.path);
    }
    println!();
    println!("Endpoints:");
    println!("  POST  /v1/parameter_sets                          - Register a parameter set");
    println!("  GET   /v1/parameter_sets                          - List parameter sets");
    println!("  PUT   /v1/parameter_sets/{{id}}                     - Replace activation window");
    println!("  GET   /v1/projects/{{project_id}}/active_parameter_set - Active set");
    println!("  POST  /v1/trained_models                          - Register a trained model");
    println!("  GET   /v1/trained_models                          - List trained models");
    println!("  PUT   /v1/trained_models/{{id}}/backtest            - Record a backtest");
    println!("  PATCH /v1/trained_models/{{id}}                     - Change deployment stage");
    println!("  GET   /status                                     - Row counts");
    println!("  GET   /health                                     - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config, store).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), AppError> {
    if config.storage.backend == BackendKind::Memory {
        println!("Memory backend selected; nothing to initialize");
        return Ok(());
    }

    let path = &config.storage.path;
    if path.exists() {
        if !force {
            return Err(AppError::config(format!(
                "database {:?} already exists. Use --force to overwrite.",
                path
            )));
        }
        std::fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "removed existing database");
    }

    config.storage.open()?;
    println!("Initialized new redb database at {:?}", path);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show registry row counts.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let status = registry.status()?;
    let response = StatusResponse::new(&config.storage.backend.to_string(), status);

    if json_mode {
        print_json(&response);
        return Ok(());
    }

    println!("Ringling Registry Status");
    println!("========================");
    println!("Backend:  {}", response.backend);
    if config.storage.backend == BackendKind::Redb {
        println!("Database: {:?}", config.storage.path);
    }
    println!();
    println!("Parameter Sets: {}", response.parameter_sets);
    println!("Trained Models: {}", response.trained_models);

    Ok(())
}

// =============================================================================
// PARAMETER SET COMMANDS
// =============================================================================

/// List parameter sets.
pub fn cmd_parameter_set_list(
    config: &Config,
    json_mode: bool,
    project: Option<u64>,
    limit: Option<usize>,
) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let filter = ParameterSetFilter {
        project_id: project.map(ProjectId),
        active_at: None,
        limit,
    };
    let sets = registry.parameter_sets().list(&filter)?;
    let now = Timestamp::now();

    if json_mode {
        let parameter_sets = sets
            .iter()
            .map(|set| ParameterSetResponse::from_record(set, now))
            .collect::<Result<Vec<_>, RegistryError>>()?;
        print_json(&ParameterSetListResponse { parameter_sets });
        return Ok(());
    }

    if sets.is_empty() {
        println!("No parameter sets");
        return Ok(());
    }

    println!(
        "{:>6}  {:>8}  {:<26}  {:<26}  {}",
        "ID", "PROJECT", "ACTIVE FROM", "ACTIVE UNTIL", "ACTIVE"
    );
    for set in &sets {
        println!(
            "{:>6}  {:>8}  {:<26}  {:<26}  {}",
            set.id.0,
            set.project_id.0,
            set.activation.active_from.to_string(),
            until_label(set),
            if set.is_active_at(now) { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// Show one parameter set.
pub fn cmd_parameter_set_show(config: &Config, json_mode: bool, id: u64) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let set = registry.parameter_sets().get(ParameterSetId(id))?;
    print_parameter_set(&set, json_mode)
}

/// Show the parameter set active for a project.
pub fn cmd_parameter_set_active(
    config: &Config,
    json_mode: bool,
    project: u64,
    at: Option<Timestamp>,
) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let at = at.unwrap_or_else(Timestamp::now);

    match registry.parameter_sets().active_at(ProjectId(project), at)? {
        Some(set) => print_parameter_set(&set, json_mode),
        None => {
            if json_mode {
                println!("null");
            } else {
                println!("No parameter set of project {} is active at {}", project, at);
            }
            Ok(())
        }
    }
}

fn print_parameter_set(set: &ParameterSet, json_mode: bool) -> Result<(), AppError> {
    if json_mode {
        print_json(&ParameterSetResponse::from_record(set, Timestamp::now())?);
        return Ok(());
    }

    println!("Parameter Set {}", set.id);
    println!("================");
    println!("Project:                  {}", set.project_id);
    println!("Minimum Software Version: {}", set.minimum_software_version);
    println!("Active From:              {}", set.activation.active_from);
    println!("Active Until:             {}", until_label(set));
    println!("Training Parameters:      {}", set.training_parameters.as_str());
    if let Some(metadata) = &set.metadata {
        println!("Metadata:                 {}", metadata.as_str());
    }
    Ok(())
}

fn until_label(set: &ParameterSet) -> String {
    set.activation
        .active_until
        .map(|until| until.to_string())
        .unwrap_or_else(|| "-".to_string())
}

// =============================================================================
// TRAINED MODEL COMMANDS
// =============================================================================

/// List trained models.
pub fn cmd_model_list(
    config: &Config,
    json_mode: bool,
    project: Option<u64>,
    stage: Option<DeploymentStage>,
    limit: Option<usize>,
) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let filter = TrainedModelFilter {
        project_id: project.map(ProjectId),
        parameter_set_id: None,
        deployment_stage: stage,
        limit,
    };
    let models = registry.trained_models().list(&filter)?;

    if json_mode {
        print_json(&TrainedModelListResponse {
            trained_models: models.iter().map(TrainedModelSummary::from).collect(),
        });
        return Ok(());
    }

    if models.is_empty() {
        println!("No trained models");
        return Ok(());
    }

    println!(
        "{:>6}  {:>8}  {:>8}  {:<10}  {}",
        "ID", "PROJECT", "PARAMS", "STAGE", "BACKTEST"
    );
    for model in &models {
        println!(
            "{:>6}  {:>8}  {:>8}  {:<10}  {}",
            model.id.0,
            model.project_id.0,
            model.parameter_set_id.0,
            model.deployment_stage.as_str(),
            backtest_label(model)
        );
    }
    Ok(())
}

/// Show one trained model.
pub fn cmd_model_show(config: &Config, json_mode: bool, id: u64) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let model = registry.trained_models().get(TrainedModelId(id))?;
    print_model(&model, json_mode);
    Ok(())
}

/// Change the deployment stage of a model.
pub fn cmd_model_promote(
    config: &Config,
    json_mode: bool,
    id: u64,
    stage: DeploymentStage,
) -> Result<(), AppError> {
    let registry = open_registry(config)?;
    let model = registry.trained_models().promote(TrainedModelId(id), stage)?;

    if !json_mode {
        println!("Model {} is now in {}", model.id, model.deployment_stage);
        println!();
    }
    print_model(&model, json_mode);
    Ok(())
}

fn print_model(model: &TrainedModel, json_mode: bool) {
    if json_mode {
        print_json(&TrainedModelResponse::from(model));
        return;
    }

    println!("Trained Model {}", model.id);
    println!("================");
    println!("Project:          {}", model.project_id);
    println!("Parameter Set:    {}", model.parameter_set_id);
    println!(
        "Training Data:    {} .. {}",
        model.training_data_from, model.training_data_until
    );
    println!("Trained At:       {}", model.train_timestamp);
    println!("Deployment Stage: {}", model.deployment_stage);
    println!("Artifact:         {} bytes", model.model_object.len());
    println!("Backtest:         {}", backtest_label(model));
    if let Some(backtest) = &model.backtest {
        println!("Backtested At:    {}", backtest.timestamp);
        for (name, value) in &backtest.metrics {
            println!("  {:<14}  {}", name, value);
        }
    }
}

fn backtest_label(model: &TrainedModel) -> &'static str {
    match &model.backtest {
        None => "none",
        Some(backtest) if backtest.passed => "passed",
        Some(_) => "failed",
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store and wrap it in a registry.
pub fn open_registry(config: &Config) -> Result<RegistryService<StorageBackend>, AppError> {
    Ok(RegistryService::new(config.storage.open()?))
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ringling_core::{ActivationWindow, Document, NewParameterSet};

    fn redb_config(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.storage.path = dir.path().join("registry.redb");
        config
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = redb_config(&dir);

        cmd_init(&config, false).expect("first init");
        assert!(config.storage.path.exists());

        let err = cmd_init(&config, false).expect_err("second init");
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn init_with_force_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = redb_config(&dir);

        {
            let registry = open_registry(&config).expect("open");
            registry
                .parameter_sets()
                .create(NewParameterSet {
                    project_id: ProjectId(1),
                    training_parameters: Document::parse("{}").expect("doc"),
                    minimum_software_version: 1,
                    activation: ActivationWindow::open_ended(
                        Timestamp::from_unix_seconds(0).expect("ts"),
                    ),
                    metadata: None,
                })
                .expect("create");
        }

        cmd_init(&config, true).expect("forced init");
        let registry = open_registry(&config).expect("reopen");
        assert_eq!(registry.status().expect("status").parameter_sets, 0);
    }

    #[test]
    fn missing_model_is_not_found() {
        let mut config = Config::default();
        config.storage.backend = BackendKind::Memory;

        let err = cmd_model_show(&config, true, 42).expect_err("missing");
        assert!(matches!(
            err,
            AppError::Registry(RegistryError::TrainedModelNotFound(TrainedModelId(42)))
        ));
    }
}
