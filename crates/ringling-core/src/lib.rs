//! # ringling-core
//!
//! The registry engine for Ringling - THE LOGIC.
//!
//! This crate keeps two kinds of records for machine-learning projects:
//! - **Parameter sets**: training configurations, each active during a
//!   half-open time window. A project never has two active at once.
//! - **Trained models**: artifacts trained against a parameter set, promoted
//!   through `training → testing → staging → production` and gated by
//!   recorded backtest results.
//!
//! ## Architectural Constraints
//!
//! - Synchronous, with NO async and NO network dependencies
//! - Every mutation runs in exactly one store transaction
//! - The store is injected; there is no global state
//! - Payloads (`training_parameters`, `model_object`) are opaque

// =============================================================================
// MODULES
// =============================================================================

pub mod activation;
pub mod parameter_set;
pub mod service;
pub mod stage;
pub mod storage;
pub mod trained_model;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Document, ErrorKind, ParameterSetId, ProjectId, RegistryError, Timestamp, TrainedModelId,
};

// =============================================================================
// RE-EXPORTS: Registries
// =============================================================================

pub use activation::{ActivationWindow, OverlapPolicy};
pub use parameter_set::{NewParameterSet, ParameterSet, ParameterSetFilter, ParameterSets};
pub use service::{RegistryService, RegistryStatus};
pub use stage::{DeploymentStage, Transition, UnknownStage};
pub use trained_model::{
    Backtest, NewTrainedModel, TrainedModel, TrainedModelFilter, TrainedModels,
};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::{MemoryStore, RedbStore, StorageBackend, Store, StoreRead, StoreWrite};
