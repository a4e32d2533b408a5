//! # Registry Service
//!
//! Composition root shared by the HTTP API and the CLI. Owns the injected
//! store and hands out registries borrowing it.

use crate::parameter_set::ParameterSets;
use crate::storage::Store;
use crate::trained_model::TrainedModels;
use crate::RegistryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Row counts reported by [`RegistryService::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub parameter_sets: usize,
    pub trained_models: usize,
}

/// Entry point to both registries over one store.
#[derive(Debug)]
pub struct RegistryService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for RegistryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> RegistryService<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn parameter_sets(&self) -> ParameterSets<'_, S> {
        ParameterSets::new(&self.store)
    }

    pub fn trained_models(&self) -> TrainedModels<'_, S> {
        TrainedModels::new(&self.store)
    }

    /// Current row counts.
    pub fn status(&self) -> Result<RegistryStatus, RegistryError> {
        Ok(RegistryStatus {
            parameter_sets: self.parameter_sets().count()?,
            trained_models: self.trained_models().count()?,
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}
