//! # Parameter Set Registry
//!
//! Training configurations per project, each with an activation window.
//!
//! Creating a parameter set whose window starts after an older open-ended
//! window closes that older window at the new start. Every other overlap
//! within a project is rejected, so a project never has two active sets at the
//! same instant. Windows can be edited later, but an edit never supersedes.

use crate::activation::{ActivationWindow, OverlapPolicy, resolve_overlaps};
use crate::storage::{Record, Store, StoreRead, StoreWrite, Table};
use crate::{Document, ParameterSetId, ProjectId, RegistryError, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// RECORDS
// =============================================================================

/// A stored parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub id: ParameterSetId,
    pub project_id: ProjectId,
    /// Opaque training configuration, kept as the exact JSON text received.
    pub training_parameters: Document,
    pub minimum_software_version: u32,
    pub activation: ActivationWindow,
    /// Free-form client annotations.
    pub metadata: Option<Document>,
}

impl ParameterSet {
    /// Whether this set is the active one of its project at `at`.
    #[must_use]
    pub fn is_active_at(&self, at: Timestamp) -> bool {
        self.activation.contains(at)
    }
}

impl Record for ParameterSet {
    const TABLE: Table = Table::ParameterSets;

    fn id(&self) -> u64 {
        self.id.0
    }

    fn assign_id(&mut self, id: u64) {
        self.id = ParameterSetId(id);
    }
}

/// Input for [`ParameterSets::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameterSet {
    pub project_id: ProjectId,
    pub training_parameters: Document,
    pub minimum_software_version: u32,
    pub activation: ActivationWindow,
    pub metadata: Option<Document>,
}

impl NewParameterSet {
    fn validate(&self) -> Result<(), RegistryError> {
        if self.training_parameters.is_null() {
            return Err(RegistryError::validation(
                "training_parameters",
                "must not be null",
            ));
        }
        self.activation.validate()
    }

    fn into_record(self) -> ParameterSet {
        ParameterSet {
            id: ParameterSetId(0),
            project_id: self.project_id,
            training_parameters: self.training_parameters,
            minimum_software_version: self.minimum_software_version,
            activation: self.activation,
            metadata: self.metadata,
        }
    }
}

/// Criteria for [`ParameterSets::list`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterSetFilter {
    pub project_id: Option<ProjectId>,
    /// Only sets whose window contains this instant.
    pub active_at: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl ParameterSetFilter {
    fn matches(&self, set: &ParameterSet) -> bool {
        self.project_id.is_none_or(|project| set.project_id == project)
            && self.active_at.is_none_or(|at| set.is_active_at(at))
    }
}

/// Fetch one parameter set, failing with `NotFound` when absent.
pub(crate) fn load<R: StoreRead>(
    reader: &R,
    id: ParameterSetId,
) -> Result<ParameterSet, RegistryError> {
    reader
        .find_by_id(id.0)?
        .ok_or(RegistryError::ParameterSetNotFound(id))
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Parameter set operations over a borrowed store.
#[derive(Debug)]
pub struct ParameterSets<'s, S: Store> {
    store: &'s S,
}

impl<'s, S: Store> ParameterSets<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Register a new parameter set, superseding an older open-ended sibling.
    ///
    /// # Errors
    ///
    /// - `Validation` if the window is inverted or the parameters are `null`
    /// - `Conflict` if the window overlaps a sibling that cannot be superseded
    pub fn create(&self, new: NewParameterSet) -> Result<ParameterSetId, RegistryError> {
        new.validate()?;
        let project_id = new.project_id;
        let active_from = new.activation.active_from;

        let mut txn = self.store.begin()?;
        let siblings: Vec<ParameterSet> =
            txn.find_where(|set: &ParameterSet| set.project_id == project_id)?;

        let superseded = resolve_overlaps(
            &new.activation,
            siblings.iter().map(|set| (set.id, &set.activation)),
            OverlapPolicy::SupersedeOpenEnded,
        )
        .map_err(|conflicting_id| RegistryError::Conflict {
            project_id,
            parameter_set_id: None,
            conflicting_id,
        })?;

        for mut sibling in siblings
            .into_iter()
            .filter(|set| superseded.contains(&set.id))
        {
            sibling.activation = sibling.activation.closed_at(active_from);
            txn.update(&sibling)?
                .ok_or(RegistryError::ParameterSetNotFound(sibling.id))?;
        }

        let mut record = new.into_record();
        let id = ParameterSetId(txn.insert(&mut record)?);
        txn.commit()?;

        for closed in &superseded {
            tracing::info!(
                parameter_set_id = %closed,
                superseded_by = %id,
                project_id = %project_id,
                active_until = %active_from,
                "parameter_set_superseded"
            );
        }
        tracing::info!(
            parameter_set_id = %id,
            project_id = %project_id,
            active_from = %active_from,
            "parameter_set_created"
        );
        Ok(id)
    }

    /// Fetch a parameter set by id.
    pub fn get(&self, id: ParameterSetId) -> Result<ParameterSet, RegistryError> {
        load(&self.store.snapshot()?, id)
    }

    /// Every parameter set matching `filter`, in creation order.
    pub fn list(&self, filter: &ParameterSetFilter) -> Result<Vec<ParameterSet>, RegistryError> {
        let snapshot = self.store.snapshot()?;
        let mut sets: Vec<ParameterSet> =
            snapshot.find_where(|set: &ParameterSet| filter.matches(set))?;
        if let Some(limit) = filter.limit {
            sets.truncate(limit);
        }
        Ok(sets)
    }

    /// Replace the activation window of an existing parameter set.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no set has this id
    /// - `Validation` if the window is inverted
    /// - `Conflict` if the window overlaps any sibling
    pub fn update_activation_window(
        &self,
        id: ParameterSetId,
        window: ActivationWindow,
    ) -> Result<ParameterSet, RegistryError> {
        window.validate()?;

        let mut txn = self.store.begin()?;
        let mut set = load(&txn, id)?;
        let project_id = set.project_id;
        let siblings: Vec<ParameterSet> = txn.find_where(|other: &ParameterSet| {
            other.project_id == project_id && other.id != id
        })?;

        resolve_overlaps(
            &window,
            siblings.iter().map(|other| (other.id, &other.activation)),
            OverlapPolicy::Reject,
        )
        .map_err(|conflicting_id| RegistryError::Conflict {
            project_id,
            parameter_set_id: Some(id),
            conflicting_id,
        })?;

        set.activation = window;
        txn.update(&set)?
            .ok_or(RegistryError::ParameterSetNotFound(id))?;
        txn.commit()?;

        tracing::info!(
            parameter_set_id = %id,
            project_id = %project_id,
            active_from = %window.active_from,
            active_until = ?window.active_until.map(|t| t.to_string()),
            "activation_window_updated"
        );
        Ok(set)
    }

    /// The parameter set of `project_id` active at `at`, if any.
    pub fn active_at(
        &self,
        project_id: ProjectId,
        at: Timestamp,
    ) -> Result<Option<ParameterSet>, RegistryError> {
        let filter = ParameterSetFilter {
            project_id: Some(project_id),
            active_at: Some(at),
            limit: Some(1),
        };
        Ok(self.list(&filter)?.into_iter().next())
    }

    /// Number of stored parameter sets.
    pub fn count(&self) -> Result<usize, RegistryError> {
        self.store.snapshot()?.count(Table::ParameterSets)
    }
}

// =============================================================================
// TESTS
// =============================================================================
