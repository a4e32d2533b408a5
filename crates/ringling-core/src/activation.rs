//! # Activation Windows
//!
//! A parameter set is the active configuration of its project during the
//! half-open interval `[active_from, active_until)`. An absent `active_until`
//! means the window is still open.
//!
//! Within a project, windows never overlap. When a new window is registered
//! while an older open-ended one exists, the older window is closed at the new
//! `active_from` (superseded). Any other overlap is a conflict.

use crate::{ParameterSetId, RegistryError, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTIVATION WINDOW
// =============================================================================

/// The interval during which a parameter set is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationWindow {
    /// Inclusive start.
    pub active_from: Timestamp,
    /// Exclusive end; `None` keeps the window open.
    pub active_until: Option<Timestamp>,
}

impl ActivationWindow {
    /// Create a window, rejecting an end that is not after the start.
    pub fn new(
        active_from: Timestamp,
        active_until: Option<Timestamp>,
    ) -> Result<Self, RegistryError> {
        let window = Self {
            active_from,
            active_until,
        };
        window.validate()?;
        Ok(window)
    }

    /// Create a window with no end.
    #[must_use]
    pub fn open_ended(active_from: Timestamp) -> Self {
        Self {
            active_from,
            active_until: None,
        }
    }

    /// Check `active_until > active_from`.
    pub fn validate(&self) -> Result<(), RegistryError> {
        match self.active_until {
            Some(until) if until <= self.active_from => Err(RegistryError::validation(
                "active_until",
                format!(
                    "{} must be after active_from {}",
                    until, self.active_from
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Whether the window has no end.
    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.active_until.is_none()
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: Timestamp) -> bool {
        self.active_from <= at && self.active_until.is_none_or(|until| at < until)
    }

    /// Whether the two windows share at least one instant.
    #[must_use]
    pub fn overlaps(&self, other: &ActivationWindow) -> bool {
        let starts_before_other_ends = other
            .active_until
            .is_none_or(|until| self.active_from < until);
        let other_starts_before_self_ends = self
            .active_until
            .is_none_or(|until| other.active_from < until);
        starts_before_other_ends && other_starts_before_self_ends
    }

    /// The same window with its end set to `until`.
    #[must_use]
    pub fn closed_at(&self, until: Timestamp) -> Self {
        Self {
            active_from: self.active_from,
            active_until: Some(until),
        }
    }
}

// =============================================================================
// OVERLAP RESOLUTION
// =============================================================================

/// How overlaps with sibling windows are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Close an older open-ended sibling at the new start; reject anything else.
    /// Used when registering a new parameter set.
    SupersedeOpenEnded,
    /// Reject every overlap. Used when editing an existing window.
    Reject,
}

/// Decide what registering `window` next to `siblings` requires.
///
/// Returns the siblings whose windows must be closed at
/// `window.active_from`, or the id of the first sibling that conflicts.
pub fn resolve_overlaps<'a>(
    window: &ActivationWindow,
    siblings: impl IntoIterator<Item = (ParameterSetId, &'a ActivationWindow)>,
    policy: OverlapPolicy,
) -> Result<Vec<ParameterSetId>, ParameterSetId> {
    let mut superseded = Vec::new();

    for (id, existing) in siblings {
        if !existing.overlaps(window) {
            continue;
        }

        let supersedable = policy == OverlapPolicy::SupersedeOpenEnded
            && existing.is_open_ended()
            && existing.active_from < window.active_from;

        if supersedable {
            superseded.push(id);
        } else {
            return Err(id);
        }
    }

    Ok(superseded)
}

// =============================================================================
// TESTS
// =============================================================================
