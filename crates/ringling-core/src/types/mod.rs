//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Ringling registry:
//! - Identifiers (`ProjectId`, `ParameterSetId`, `TrainedModelId`)
//! - Time (`Timestamp`)
//! - Opaque payloads (`Document`)
//! - Error types (`RegistryError`, `ErrorKind`)
//!
//! ## Wire Compatibility
//!
//! `Timestamp` renders exactly like an offset-free ISO-8601 string produced by
//! most client libraries, so a timestamp read back from the registry compares
//! equal, as text, to the one that was sent.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of the project that owns parameter sets and trained models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

/// Storage-assigned identifier of a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterSetId(pub u64);

/// Storage-assigned identifier of a trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrainedModelId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParameterSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TrainedModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// A UTC instant without an attached offset.
///
/// Rendered as `YYYY-MM-DDTHH:MM:SS[.ffffff|.fffffffff]`:
/// no fraction when sub-seconds are zero, six digits for whole microseconds,
/// nine digits otherwise. Parsing also accepts RFC 3339 with an offset,
/// normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().naive_utc())
    }

    /// Build a timestamp from whole seconds since the Unix epoch.
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(|dt| Self(dt.naive_utc()))
    }

    /// Seconds since the Unix epoch (sub-seconds truncated).
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(with_offset.naive_utc()));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.nanosecond();
        let format = if nanos == 0 {
            "%Y-%m-%dT%H:%M:%S"
        } else if nanos % 1_000 == 0 {
            "%Y-%m-%dT%H:%M:%S%.6f"
        } else {
            "%Y-%m-%dT%H:%M:%S%.9f"
        };
        write!(f, "{}", self.0.format(format))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", text, e)))
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// An opaque JSON document stored as the exact text it was received as.
///
/// The registry never interprets a document; it only checks that the text is
/// well-formed JSON so that it can be embedded verbatim in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(String);

impl Document {
    /// Wrap JSON text, rejecting anything that is not a single JSON value.
    pub fn parse(text: impl Into<String>) -> Result<Self, RegistryError> {
        let text = text.into();
        serde_json::from_str::<serde::de::IgnoredAny>(&text)
            .map_err(|e| RegistryError::Serialization(format!("document is not JSON: {}", e)))?;
        Ok(Self(text))
    }

    /// The stored JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the stored text back into a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, RegistryError> {
        serde_json::from_str(&self.0).map_err(|e| RegistryError::Serialization(e.to_string()))
    }

    /// Whether the document is the JSON literal `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.trim() == "null"
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Machine-readable category of a [`RegistryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InvalidTransition,
    BacktestRequired,
    Storage,
}

impl ErrorKind {
    /// Stable snake_case name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::BacktestRequired => "backtest_required",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the registry.
///
/// Every variant carries the identifiers needed to render it without a second
/// lookup. Storage failures are wrapped, never swallowed or retried.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A field is missing, malformed or out of range.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// No parameter set has the given id.
    #[error("Parameter set not found: {0}")]
    ParameterSetNotFound(ParameterSetId),

    /// No trained model has the given id.
    #[error("Trained model not found: {0}")]
    TrainedModelNotFound(TrainedModelId),

    /// The activation window would make two parameter sets of one project
    /// active at the same instant. `parameter_set_id` is `None` on create.
    #[error("Activation window overlaps parameter set {conflicting_id} in project {project_id}")]
    Conflict {
        project_id: ProjectId,
        parameter_set_id: Option<ParameterSetId>,
        conflicting_id: ParameterSetId,
    },

    /// The requested stage is not reachable from the current one.
    #[error("Trained model {model_id} cannot move from {from} to {to}")]
    InvalidTransition {
        model_id: TrainedModelId,
        from: crate::DeploymentStage,
        to: crate::DeploymentStage,
    },

    /// Backtest results can no longer be attached in this stage.
    #[error("Trained model {model_id} is in stage {stage}; backtests are only accepted in training or testing")]
    StageLocked {
        model_id: TrainedModelId,
        stage: crate::DeploymentStage,
    },

    /// Promotion requires a recorded, passing backtest.
    #[error("Trained model {model_id} needs a passing backtest before moving to {target}")]
    BacktestRequired {
        model_id: TrainedModelId,
        target: crate::DeploymentStage,
    },

    /// The underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A row or payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RegistryError {
    /// Shorthand for a validation failure.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The machine-readable category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation { .. } => ErrorKind::Validation,
            RegistryError::ParameterSetNotFound(_) | RegistryError::TrainedModelNotFound(_) => {
                ErrorKind::NotFound
            }
            RegistryError::Conflict { .. } => ErrorKind::Conflict,
            RegistryError::InvalidTransition { .. } | RegistryError::StageLocked { .. } => {
                ErrorKind::InvalidTransition
            }
            RegistryError::BacktestRequired { .. } => ErrorKind::BacktestRequired,
            RegistryError::Storage(_) | RegistryError::Serialization(_) => ErrorKind::Storage,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
