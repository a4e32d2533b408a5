//! # Deployment Stages
//!
//! The promotion lifecycle of a trained model:
//!
//! | Stage | Next | Backtest gate |
//! |-------|------|---------------|
//! | training | testing | no |
//! | testing | staging | passing backtest required |
//! | staging | production | passing backtest required |
//! | production | - | - |
//! | retired | - (terminal) | - |
//!
//! `retired` is reachable from every other stage and nothing leaves it.
//! Moving to the current stage is a no-op.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Promotion state of a trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    Training,
    Testing,
    Staging,
    Production,
    Retired,
}

/// Outcome of checking a stage change against the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current stage; nothing to write.
    Stay,
    /// One step forward along the progression.
    Advance { requires_backtest: bool },
    /// Escape to the terminal `retired` stage.
    Retire,
}

impl DeploymentStage {
    /// Every stage, in progression order.
    pub const ALL: [DeploymentStage; 5] = [
        DeploymentStage::Training,
        DeploymentStage::Testing,
        DeploymentStage::Staging,
        DeploymentStage::Production,
        DeploymentStage::Retired,
    ];

    /// Stage assigned to newly registered models.
    pub const INITIAL: DeploymentStage = DeploymentStage::Training;

    /// Wire name of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStage::Training => "training",
            DeploymentStage::Testing => "testing",
            DeploymentStage::Staging => "staging",
            DeploymentStage::Production => "production",
            DeploymentStage::Retired => "retired",
        }
    }

    /// The next stage along the forward progression, if any.
    #[must_use]
    pub fn next(&self) -> Option<DeploymentStage> {
        match self {
            DeploymentStage::Training => Some(DeploymentStage::Testing),
            DeploymentStage::Testing => Some(DeploymentStage::Staging),
            DeploymentStage::Staging => Some(DeploymentStage::Production),
            DeploymentStage::Production | DeploymentStage::Retired => None,
        }
    }

    /// Check if this stage is terminal (retired).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStage::Retired)
    }

    /// Whether backtest results may still be attached in this stage.
    #[must_use]
    pub fn accepts_backtest(&self) -> bool {
        matches!(self, DeploymentStage::Training | DeploymentStage::Testing)
    }

    /// Look up the move from `self` to `target` in the transition table.
    ///
    /// Returns `None` when the move is illegal (skipping a stage, moving
    /// backward, or leaving `retired`).
    #[must_use]
    pub fn transition_to(self, target: DeploymentStage) -> Option<Transition> {
        match (self, target) {
            (from, to) if from == to => Some(Transition::Stay),
            (from, _) if from.is_terminal() => None,
            (_, DeploymentStage::Retired) => Some(Transition::Retire),
            (from, to) if from.next() == Some(to) => Some(Transition::Advance {
                requires_backtest: from != DeploymentStage::Training,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown deployment stage '{}' (expected training, testing, staging, production or retired)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for DeploymentStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeploymentStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
