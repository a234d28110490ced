//! GenerationState type for the coordinator's lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle of a coordinator.
///
/// There is no error state: a failed or silent renderer simply returns the
/// coordinator to `Idle` without a completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// No run in flight.
    #[default]
    Idle,
    /// A run was requested and has not delivered its final notification.
    Generating,
}

impl GenerationState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Generating => "generating",
        }
    }

    /// Returns true while a run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, GenerationState::Generating)
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
