//! World configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tunables for a [`crate::World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Per-subscription stream buffer capacity.
    pub stream_capacity: usize,
    /// Cache `effective` per (node, kind) for the duration of one call.
    pub memoize_resolution: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            stream_capacity: 1024,
            memoize_resolution: true,
        }
    }
}

impl WorldConfig {
    /// Validate the configuration.
    ///
    /// This must be called before constructing a `World`; the constructors do
    /// it for you.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stream_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                field: "stream_capacity".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
