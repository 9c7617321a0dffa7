use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Budget of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Maximum number of expanded nodes.
    pub max_expansions: usize,
    /// Wall-clock limit in milliseconds.
    pub max_duration_ms: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_expansions: 10_000,
            max_duration_ms: 2_000,
        }
    }
}

impl SearchLimits {
    /// Sets the expansion budget.
    #[must_use]
    pub const fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn with_max_duration_ms(mut self, max_duration_ms: u64) -> Self {
        self.max_duration_ms = max_duration_ms;
        self
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either budget is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_expansions == 0 {
            return Err(ValidationError::InvalidSearchLimits {
                reason: "max_expansions must be > 0".to_string(),
            });
        }
        if self.max_duration_ms == 0 {
            return Err(ValidationError::InvalidSearchLimits {
                reason: "max_duration_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
