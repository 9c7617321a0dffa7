//! Planner configuration.
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration. `validate` runs on every load.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::runtime::RuntimeConfig;
use crate::search::SearchLimits;

/// Pattern of retractable "ok" questions: `ok`, or anything ending in `#ok`.
pub const DEFAULT_RETRACT_PATTERN: &str = "(?i)^(.*#)?ok$";

/// Benefit given to targets the user selected explicitly.
pub const USER_SELECTED_BENEFIT: f64 = 1e10;

/// Configuration of a `Planner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Search budget.
    pub search: SearchLimits,
    /// Background search pool.
    pub runtime: RuntimeConfig,
    /// Plans are only calculated on explicit request.
    pub manual_mode: bool,
    /// Choice names matching this pattern mark a question as retractable.
    pub retract_pattern: String,
    pub user_selected_benefit: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            search: SearchLimits::default(),
            runtime: RuntimeConfig::default(),
            manual_mode: false,
            retract_pattern: DEFAULT_RETRACT_PATTERN.to_string(),
            user_selected_benefit: USER_SELECTED_BENEFIT,
        }
    }
}

impl PlannerConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// `ConfigUnreadable` for malformed JSON, otherwise any error of `validate`.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::ConfigUnreadable {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// `ConfigUnreadable` if the file cannot be read or parsed, otherwise any
    /// error of `validate`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ValidationError::ConfigUnreadable {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Validates all sections.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.search.validate()?;
        self.runtime.validate()?;
        self.compile_retract_pattern()?;
        if !(self.user_selected_benefit.is_finite() && self.user_selected_benefit > 0.0) {
            return Err(ValidationError::InvalidBenefit {
                benefit: self.user_selected_benefit,
            });
        }
        Ok(())
    }

    pub(crate) fn compile_retract_pattern(&self) -> Result<Regex, ValidationError> {
        Regex::new(&self.retract_pattern).map_err(|e| ValidationError::InvalidPattern {
            pattern: self.retract_pattern.clone(),
            reason: e.to_string(),
        })
    }
}
