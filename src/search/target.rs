use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConditionError, ValidationError};
use crate::knowledge::ObjectId;
use crate::operator::action_applicable;
use crate::session::SessionView;

/// A goal of the search: a group of actions with a benefit.
///
/// A target is reached once all of its actions are applicable; they are
/// then appended to the path as its final steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    actions: Vec<ObjectId>,
    benefit: f64,
}

impl Target {
    /// Creates a target.
    ///
    /// # Errors
    ///
    /// `EmptyTarget` without actions, `InvalidBenefit` unless the benefit is
    /// finite and positive.
    pub fn new(actions: Vec<ObjectId>, benefit: f64) -> Result<Self, ValidationError> {
        if actions.is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if !(benefit.is_finite() && benefit > 0.0) {
            return Err(ValidationError::InvalidBenefit { benefit });
        }
        Ok(Self { actions, benefit })
    }

    /// A single-action target.
    ///
    /// # Errors
    ///
    /// `InvalidBenefit` unless the benefit is finite and positive.
    pub fn single(action: ObjectId, benefit: f64) -> Result<Self, ValidationError> {
        Self::new(vec![action], benefit)
    }

    /// Actions that must all become applicable.
    #[must_use]
    pub fn actions(&self) -> &[ObjectId] {
        &self.actions
    }

    /// Benefit of reaching the target.
    #[must_use]
    pub const fn benefit(&self) -> f64 {
        self.benefit
    }

    #[must_use]
    pub(crate) fn with_benefit(&self, benefit: f64) -> Self {
        Self {
            actions: self.actions.clone(),
            benefit,
        }
    }

    /// Returns true if every action of the target is applicable in `session`.
    ///
    /// # Errors
    ///
    /// Structural condition errors only.
    pub fn is_reached(&self, session: &dyn SessionView) -> Result<bool, ConditionError> {
        for action in &self.actions {
            if !action_applicable(session, *action)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Who chose the targets of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOrigin {
    /// Derived from the strategic situation.
    #[default]
    Derived,
    /// Selected by the user. Permanently relevant actions may then be targeted.
    UserSelected,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(f, "[{}] (benefit {})", names.join(", "), self.benefit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_non_positive_targets() {
        assert!(matches!(Target::new(vec![], 1.0), Err(ValidationError::EmptyTarget)));
        assert!(matches!(
            Target::single(ObjectId::new(1), 0.0),
            Err(ValidationError::InvalidBenefit { .. })
        ));
        assert!(Target::single(ObjectId::new(1), f64::NAN).is_err());
        assert!(Target::single(ObjectId::new(1), 2.0).is_ok());
    }
}
