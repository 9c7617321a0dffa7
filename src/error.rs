//! Error types for diagplan.
//!
//! All errors are strongly typed using thiserror. The planner distinguishes
//! recoverable planning states (an unanswered precondition, no reachable
//! target) from structural errors that indicate a broken knowledge model.
//! Recoverable states are never surfaced as errors; they become `false` or
//! "no path" values at the call site.

use thiserror::Error;

use crate::knowledge::ObjectId;

/// Validation errors raised while building a knowledge model or a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An id does not name an object of the knowledge base.
    #[error("Unknown object referenced: {id}")]
    UnknownObject {
        id: ObjectId,
    },

    /// An object is used where another kind is required.
    #[error("Object {id} is a {actual}, expected a {expected}")]
    WrongObjectKind {
        id: ObjectId,
        expected: String,
        actual: String,
    },

    /// Two objects share a name.
    #[error("Duplicate object name: {name}")]
    DuplicateName {
        name: String,
    },

    /// An effect does not reference a question.
    #[error("Operator for action {action} has an effect without a question reference")]
    OperatorWithoutQuestion {
        action: ObjectId,
    },

    /// An action has more than one operator.
    #[error("Action {action} has more than one operator")]
    DuplicateOperator {
        action: ObjectId,
    },

    /// Negative or non-finite action cost.
    #[error("Cost {cost} of action {action} must be finite and non-negative")]
    InvalidCost {
        action: ObjectId,
        cost: f64,
    },

    /// Non-positive or non-finite target benefit.
    #[error("Target benefit {benefit} must be finite and positive")]
    InvalidBenefit {
        benefit: f64,
    },

    /// Target without actions.
    #[error("Target must contain at least one action")]
    EmptyTarget,

    /// Zero expansion or time budget.
    #[error("Invalid search limits: {reason}")]
    InvalidSearchLimits {
        reason: String,
    },

    /// Unusable worker pool settings.
    #[error("Invalid runtime configuration: {reason}")]
    InvalidRuntimeConfig {
        reason: String,
    },

    /// Retract pattern does not compile.
    #[error("Invalid retract pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    /// Configuration file missing or malformed.
    #[error("Failed to read configuration: {reason}")]
    ConfigUnreadable {
        reason: String,
    },
}

/// Errors raised while evaluating a condition.
///
/// `NoAnswer` and `UnknownAnswer` mean "not yet applicable" and are folded
/// into `false` by every planner call site. `UnknownObject` is structural.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The question has no value yet.
    #[error("No answer for {object}")]
    NoAnswer {
        object: ObjectId,
    },

    /// The question was answered "unknown".
    #[error("Answer for {object} is unknown")]
    UnknownAnswer {
        object: ObjectId,
    },

    /// The condition names an object outside the knowledge base.
    #[error("Condition references unknown object {object}")]
    UnknownObject {
        object: ObjectId,
    },
}

impl ConditionError {
    /// Returns true if the error only means the condition cannot be decided yet.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoAnswer { .. } | Self::UnknownAnswer { .. })
    }
}

/// Session-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation needs a real session.
    #[error("Operation '{operation}' is unsupported in a simulated session")]
    UnsupportedInSimulation {
        operation: &'static str,
    },
}

/// Execution errors that occur while planning or running a plan.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The search queue is at capacity.
    #[error("Planning queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    /// The search runtime was shut down.
    #[error("Planning runtime disconnected")]
    Disconnected,

    /// No result within the wait limit.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    /// The id does not name an action container.
    #[error("Action {action} is not part of the knowledge base")]
    UnknownAction {
        action: ObjectId,
    },
}

/// Top-level error type for diagplan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Invalid model or configuration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Structural condition error.
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Unsupported session operation.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Planning or runtime failure.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl PlanError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error indicates a broken knowledge model or a core bug.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Session(_) | Self::Internal { .. } => true,
            Self::Condition(e) => !e.is_recoverable(),
            Self::Execution(e) => matches!(e, ExecutionError::UnknownAction { .. }),
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }
            ),
            _ => false,
        }
    }
}

/// Result type alias for diagplan operations.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_in_simulation_names_operation() {
        let err = SessionError::UnsupportedInSimulation { operation: "protocol" };
        let msg = format!("{err}");
        assert!(msg.contains("protocol"));
        assert!(msg.contains("simulated"));
    }

    #[test]
    fn condition_errors_split_recoverable_and_structural() {
        let id = ObjectId::new(3);
        assert!(ConditionError::NoAnswer { object: id }.is_recoverable());
        assert!(ConditionError::UnknownAnswer { object: id }.is_recoverable());
        assert!(!ConditionError::UnknownObject { object: id }.is_recoverable());

        let err: PlanError = ConditionError::UnknownObject { object: id }.into();
        assert!(err.is_structural());
        let err: PlanError = ConditionError::NoAnswer { object: id }.into();
        assert!(!err.is_structural());
    }

    #[test]
    fn queue_full_is_retryable() {
        let err: PlanError = ExecutionError::QueueFull { capacity: 4 }.into();
        assert!(err.is_retryable());
        assert!(!err.is_structural());
        assert!(format!("{err}").contains('4'));
    }

    #[test]
    fn validation_errors_are_structural() {
        let err: PlanError = ValidationError::EmptyTarget.into();
        assert!(err.is_validation());
        assert!(err.is_structural());
        assert!(!err.is_retryable());
    }

    #[test]
    fn internal_error_message() {
        let err = PlanError::internal("unexpected state");
        assert!(err.is_structural());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
