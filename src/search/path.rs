use std::fmt;

use serde::{Deserialize, Serialize};

use crate::knowledge::ObjectId;

use super::target::Target;

/// A plan found by the search.
///
/// `actions` are the intermediate steps that establish the target's
/// preconditions and `cost` is their accumulated cost. The target's own
/// actions are appended by `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    actions: Vec<ObjectId>,
    target: Target,
    cost: f64,
    target_cost: f64,
}

impl Path {
    pub(crate) const fn new(actions: Vec<ObjectId>, target: Target, cost: f64, target_cost: f64) -> Self {
        Self {
            actions,
            target,
            cost,
            target_cost,
        }
    }

    /// Intermediate actions in execution order.
    #[must_use]
    pub fn actions(&self) -> &[ObjectId] {
        &self.actions
    }

    /// Target the path leads to.
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Accumulated cost of the intermediate actions.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Cost of the target's own actions.
    #[must_use]
    pub const fn target_cost(&self) -> f64 {
        self.target_cost
    }

    /// Cost of the intermediate and target actions.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.cost + self.target_cost
    }

    /// Full execution order: intermediate actions followed by the target's actions.
    #[must_use]
    pub fn sequence(&self) -> Vec<ObjectId> {
        self.actions
            .iter()
            .chain(self.target.actions())
            .copied()
            .collect()
    }

    /// True if the target is reachable without intermediate actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(f, "[{}] -> {} (cost {})", steps.join(" -> "), self.target, self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_appends_target_actions() {
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);
        let t = ObjectId::new(3);
        let path = Path::new(vec![a, b], Target::single(t, 1.0).unwrap(), 3.0, 2.0);
        assert_eq!(path.sequence(), vec![a, b, t]);
        assert!((path.total_cost() - 5.0).abs() < f64::EPSILON);
        assert!(!path.is_empty());
    }
}
