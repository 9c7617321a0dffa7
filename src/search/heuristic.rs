//! Pluggable cost and scoring functions.

use crate::knowledge::ObjectId;
use crate::session::SessionView;

/// Cost of performing an action in a given state.
///
/// Implementations must return finite, non-negative costs.
pub trait CostFunction: Send + Sync {
    /// Cost of carrying out `action` in `session`.
    fn cost(&self, action: ObjectId, session: &dyn SessionView) -> f64;
}

/// Static costs declared in the knowledge base.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticCosts;

impl CostFunction for StaticCosts {
    fn cost(&self, action: ObjectId, session: &dyn SessionView) -> f64 {
        session.knowledge().cost(action)
    }
}

/// Scores a (partial) path towards one target. Lower is better.
///
/// Scores must not decrease when `cost_so_far` grows, otherwise the first
/// goal popped from the frontier is not guaranteed to be the best one.
pub trait SearchHeuristic: Send + Sync {
    /// Score of a path with `cost_so_far` towards a target.
    fn score(&self, cost_so_far: f64, target_cost: f64, benefit: f64) -> f64;

    /// Name for logs.
    fn name(&self) -> &'static str;
}

/// Total cost divided by the target's benefit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostBenefitRatio;

impl SearchHeuristic for CostBenefitRatio {
    fn score(&self, cost_so_far: f64, target_cost: f64, benefit: f64) -> f64 {
        (cost_so_far + target_cost) / benefit
    }

    fn name(&self) -> &'static str {
        "cost_benefit_ratio"
    }
}

/// Total cost, ignoring benefits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostOnly;

impl SearchHeuristic for CostOnly {
    fn score(&self, cost_so_far: f64, target_cost: f64, _benefit: f64) -> f64 {
        cost_so_far + target_cost
    }

    fn name(&self) -> &'static str {
        "cost_only"
    }
}
