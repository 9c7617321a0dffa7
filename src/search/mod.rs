//! Cost-benefit search for action sequences that reach a target.

mod blocking;
mod engine;
mod heuristic;
mod limits;
mod path;
mod target;

pub use blocking::{blocked_actions, final_values, BlockingReason};
pub use engine::{NoPathReason, SearchEngine, SearchOutcome, SearchReport, SearchStats};
pub use heuristic::{CostBenefitRatio, CostFunction, CostOnly, SearchHeuristic, StaticCosts};
pub use limits::SearchLimits;
pub use path::Path;
pub use target::{Target, TargetOrigin};
