//! Plan execution: committing paths to a session and guarding them while
//! the user works through them.

mod controller;
mod situation;
mod state;

pub use controller::Planner;
pub use situation::{Situation, StrategicSupport};
pub use state::{ExecutionState, PlanState};
