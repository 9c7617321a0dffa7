//! # diagplan - Cost-Benefit Sequential Planning
//!
//! diagplan computes, commits and supervises sequences of actions for an
//! interactive problem-solving session. Given target actions, it searches
//! over simulated session states for the cheapest sequence whose simulated
//! effects make a target applicable, then indicates that sequence on the
//! real session and re-validates it as the user works through it.
//!
//! ## Core Concepts
//!
//! - **Fact Store**: per-object fact aggregation with deterministic merging by
//!   method priority
//! - **Layered Blackboard**: copy-on-write overlays that isolate simulated
//!   writes from the real session
//! - **State Transition**: an action's precondition and value effects
//! - **Search Engine**: best-first search ranked by cost/benefit
//! - **Planner**: commits paths, re-checks them and reacts to new findings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use diagplan::{Condition, KnowledgeBase, Planner, PlannerConfig, Session, Target, Value};
//! use diagplan::operator::{StateTransition, ValueTransition};
//!
//! let mut kb = KnowledgeBase::builder();
//! let pressure = kb.question("pressure");
//! let pump = kb.action("check pump", 2.0);
//! let valve = kb.action("replace valve", 5.0);
//! kb.operator(StateTransition::new(pump).with_effect(ValueTransition::set(pressure, Value::Number(3.0))));
//! kb.operator(StateTransition::new(valve).with_activation(Condition::greater(pressure, 1.0)));
//!
//! let mut session = Session::new(Arc::new(kb.build()?));
//! let planner = Planner::new(PlannerConfig::default())?;
//! let path = planner.request_plan(&mut session, &[Target::single(valve, 1.0)?])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Facts and storage
pub mod blackboard;
pub mod error;
pub mod fact;
pub mod knowledge;
pub mod value;

// Sessions and planning operators
pub mod condition;
pub mod operator;
pub mod session;

// Search and execution
pub mod config;
pub mod execution;
pub mod runtime;
pub mod search;

pub use blackboard::{FactStorage, FactStore, LayeredBlackboard};
pub use condition::Condition;
pub use config::PlannerConfig;
pub use error::{ConditionError, ExecutionError, PlanError, PlanResult, SessionError, ValidationError};
pub use execution::{ExecutionState, PlanState, Planner, Situation, StrategicSupport};
pub use fact::{Fact, SourceId, SourceKind};
pub use knowledge::{KnowledgeBase, MethodId, ObjectId};
pub use operator::StateTransition;
pub use runtime::{RuntimeConfig, SearchHandle, SearchRuntime};
pub use search::{BlockingReason, Path, SearchEngine, SearchLimits, SearchOutcome, SearchReport, Target, TargetOrigin};
pub use session::{RootHandle, Session, SessionView, SimulatedSession};
pub use value::{Indication, IndicationState, Value};
