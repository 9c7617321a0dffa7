//! Sessions: the real problem-solving session and its simulated overlays.
//!
//! Everything the planner evaluates (conditions, operators, completion
//! checks) is written against `SessionView`, so the same code runs on the
//! real session and on any simulated layer.

mod protocol;
mod real;
mod simulated;

pub use protocol::{Protocol, ProtocolEntry};
pub use real::{Session, SessionId, SessionMetadata};
pub use simulated::{RootHandle, SimulatedSession};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::blackboard::FactStorage;
use crate::error::SessionError;
use crate::knowledge::{KnowledgeBase, ObjectId};
use crate::value::{Indication, Value};

/// Read/write view shared by real and simulated sessions.
pub trait SessionView: Send + Sync {
    /// Knowledge base of the session.
    fn knowledge(&self) -> &KnowledgeBase;

    /// Fact storage of this view.
    fn blackboard(&self) -> &dyn FactStorage;

    /// Time of the current (or last) propagation cycle.
    fn propagation_time(&self) -> DateTime<Utc>;

    /// True for simulated sessions.
    fn is_simulated(&self) -> bool;

    /// Session protocol. Unsupported in simulations.
    fn protocol(&self) -> Result<&Protocol, SessionError>;

    /// Session metadata. Unsupported in simulations.
    fn metadata(&self) -> Result<SessionMetadata, SessionError>;

    /// Indicated actions ordered by indication order. Unsupported in simulations.
    fn agenda(&self) -> Result<Vec<ObjectId>, SessionError>;

    /// Merged value of `object`; `None` means undefined.
    fn value(&self, object: ObjectId) -> Option<Value> {
        self.blackboard().merged_value(object)
    }

    /// Indication of `action`, if any.
    fn indication(&self, action: ObjectId) -> Option<Indication> {
        self.value(action).and_then(|v| v.as_indication())
    }

    /// True if `action` must not be carried out.
    fn is_contra_indicated(&self, action: ObjectId) -> bool {
        self.indication(action).is_some_and(|i| i.is_contra_indicated())
    }
}

/// Propagation bookkeeping of a real session.
///
/// Nested `open` calls share one propagation time, taken when the outermost
/// cycle opens.
#[derive(Debug)]
pub struct PropagationManager {
    time: RwLock<DateTime<Utc>>,
    depth: AtomicUsize,
}

impl PropagationManager {
    /// Manager whose first cycle time is `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(start),
            depth: AtomicUsize::new(0),
        }
    }

    /// Opens a cycle; the outermost one takes a new time.
    pub fn open(&self) {
        if self.depth.fetch_add(1, Ordering::SeqCst) == 0 {
            let mut time = match self.time.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *time = Utc::now().max(*time);
        }
    }

    /// Closes the innermost cycle.
    pub fn commit(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
    }

    /// True while a cycle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Time of the current or last cycle.
    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        match self.time.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
