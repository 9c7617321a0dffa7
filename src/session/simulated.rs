//! Simulated sessions: throwaway overlays over a real session.
//!
//! A simulation reads everything the real session knows but writes only to
//! its own blackboard layer. Propagation is a no-op and real-session-only
//! surfaces (protocol, metadata, agenda) fail with
//! `SessionError::UnsupportedInSimulation`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::blackboard::{FactStorage, FactStore, LayeredBlackboard};
use crate::error::SessionError;
use crate::knowledge::{KnowledgeBase, ObjectId};

use super::protocol::Protocol;
use super::real::{Session, SessionMetadata};
use super::{PropagationManager, SessionView};

/// Shared, thread-safe parts of a real session.
///
/// Background searches hold one of these instead of borrowing the session.
#[derive(Clone)]
pub struct RootHandle {
    knowledge: Arc<KnowledgeBase>,
    store: Arc<FactStore>,
    propagation: Arc<PropagationManager>,
}

impl RootHandle {
    pub(crate) fn new(
        knowledge: Arc<KnowledgeBase>,
        store: Arc<FactStore>,
        propagation: Arc<PropagationManager>,
    ) -> Self {
        Self {
            knowledge,
            store,
            propagation,
        }
    }

    /// Shared knowledge base.
    #[must_use]
    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Root fact store of the real session.
    #[must_use]
    pub fn store(&self) -> &Arc<FactStore> {
        &self.store
    }

    /// Propagation time of the real session.
    #[must_use]
    pub fn propagation_time(&self) -> DateTime<Utc> {
        self.propagation.time()
    }
}

impl fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootHandle")
            .field("facts", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// A simulated session over a real session or over another simulation.
pub struct SimulatedSession {
    root: RootHandle,
    blackboard: Arc<LayeredBlackboard>,
}

impl SimulatedSession {
    /// Creates a simulation directly over a real session.
    #[must_use]
    pub fn over(session: &Session) -> Self {
        Self::from_root(session.root_handle())
    }

    /// Creates a simulation over the shared parts of a real session.
    #[must_use]
    pub fn from_root(root: RootHandle) -> Self {
        let blackboard = Arc::new(LayeredBlackboard::over_root(Arc::clone(&root.store)));
        Self { root, blackboard }
    }

    /// Creates a simulation over this one. Writes to the new simulation do
    /// not reach `self`; writes to `self` stay visible for objects the new
    /// simulation has not touched.
    #[must_use]
    pub fn decorate(&self) -> Self {
        Self {
            root: self.root.clone(),
            blackboard: Arc::new(LayeredBlackboard::over(Arc::clone(&self.blackboard))),
        }
    }

    /// Independent sibling over the same floor.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            root: self.root.clone(),
            blackboard: Arc::new(self.blackboard.copy()),
        }
    }

    /// Blackboard layer of this simulation.
    #[must_use]
    pub fn layer(&self) -> &LayeredBlackboard {
        &self.blackboard
    }

    /// Shared parts of the underlying real session.
    #[must_use]
    pub const fn root(&self) -> &RootHandle {
        &self.root
    }

    /// Nesting depth; 1 for a simulation directly over a real session.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.blackboard.depth()
    }

    /// Propagation in a simulation is synchronous and has no side effects.
    pub fn open_propagation(&self) {}

    /// Counterpart of `open_propagation`.
    pub fn commit_propagation(&self) {}
}

impl fmt::Debug for SimulatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedSession")
            .field("depth", &self.depth())
            .field("local", &self.blackboard.local_len())
            .finish_non_exhaustive()
    }
}

impl SessionView for SimulatedSession {
    fn knowledge(&self) -> &KnowledgeBase {
        &self.root.knowledge
    }

    fn blackboard(&self) -> &dyn FactStorage {
        self.blackboard.as_ref()
    }

    fn propagation_time(&self) -> DateTime<Utc> {
        self.root.propagation_time()
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn protocol(&self) -> Result<&Protocol, SessionError> {
        Err(SessionError::UnsupportedInSimulation { operation: "protocol" })
    }

    fn metadata(&self) -> Result<SessionMetadata, SessionError> {
        Err(SessionError::UnsupportedInSimulation { operation: "metadata" })
    }

    fn agenda(&self) -> Result<Vec<ObjectId>, SessionError> {
        Err(SessionError::UnsupportedInSimulation { operation: "agenda" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Fact;
    use crate::value::Value;

    fn session() -> (Session, ObjectId) {
        let mut kb = KnowledgeBase::builder();
        let q = kb.question("q");
        (Session::new(Arc::new(kb.build().unwrap())), q)
    }

    #[test]
    fn simulation_sees_real_values_but_not_vice_versa() {
        let (session, q) = session();
        session.answer(q, Value::Number(1.0));

        let sim = SimulatedSession::over(&session);
        assert_eq!(sim.value(q), Some(Value::Number(1.0)));

        sim.blackboard().add(Fact::user_entered(q, Value::Number(2.0)));
        assert_eq!(sim.value(q), Some(Value::Number(2.0)));
        assert_eq!(session.value(q), Some(Value::Number(1.0)));
    }

    #[test]
    fn real_only_surfaces_fail_fast() {
        let (session, _) = session();
        let sim = SimulatedSession::over(&session);
        assert!(matches!(
            sim.protocol(),
            Err(SessionError::UnsupportedInSimulation { operation: "protocol" })
        ));
        assert!(sim.metadata().is_err());
        assert!(sim.agenda().is_err());
        assert!(sim.is_simulated());
    }

    #[test]
    fn decorate_nests_and_copy_does_not() {
        let (session, q) = session();
        let sim = SimulatedSession::over(&session);
        let nested = sim.decorate();
        let sibling = nested.copy();
        assert_eq!(sim.depth(), 1);
        assert_eq!(nested.depth(), 2);
        assert_eq!(sibling.depth(), 2);

        nested.blackboard().add(Fact::user_entered(q, Value::Bool(true)));
        assert!(!sim.blackboard().has_fact(q));
        assert!(!sibling.blackboard().has_fact(q));
    }

    #[test]
    fn root_handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RootHandle>();
        assert_send_sync::<SimulatedSession>();
    }
}
