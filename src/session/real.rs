//! The real problem-solving session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blackboard::{FactStorage, FactStore};
use crate::error::SessionError;
use crate::execution::ExecutionState;
use crate::fact::Fact;
use crate::knowledge::{KnowledgeBase, ObjectId};
use crate::value::Value;

use super::protocol::Protocol;
use super::simulated::RootHandle;
use super::{PropagationManager, SessionView};

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive data about a real session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session id.
    pub id: SessionId,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// A real session over a shared knowledge base.
///
/// Fact storage and propagation are shared (`Arc`) so that simulations and
/// background searches can read the session without borrowing it. The
/// planner's per-session execution state lives here too and is created on
/// first use.
pub struct Session {
    id: SessionId,
    created: DateTime<Utc>,
    knowledge: Arc<KnowledgeBase>,
    store: Arc<FactStore>,
    propagation: Arc<PropagationManager>,
    protocol: Protocol,
    execution: Option<ExecutionState>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        let created = Utc::now();
        let store = Arc::new(FactStore::new(Arc::new(knowledge.methods().clone())));
        Self {
            id: SessionId::new(),
            created,
            knowledge,
            store,
            propagation: Arc::new(PropagationManager::new(created)),
            protocol: Protocol::default(),
            execution: None,
        }
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Creation time.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Shared knowledge base.
    #[must_use]
    pub fn knowledge_arc(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Root fact store.
    #[must_use]
    pub fn store(&self) -> &Arc<FactStore> {
        &self.store
    }

    /// Propagation bookkeeping.
    #[must_use]
    pub fn propagation(&self) -> &PropagationManager {
        &self.propagation
    }

    /// Cloneable, thread-safe handle on the shared parts of this session.
    #[must_use]
    pub fn root_handle(&self) -> RootHandle {
        RootHandle::new(
            Arc::clone(&self.knowledge),
            Arc::clone(&self.store),
            Arc::clone(&self.propagation),
        )
    }

    /// Mutable protocol.
    pub fn protocol_mut(&mut self) -> &mut Protocol {
        &mut self.protocol
    }

    /// Adds a fact inside its own propagation cycle.
    pub fn add_fact(&self, fact: Fact) {
        self.propagation.open();
        self.store.add(fact);
        self.propagation.commit();
    }

    /// Removes a fact inside its own propagation cycle.
    pub fn remove_fact(&self, fact: &Fact) -> bool {
        self.propagation.open();
        let removed = self.store.remove(fact);
        self.propagation.commit();
        removed
    }

    /// Enters a user answer and returns the created fact.
    pub fn answer(&self, question: ObjectId, value: Value) -> Fact {
        let fact = Fact::user_entered(question, value);
        self.add_fact(fact.clone());
        fact
    }

    pub(crate) fn take_execution(&mut self) -> ExecutionState {
        self.execution.take().unwrap_or_default()
    }

    pub(crate) fn restore_execution(&mut self, state: ExecutionState) {
        self.execution = Some(state);
    }

    pub(crate) fn execution(&self) -> Option<&ExecutionState> {
        self.execution.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created", &self.created)
            .field("facts", &self.store.len())
            .field("protocol", &self.protocol.len())
            .finish_non_exhaustive()
    }
}

impl SessionView for Session {
    fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    fn blackboard(&self) -> &dyn FactStorage {
        self.store.as_ref()
    }

    fn propagation_time(&self) -> DateTime<Utc> {
        self.propagation.time()
    }

    fn is_simulated(&self) -> bool {
        false
    }

    fn protocol(&self) -> Result<&Protocol, SessionError> {
        Ok(&self.protocol)
    }

    fn metadata(&self) -> Result<SessionMetadata, SessionError> {
        Ok(SessionMetadata {
            id: self.id,
            created: self.created,
        })
    }

    fn agenda(&self) -> Result<Vec<ObjectId>, SessionError> {
        let mut indicated: Vec<(usize, ObjectId)> = self
            .knowledge
            .action_containers()
            .filter_map(|o| {
                self.indication(o.id)
                    .filter(|i| i.is_indicated())
                    .map(|i| (i.order, o.id))
            })
            .collect();
        indicated.sort_unstable();
        Ok(indicated.into_iter().map(|(_, id)| id).collect())
    }
}
