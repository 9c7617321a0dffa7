use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fact::Fact;
use crate::knowledge::ObjectId;

/// Lifecycle of a plan within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    /// No plan has been requested or the last one was cleared.
    #[default]
    Idle,
    /// A search is running.
    Planning,
    /// A committed path is being carried out.
    Executing,
    /// The last committed path was carried out completely.
    Completed,
    /// The committed path became invalid and was discarded.
    Aborted,
    /// The situation changed; the path was discarded and a new one is due.
    Replanning,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Replanning => "replanning",
        };
        write!(f, "{s}")
    }
}

/// Per-session execution state of the planner.
///
/// Owned by the session and created on first use. The committed sequence is
/// immutable; the cursor is -1 until the first action is activated.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub(crate) sequence: Option<Arc<[ObjectId]>>,
    pub(crate) cursor: isize,
    pub(crate) indicated_facts: Vec<Fact>,
    pub(crate) undiscriminated: Option<BTreeSet<ObjectId>>,
    pub(crate) conflicting: BTreeSet<ObjectId>,
    pub(crate) unreached_target: Option<ObjectId>,
    pub(crate) aborted_manually_set_target: bool,
    pub(crate) state: PlanState,
    pub(crate) manual_mode: Option<bool>,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self {
            sequence: None,
            cursor: -1,
            indicated_facts: Vec::new(),
            undiscriminated: None,
            conflicting: BTreeSet::new(),
            unreached_target: None,
            aborted_manually_set_target: false,
            state: PlanState::Idle,
            manual_mode: None,
        }
    }
}

impl ExecutionState {
    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> PlanState {
        self.state
    }

    /// The committed action sequence, if any.
    #[must_use]
    pub fn sequence(&self) -> Option<&[ObjectId]> {
        self.sequence.as_deref()
    }

    /// Action currently being carried out.
    #[must_use]
    pub fn current_action(&self) -> Option<ObjectId> {
        let sequence = self.sequence.as_deref()?;
        usize::try_from(self.cursor)
            .ok()
            .and_then(|idx| sequence.get(idx).copied())
    }

    /// Last action of the most recently aborted path.
    #[must_use]
    pub const fn unreached_target(&self) -> Option<ObjectId> {
        self.unreached_target
    }

    /// Conflicting questions last seen.
    #[must_use]
    pub const fn conflicting(&self) -> &BTreeSet<ObjectId> {
        &self.conflicting
    }

    /// Undiscriminated solutions the current plan was made for; `None` for explicit requests.
    #[must_use]
    pub const fn undiscriminated(&self) -> Option<&BTreeSet<ObjectId>> {
        self.undiscriminated.as_ref()
    }

    /// True if retrying the unreached target is suppressed.
    #[must_use]
    pub const fn aborted_manually_set_target(&self) -> bool {
        self.aborted_manually_set_target
    }

    pub(crate) fn has_path(&self) -> bool {
        self.sequence.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle_without_action() {
        let state = ExecutionState::default();
        assert_eq!(state.state(), PlanState::Idle);
        assert_eq!(state.current_action(), None);
    }

    #[test]
    fn current_action_follows_cursor() {
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);
        let mut state = ExecutionState {
            sequence: Some(Arc::from(vec![a, b])),
            ..ExecutionState::default()
        };
        assert_eq!(state.current_action(), None);
        state.cursor = 1;
        assert_eq!(state.current_action(), Some(b));
        state.cursor = 2;
        assert_eq!(state.current_action(), None);
    }
}
