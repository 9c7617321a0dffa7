//! Terminology objects: questions, action containers and solutions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Stable identifier of a terminology object inside one knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Creates an identifier from its raw index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a terminology object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Can be answered.
    Question,
    /// Groups questions; the unit the planner schedules.
    ActionContainer,
    /// Diagnosis to be discriminated.
    Solution,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Question => write!(f, "question"),
            Self::ActionContainer => write!(f, "action container"),
            Self::Solution => write!(f, "solution"),
        }
    }
}

/// Planner-relevant properties of a terminology object.
///
/// Action properties are ignored on questions and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectProperties {
    /// Static cost of an action container.
    pub cost: f64,
    /// Action may only finish a path, never establish preconditions for others.
    pub target_only: bool,
    /// Action is always relevant and must not be scheduled as an intermediate step.
    pub permanently_relevant: bool,
    /// Answer assumed for an unanswered question while simulating its action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_value: Option<Value>,
    /// Question may only be answered once per session.
    pub check_once: bool,
    /// Choice alternatives of a choice question.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

/// An identifiable node of the knowledge hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminologyObject {
    /// Object id.
    pub id: ObjectId,
    /// Unique name.
    pub name: String,
    /// Object kind.
    pub kind: ObjectKind,
    /// Containing objects.
    #[serde(default)]
    pub parents: Vec<ObjectId>,
    /// Contained objects in declaration order.
    #[serde(default)]
    pub children: Vec<ObjectId>,
    /// Planner properties.
    #[serde(default)]
    pub properties: ObjectProperties,
}

impl TerminologyObject {
    /// True for questions.
    pub const fn is_question(&self) -> bool {
        matches!(self.kind, ObjectKind::Question)
    }

    /// True for action containers.
    pub const fn is_action(&self) -> bool {
        matches!(self.kind, ObjectKind::ActionContainer)
    }
}

impl fmt::Display for TerminologyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
