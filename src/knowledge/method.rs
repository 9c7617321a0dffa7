//! Problem-solving methods that contribute facts.
//!
//! Facts carry a `MethodId` instead of a reference to the solver instance.
//! The registry resolves ids to priorities when facts are merged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a problem-solving method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(u16);

impl MethodId {
    /// Answers entered by the user.
    pub const USER_SELECTED: Self = Self(0);
    /// Effects fired by planning operators.
    pub const STATE_TRANSITION: Self = Self(1);
    /// Rule-based derivations.
    pub const RULES: Self = Self(2);
    /// Initial values of the knowledge base.
    pub const INIT: Self = Self(3);
    /// Indications placed by the cost-benefit planner.
    pub const COST_BENEFIT: Self = Self(4);

    const BUILTIN_COUNT: u16 = 5;

    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method:{}", self.0)
    }
}

/// Role of a method in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Enters primary findings (the user, data import).
    Source,
    /// Derives values from other values.
    Problem,
    /// Decides what to ask next.
    Strategic,
}

/// Registry entry describing one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSolver {
    /// Method id.
    pub id: MethodId,
    /// Display name.
    pub name: String,
    /// Role of the method.
    pub kind: MethodKind,
    /// Merge priority; the lowest value wins.
    pub priority: f64,
}

/// Registry of all methods known to a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRegistry {
    methods: Vec<ProblemSolver>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        let builtin = |id: MethodId, name: &str, kind: MethodKind, priority: f64| ProblemSolver {
            id,
            name: name.to_string(),
            kind,
            priority,
        };
        Self {
            methods: vec![
                builtin(MethodId::USER_SELECTED, "user_selected", MethodKind::Source, 1.0),
                builtin(MethodId::STATE_TRANSITION, "state_transition", MethodKind::Problem, 2.0),
                builtin(MethodId::RULES, "rules", MethodKind::Problem, 4.0),
                builtin(MethodId::INIT, "init", MethodKind::Source, 5.0),
                builtin(MethodId::COST_BENEFIT, "cost_benefit", MethodKind::Strategic, 6.0),
            ],
        }
    }
}

impl MethodRegistry {
    /// Registers an additional method and returns its id.
    pub fn register(&mut self, name: impl Into<String>, kind: MethodKind, priority: f64) -> MethodId {
        let raw = u16::try_from(self.methods.len()).unwrap_or(u16::MAX);
        let id = MethodId(raw.max(MethodId::BUILTIN_COUNT));
        self.methods.push(ProblemSolver {
            id,
            name: name.into(),
            kind,
            priority,
        });
        id
    }

    /// Entry of `id`.
    #[must_use]
    pub fn get(&self, id: MethodId) -> Option<&ProblemSolver> {
        self.methods.iter().find(|m| m.id == id)
    }

    /// Merge priority of `id`; unknown methods rank last.
    #[must_use]
    pub fn priority(&self, id: MethodId) -> f64 {
        self.get(id).map_or(f64::MAX, |m| m.priority)
    }

    /// Returns true if `id` is a source method (its facts are primary findings).
    #[must_use]
    pub fn is_source(&self, id: MethodId) -> bool {
        self.get(id).is_some_and(|m| m.kind == MethodKind::Source)
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProblemSolver> {
        self.methods.iter()
    }
}
