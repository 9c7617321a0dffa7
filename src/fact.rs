//! Facts: value assertions made by a method on behalf of a source.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::{MethodId, ObjectId};
use crate::value::Value;

/// Identity of whatever asserted a fact (a rule, an operator firing, a user entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    /// Creates a new random source id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance class of a fact. Within one method, user entries dominate
/// derived facts, which dominate simulated assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Entered by the user.
    UserEntry,
    /// Derived by a problem-solving method.
    Derived,
    /// Assumed while simulating.
    Simulated,
}

impl SourceKind {
    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::UserEntry => 0,
            Self::Derived => 1,
            Self::Simulated => 2,
        }
    }
}

/// Monotonic creation stamp; a larger stamp means a newer fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactStamp(u64);

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

impl FactStamp {
    fn next() -> Self {
        Self(NEXT_STAMP.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A value assertion for one terminology object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Object the value is assigned to.
    pub object: ObjectId,
    /// Asserted value.
    pub value: Value,
    /// Method that asserted the fact.
    pub method: MethodId,
    /// Source within the method; one fact per method and source.
    pub source: SourceId,
    /// Provenance class.
    pub origin: SourceKind,
    /// Creation stamp.
    pub stamp: FactStamp,
}

impl Fact {
    /// Creates a fact with a fresh creation stamp.
    #[must_use]
    pub fn new(object: ObjectId, value: Value, method: MethodId, source: SourceId, origin: SourceKind) -> Self {
        Self {
            object,
            value,
            method,
            source,
            origin,
            stamp: FactStamp::next(),
        }
    }

    /// A user answer with its own source.
    #[must_use]
    pub fn user_entered(object: ObjectId, value: Value) -> Self {
        Self::new(object, value, MethodId::USER_SELECTED, SourceId::new(), SourceKind::UserEntry)
    }

    /// A fact derived by `method`.
    #[must_use]
    pub fn derived(object: ObjectId, value: Value, method: MethodId, source: SourceId) -> Self {
        Self::new(object, value, method, source, SourceKind::Derived)
    }

    /// Returns true if `other` is the same assertion (same method, source and stamp).
    #[must_use]
    pub fn same_assertion(&self, other: &Self) -> bool {
        self.method == other.method && self.source == other.source && self.stamp == other.stamp
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} [{}]", self.object, self.value, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_increase() {
        let q = ObjectId::new(0);
        let a = Fact::user_entered(q, Value::Bool(true));
        let b = Fact::user_entered(q, Value::Bool(true));
        assert!(b.stamp > a.stamp);
        assert!(!a.same_assertion(&b));
        assert!(a.same_assertion(&a.clone()));
    }

    #[test]
    fn origin_rank_orders_provenance() {
        assert!(SourceKind::UserEntry.rank() < SourceKind::Derived.rank());
        assert!(SourceKind::Derived.rank() < SourceKind::Simulated.rank());
    }
}
