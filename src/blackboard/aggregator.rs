//! Per-object fact aggregation and merging.

use std::cmp::Ordering;

use crate::fact::{Fact, SourceId};
use crate::knowledge::{MethodId, MethodRegistry};

/// All facts currently asserted for one object.
///
/// Holds at most one fact per (method, source) pair. Merging is a total
/// order, so the merged fact never depends on insertion order:
/// method priority, then provenance rank, then the newest stamp.
#[derive(Debug, Clone, Default)]
pub struct FactAggregator {
    facts: Vec<Fact>,
}

impl FactAggregator {
    /// Aggregator seeded with a single fact.
    pub(crate) fn seeded(fact: Option<Fact>) -> Self {
        Self {
            facts: fact.into_iter().collect(),
        }
    }

    /// Adds `fact`, replacing any fact from the same method and source.
    pub(crate) fn add(&mut self, fact: Fact) {
        self.facts
            .retain(|f| !(f.method == fact.method && f.source == fact.source));
        self.facts.push(fact);
    }

    /// Removes exactly this assertion. Returns true if something was removed.
    pub(crate) fn remove(&mut self, fact: &Fact) -> bool {
        let before = self.facts.len();
        self.facts.retain(|f| !f.same_assertion(fact));
        self.facts.len() != before
    }

    pub(crate) fn remove_by_source(&mut self, source: SourceId) -> bool {
        let before = self.facts.len();
        self.facts.retain(|f| f.source != source);
        self.facts.len() != before
    }

    pub(crate) fn remove_by_method(&mut self, method: MethodId) -> bool {
        let before = self.facts.len();
        self.facts.retain(|f| f.method != method);
        self.facts.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub(crate) fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub(crate) fn fact(&self, method: MethodId, source: SourceId) -> Option<&Fact> {
        self.facts
            .iter()
            .find(|f| f.method == method && f.source == source)
    }

    pub(crate) fn has_facts_by(&self, method: MethodId) -> bool {
        self.facts.iter().any(|f| f.method == method)
    }

    /// Distinct contributing methods, sorted by id.
    pub(crate) fn contributing_methods(&self) -> Vec<MethodId> {
        let mut methods: Vec<MethodId> = self.facts.iter().map(|f| f.method).collect();
        methods.sort_unstable();
        methods.dedup();
        methods
    }

    /// The merged fact across all methods.
    ///
    /// A contra-indication dominates every indication, whatever its method.
    pub(crate) fn merged(&self, methods: &MethodRegistry) -> Option<&Fact> {
        let contra = self
            .facts
            .iter()
            .filter(|f| f.value.as_indication().is_some_and(|i| i.is_contra_indicated()))
            .min_by(|a, b| compare(a, b, methods));
        contra.or_else(|| self.facts.iter().min_by(|a, b| compare(a, b, methods)))
    }

    /// The merged fact restricted to one method.
    pub(crate) fn merged_by(&self, method: MethodId, methods: &MethodRegistry) -> Option<&Fact> {
        self.facts
            .iter()
            .filter(|f| f.method == method)
            .min_by(|a, b| compare(a, b, methods))
    }
}

fn compare(a: &Fact, b: &Fact, methods: &MethodRegistry) -> Ordering {
    methods
        .priority(a.method)
        .total_cmp(&methods.priority(b.method))
        .then_with(|| a.origin.rank().cmp(&b.origin.rank()))
        .then_with(|| b.stamp.cmp(&a.stamp))
        .then_with(|| a.method.cmp(&b.method))
        .then_with(|| a.source.cmp(&b.source))
}
