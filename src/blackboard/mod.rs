//! Fact storage: the root store of a real session and the layered
//! copy-on-write overlays used by simulations.

mod aggregator;
mod layered;
mod store;

pub use layered::LayeredBlackboard;
pub use store::FactStore;

use crate::fact::{Fact, SourceId};
use crate::knowledge::{MethodId, MethodRegistry, ObjectId};
use crate::value::Value;

use aggregator::FactAggregator;

mod sealed {
    use super::{FactAggregator, MethodRegistry, ObjectId};

    /// Per-object aggregator access shared by the root store and layers.
    pub trait AggregatorAccess {
        fn registry(&self) -> &MethodRegistry;

        fn read<R>(&self, object: ObjectId, f: impl FnOnce(Option<&FactAggregator>) -> R) -> R;

        fn write<R>(&self, object: ObjectId, f: impl FnOnce(&mut FactAggregator) -> R) -> R;

        /// Objects that may carry facts (a superset of the valued objects).
        fn candidate_objects(&self) -> Vec<ObjectId>;
    }
}

use sealed::AggregatorAccess;

/// Read/write contract of a fact storage.
///
/// Implemented by `FactStore` and `LayeredBlackboard`; readers never need
/// to know whether they look at the real session or at a simulation.
pub trait FactStorage: Send + Sync {
    /// Adds a fact, replacing any fact of the same method and source.
    fn add(&self, fact: Fact);

    /// Removes exactly this assertion.
    fn remove(&self, fact: &Fact) -> bool;

    /// Removes every fact of `source` for `object`.
    fn remove_all(&self, object: ObjectId, source: SourceId) -> bool;

    /// Removes every fact of `method` for `object`.
    fn remove_by_method(&self, object: ObjectId, method: MethodId) -> bool;

    /// Removes every fact for `object`.
    fn clear(&self, object: ObjectId);

    /// Fact that wins the merge for `object`.
    fn merged_fact(&self, object: ObjectId) -> Option<Fact>;

    /// Winning fact among those of `method`.
    fn merged_fact_by(&self, object: ObjectId, method: MethodId) -> Option<Fact>;

    /// The fact of exactly this method and source.
    fn fact(&self, object: ObjectId, method: MethodId, source: SourceId) -> Option<Fact>;

    /// Every fact for `object`, in merge order.
    fn all_facts(&self, object: ObjectId) -> Vec<Fact>;

    /// True if `method` asserted anything for `object`.
    fn has_fact_by(&self, object: ObjectId, method: MethodId) -> bool;

    /// Methods with at least one fact for `object`.
    fn contributing_methods(&self, object: ObjectId) -> Vec<MethodId>;

    /// Objects that currently have a merged value, sorted by id.
    fn valued_objects(&self) -> Vec<ObjectId>;

    /// Value of the merged fact; `None` means undefined.
    fn merged_value(&self, object: ObjectId) -> Option<Value> {
        self.merged_fact(object).map(|f| f.value)
    }

    /// Value of the winning fact of `method`.
    fn merged_value_by(&self, object: ObjectId, method: MethodId) -> Option<Value> {
        self.merged_fact_by(object, method).map(|f| f.value)
    }

    /// True if `object` has a merged value.
    fn has_fact(&self, object: ObjectId) -> bool {
        self.merged_fact(object).is_some()
    }
}

impl<T> FactStorage for T
where
    T: AggregatorAccess + Send + Sync,
{
    fn add(&self, fact: Fact) {
        tracing::trace!(object = %fact.object, value = %fact.value, method = %fact.method, "fact added");
        self.write(fact.object, |agg| agg.add(fact));
    }

    fn remove(&self, fact: &Fact) -> bool {
        if !self.read(fact.object, |agg| agg.is_some_and(|a| a.facts().iter().any(|f| f.same_assertion(fact)))) {
            return false;
        }
        self.write(fact.object, |agg| agg.remove(fact))
    }

    fn remove_all(&self, object: ObjectId, source: SourceId) -> bool {
        if !self.read(object, |agg| agg.is_some_and(|a| a.facts().iter().any(|f| f.source == source))) {
            return false;
        }
        self.write(object, |agg| agg.remove_by_source(source))
    }

    fn remove_by_method(&self, object: ObjectId, method: MethodId) -> bool {
        if !self.has_fact_by(object, method) {
            return false;
        }
        self.write(object, |agg| agg.remove_by_method(method))
    }

    fn clear(&self, object: ObjectId) {
        if self.read(object, |agg| agg.is_some_and(|a| !a.is_empty())) {
            self.write(object, |agg| *agg = FactAggregator::default());
        }
    }

    fn merged_fact(&self, object: ObjectId) -> Option<Fact> {
        self.read(object, |agg| agg.and_then(|a| a.merged(self.registry())).cloned())
    }

    fn merged_fact_by(&self, object: ObjectId, method: MethodId) -> Option<Fact> {
        self.read(object, |agg| agg.and_then(|a| a.merged_by(method, self.registry())).cloned())
    }

    fn fact(&self, object: ObjectId, method: MethodId, source: SourceId) -> Option<Fact> {
        self.read(object, |agg| agg.and_then(|a| a.fact(method, source)).cloned())
    }

    fn all_facts(&self, object: ObjectId) -> Vec<Fact> {
        self.read(object, |agg| agg.map(|a| a.facts().to_vec()).unwrap_or_default())
    }

    fn has_fact_by(&self, object: ObjectId, method: MethodId) -> bool {
        self.read(object, |agg| agg.is_some_and(|a| a.has_facts_by(method)))
    }

    fn contributing_methods(&self, object: ObjectId) -> Vec<MethodId> {
        self.read(object, |agg| agg.map(FactAggregator::contributing_methods).unwrap_or_default())
    }

    fn valued_objects(&self) -> Vec<ObjectId> {
        let mut objects: Vec<ObjectId> = self
            .candidate_objects()
            .into_iter()
            .filter(|o| self.read(*o, |agg| agg.is_some_and(|a| !a.is_empty())))
            .collect();
        objects.sort_unstable();
        objects.dedup();
        objects
    }
}
