//! Copy-on-write blackboard layers.
//!
//! Key invariants:
//! - Writes never reach the floor or the root store.
//! - Reads resolve through the nearest layer that holds an aggregator for
//!   the object, falling back to the root store.
//! - A write materializes the object locally, seeded with the floor's merged
//!   fact, so later floor changes no longer show through for that object.
//! - `copy` clones only the local map; its cost is bounded by the local size.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::fact::Fact;
use crate::knowledge::{MethodRegistry, ObjectId};
use crate::value::Value;

use super::aggregator::FactAggregator;
use super::sealed::AggregatorAccess;
use super::store::FactStore;
use super::FactStorage;

/// A blackboard layer over either the root store or another layer.
#[derive(Debug)]
pub struct LayeredBlackboard {
    local: RwLock<HashMap<ObjectId, FactAggregator>>,
    floor: Option<Arc<LayeredBlackboard>>,
    root: Arc<FactStore>,
    depth: usize,
}

impl LayeredBlackboard {
    /// Creates a layer directly over the root store.
    #[must_use]
    pub fn over_root(root: Arc<FactStore>) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            floor: None,
            root,
            depth: 1,
        }
    }

    /// Creates a layer over another layer.
    #[must_use]
    pub fn over(floor: Arc<Self>) -> Self {
        let root = Arc::clone(&floor.root);
        let depth = floor.depth + 1;
        Self {
            local: RwLock::new(HashMap::new()),
            floor: Some(floor),
            root,
            depth,
        }
    }

    /// Independent sibling over the same floor with a copy of the local state.
    #[must_use]
    pub fn copy(&self) -> Self {
        let local = self.read_local().clone();
        Self {
            local: RwLock::new(local),
            floor: self.floor.clone(),
            root: Arc::clone(&self.root),
            depth: self.depth,
        }
    }

    /// Number of layers between this one and the root store, counting itself.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Root store at the bottom of the chain.
    #[must_use]
    pub fn root(&self) -> &Arc<FactStore> {
        &self.root
    }

    /// Layer directly below, or `None` for a layer over the root.
    #[must_use]
    pub fn floor(&self) -> Option<&Arc<Self>> {
        self.floor.as_ref()
    }

    /// Number of objects materialized in this layer.
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.read_local().len()
    }

    /// Objects materialized in this layer, sorted.
    #[must_use]
    pub fn local_objects(&self) -> Vec<ObjectId> {
        let mut objects: Vec<ObjectId> = self.read_local().keys().copied().collect();
        objects.sort_unstable();
        objects
    }

    /// Objects materialized anywhere in the layer chain, sorted.
    #[must_use]
    pub fn decorated_objects(&self) -> Vec<ObjectId> {
        let mut objects = BTreeSet::new();
        let mut layer = Some(self);
        while let Some(current) = layer {
            objects.extend(current.read_local().keys().copied());
            layer = current.floor.as_deref();
        }
        objects.into_iter().collect()
    }

    /// Merged fact as seen by the layers alone; `None` if no layer touched the object.
    #[must_use]
    pub fn decorated_merged_fact(&self, object: ObjectId) -> Option<Fact> {
        let mut layer = Some(self);
        while let Some(current) = layer {
            let local = current.read_local();
            if let Some(aggregator) = local.get(&object) {
                return aggregator.merged(self.registry()).cloned();
            }
            drop(local);
            layer = current.floor.as_deref();
        }
        None
    }

    /// Merged value of `object` from this layer and its floors only, ignoring the root.
    #[must_use]
    pub fn decorated_merged_value(&self, object: ObjectId) -> Option<Value> {
        self.decorated_merged_fact(object).map(|f| f.value)
    }

    /// The layered value if it differs from the root store's value.
    #[must_use]
    pub fn changed_value(&self, object: ObjectId) -> Option<Value> {
        let decorated = self.decorated_merged_value(object)?;
        if self.root.merged_value(object).as_ref() == Some(&decorated) {
            return None;
        }
        Some(decorated)
    }

    /// Returns true if both layers resolve `object` to the same merged value.
    #[must_use]
    pub fn agrees_with(&self, other: &Self, object: ObjectId) -> bool {
        self.merged_value(object) == other.merged_value(object)
    }

    fn read_local(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, FactAggregator>> {
        match self.local.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_local(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, FactAggregator>> {
        match self.local.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Resolves `object` starting at `start`, falling back to the root store.
fn resolve<R>(
    start: Option<&LayeredBlackboard>,
    root: &FactStore,
    object: ObjectId,
    f: impl FnOnce(Option<&FactAggregator>) -> R,
) -> R {
    let mut layer = start;
    while let Some(current) = layer {
        let local = current.read_local();
        if let Some(aggregator) = local.get(&object) {
            return f(Some(aggregator));
        }
        drop(local);
        layer = current.floor.as_deref();
    }
    root.read(object, f)
}

impl AggregatorAccess for LayeredBlackboard {
    fn registry(&self) -> &MethodRegistry {
        self.root.methods()
    }

    fn read<R>(&self, object: ObjectId, f: impl FnOnce(Option<&FactAggregator>) -> R) -> R {
        resolve(Some(self), &self.root, object, f)
    }

    fn write<R>(&self, object: ObjectId, f: impl FnOnce(&mut FactAggregator) -> R) -> R {
        let mut local = self.write_local();
        let aggregator = local.entry(object).or_insert_with(|| {
            let seed = resolve(self.floor.as_deref(), &self.root, object, |agg| {
                agg.and_then(|a| a.merged(self.root.methods())).cloned()
            });
            FactAggregator::seeded(seed)
        });
        f(aggregator)
    }

    fn candidate_objects(&self) -> Vec<ObjectId> {
        let mut objects = self.decorated_objects();
        objects.extend(self.root.candidate_objects());
        objects
    }
}
