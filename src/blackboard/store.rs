//! Root fact store of a real session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::knowledge::{MethodRegistry, ObjectId};

use super::aggregator::FactAggregator;
use super::sealed::AggregatorAccess;

/// Thread-safe root fact store.
///
/// Objects whose last fact is removed are dropped from the map, so they read
/// as undefined again.
#[derive(Debug)]
pub struct FactStore {
    methods: Arc<MethodRegistry>,
    state: RwLock<HashMap<ObjectId, FactAggregator>>,
}

impl FactStore {
    /// Creates an empty store that merges facts with `methods`.
    #[must_use]
    pub fn new(methods: Arc<MethodRegistry>) -> Self {
        Self {
            methods,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Method registry used for merge priorities.
    #[must_use]
    pub fn methods(&self) -> &Arc<MethodRegistry> {
        &self.methods
    }

    /// Number of objects with at least one fact.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().len()
    }

    /// True if no object carries a fact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_state().is_empty()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, FactAggregator>> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, FactAggregator>> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AggregatorAccess for FactStore {
    fn registry(&self) -> &MethodRegistry {
        &self.methods
    }

    fn read<R>(&self, object: ObjectId, f: impl FnOnce(Option<&FactAggregator>) -> R) -> R {
        let state = self.read_state();
        f(state.get(&object))
    }

    fn write<R>(&self, object: ObjectId, f: impl FnOnce(&mut FactAggregator) -> R) -> R {
        let mut state = self.write_state();
        let aggregator = state.entry(object).or_default();
        let result = f(aggregator);
        if aggregator.is_empty() {
            state.remove(&object);
        }
        result
    }

    fn candidate_objects(&self) -> Vec<ObjectId> {
        self.read_state().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::FactStorage;
    use crate::fact::{Fact, SourceId};
    use crate::knowledge::MethodId;
    use crate::value::Value;

    fn store() -> FactStore {
        FactStore::new(Arc::new(MethodRegistry::default()))
    }

    #[test]
    fn put_and_merge() {
        let store = store();
        let q = ObjectId::new(1);
        store.add(Fact::derived(q, Value::Number(3.0), MethodId::RULES, SourceId::new()));
        store.add(Fact::user_entered(q, Value::Number(4.0)));

        assert_eq!(store.merged_value(q), Some(Value::Number(4.0)));
        assert_eq!(store.merged_value_by(q, MethodId::RULES), Some(Value::Number(3.0)));
        assert_eq!(
            store.contributing_methods(q),
            vec![MethodId::USER_SELECTED, MethodId::RULES]
        );
        assert_eq!(store.valued_objects(), vec![q]);
    }

    #[test]
    fn removing_last_fact_makes_object_undefined() {
        let store = store();
        let q = ObjectId::new(2);
        let fact = Fact::user_entered(q, Value::Bool(true));
        store.add(fact.clone());
        assert!(store.has_fact(q));

        assert!(store.remove(&fact));
        assert!(!store.has_fact(q));
        assert_eq!(store.merged_value(q), None);
        assert!(store.is_empty());
        assert!(!store.remove(&fact));
    }

    #[test]
    fn remove_all_by_source() {
        let store = store();
        let q = ObjectId::new(3);
        let source = SourceId::new();
        store.add(Fact::derived(q, Value::Number(1.0), MethodId::RULES, source));
        store.add(Fact::derived(q, Value::Number(2.0), MethodId::STATE_TRANSITION, source));
        store.add(Fact::derived(q, Value::Number(9.0), MethodId::INIT, SourceId::new()));

        assert!(store.remove_all(q, source));
        assert_eq!(store.merged_value(q), Some(Value::Number(9.0)));
        assert_eq!(store.all_facts(q).len(), 1);
    }

    #[test]
    fn concurrent_writers_are_serialized() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        store.add(Fact::user_entered(ObjectId::new(t * 100 + i), Value::Number(f64::from(i))));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
