//! Memoized type-filter factory (C4): the alert store admits by type, and
//! the same filter set (after normalizing to lowercase+sorted) is reused
//! across requests rather than rebuilt each time.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_ALERT_TYPES: &[&str] = &["flash", "urgent"];

/// A predicate over lowercased alert type names; empty set admits everything.
pub struct TypeFilter {
    types: HashSet<String>,
}

impl TypeFilter {
    pub fn matches(&self, type_lower: &str) -> bool {
        self.types.is_empty() || self.types.contains(type_lower)
    }
}

/// Builds the stable memoization key: lowercase, sort, join. Two input
/// orderings or casings of the same set collapse to the same key.
fn memo_key(types: &[String]) -> String {
    let mut lowered: Vec<String> = types.iter().map(|t| t.to_lowercase()).collect();
    lowered.sort();
    lowered.dedup();
    serde_json::to_string(&lowered).expect("serializing string vec cannot fail")
}

pub struct TypeFilterFactory {
    cache: Mutex<HashMap<String, Arc<TypeFilter>>>,
}

impl TypeFilterFactory {
    pub fn new() -> Self {
        Self { cache: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, types: &[String]) -> Arc<TypeFilter> {
        let key = memo_key(types);
        let mut cache = self.cache.lock();
        cache
            .entry(key)
            .or_insert_with(|| {
                let set = types.iter().map(|t| t.to_lowercase()).collect();
                Arc::new(TypeFilter { types: set })
            })
            .clone()
    }

    pub fn default_filter(&self) -> Arc<TypeFilter> {
        self.get(&DEFAULT_ALERT_TYPES.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }
}

impl Default for TypeFilterFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let factory = TypeFilterFactory::new();
        let f = factory.get(&[]);
        assert!(f.matches("anything"));
    }

    #[test]
    fn filter_is_case_insensitive() {
        let factory = TypeFilterFactory::new();
        let f = factory.get(&["Flash".to_string()]);
        assert!(f.matches("flash"));
        assert!(!f.matches("urgent"));
    }

    #[test]
    fn memoization_returns_same_instance_regardless_of_order_or_case() {
        let factory = TypeFilterFactory::new();
        let a = factory.get(&["Flash".to_string(), "Urgent".to_string()]);
        let b = factory.get(&["urgent".to_string(), "flash".to_string()]);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_sets_produce_different_instances() {
        let factory = TypeFilterFactory::new();
        let a = factory.get(&["flash".to_string()]);
        let b = factory.get(&["urgent".to_string()]);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
