//! The bounded, time-ordered alert cache (C2).
//!
//! Generalizes the teacher's `AppState::add_access_log` "keep last N" trim
//! idiom into a cache with a secondary id index, admission-time type
//! filtering, age eviction, and duplicate suppression.

use crate::vendor::types::{Alert, ListEntry};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CACHE_MAX_ITEMS: usize = 100;
pub const DEFAULT_CACHE_MAX_AGE_MS: i64 = 72 * 60 * 60 * 1000;

struct Inner {
    /// Newest-first by `alertTimestamp` (invariant I2).
    ordered: VecDeque<Alert>,
    by_id: HashMap<String, Alert>,
    lists: Vec<ListEntry>,
}

pub struct AlertStore {
    inner: RwLock<Inner>,
    max_items: usize,
    max_age_ms: i64,
}

impl AlertStore {
    pub fn new(max_items: usize, max_age_ms: i64) -> Self {
        Self {
            inner: RwLock::new(Inner { ordered: VecDeque::new(), by_id: HashMap::new(), lists: Vec::new() }),
            max_items,
            max_age_ms,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_MAX_ITEMS, DEFAULT_CACHE_MAX_AGE_MS)
    }

    /// Admits `alert` if it is identified, passes `type_filter`, and is not
    /// older than `max_age_ms` relative to `now_ms`. Duplicate ids are
    /// first-write-wins (I5): a repeat insertion of an already-known id is a
    /// no-op. Returns true if the alert was admitted.
    pub fn add(&self, alert: Alert, type_filter: &(impl Fn(&str) -> bool + ?Sized), now_ms: i64) -> bool {
        if !alert.is_identified() {
            log::warn!("dropping alert with empty alertId");
            return false;
        }
        if !type_filter(&alert.type_lower()) {
            return false;
        }
        if now_ms.saturating_sub(alert.alert_timestamp) > self.max_age_ms {
            return false;
        }

        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&alert.alert_id) {
            return false;
        }

        let pos = inner
            .ordered
            .iter()
            .position(|existing| existing.alert_timestamp < alert.alert_timestamp)
            .unwrap_or(inner.ordered.len());
        inner.by_id.insert(alert.alert_id.clone(), alert.clone());
        inner.ordered.insert(pos, alert);

        while inner.ordered.len() > self.max_items {
            if let Some(evicted) = inner.ordered.pop_back() {
                inner.by_id.remove(&evicted.alert_id);
            }
        }
        true
    }

    /// All alerts newer than `since_ms` (exclusive), newest-first. With no
    /// bound, returns the whole ordered sequence.
    pub fn get_all(&self, since_ms: Option<i64>) -> Vec<Alert> {
        let inner = self.inner.read();
        match since_ms {
            None => inner.ordered.iter().cloned().collect(),
            Some(since) => {
                // Ordered newest-first: stop at the first entry at or before `since`.
                let mut out = Vec::new();
                for alert in inner.ordered.iter() {
                    if alert.alert_timestamp <= since {
                        break;
                    }
                    out.push(alert.clone());
                }
                out
            }
        }
    }

    pub fn get_by_id(&self, alert_id: &str) -> Option<Alert> {
        self.inner.read().by_id.get(alert_id).cloned()
    }

    pub fn latest_timestamp(&self) -> Option<i64> {
        self.inner.read().ordered.front().map(|a| a.alert_timestamp)
    }

    pub fn lists(&self) -> Vec<ListEntry> {
        self.inner.read().lists.clone()
    }

    pub fn set_lists(&self, lists: Vec<ListEntry>) {
        self.inner.write().lists = lists;
    }

    pub fn len(&self) -> usize {
        self.inner.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.ordered.clear();
        inner.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn alert(id: &str, ts: i64, type_name: &str) -> Alert {
        Alert {
            alert_id: id.to_string(),
            alert_timestamp: ts,
            alert_type: crate::vendor::types::AlertType { name: type_name.to_string() },
            headline: "h".to_string(),
            lists_matched: None,
            extra: StdHashMap::new(),
        }
    }

    fn allow_all(_: &str) -> bool {
        true
    }

    #[test]
    fn ordering_is_newest_first() {
        let store = AlertStore::new(10, i64::MAX);
        store.add(alert("a", 100, "flash"), &allow_all, 1000);
        store.add(alert("b", 300, "flash"), &allow_all, 1000);
        store.add(alert("c", 200, "flash"), &allow_all, 1000);

        let all = store.get_all(None);
        let ids: Vec<_> = all.iter().map(|a| a.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn duplicate_id_is_first_write_wins() {
        let store = AlertStore::new(10, i64::MAX);
        store.add(alert("a", 100, "flash"), &allow_all, 1000);
        let admitted = store.add(alert("a", 999, "flash"), &allow_all, 1000);
        assert!(!admitted);
        assert_eq!(store.get_by_id("a").unwrap().alert_timestamp, 100);
    }

    #[test]
    fn bound_evicts_oldest_first() {
        let store = AlertStore::new(2, i64::MAX);
        store.add(alert("a", 100, "flash"), &allow_all, 1000);
        store.add(alert("b", 200, "flash"), &allow_all, 1000);
        store.add(alert("c", 300, "flash"), &allow_all, 1000);

        assert_eq!(store.len(), 2);
        assert!(store.get_by_id("a").is_none());
        assert!(store.get_by_id("b").is_some());
        assert!(store.get_by_id("c").is_some());
    }

    #[test]
    fn age_bound_rejects_stale_alerts() {
        let store = AlertStore::new(10, 1000);
        let admitted = store.add(alert("a", 0, "flash"), &allow_all, 5000);
        assert!(!admitted);
    }

    #[test]
    fn type_filter_blocks_admission() {
        let store = AlertStore::new(10, i64::MAX);
        let admitted = store.add(alert("a", 100, "boring"), &|t| t == "flash", 1000);
        assert!(!admitted);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn unidentified_alert_is_rejected() {
        let store = AlertStore::new(10, i64::MAX);
        let admitted = store.add(alert("", 100, "flash"), &allow_all, 1000);
        assert!(!admitted);
    }

    #[test]
    fn get_all_since_excludes_at_or_before_boundary() {
        let store = AlertStore::new(10, i64::MAX);
        store.add(alert("a", 100, "flash"), &allow_all, 1000);
        store.add(alert("b", 200, "flash"), &allow_all, 1000);
        let since = store.get_all(Some(100));
        let ids: Vec<_> = since.iter().map(|a| a.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn mapping_domain_matches_ordered_sequence() {
        let store = AlertStore::new(2, i64::MAX);
        store.add(alert("a", 100, "flash"), &allow_all, 1000);
        store.add(alert("b", 200, "flash"), &allow_all, 1000);
        store.add(alert("c", 300, "flash"), &allow_all, 1000);

        let inner = store.inner.read();
        let ordered_ids: std::collections::HashSet<_> =
            inner.ordered.iter().map(|a| a.alert_id.clone()).collect();
        let mapped_ids: std::collections::HashSet<_> = inner.by_id.keys().cloned().collect();
        assert_eq!(ordered_ids, mapped_ids);
    }
}
