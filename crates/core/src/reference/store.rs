use std::collections::HashMap;

use crate::domain::product::ReferenceSet;

/// The reference memory of one session: the most recent search results and
/// the most recent compared set. Each write replaces its slot wholesale;
/// the two slots never merge.
///
/// Resolution always works on an owned snapshot, never on the live store,
/// so every reference resolved within one turn sees the same state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceSnapshot {
    pub last_search_results: Option<ReferenceSet>,
    pub last_compared_products: Option<ReferenceSet>,
}

impl ReferenceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.last_search_results.is_none() && self.last_compared_products.is_none()
    }
}

/// Session-keyed reference memory. In-memory only: losing it degrades later
/// reference resolution but never the correctness of explicit-id operations,
/// so nothing here touches durable storage.
///
/// The store does no locking of its own. Callers serialize turns per session
/// and wrap the store in whatever lock their runtime needs.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    sessions: HashMap<String, ReferenceSnapshot>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the session's reference memory. Idempotent, never fails.
    pub fn get(&mut self, session_id: &str) -> &ReferenceSnapshot {
        self.entry(session_id)
    }

    /// Owned copy of the session's reference memory for pure resolution.
    /// Unknown sessions read as empty.
    pub fn snapshot(&self, session_id: &str) -> ReferenceSnapshot {
        self.sessions.get(session_id).cloned().unwrap_or_default()
    }

    /// Replace `last_search_results`. The comparison slot is unaffected.
    pub fn record_search(&mut self, session_id: &str, results: ReferenceSet) {
        self.entry(session_id).last_search_results = Some(results);
    }

    /// Replace `last_compared_products`. The search slot is unaffected.
    pub fn record_comparison(&mut self, session_id: &str, products: ReferenceSet) {
        self.entry(session_id).last_compared_products = Some(products);
    }

    /// Reset both slots for an explicit session reset.
    pub fn clear(&mut self, session_id: &str) {
        if let Some(state) = self.sessions.get_mut(session_id) {
            *state = ReferenceSnapshot::default();
        }
    }

    /// Drop a session entirely (session expiry).
    pub fn remove(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    fn entry(&mut self, session_id: &str) -> &mut ReferenceSnapshot {
        self.sessions.entry(session_id.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ReferenceSnapshot, ReferenceStore};
    use crate::domain::product::{Product, ProductId, ReferenceSet};

    fn set(ids: &[i64]) -> ReferenceSet {
        ids.iter()
            .map(|id| Product {
                id: ProductId(*id),
                title: format!("product-{id}"),
                price: Decimal::from(*id),
                category: None,
                description: None,
                image: None,
            })
            .collect()
    }

    #[test]
    fn get_creates_empty_state_on_first_access() {
        let mut store = ReferenceStore::new();
        assert_eq!(store.get("s1"), &ReferenceSnapshot::default());
        // A second access observes the same (still empty) state.
        assert!(store.get("s1").is_empty());
    }

    #[test]
    fn record_search_overwrites_and_leaves_comparison_untouched() {
        let mut store = ReferenceStore::new();
        store.record_comparison("s1", set(&[9, 10]));
        store.record_search("s1", set(&[1, 2, 3]));
        store.record_search("s1", set(&[4]));

        let snapshot = store.snapshot("s1");
        assert_eq!(snapshot.last_search_results, Some(set(&[4])));
        assert_eq!(snapshot.last_compared_products, Some(set(&[9, 10])));
    }

    #[test]
    fn record_comparison_leaves_search_untouched() {
        let mut store = ReferenceStore::new();
        store.record_search("s1", set(&[1, 2]));
        store.record_comparison("s1", set(&[1, 2]));
        store.record_comparison("s1", set(&[2]));

        let snapshot = store.snapshot("s1");
        assert_eq!(snapshot.last_search_results, Some(set(&[1, 2])));
        assert_eq!(snapshot.last_compared_products, Some(set(&[2])));
    }

    #[test]
    fn clear_resets_both_slots() {
        let mut store = ReferenceStore::new();
        store.record_search("s1", set(&[1]));
        store.record_comparison("s1", set(&[1]));
        store.clear("s1");
        assert!(store.snapshot("s1").is_empty());
    }

    #[test]
    fn sessions_are_isolated() {
        let mut store = ReferenceStore::new();
        store.record_search("s1", set(&[1]));
        assert!(store.snapshot("s2").is_empty());
        store.clear("s2");
        assert_eq!(store.snapshot("s1").last_search_results, Some(set(&[1])));
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let mut store = ReferenceStore::new();
        store.record_search("s1", set(&[1, 2]));
        let snapshot = store.snapshot("s1");
        store.record_search("s1", set(&[3]));
        assert_eq!(snapshot.last_search_results, Some(set(&[1, 2])));
    }
}
