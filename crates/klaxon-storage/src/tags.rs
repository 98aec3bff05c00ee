//! Reverse tag index arithmetic. An index entry maps one (tenant, category,
//! name) key to the set of trigger ids carrying that tag; these functions
//! compute the successor of an entry without touching storage, so backends
//! apply them atomically under their own locking and tests can cover the
//! edge cases directly.

use std::collections::HashSet;

/// Entry value after adding `trigger_id`. Adding an id that is already
/// present returns an equal set.
pub fn with_trigger(current: &HashSet<String>, trigger_id: &str) -> HashSet<String> {
    let mut next = current.clone();
    next.insert(trigger_id.to_string());
    next
}

/// Entry value after dropping `trigger_id`, or `None` when the set empties
/// and the entry itself should be deleted.
pub fn without_trigger(current: &HashSet<String>, trigger_id: &str) -> Option<HashSet<String>> {
    let mut next = current.clone();
    next.remove(trigger_id);
    if next.is_empty() {
        None
    } else {
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn with_trigger_is_idempotent() {
        let current = set(&["t1"]);
        let once = with_trigger(&current, "t2");
        let twice = with_trigger(&once, "t2");
        assert_eq!(once, set(&["t1", "t2"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn without_trigger_keeps_remaining_ids() {
        let current = set(&["t1", "t2"]);
        assert_eq!(without_trigger(&current, "t1"), Some(set(&["t2"])));
    }

    #[test]
    fn without_last_trigger_deletes_the_entry() {
        let current = set(&["t1"]);
        assert_eq!(without_trigger(&current, "t1"), None);
    }

    #[test]
    fn without_absent_trigger_leaves_entry_intact() {
        let current = set(&["t1"]);
        assert_eq!(without_trigger(&current, "t9"), Some(set(&["t1"])));
    }
}
