//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Add/remove computation between unordered keyed collections."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Set difference over keyed entries.
//!
//! Inputs are treated as sets: ordering is irrelevant and duplicate keys
//! collapse to their first occurrence. Output order is still deterministic,
//! `to_add` follows `new` and `to_remove` follows `old`.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::model::IpAccessEntry;

/// Entries to add and remove so that `old` becomes `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            to_add: Vec::new(),
            to_remove: Vec::new(),
        }
    }
}

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute `new - old` and `old - new` by key equality.
pub fn diff<'a, T, K, F>(old: &'a [T], new: &'a [T], key: F) -> Diff<T>
where
    T: Clone,
    K: Hash + Eq,
    F: Fn(&'a T) -> K,
{
    let old_index = index_by_key(old, &key);
    let new_index = index_by_key(new, &key);

    let to_add = new_index
        .iter()
        .filter(|(k, _)| !old_index.contains_key(*k))
        .map(|(_, entry)| (*entry).clone())
        .collect();
    let to_remove = old_index
        .iter()
        .filter(|(k, _)| !new_index.contains_key(*k))
        .map(|(_, entry)| (*entry).clone())
        .collect();

    Diff { to_add, to_remove }
}

/// Access-list diff keyed on `(source, description)`.
pub fn diff_ip_access(old: &[IpAccessEntry], new: &[IpAccessEntry]) -> Diff<IpAccessEntry> {
    diff(old, new, IpAccessEntry::key)
}

fn index_by_key<'a, T, K, F>(entries: &'a [T], key: &F) -> IndexMap<K, &'a T>
where
    K: Hash + Eq,
    F: Fn(&'a T) -> K,
{
    let mut index = IndexMap::with_capacity(entries.len());
    for entry in entries {
        index.entry(key(entry)).or_insert(entry);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, description: &str) -> IpAccessEntry {
        IpAccessEntry::new(source, description)
    }

    #[test]
    fn empty_inputs() {
        let none: Vec<IpAccessEntry> = Vec::new();
        assert!(diff_ip_access(&none, &none).is_empty());

        let b = vec![entry("1.2.3.4/32", "A")];
        let d = diff_ip_access(&none, &b);
        assert_eq!(d.to_add, b);
        assert!(d.to_remove.is_empty());

        let d = diff_ip_access(&b, &none);
        assert!(d.to_add.is_empty());
        assert_eq!(d.to_remove, b);
    }

    #[test]
    fn identical_collections_in_any_order_produce_nothing() {
        let a = vec![entry("1.2.3.4/32", "A"), entry("5.6.7.8/32", "B")];
        let b = vec![entry("5.6.7.8/32", "B"), entry("1.2.3.4/32", "A")];
        assert!(diff_ip_access(&a, &b).is_empty());
    }

    #[test]
    fn description_change_is_remove_plus_add() {
        let old = vec![entry("1.2.3.4/32", "office")];
        let new = vec![entry("1.2.3.4/32", "home")];
        let d = diff_ip_access(&old, &new);
        assert_eq!(d.to_add, vec![entry("1.2.3.4/32", "home")]);
        assert_eq!(d.to_remove, vec![entry("1.2.3.4/32", "office")]);
    }

    #[test]
    fn duplicates_collapse() {
        let old = vec![entry("1.2.3.4/32", "A")];
        let new = vec![
            entry("9.9.9.9/32", "C"),
            entry("9.9.9.9/32", "C"),
            entry("1.2.3.4/32", "A"),
        ];
        let d = diff_ip_access(&old, &new);
        assert_eq!(d.to_add, vec![entry("9.9.9.9/32", "C")]);
        assert!(d.to_remove.is_empty());
    }

    #[test]
    fn output_follows_input_order() {
        let old = vec![entry("3.3.3.3/32", ""), entry("1.1.1.1/32", ""), entry("2.2.2.2/32", "")];
        let new = vec![entry("6.6.6.6/32", ""), entry("2.2.2.2/32", ""), entry("4.4.4.4/32", "")];
        let d = diff_ip_access(&old, &new);
        assert_eq!(d.to_add, vec![entry("6.6.6.6/32", ""), entry("4.4.4.4/32", "")]);
        assert_eq!(d.to_remove, vec![entry("3.3.3.3/32", ""), entry("1.1.1.1/32", "")]);
    }

    #[test]
    fn generic_over_key_function() {
        let old = vec![1u32, 2, 3, 4];
        let new = vec![3u32, 4, 5];
        let d = diff(&old, &new, |n| *n);
        assert_eq!(d.to_add, vec![5]);
        assert_eq!(d.to_remove, vec![1, 2]);
    }
}
