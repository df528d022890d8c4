//! Bulk selection: the set of rows an operator has checked.
//!
//! The set never prunes itself. Whoever refreshes the list underneath it
//! calls [`SelectionSet::retain_present`].

use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct SelectionSet<K> {
    selected: HashSet<K>,
}

impl<K> Default for SelectionSet<K> {
    fn default() -> Self {
        Self {
            selected: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + Ord> SelectionSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether `id` is
    /// selected afterwards.
    pub fn toggle(&mut self, id: K) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Select every id in `ids`. Existing selections are kept.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = K>) {
        self.selected.extend(ids);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &K) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected ids, sorted.
    pub fn ids(&self) -> Vec<K> {
        let mut ids: Vec<K> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop every selected id not in `present`. Returns how many were dropped.
    pub fn retain_present<'a>(&mut self, present: impl IntoIterator<Item = &'a K>) -> usize
    where
        K: 'a,
    {
        let present: HashSet<&K> = present.into_iter().collect();
        let before = self.selected.len();
        self.selected.retain(|id| present.contains(id));
        before - self.selected.len()
    }
}
