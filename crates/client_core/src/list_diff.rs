//! Minimal list updates between two publications of a view, for list
//! renderers that animate inserts and removals and re-render changed rows.

use std::sync::Arc;

use shared::filter::FilterWithValue;

pub trait DiffCallback<T> {
    /// Whether `old` and `new` represent the same row.
    fn same_item(&self, old: &T, new: &T) -> bool;
    /// Whether a row that is the same item needs no re-render.
    fn same_contents(&self, old: &T, new: &T) -> bool;
}

/// Rows are the same item only if they are the same allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCallback;

impl<T: PartialEq> DiffCallback<Arc<T>> for IdentityCallback {
    fn same_item(&self, old: &Arc<T>, new: &Arc<T>) -> bool {
        Arc::ptr_eq(old, new)
    }

    fn same_contents(&self, old: &Arc<T>, new: &Arc<T>) -> bool {
        old == new
    }
}

/// Rows are the same item when they belong to the same filter key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedCallback;

impl DiffCallback<Arc<FilterWithValue>> for KeyedCallback {
    fn same_item(&self, old: &Arc<FilterWithValue>, new: &Arc<FilterWithValue>) -> bool {
        old.key() == new.key()
    }

    fn same_contents(&self, old: &Arc<FilterWithValue>, new: &Arc<FilterWithValue>) -> bool {
        Arc::ptr_eq(old, new) || old == new
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListUpdate {
    /// Index into the old list.
    Remove { index: usize },
    /// Index into the new list.
    Insert { index: usize },
    /// Index into the new list.
    Change { index: usize },
}

/// Updates turning `old` into `new`.
///
/// Removes come first in descending order, then inserts in ascending order,
/// then changes; applied in that order each index is valid.
pub fn diff<T, C: DiffCallback<T>>(old: &[T], new: &[T], callback: &C) -> Vec<ListUpdate> {
    let (n, m) = (old.len(), new.len());
    // lcs[i][j]: longest common run of same items in old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if callback.same_item(&old[i], &new[j]) {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut removes = Vec::new();
    let mut inserts = Vec::new();
    let mut changes = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if callback.same_item(&old[i], &new[j]) {
            if !callback.same_contents(&old[i], &new[j]) {
                changes.push(ListUpdate::Change { index: j });
            }
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            removes.push(ListUpdate::Remove { index: i });
            i += 1;
        } else {
            inserts.push(ListUpdate::Insert { index: j });
            j += 1;
        }
    }
    removes.extend((i..n).map(|index| ListUpdate::Remove { index }));
    inserts.extend((j..m).map(|index| ListUpdate::Insert { index }));

    removes.reverse();
    removes.extend(inserts);
    removes.extend(changes);
    removes
}

/// Holds the rendered list and reports what to update on each submission.
pub struct ListBinding<T, C> {
    items: Vec<T>,
    callback: C,
}

impl<T: Clone, C: DiffCallback<T>> ListBinding<T, C> {
    pub fn new(callback: C) -> Self {
        Self {
            items: Vec::new(),
            callback,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn submit(&mut self, items: &[T]) -> Vec<ListUpdate> {
        let updates = diff(&self.items, items, &self.callback);
        self.items = items.to_vec();
        updates
    }
}

#[cfg(test)]
mod tests {
    use shared::filter::{BooleanFilter, BooleanFilterValue, Filter, FilterValue};

    use super::*;

    fn entry(key: &str, value: bool) -> Arc<FilterWithValue> {
        let filter: Filter = BooleanFilter::new(key, key).into();
        Arc::new(
            FilterWithValue::pair(
                filter,
                FilterValue::Boolean(BooleanFilterValue {
                    key: key.into(),
                    value,
                }),
            )
            .expect("matching pair"),
        )
    }

    /// Replays updates on `old` using placeholders from `new`.
    fn apply<T: Clone>(old: &[T], new: &[T], updates: &[ListUpdate]) -> Vec<T> {
        let mut items = old.to_vec();
        for update in updates {
            match *update {
                ListUpdate::Remove { index } => {
                    items.remove(index);
                }
                ListUpdate::Insert { index } => items.insert(index, new[index].clone()),
                ListUpdate::Change { index } => items[index] = new[index].clone(),
            }
        }
        items
    }

    #[test]
    fn unchanged_shared_entries_produce_no_updates() {
        let a = entry("a", false);
        let b = entry("b", true);
        let old = vec![a.clone(), b.clone()];
        assert!(diff(&old, &old.clone(), &IdentityCallback).is_empty());
        assert!(diff(&old, &[a, b], &KeyedCallback).is_empty());
    }

    #[test]
    fn keyed_diff_reports_changes_in_place() {
        let old = vec![entry("a", false), entry("b", false)];
        let new = vec![old[0].clone(), entry("b", true)];
        let updates = diff(&old, &new, &KeyedCallback);
        assert_eq!(updates, vec![ListUpdate::Change { index: 1 }]);
        assert_eq!(apply(&old, &new, &updates), new);
    }

    #[test]
    fn identity_diff_treats_new_allocations_as_new_items() {
        let old = vec![entry("a", false)];
        let new = vec![entry("a", false)];
        let updates = diff(&old, &new, &IdentityCallback);
        assert_eq!(
            updates,
            vec![ListUpdate::Remove { index: 0 }, ListUpdate::Insert { index: 0 }]
        );
    }

    #[test]
    fn inserts_and_removes_land_at_their_positions() {
        let a = entry("a", false);
        let b = entry("b", false);
        let c = entry("c", false);
        let d = entry("d", false);
        let old = vec![a.clone(), b.clone(), c.clone()];
        let new = vec![d.clone(), a.clone(), c.clone(), entry("e", true)];

        let updates = diff(&old, &new, &KeyedCallback);
        assert_eq!(
            updates,
            vec![
                ListUpdate::Remove { index: 1 },
                ListUpdate::Insert { index: 0 },
                ListUpdate::Insert { index: 3 },
            ]
        );
        assert_eq!(apply(&old, &new, &updates), new);
    }

    #[test]
    fn binding_tracks_submitted_lists() {
        let mut binding = ListBinding::new(KeyedCallback);
        let first = vec![entry("a", false), entry("b", false)];
        assert_eq!(
            binding.submit(&first),
            vec![ListUpdate::Insert { index: 0 }, ListUpdate::Insert { index: 1 }]
        );
        assert_eq!(binding.submit(&first), Vec::new());
        assert_eq!(binding.items(), first.as_slice());

        let second = vec![first[1].clone()];
        assert_eq!(binding.submit(&second), vec![ListUpdate::Remove { index: 0 }]);
    }
}
