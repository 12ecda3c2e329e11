use std::{collections::HashMap, sync::Arc};

use shared::{
    error::FilterError,
    filter::{Filter, FilterValue, FilterWithValue},
};
use tracing::debug;

/// Pairs every filter with its persisted value or its default.
///
/// Output follows `filters` order. Values whose key matches no filter are
/// dropped. A value of the wrong variant for its filter is an error.
pub fn join_filters(
    filters: &[Filter],
    values: &[FilterValue],
) -> Result<Vec<FilterWithValue>, FilterError> {
    let mut by_key: HashMap<&str, &FilterValue> = HashMap::with_capacity(values.len());
    for value in values {
        by_key.entry(value.key()).or_insert(value);
    }

    let joined = filters
        .iter()
        .map(|filter| match by_key.remove(filter.key()) {
            Some(value) => FilterWithValue::pair(filter.clone(), value.clone()),
            None => Ok(FilterWithValue::with_default(filter.clone())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !by_key.is_empty() {
        debug!(
            "filter join: dropped {} orphan values: {:?}",
            by_key.len(),
            by_key.keys().collect::<Vec<_>>()
        );
    }
    Ok(joined)
}

/// Wraps `next` for publication, reusing entries of `previous` that are
/// value-equal under the same key so unchanged items keep their identity.
pub fn share_unchanged(
    previous: &[Arc<FilterWithValue>],
    next: Vec<FilterWithValue>,
) -> Vec<Arc<FilterWithValue>> {
    let previous: HashMap<&str, &Arc<FilterWithValue>> =
        previous.iter().map(|entry| (entry.key(), entry)).collect();
    next.into_iter()
        .map(|entry| match previous.get(entry.key()) {
            Some(old) if ***old == entry => Arc::clone(old),
            _ => Arc::new(entry),
        })
        .collect()
}
