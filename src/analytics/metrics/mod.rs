//! Derived KPIs and the per-dimension groupings behind each page.
//!
//! Every ratio goes through [`safe_divide`], so a zero or undefined
//! denominator yields 0 rather than NaN or infinity.

pub mod financial;
pub mod operations;
pub mod patient;
pub mod scenario;

pub use financial::*;
pub use operations::*;
pub use patient::*;
pub use scenario::*;

use std::collections::{BTreeMap, BTreeSet};

/// `num / den`, or 0 when the result would not be finite.
pub fn safe_divide(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let value = num / den;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `num / den × 100` with the same zero policy.
pub fn ratio_pct(num: f64, den: f64) -> f64 {
    safe_divide(num, den) * 100.0
}

/// `(current / prior − 1) × 100`, defined only for a positive prior.
pub fn pct_change(current: f64, prior: f64) -> Option<f64> {
    if prior > 0.0 && current.is_finite() {
        Some((current / prior - 1.0) * 100.0)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════
// Reduction helpers
// ═══════════════════════════════════════════════════════════

pub(crate) fn sum_of<R>(rows: &[&R], value: impl Fn(&R) -> Option<f64>) -> f64 {
    rows.iter().filter_map(|r| value(r)).sum()
}

pub(crate) fn mean_of<R>(rows: &[&R], value: impl Fn(&R) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = rows.iter().filter_map(|r| value(r)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Share of rows satisfying `pred`, as a percentage.
pub(crate) fn share_pct<R>(rows: &[&R], pred: impl Fn(&R) -> bool) -> f64 {
    let hits = rows.iter().filter(|r| pred(r)).count();
    ratio_pct(hits as f64, rows.len() as f64)
}

pub(crate) fn distinct_count<'a>(ids: impl Iterator<Item = Option<&'a str>>) -> usize {
    ids.flatten().collect::<BTreeSet<_>>().len()
}

pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Group references to `rows` by `key`; rows without a key are dropped.
pub(crate) fn group_by<'a, R, K: Ord>(
    rows: &'a [R],
    key: impl Fn(&R) -> Option<K>,
) -> BTreeMap<K, Vec<&'a R>> {
    let mut groups: BTreeMap<K, Vec<&'a R>> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row);
        }
    }
    groups
}
