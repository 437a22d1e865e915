//! Structural diff computation.
//!
//! [`compute_delta`] walks two snapshots key by key and reports every
//! difference with its full path. Objects recurse per key, arrays recurse over
//! their common prefix and report growth or shrinkage as `ArrayChange`, and any
//! other mismatch is an `Edit`.

use crate::diff::model::{ArrayItem, DiffEntry};
use crate::model::{FieldValue, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// Equality strategy applied to candidate `Edit` entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// Keep every structurally detected edit
    #[default]
    Exact,
    /// Drop edits whose two sides are loosely equal (`"1"` vs `1`, `true` vs `1`)
    Coerced,
}

impl Comparison {
    pub fn equals(self, lhs: &FieldValue, rhs: &FieldValue) -> bool {
        match self {
            Comparison::Exact => exact_equals(lhs, rhs),
            Comparison::Coerced => coerced_equals(lhs, rhs),
        }
    }
}

/// Structural equality; NaN equals NaN so that a snapshot always equals itself
pub fn exact_equals(lhs: &FieldValue, rhs: &FieldValue) -> bool {
    match (lhs, rhs) {
        (FieldValue::Number(a), FieldValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (FieldValue::Object(a), FieldValue::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| exact_equals(v, w)))
        }
        (FieldValue::Array(a), FieldValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(v, w)| exact_equals(v, w))
        }
        _ => lhs == rhs,
    }
}

/// Loose equality tolerating representational noise
///
/// Null only equals null. Text compares to a date by RFC 3339 parse, and
/// scalars of different types compare by numeric coercion.
pub fn coerced_equals(lhs: &FieldValue, rhs: &FieldValue) -> bool {
    if exact_equals(lhs, rhs) {
        return true;
    }
    match (lhs, rhs) {
        (FieldValue::Null, _) | (_, FieldValue::Null) => false,
        (FieldValue::Text(_), FieldValue::Text(_)) => false,
        (a, b) if a.is_nested() || b.is_nested() => false,
        (FieldValue::Date(d), FieldValue::Text(s)) | (FieldValue::Text(s), FieldValue::Date(d)) => {
            chrono::DateTime::parse_from_rfc3339(s).is_ok_and(|parsed| parsed == *d)
                || s.trim().parse::<f64>().ok() == Some(d.timestamp_millis() as f64)
        }
        (a, b) => match (a.to_number(), b.to_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Compute the field-level differences between two snapshots.
///
/// Entries whose path contains a name from `excluded` are discarded, at any
/// depth. Returns `None` when no entry remains.
pub fn compute_delta(
    previous: &Snapshot,
    next: &Snapshot,
    excluded: &BTreeSet<String>,
    comparison: Comparison,
) -> Option<Vec<DiffEntry>> {
    let mut entries = Vec::new();
    let mut path = Vec::new();
    diff_fields(
        previous.iter(),
        next.iter(),
        &mut path,
        comparison,
        &mut entries,
    );

    entries.retain(|entry| !entry.touches_any(excluded));

    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

fn diff_fields<'a>(
    lhs: impl Iterator<Item = (&'a String, &'a FieldValue)>,
    rhs: impl Iterator<Item = (&'a String, &'a FieldValue)>,
    path: &mut Vec<String>,
    comparison: Comparison,
    out: &mut Vec<DiffEntry>,
) {
    let mut sides: BTreeMap<&str, (Option<&FieldValue>, Option<&FieldValue>)> = BTreeMap::new();
    for (key, value) in lhs {
        sides.entry(key.as_str()).or_default().0 = Some(value);
    }
    for (key, value) in rhs {
        sides.entry(key.as_str()).or_default().1 = Some(value);
    }

    for (key, (old, new)) in sides {
        path.push(key.to_string());
        match (old, new) {
            (Some(old), Some(new)) => diff_values(old, new, path, comparison, out),
            (None, Some(new)) => out.push(DiffEntry::New {
                path: path.clone(),
                rhs: new.clone(),
            }),
            (Some(old), None) => out.push(DiffEntry::Delete {
                path: path.clone(),
                lhs: old.clone(),
            }),
            (None, None) => {}
        }
        path.pop();
    }
}

fn diff_values(
    lhs: &FieldValue,
    rhs: &FieldValue,
    path: &mut Vec<String>,
    comparison: Comparison,
    out: &mut Vec<DiffEntry>,
) {
    match (lhs, rhs) {
        (FieldValue::Object(a), FieldValue::Object(b)) => {
            diff_fields(a.iter(), b.iter(), path, comparison, out);
        }
        (FieldValue::Array(a), FieldValue::Array(b)) => {
            for (index, (old, new)) in a.iter().zip(b).enumerate() {
                path.push(index.to_string());
                diff_values(old, new, path, comparison, out);
                path.pop();
            }
            for (index, old) in a.iter().enumerate().skip(b.len()) {
                out.push(DiffEntry::ArrayChange {
                    path: path.clone(),
                    index,
                    item: ArrayItem::Delete { lhs: old.clone() },
                });
            }
            for (index, new) in b.iter().enumerate().skip(a.len()) {
                out.push(DiffEntry::ArrayChange {
                    path: path.clone(),
                    index,
                    item: ArrayItem::New { rhs: new.clone() },
                });
            }
        }
        _ => {
            if !comparison.equals(lhs, rhs) {
                out.push(DiffEntry::Edit {
                    path: path.clone(),
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                });
            }
        }
    }
}
