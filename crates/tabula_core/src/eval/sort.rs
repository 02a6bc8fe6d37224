//! Multi-key stable row sorting.
//!
//! # Invariants
//! - Ordering is total over any mix of cell variants: missing/`Null`/`NaN`
//!   first, then numbers, then booleans, then everything else by text.
//! - Sort keys are computed once per row and key before sorting.

use crate::model::cell::CellValue;
use crate::model::property::PropertyId;
use crate::model::row::Row;
use crate::model::view::{SortDirection, SortKey};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Comparable projection of one cell.
#[derive(Debug)]
enum SortValue {
    Missing,
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl SortValue {
    fn of(value: Option<&CellValue>) -> Self {
        match value {
            None | Some(CellValue::Null) => Self::Missing,
            Some(CellValue::Number(number)) if number.is_nan() => Self::Missing,
            Some(CellValue::Number(number)) => Self::Number(*number),
            Some(CellValue::Boolean(flag)) => Self::Boolean(*flag),
            Some(other) => Self::Text(other.to_text()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Boolean(_) => 2,
            Self::Text(_) => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left.total_cmp(right),
            (Self::Boolean(left), Self::Boolean(right)) => left.cmp(right),
            (Self::Text(left), Self::Text(right)) => collate(left, right),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Generic cell ordering: missing/`Null`/`NaN` lowest, numbers numerically,
/// booleans as 0/1, text by case-folded collation. Mixed variants order by
/// class in that sequence.
pub fn compare_values(left: Option<&CellValue>, right: Option<&CellValue>) -> Ordering {
    SortValue::of(left).compare(&SortValue::of(right))
}

/// Case-insensitive ordering; on a tie lowercase sorts before uppercase.
pub fn collate(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| right.cmp(left))
}

/// Sorts `rows` in place by `sorts`, skipping keys whose property is not in
/// `known`. Rows equal on every key keep their incoming relative order.
pub fn sort_rows(rows: &mut [&Row], sorts: &[SortKey], known: &HashSet<PropertyId>) {
    let keys: Vec<&SortKey> = sorts
        .iter()
        .filter(|key| known.contains(&key.property_id))
        .collect();
    if keys.is_empty() {
        return;
    }

    let mut decorated: Vec<(Vec<SortValue>, &Row)> = rows
        .iter()
        .map(|row| {
            let values = keys
                .iter()
                .map(|key| SortValue::of(row.cell(key.property_id)))
                .collect();
            (values, *row)
        })
        .collect();

    decorated.sort_by(|(left, _), (right, _)| {
        for ((key, left), right) in keys.iter().zip(left).zip(right) {
            let ordering = match key.direction {
                SortDirection::Asc => left.compare(right),
                SortDirection::Desc => left.compare(right).reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    for (slot, (_, row)) in rows.iter_mut().zip(decorated) {
        *slot = row;
    }
}
