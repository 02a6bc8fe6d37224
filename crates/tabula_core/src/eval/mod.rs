//! Read-side projection of a table through one view.
//!
//! # Responsibility
//! - Combine rows, properties and a view into a filtered, sorted row list.
//! - Stay pure: evaluation never mutates and never fails.
//!
//! # Invariants
//! - Output starts from rows in position order; sorting is stable on top.
//! - Filters and sort keys naming a property missing from `properties` are
//!   skipped, so stale view configs degrade to a no-op.
//! - Without a view the projection is every row in position order.

pub mod filter;
pub mod group;
pub mod sort;

use crate::model::property::{Property, PropertyId};
use crate::model::row::Row;
use crate::model::view::{Predicate, View};
use log::trace;
use std::collections::HashSet;

pub use group::{group_rows, RowGroup};

/// Evaluates `view` over `rows`.
pub fn evaluate<'a>(view: Option<&View>, rows: &'a [Row], properties: &[Property]) -> Vec<&'a Row> {
    let mut projection: Vec<&Row> = rows.iter().collect();
    projection.sort_by_key(|row| row.position);

    let Some(view) = view else {
        return projection;
    };

    let known: HashSet<PropertyId> = properties.iter().map(|property| property.id).collect();
    let active: Vec<&Predicate> = view
        .filters()
        .iter()
        .filter(|predicate| known.contains(&predicate.property_id))
        .collect();
    let skipped = view.filters().len() - active.len();
    if skipped > 0 {
        trace!(
            "event=evaluate module=eval status=degraded view_id={} skipped_filters={}",
            view.id,
            skipped
        );
    }

    if !active.is_empty() {
        projection.retain(|row| {
            active
                .iter()
                .all(|predicate| filter::matches(row, predicate))
        });
    }

    sort::sort_rows(&mut projection, view.sorts(), &known);
    projection
}
