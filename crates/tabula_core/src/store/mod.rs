//! In-memory owners of a table's sibling collections.
//!
//! # Responsibility
//! - Own ordered properties, rows and views independently.
//! - Delegate every ordering change to [`crate::position`].
//!
//! # Invariants
//! - Each collection is stored in position order with `position == index`.
//! - Unknown ids on update/remove are benign no-ops returning `None`.
//! - Cross-collection cascades are orchestrated by the table engine, not here.

pub mod property_schema;
pub mod row_store;
pub mod view_registry;

const UNTITLED: &str = "Untitled";

/// Trims a display name, falling back to `Untitled` when blank.
pub(crate) fn normalize_name(value: impl Into<String>) -> String {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}
