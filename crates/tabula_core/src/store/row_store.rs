//! Ordered records of one table.
//!
//! # Invariants
//! - `update` is a shallow merge: keys absent from the patch are untouched,
//!   keys present overwrite (a `Null` value clears but keeps the key).
//! - Bulk deletion reindexes once, after every removal.

use crate::model::property::PropertyId;
use crate::model::row::{Cells, Row, RowId};
use crate::position::{self, ValidationError};
use std::collections::HashSet;
use uuid::Uuid;

/// Owner of a table's rows, kept in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStore {
    rows: Vec<Row>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from hydrated rows, normalizing positions.
    pub fn from_rows(mut rows: Vec<Row>) -> Result<Self, ValidationError> {
        position::normalize(&mut rows)?;
        Ok(Self { rows })
    }

    /// Rows in position order.
    pub fn all(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row at the next position.
    pub fn add(&mut self, cells: Cells) -> &Row {
        self.push(Uuid::new_v4(), cells)
    }

    /// Appends a row with a caller-provided stable id.
    ///
    /// # Errors
    /// - `NilId` for a nil id, `DuplicateId` when the id is already taken.
    pub fn add_with_id(&mut self, id: RowId, cells: Cells) -> Result<&Row, ValidationError> {
        if id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.get(id).is_some() {
            return Err(ValidationError::DuplicateId(id));
        }
        Ok(self.push(id, cells))
    }

    /// Shallow-merges `patch` into the row's cells. Returns `None` for
    /// unknown ids.
    pub fn update(&mut self, id: RowId, patch: Cells) -> Option<&Row> {
        let row = self.rows.iter_mut().find(|row| row.id == id)?;
        row.cells.extend(patch);
        Some(&*row)
    }

    /// Removes one row and reindexes the rest.
    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let index = self.rows.iter().position(|row| row.id == id)?;
        let removed = self.rows.remove(index);
        position::reindex(&mut self.rows);
        Some(removed)
    }

    /// Removes every row listed in `ids`, ignoring unknown ids.
    ///
    /// Returns the ids actually removed, in their former position order.
    pub fn remove_many(&mut self, ids: &[RowId]) -> Vec<RowId> {
        let wanted: HashSet<RowId> = ids.iter().copied().collect();
        let mut removed = Vec::new();
        self.rows.retain(|row| {
            if wanted.contains(&row.id) {
                removed.push(row.id);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            position::reindex(&mut self.rows);
        }
        removed
    }

    /// Replaces the whole row order.
    ///
    /// # Errors
    /// - Returns `ValidationError` unless `ordered_ids` is an exact
    ///   permutation of the current ids.
    pub fn reorder(&mut self, ordered_ids: &[RowId]) -> Result<(), ValidationError> {
        position::apply_order(&mut self.rows, ordered_ids)
    }

    /// Deletes the `property_id` key from every row. Returns rows touched.
    pub fn forget_property(&mut self, property_id: PropertyId) -> usize {
        self.rows
            .iter_mut()
            .filter_map(|row| row.cells.remove(&property_id))
            .count()
    }

    fn push(&mut self, id: RowId, cells: Cells) -> &Row {
        let position = self.rows.len();
        self.rows.push(Row {
            id,
            position,
            cells,
        });
        &self.rows[position]
    }
}
