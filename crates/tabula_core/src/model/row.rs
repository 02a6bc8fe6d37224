//! Row (record) model.

use crate::model::cell::CellValue;
use crate::model::property::PropertyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable row identifier.
pub type RowId = Uuid;

/// Sparse cell map keyed by property id. A missing key means "no value".
pub type Cells = BTreeMap<PropertyId, CellValue>;

/// One record of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub position: usize,
    #[serde(default)]
    pub cells: Cells,
}

impl Row {
    /// Returns the cell for `property_id`, treating `Null` as present.
    pub fn cell(&self, property_id: PropertyId) -> Option<&CellValue> {
        self.cells.get(&property_id)
    }
}
