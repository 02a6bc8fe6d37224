//! Serializable table snapshot used for hydration and export.

use crate::model::property::Property;
use crate::model::row::Row;
use crate::model::view::View;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable table identifier.
pub type TableId = Uuid;

/// Full state of one table.
///
/// Collections are expected in position order when produced by
/// [`crate::engine::TableEngine::snapshot`]; hydration tolerates any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub id: TableId,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub views: Vec<View>,
}
