//! Persistence collaborator contract.
//!
//! # Responsibility
//! - Describe the `(entity kind, operation, payload)` round trip a host runs
//!   after a local mutation commits.
//! - Convert engine change notifications into persist requests.
//!
//! # Invariants
//! - The engine never calls persistence itself and never retries.
//! - Collaborator failures surface verbatim; rollback is the host's call.

pub mod sqlite;

use crate::db::DbError;
use crate::engine::TableChange;
use crate::model::table::TableId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub use sqlite::SqlitePersistence;

pub type PersistResult<T> = Result<T, PersistenceError>;

/// Kind of entity a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Property,
    Row,
    View,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Property => "property",
            Self::Row => "row",
            Self::View => "view",
        }
    }
}

/// Operation applied to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOp {
    Create,
    Update,
    /// Payload: `{"ids": [...]}`.
    Delete,
    /// Payload: `{"ids": [...]}` listing every sibling in the new order.
    Reorder,
}

impl PersistOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
        }
    }
}

/// One persistence round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistRequest {
    pub table_id: TableId,
    pub entity: EntityKind,
    pub operation: PersistOp,
    pub payload: Value,
}

/// Errors reported by a persistence collaborator.
#[derive(Debug)]
pub enum PersistenceError {
    /// Payload or request rejected by the store.
    Validation(String),
    /// Target entity does not exist in the store.
    NotFound { entity: EntityKind, id: Uuid },
    /// Storage transport failure.
    Storage(DbError),
    /// Stored data cannot be converted back to a valid entity.
    InvalidData(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "persist request rejected: {message}"),
            Self::NotFound { entity, id } => {
                write!(f, "{} not found in store: {id}", entity.as_str())
            }
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(_) | Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// Out-of-process store reached by the host after local commits.
pub trait Persistence {
    /// Applies `request` and returns the canonical stored entity.
    fn persist(&self, request: &PersistRequest) -> PersistResult<Value>;
}

impl TableChange {
    /// Builds the persist request mirroring this change.
    ///
    /// # Errors
    /// - `InvalidData` when the entity cannot be serialized.
    pub fn persist_request(&self, table_id: TableId) -> PersistResult<PersistRequest> {
        let (entity, operation, payload) = match self {
            Self::TableRenamed { name } => {
                (EntityKind::Table, PersistOp::Update, json!({ "name": name }))
            }
            Self::PropertyAdded(property) => {
                (EntityKind::Property, PersistOp::Create, to_payload(property)?)
            }
            Self::PropertyUpdated(property) => {
                (EntityKind::Property, PersistOp::Update, to_payload(property)?)
            }
            Self::PropertyRemoved(id) => {
                (EntityKind::Property, PersistOp::Delete, json!({ "ids": [id] }))
            }
            Self::PropertiesReordered(ids) => {
                (EntityKind::Property, PersistOp::Reorder, json!({ "ids": ids }))
            }
            Self::RowAdded(row) => (EntityKind::Row, PersistOp::Create, to_payload(row)?),
            Self::RowUpdated(row) => (EntityKind::Row, PersistOp::Update, to_payload(row)?),
            Self::RowsDeleted(ids) => (EntityKind::Row, PersistOp::Delete, json!({ "ids": ids })),
            Self::RowsReordered(ids) => {
                (EntityKind::Row, PersistOp::Reorder, json!({ "ids": ids }))
            }
            Self::ViewAdded(view) => (EntityKind::View, PersistOp::Create, to_payload(view)?),
            Self::ViewUpdated(view) => (EntityKind::View, PersistOp::Update, to_payload(view)?),
            Self::ViewDeleted(id) => (EntityKind::View, PersistOp::Delete, json!({ "ids": [id] })),
            Self::ViewsReordered(ids) => {
                (EntityKind::View, PersistOp::Reorder, json!({ "ids": ids }))
            }
        };
        Ok(PersistRequest {
            table_id,
            entity,
            operation,
            payload,
        })
    }
}

fn to_payload<T: Serialize>(value: &T) -> PersistResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| PersistenceError::InvalidData(format!("cannot serialize entity: {err}")))
}
