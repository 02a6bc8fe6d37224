//! Core of the tabular view engine.
//! Owns table state, view evaluation and the persistence contract; hosts
//! drive it through [`TableEngine`].

pub mod config;
pub mod db;
pub mod engine;
pub mod eval;
pub mod logging;
pub mod model;
pub mod persist;
pub mod position;
pub mod store;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::{TableChange, TableEngine};
pub use eval::{evaluate, group_rows, RowGroup};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::cell::CellValue;
pub use model::property::{
    Property, PropertyConfig, PropertyId, PropertyPatch, PropertyType, SelectOption,
};
pub use model::row::{Cells, Row, RowId};
pub use model::table::{TableId, TableSnapshot};
pub use model::view::{
    FilterOperator, Predicate, SortDirection, SortKey, View, ViewConfig, ViewId, ViewKind,
    ViewPatch,
};
pub use persist::{
    EntityKind, PersistOp, PersistRequest, PersistResult, Persistence, PersistenceError,
    SqlitePersistence,
};
pub use position::ValidationError;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
