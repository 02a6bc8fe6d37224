//! Domain model for tables, their columns, records and saved views.
//!
//! # Responsibility
//! - Define the canonical data structures shared by stores, evaluation and
//!   persistence.
//! - Keep heterogeneous cell values as an explicit tagged union.
//!
//! # Invariants
//! - Every entity is identified by a stable, non-nil `Uuid`.
//! - Sibling collections carry dense `position` values `0..N-1`.

pub mod cell;
pub mod property;
pub mod row;
pub mod table;
pub mod view;
