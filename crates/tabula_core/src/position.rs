//! Dense sibling ordering.
//!
//! # Responsibility
//! - Keep `position == index` for every sibling collection of one table.
//! - Validate and apply explicit total reorders in a single pass.
//!
//! # Invariants
//! - After every call positions are exactly `0..N-1`.
//! - A rejected reorder leaves the collection untouched.
//! - Reorders replace the whole order at once, never by pairwise moves.

use crate::model::property::Property;
use crate::model::row::Row;
use crate::model::view::View;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Rejection reasons for reorders and hydrated collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Reorder id list does not cover every sibling.
    LengthMismatch { expected: usize, actual: usize },
    /// Reorder id list names an id that is not a sibling.
    UnknownId(Uuid),
    /// Id appears more than once.
    DuplicateId(Uuid),
    /// Nil uuid used as an entity id.
    NilId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "reorder must list every sibling exactly once: expected {expected} ids, got {actual}"
            ),
            Self::UnknownId(id) => write!(f, "reorder references unknown id: {id}"),
            Self::DuplicateId(id) => write!(f, "id listed more than once: {id}"),
            Self::NilId => write!(f, "entity id must not be nil"),
        }
    }
}

impl Error for ValidationError {}

/// Sibling entity carrying a stable id and a dense position.
pub trait Positioned {
    fn id(&self) -> Uuid;
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

macro_rules! impl_positioned {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Positioned for $ty {
                fn id(&self) -> Uuid {
                    self.id
                }

                fn position(&self) -> usize {
                    self.position
                }

                fn set_position(&mut self, position: usize) {
                    self.position = position;
                }
            }
        )+
    };
}

impl_positioned!(Property, Row, View);

/// Rewrites `position = index` for every item.
pub fn reindex<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index);
    }
}

/// Checks that `ordered_ids` is exactly a permutation of the ids in `items`.
pub fn validate_permutation<T: Positioned>(
    items: &[T],
    ordered_ids: &[Uuid],
) -> Result<(), ValidationError> {
    let existing: Vec<Uuid> = items.iter().map(Positioned::id).collect();
    validate_id_permutation(&existing, ordered_ids)
}

/// Checks that `ordered_ids` is exactly a permutation of `existing`.
///
/// # Errors
/// - `UnknownId` for an id outside `existing`, `DuplicateId` for a repeated
///   id, `LengthMismatch` when some existing id is missing.
pub fn validate_id_permutation(
    existing: &[Uuid],
    ordered_ids: &[Uuid],
) -> Result<(), ValidationError> {
    let known: HashSet<Uuid> = existing.iter().copied().collect();
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if !known.contains(id) {
            return Err(ValidationError::UnknownId(*id));
        }
        if !seen.insert(*id) {
            return Err(ValidationError::DuplicateId(*id));
        }
    }
    if ordered_ids.len() != existing.len() {
        return Err(ValidationError::LengthMismatch {
            expected: existing.len(),
            actual: ordered_ids.len(),
        });
    }
    Ok(())
}

/// Replaces the order of `items` with `ordered_ids` and reindexes.
///
/// # Errors
/// - Returns `ValidationError` when `ordered_ids` is not an exact permutation
///   of the current ids; `items` is left unchanged in that case.
pub fn apply_order<T: Positioned>(
    items: &mut Vec<T>,
    ordered_ids: &[Uuid],
) -> Result<(), ValidationError> {
    validate_permutation(items, ordered_ids)?;

    let mut by_id: HashMap<Uuid, T> = items.drain(..).map(|item| (item.id(), item)).collect();
    let reordered: Vec<T> = ordered_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();
    *items = reordered;
    reindex(items);
    Ok(())
}

/// Normalizes a hydrated collection: rejects nil/duplicate ids, orders by
/// stored position (stable for ties) and reindexes densely.
pub fn normalize<T: Positioned>(items: &mut [T]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items.iter() {
        let id = item.id();
        if id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId(id));
        }
    }
    items.sort_by_key(Positioned::position);
    reindex(items);
    Ok(())
}

/// Returns whether positions are exactly `0..N-1` in slice order.
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index)
}
