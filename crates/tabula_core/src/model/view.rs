//! Saved views over a table's shared row set.
//!
//! # Responsibility
//! - Describe display kind plus filter/sort configuration for one view.
//!
//! # Invariants
//! - Filters combine with logical AND, in list order.
//! - Sort keys apply in list order; the first non-equal key decides.
//! - Config entries may reference properties that no longer exist; such
//!   entries are inert during evaluation.

use crate::model::cell::CellValue;
use crate::model::property::{Property, PropertyId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable view identifier.
pub type ViewId = Uuid;

/// Presentation kind of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Table,
    Kanban,
    List,
    Gallery,
    Calendar,
}

/// Filter operator applied to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Case-insensitive substring match on text representations.
    Contains,
    /// Case-insensitive text equality.
    Equals,
    /// Case-insensitive text inequality.
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Exact value equality without stringification.
    Is,
    /// Exact value inequality without stringification.
    IsNot,
    /// Lexicographic text comparison; not calendar aware.
    Before,
    /// Lexicographic text comparison; not calendar aware.
    After,
    IsChecked,
    IsUnchecked,
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub property_id: PropertyId,
    pub operator: FilterOperator,
    /// Ignored by unary operators (`is_empty`, `is_checked`, ...).
    #[serde(default)]
    pub operand: CellValue,
}

impl Predicate {
    pub fn new(
        property_id: PropertyId,
        operator: FilterOperator,
        operand: impl Into<CellValue>,
    ) -> Self {
        Self {
            property_id,
            operator,
            operand: operand.into(),
        }
    }

    /// Builds a predicate for operators that take no operand.
    pub fn unary(property_id: PropertyId, operator: FilterOperator) -> Self {
        Self {
            property_id,
            operator,
            operand: CellValue::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property_id: PropertyId,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(property_id: PropertyId) -> Self {
        Self {
            property_id,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property_id: PropertyId) -> Self {
        Self {
            property_id,
            direction: SortDirection::Desc,
        }
    }
}

/// Filter/sort/display configuration of a view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub filters: Vec<Predicate>,
    #[serde(default)]
    pub sorts: Vec<SortKey>,
    /// Columns hidden in this view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_properties: Vec<PropertyId>,
    /// Grouping column for kanban-like views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<PropertyId>,
}

impl ViewConfig {
    /// Returns whether any entry of this config references `property_id`.
    pub fn references(&self, property_id: PropertyId) -> bool {
        self.filters
            .iter()
            .any(|predicate| predicate.property_id == property_id)
            || self.sorts.iter().any(|key| key.property_id == property_id)
            || self.hidden_properties.contains(&property_id)
            || self.group_by == Some(property_id)
    }

    /// Drops every entry that references `property_id`.
    pub fn forget_property(&mut self, property_id: PropertyId) {
        self.filters
            .retain(|predicate| predicate.property_id != property_id);
        self.sorts.retain(|key| key.property_id != property_id);
        self.hidden_properties.retain(|id| *id != property_id);
        if self.group_by == Some(property_id) {
            self.group_by = None;
        }
    }
}

/// Saved view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    pub name: String,
    pub kind: ViewKind,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ViewConfig>,
}

impl View {
    pub fn filters(&self) -> &[Predicate] {
        self.config
            .as_ref()
            .map_or(&[], |config| config.filters.as_slice())
    }

    pub fn sorts(&self) -> &[SortKey] {
        self.config
            .as_ref()
            .map_or(&[], |config| config.sorts.as_slice())
    }

    pub fn group_by(&self) -> Option<PropertyId> {
        self.config.as_ref().and_then(|config| config.group_by)
    }

    /// Returns `properties` in position order minus the ones this view hides.
    pub fn visible_properties<'a>(&self, properties: &'a [Property]) -> Vec<&'a Property> {
        let hidden = self
            .config
            .as_ref()
            .map_or(&[][..], |config| config.hidden_properties.as_slice());
        let mut visible: Vec<&Property> = properties
            .iter()
            .filter(|property| !hidden.contains(&property.id))
            .collect();
        visible.sort_by_key(|property| property.position);
        visible
    }
}

/// Partial update for a view. `None` fields are left untouched.
///
/// `config` replaces the whole config first; `filters`/`sorts` then replace
/// single fields of the resulting config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewPatch {
    pub name: Option<String>,
    pub kind: Option<ViewKind>,
    /// `Some(None)` clears the config.
    pub config: Option<Option<ViewConfig>>,
    pub filters: Option<Vec<Predicate>>,
    pub sorts: Option<Vec<SortKey>>,
}

impl ViewPatch {
    pub fn filters(filters: Vec<Predicate>) -> Self {
        Self {
            filters: Some(filters),
            ..Self::default()
        }
    }

    pub fn sorts(sorts: Vec<SortKey>) -> Self {
        Self {
            sorts: Some(sorts),
            ..Self::default()
        }
    }
}
