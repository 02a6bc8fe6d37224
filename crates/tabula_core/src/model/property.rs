//! Property (column) definitions.
//!
//! # Responsibility
//! - Describe one typed column of a table and its type-specific config.
//!
//! # Invariants
//! - `id` is stable for the property lifetime and never reused.
//! - Changing `kind` never rewrites stored cell values.

use crate::model::cell::CellValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable property identifier.
pub type PropertyId = Uuid;

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Checkbox,
    Date,
    Url,
}

impl PropertyType {
    /// Returns whether `value` has the variant this type expects.
    ///
    /// `Null` is accepted by every type.
    pub fn accepts(self, value: &CellValue) -> bool {
        matches!(
            (self, value),
            (_, CellValue::Null)
                | (Self::Text, CellValue::Text(_))
                | (Self::Number, CellValue::Number(_))
                | (Self::Select, CellValue::Select(_))
                | (Self::MultiSelect, CellValue::MultiSelect(_))
                | (Self::Checkbox, CellValue::Boolean(_))
                | (Self::Date, CellValue::Date(_))
                | (Self::Url, CellValue::Url(_))
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Url => "url",
        }
    }
}

/// One selectable option for select/multi-select columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SelectOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }
}

/// Type-specific column configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    /// Ordered options for select-like columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Display hint for number columns (e.g. `percent`, `currency`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

impl PropertyConfig {
    /// Builds a select config from option names, preserving order.
    pub fn with_options<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: names.into_iter().map(SelectOption::new).collect(),
            number_format: None,
        }
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PropertyConfig>,
}

/// Partial update for a property. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub kind: Option<PropertyType>,
    /// `Some(None)` clears the config.
    pub config: Option<Option<PropertyConfig>>,
}

impl PropertyPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn retype(kind: PropertyType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}
