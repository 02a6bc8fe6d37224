//! Typed cell values.
//!
//! # Responsibility
//! - Represent one cell of a row as a tagged union instead of a loosely typed
//!   value.
//! - Provide the text/number views used by filter and sort evaluation.
//!
//! # Invariants
//! - `Null` means "explicitly cleared"; an absent key in `Row::cells` means
//!   "never set". Both are empty for filtering purposes.
//! - `Date` holds canonical sortable text (e.g. `2026-02-13`); it is never
//!   parsed into a calendar type.

use serde::{Deserialize, Serialize};

/// One cell value. The owning property's declared type names the expected
/// variant; see [`crate::model::property::PropertyType::accepts`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Explicitly cleared cell.
    #[default]
    Null,
    /// Free-form text.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Checkbox state.
    Boolean(bool),
    /// Single select option name.
    Select(String),
    /// Multiple select option names in user order.
    MultiSelect(Vec<String>),
    /// Canonical sortable date text.
    Date(String),
    /// Link target.
    Url(String),
}

impl CellValue {
    /// Convenience constructor for text cells.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Convenience constructor for select cells.
    pub fn select(value: impl Into<String>) -> Self {
        Self::Select(value.into())
    }

    /// Convenience constructor for date cells.
    pub fn date(value: impl Into<String>) -> Self {
        Self::Date(value.into())
    }

    /// Returns whether this value carries no content.
    ///
    /// Zero and `false` are real values and are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) | Self::Select(value) | Self::Date(value) | Self::Url(value) => {
                value.is_empty()
            }
            Self::MultiSelect(values) => values.is_empty(),
            Self::Number(_) | Self::Boolean(_) => false,
        }
    }

    /// Text representation used by text operators and mixed-type sorting.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(value) | Self::Select(value) | Self::Date(value) | Self::Url(value) => {
                value.clone()
            }
            Self::Number(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::MultiSelect(values) => values.join(","),
        }
    }

    /// Numeric view of this value, if it has one.
    ///
    /// Text-like values are parsed after trimming; blank text, booleans,
    /// multi-selects and `NaN` have no numeric view.
    pub fn as_number(&self) -> Option<f64> {
        let parsed = match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) | Self::Select(value) | Self::Date(value) | Self::Url(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
            Self::Null | Self::Boolean(_) | Self::MultiSelect(_) => None,
        };
        parsed.filter(|value| !value.is_nan())
    }

    /// Stable snake_case variant label used in logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Select(_) => "select",
            Self::MultiSelect(_) => "multi_select",
            Self::Date(_) => "date",
            Self::Url(_) => "url",
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
