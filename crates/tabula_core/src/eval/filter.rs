//! Predicate evaluation against one row.
//!
//! # Invariants
//! - An absent cell and an explicit `Null` behave the same.
//! - Every operator is total: mismatched or non-numeric inputs yield `false`
//!   (or `true` for the negated operators), never an error.
//! - `before`/`after` compare raw text; dates must use a sortable encoding.

use crate::model::cell::CellValue;
use crate::model::row::Row;
use crate::model::view::{FilterOperator, Predicate};
use std::cmp::Ordering;

/// Returns whether `row` satisfies `predicate`.
pub fn matches(row: &Row, predicate: &Predicate) -> bool {
    matches_value(
        row.cell(predicate.property_id),
        predicate.operator,
        &predicate.operand,
    )
}

/// Applies `operator` to a cell value (`None` when the key is absent).
pub fn matches_value(
    value: Option<&CellValue>,
    operator: FilterOperator,
    operand: &CellValue,
) -> bool {
    match operator {
        FilterOperator::Contains => {
            folded_text(value).contains(operand.to_text().to_lowercase().as_str())
        }
        FilterOperator::Equals => folded_text(value) == operand.to_text().to_lowercase(),
        FilterOperator::NotEquals => folded_text(value) != operand.to_text().to_lowercase(),
        FilterOperator::IsEmpty => is_empty(value),
        FilterOperator::IsNotEmpty => !is_empty(value),
        FilterOperator::Gt => compare_numbers(value, operand) == Some(Ordering::Greater),
        FilterOperator::Lt => compare_numbers(value, operand) == Some(Ordering::Less),
        FilterOperator::Gte => matches!(
            compare_numbers(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::Lte => matches!(
            compare_numbers(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Is => same_value(value, operand),
        FilterOperator::IsNot => !same_value(value, operand),
        FilterOperator::Before => compare_text(value, operand) == Some(Ordering::Less),
        FilterOperator::After => compare_text(value, operand) == Some(Ordering::Greater),
        FilterOperator::IsChecked => matches!(value, Some(CellValue::Boolean(true))),
        FilterOperator::IsUnchecked => matches!(value, Some(CellValue::Boolean(false))),
    }
}

fn is_empty(value: Option<&CellValue>) -> bool {
    value.map_or(true, CellValue::is_empty)
}

fn folded_text(value: Option<&CellValue>) -> String {
    value.map(CellValue::to_text).unwrap_or_default().to_lowercase()
}

fn compare_numbers(value: Option<&CellValue>, operand: &CellValue) -> Option<Ordering> {
    let left = value.and_then(CellValue::as_number)?;
    let right = operand.as_number()?;
    left.partial_cmp(&right)
}

fn compare_text(value: Option<&CellValue>, operand: &CellValue) -> Option<Ordering> {
    let value = value.filter(|value| !value.is_empty())?;
    if operand.is_empty() {
        return None;
    }
    Some(value.to_text().cmp(&operand.to_text()))
}

/// Exact equality over variant pairs. Text operands may name select, date or
/// url values; numbers and booleans are never stringified.
fn same_value(value: Option<&CellValue>, operand: &CellValue) -> bool {
    let value = value.unwrap_or(&CellValue::Null);
    match (value, operand) {
        (CellValue::Null, CellValue::Null) => true,
        (CellValue::Number(left), CellValue::Number(right)) => left == right,
        (CellValue::Boolean(left), CellValue::Boolean(right)) => left == right,
        (CellValue::MultiSelect(left), CellValue::MultiSelect(right)) => left == right,
        (
            CellValue::Text(left) | CellValue::Select(left),
            CellValue::Text(right) | CellValue::Select(right),
        ) => left == right,
        (CellValue::Date(left), CellValue::Date(right) | CellValue::Text(right))
        | (CellValue::Text(left), CellValue::Date(right)) => left == right,
        (CellValue::Url(left), CellValue::Url(right) | CellValue::Text(right))
        | (CellValue::Text(left), CellValue::Url(right)) => left == right,
        _ => false,
    }
}
