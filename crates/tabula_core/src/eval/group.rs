//! Bucketing of an evaluated projection for board-style views.

use crate::model::cell::CellValue;
use crate::model::property::{Property, PropertyType};
use crate::model::row::Row;

/// One bucket of rows sharing a group key. `key == None` holds rows without
/// a value.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup<'a> {
    pub key: Option<String>,
    pub rows: Vec<&'a Row>,
}

/// Partitions `projection` by the value of `property`.
///
/// Select-like properties get one bucket per configured option (in option
/// order, even when empty), then buckets for unlisted values in first-seen
/// order. Multi-select rows land in every bucket they name. A trailing
/// `None` bucket collects rows without a value, when there are any.
pub fn group_rows<'a>(projection: &[&'a Row], property: &Property) -> Vec<RowGroup<'a>> {
    let mut groups: Vec<RowGroup<'a>> = Vec::new();
    if matches!(
        property.kind,
        PropertyType::Select | PropertyType::MultiSelect
    ) {
        if let Some(config) = &property.config {
            for option in &config.options {
                push_unique(&mut groups, &option.name);
            }
        }
    }

    let mut unset = Vec::new();
    for row in projection {
        let keys = group_keys(row.cell(property.id));
        if keys.is_empty() {
            unset.push(*row);
            continue;
        }
        for key in keys {
            let index = push_unique(&mut groups, &key);
            groups[index].rows.push(*row);
        }
    }

    if !unset.is_empty() {
        groups.push(RowGroup {
            key: None,
            rows: unset,
        });
    }
    groups
}

fn push_unique(groups: &mut Vec<RowGroup<'_>>, key: &str) -> usize {
    if let Some(index) = groups
        .iter()
        .position(|group| group.key.as_deref() == Some(key))
    {
        return index;
    }
    groups.push(RowGroup {
        key: Some(key.to_string()),
        rows: Vec::new(),
    });
    groups.len() - 1
}

fn group_keys(value: Option<&CellValue>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(CellValue::MultiSelect(values)) => values
            .iter()
            .filter(|value| !value.is_empty())
            .cloned()
            .collect(),
        Some(value) if value.is_empty() => Vec::new(),
        Some(value) => vec![value.to_text()],
    }
}
