//! Ordered column definitions of one table.

use crate::model::property::{Property, PropertyConfig, PropertyId, PropertyPatch, PropertyType};
use crate::position::{self, ValidationError};
use crate::store::normalize_name;
use uuid::Uuid;

/// Owner of a table's properties, kept in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySchema {
    properties: Vec<Property>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from hydrated properties, normalizing positions.
    pub fn from_properties(mut properties: Vec<Property>) -> Result<Self, ValidationError> {
        position::normalize(&mut properties)?;
        Ok(Self { properties })
    }

    /// Properties in position order.
    pub fn all(&self) -> &[Property] {
        &self.properties
    }

    pub fn get(&self, id: PropertyId) -> Option<&Property> {
        self.properties.iter().find(|property| property.id == id)
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Appends a new property at the next position.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: PropertyType,
        config: Option<PropertyConfig>,
    ) -> &Property {
        let id = Uuid::new_v4();
        self.push(id, name.into(), kind, config)
    }

    /// Appends a property with a caller-provided stable id.
    ///
    /// Used by import/sync paths where identity already exists externally.
    ///
    /// # Errors
    /// - `NilId` for a nil id, `DuplicateId` when the id is already taken.
    pub fn add_with_id(
        &mut self,
        id: PropertyId,
        name: impl Into<String>,
        kind: PropertyType,
        config: Option<PropertyConfig>,
    ) -> Result<&Property, ValidationError> {
        if id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.contains(id) {
            return Err(ValidationError::DuplicateId(id));
        }
        Ok(self.push(id, name.into(), kind, config))
    }

    /// Merges `patch` into the property. Returns `None` for unknown ids.
    ///
    /// Changing the type never touches stored cells.
    pub fn update(&mut self, id: PropertyId, patch: PropertyPatch) -> Option<&Property> {
        let property = self.properties.iter_mut().find(|property| property.id == id)?;
        if let Some(name) = patch.name {
            property.name = normalize_name(name);
        }
        if let Some(kind) = patch.kind {
            property.kind = kind;
        }
        if let Some(config) = patch.config {
            property.config = config;
        }
        Some(&*property)
    }

    /// Removes the property and reindexes the remaining ones.
    pub fn remove(&mut self, id: PropertyId) -> Option<Property> {
        let index = self
            .properties
            .iter()
            .position(|property| property.id == id)?;
        let removed = self.properties.remove(index);
        position::reindex(&mut self.properties);
        Some(removed)
    }

    /// Replaces the whole column order.
    ///
    /// # Errors
    /// - Returns `ValidationError` unless `ordered_ids` is an exact
    ///   permutation of the current ids.
    pub fn reorder(&mut self, ordered_ids: &[PropertyId]) -> Result<(), ValidationError> {
        position::apply_order(&mut self.properties, ordered_ids)
    }

    fn push(
        &mut self,
        id: PropertyId,
        name: String,
        kind: PropertyType,
        config: Option<PropertyConfig>,
    ) -> &Property {
        let position = self.properties.len();
        self.properties.push(Property {
            id,
            name: normalize_name(name),
            kind,
            position,
            config,
        });
        &self.properties[position]
    }
}
