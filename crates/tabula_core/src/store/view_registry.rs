//! Named filter/sort configurations of one table.
//!
//! Deleting a view never changes any host-side selection; hosts fall back to
//! [`ViewRegistry::first`] themselves.

use crate::model::property::PropertyId;
use crate::model::view::{View, ViewConfig, ViewId, ViewKind, ViewPatch};
use crate::position::{self, ValidationError};
use crate::store::normalize_name;
use uuid::Uuid;

/// Owner of a table's views, kept in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewRegistry {
    views: Vec<View>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from hydrated views, normalizing positions.
    pub fn from_views(mut views: Vec<View>) -> Result<Self, ValidationError> {
        position::normalize(&mut views)?;
        Ok(Self { views })
    }

    /// Views in position order.
    pub fn all(&self) -> &[View] {
        &self.views
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.iter().find(|view| view.id == id)
    }

    /// First view in position order.
    pub fn first(&self) -> Option<&View> {
        self.views.first()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Appends a view at the next position.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: ViewKind,
        config: Option<ViewConfig>,
    ) -> &View {
        self.push(Uuid::new_v4(), name.into(), kind, config)
    }

    /// Appends a view with a caller-provided stable id.
    ///
    /// # Errors
    /// - `NilId` for a nil id, `DuplicateId` when the id is already taken.
    pub fn add_with_id(
        &mut self,
        id: ViewId,
        name: impl Into<String>,
        kind: ViewKind,
        config: Option<ViewConfig>,
    ) -> Result<&View, ValidationError> {
        if id.is_nil() {
            return Err(ValidationError::NilId);
        }
        if self.get(id).is_some() {
            return Err(ValidationError::DuplicateId(id));
        }
        Ok(self.push(id, name.into(), kind, config))
    }

    /// Merges `patch` into the view. Returns `None` for unknown ids.
    pub fn update(&mut self, id: ViewId, patch: ViewPatch) -> Option<&View> {
        let view = self.views.iter_mut().find(|view| view.id == id)?;
        if let Some(name) = patch.name {
            view.name = normalize_name(name);
        }
        if let Some(kind) = patch.kind {
            view.kind = kind;
        }
        if let Some(config) = patch.config {
            view.config = config;
        }
        if let Some(filters) = patch.filters {
            view.config.get_or_insert_with(ViewConfig::default).filters = filters;
        }
        if let Some(sorts) = patch.sorts {
            view.config.get_or_insert_with(ViewConfig::default).sorts = sorts;
        }
        Some(&*view)
    }

    /// Removes one view and reindexes the rest.
    pub fn remove(&mut self, id: ViewId) -> Option<View> {
        let index = self.views.iter().position(|view| view.id == id)?;
        let removed = self.views.remove(index);
        position::reindex(&mut self.views);
        Some(removed)
    }

    /// Replaces the whole view order.
    ///
    /// # Errors
    /// - Returns `ValidationError` unless `ordered_ids` is an exact
    ///   permutation of the current ids.
    pub fn reorder(&mut self, ordered_ids: &[ViewId]) -> Result<(), ValidationError> {
        position::apply_order(&mut self.views, ordered_ids)
    }

    /// Drops config entries referencing `property_id`. Returns views touched.
    pub fn forget_property(&mut self, property_id: PropertyId) -> usize {
        let mut touched = 0;
        for config in self.views.iter_mut().filter_map(|view| view.config.as_mut()) {
            if config.references(property_id) {
                config.forget_property(property_id);
                touched += 1;
            }
        }
        touched
    }

    fn push(
        &mut self,
        id: ViewId,
        name: String,
        kind: ViewKind,
        config: Option<ViewConfig>,
    ) -> &View {
        let position = self.views.len();
        self.views.push(View {
            id,
            name: normalize_name(name),
            kind,
            position,
            config,
        });
        &self.views[position]
    }
}

#[cfg(test)]
mod tests {
    use super::ViewRegistry;
    use crate::model::view::{SortKey, ViewKind, ViewPatch};
    use uuid::Uuid;

    #[test]
    fn per_field_patch_creates_config_when_missing() {
        let mut registry = ViewRegistry::new();
        let id = registry.add("All", ViewKind::Table, None).id;
        let property = Uuid::new_v4();

        let view = registry
            .update(id, ViewPatch::sorts(vec![SortKey::desc(property)]))
            .unwrap();

        assert_eq!(view.sorts(), &[SortKey::desc(property)]);
        assert!(view.filters().is_empty());
    }

    #[test]
    fn remove_keeps_first_view_in_position_order() {
        let mut registry = ViewRegistry::new();
        let a = registry.add("A", ViewKind::Table, None).id;
        let b = registry.add("B", ViewKind::Kanban, None).id;

        registry.remove(a).unwrap();

        let first = registry.first().unwrap();
        assert_eq!(first.id, b);
        assert_eq!(first.position, 0);
    }

    #[test]
    fn add_with_id_keeps_caller_identity() {
        let mut registry = ViewRegistry::new();
        let id = Uuid::new_v4();
        registry.add("First", ViewKind::List, None);

        let view = registry
            .add_with_id(id, " Imported ", ViewKind::Calendar, None)
            .unwrap();
        assert_eq!(view.id, id);
        assert_eq!(view.name, "Imported");
        assert_eq!(view.position, 1);
        assert!(registry
            .add_with_id(id, "Again", ViewKind::Table, None)
            .is_err());
    }
}
