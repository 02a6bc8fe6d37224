//! Per-table engine instance: mutation surface, cascades and projections.
//!
//! # Responsibility
//! - Own one table's properties, rows and views (no process-wide state).
//! - Orchestrate cross-collection cascades on property removal.
//! - Emit a [`TableChange`] after every effective mutation.
//!
//! # Invariants
//! - Row cells never hold keys for properties missing from the schema.
//! - Unknown ids on update/delete are silent no-ops and emit nothing.
//! - Reads ([`TableEngine::evaluate`]) never mutate state.

use crate::eval::{self, RowGroup};
use crate::model::property::{Property, PropertyConfig, PropertyId, PropertyPatch, PropertyType};
use crate::model::row::{Cells, Row, RowId};
use crate::model::table::{TableId, TableSnapshot};
use crate::model::view::{View, ViewConfig, ViewId, ViewKind, ViewPatch};
use crate::position::ValidationError;
use crate::store::normalize_name;
use crate::store::property_schema::PropertySchema;
use crate::store::row_store::RowStore;
use crate::store::view_registry::ViewRegistry;
use log::{debug, info, warn};
use uuid::Uuid;

/// Notification emitted after a mutation has been applied locally.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    TableRenamed { name: String },
    PropertyAdded(Property),
    PropertyUpdated(Property),
    /// Rows and views were cleaned up in the same step.
    PropertyRemoved(PropertyId),
    PropertiesReordered(Vec<PropertyId>),
    RowAdded(Row),
    RowUpdated(Row),
    RowsDeleted(Vec<RowId>),
    RowsReordered(Vec<RowId>),
    ViewAdded(View),
    ViewUpdated(View),
    ViewDeleted(ViewId),
    ViewsReordered(Vec<ViewId>),
}

type ChangeListener = Box<dyn FnMut(TableId, &TableChange)>;

/// In-memory engine for one table.
pub struct TableEngine {
    id: TableId,
    name: String,
    properties: PropertySchema,
    rows: RowStore,
    views: ViewRegistry,
    listeners: Vec<ChangeListener>,
}

impl TableEngine {
    /// Creates an empty table with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Creates an empty table with a caller-provided id.
    pub fn with_id(id: TableId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: normalize_name(name),
            properties: PropertySchema::new(),
            rows: RowStore::new(),
            views: ViewRegistry::new(),
            listeners: Vec::new(),
        }
    }

    /// Hydrates an engine from stored state.
    ///
    /// Positions are normalized per collection and cells naming unknown
    /// properties are dropped. View configs are kept as stored; stale
    /// entries are inert during evaluation.
    ///
    /// # Errors
    /// - Returns `ValidationError` for nil or duplicate ids.
    pub fn from_snapshot(snapshot: TableSnapshot) -> Result<Self, ValidationError> {
        if snapshot.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        let properties = PropertySchema::from_properties(snapshot.properties)?;
        let mut rows = snapshot.rows;
        let mut dropped = 0usize;
        for row in &mut rows {
            let before = row.cells.len();
            row.cells.retain(|property_id, _| properties.contains(*property_id));
            dropped += before - row.cells.len();
        }
        let rows = RowStore::from_rows(rows)?;
        let views = ViewRegistry::from_views(snapshot.views)?;

        info!(
            "event=table_hydrate module=engine status=ok table_id={} properties={} rows={} views={} dropped_cells={}",
            snapshot.id,
            properties.len(),
            rows.len(),
            views.len(),
            dropped
        );

        Ok(Self {
            id: snapshot.id,
            name: normalize_name(snapshot.name),
            properties,
            rows,
            views,
            listeners: Vec::new(),
        })
    }

    /// Returns the current state in position order.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            id: self.id,
            name: self.name.clone(),
            properties: self.properties.all().to_vec(),
            rows: self.rows.all().to_vec(),
            views: self.views.all().to_vec(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[Property] {
        self.properties.all()
    }

    pub fn rows(&self) -> &[Row] {
        self.rows.all()
    }

    pub fn views(&self) -> &[View] {
        self.views.all()
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(id)
    }

    /// Registers a listener invoked after every effective mutation.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(TableId, &TableChange) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = normalize_name(name);
        self.emit(TableChange::TableRenamed {
            name: self.name.clone(),
        });
    }

    /// Appends a property at the next position.
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        kind: PropertyType,
        config: Option<PropertyConfig>,
    ) -> Property {
        let property = self.properties.add(name, kind, config).clone();
        debug!(
            "event=property_add module=engine status=ok table_id={} property_id={} type={} position={}",
            self.id,
            property.id,
            property.kind.as_str(),
            property.position
        );
        self.emit(TableChange::PropertyAdded(property.clone()));
        property
    }

    /// Appends a property under a caller-supplied id.
    ///
    /// # Errors
    /// - `ValidationError` for a nil id or one already in the schema.
    pub fn add_property_with_id(
        &mut self,
        id: PropertyId,
        name: impl Into<String>,
        kind: PropertyType,
        config: Option<PropertyConfig>,
    ) -> Result<Property, ValidationError> {
        let property = self
            .properties
            .add_with_id(id, name, kind, config)
            .inspect_err(|err| {
                warn!(
                    "event=property_add module=engine status=rejected table_id={} property_id={} error={}",
                    self.id, id, err
                );
            })?
            .clone();
        debug!(
            "event=property_add module=engine status=ok table_id={} property_id={} type={} position={}",
            self.id,
            property.id,
            property.kind.as_str(),
            property.position
        );
        self.emit(TableChange::PropertyAdded(property.clone()));
        Ok(property)
    }

    /// Merges `patch` into a property. Returns `None` for unknown ids.
    ///
    /// A type change leaves stored cells untouched, even when they no longer
    /// fit the new type.
    pub fn update_property(&mut self, id: PropertyId, patch: PropertyPatch) -> Option<Property> {
        let retyped = patch.kind;
        let property = self.properties.update(id, patch)?.clone();
        if let Some(kind) = retyped {
            let stale = self
                .rows
                .all()
                .iter()
                .filter_map(|row| row.cell(id))
                .filter(|value| !kind.accepts(value))
                .count();
            if stale > 0 {
                warn!(
                    "event=property_retype module=engine status=stale_cells table_id={} property_id={} type={} stale_cells={}",
                    self.id,
                    id,
                    kind.as_str(),
                    stale
                );
            }
        }
        self.emit(TableChange::PropertyUpdated(property.clone()));
        Some(property)
    }

    /// Removes a property, its cells on every row and every view config
    /// entry referencing it. Returns `None` for unknown ids.
    pub fn remove_property(&mut self, id: PropertyId) -> Option<Property> {
        let removed = self.properties.remove(id)?;
        let rows_touched = self.rows.forget_property(id);
        let views_touched = self.views.forget_property(id);
        debug!(
            "event=property_remove module=engine status=ok table_id={} property_id={} rows_touched={} views_touched={}",
            self.id, id, rows_touched, views_touched
        );
        self.emit(TableChange::PropertyRemoved(id));
        Some(removed)
    }

    /// Replaces the column order.
    ///
    /// # Errors
    /// - `ValidationError` unless `ordered_ids` is an exact permutation.
    pub fn reorder_properties(&mut self, ordered_ids: &[PropertyId]) -> Result<(), ValidationError> {
        self.properties.reorder(ordered_ids).inspect_err(|err| {
            warn!(
                "event=property_reorder module=engine status=rejected table_id={} error={}",
                self.id, err
            );
        })?;
        self.emit(TableChange::PropertiesReordered(ordered_ids.to_vec()));
        Ok(())
    }

    /// Appends a row at the next position.
    pub fn add_row(&mut self, cells: Cells) -> Row {
        let cells = self.known_cells(cells);
        let row = self.rows.add(cells).clone();
        debug!(
            "event=row_add module=engine status=ok table_id={} row_id={} position={}",
            self.id, row.id, row.position
        );
        self.emit(TableChange::RowAdded(row.clone()));
        row
    }

    /// Appends a row under a caller-supplied id. Unknown cell keys are dropped.
    ///
    /// # Errors
    /// - `ValidationError` for a nil id or one already in the table.
    pub fn add_row_with_id(&mut self, id: RowId, cells: Cells) -> Result<Row, ValidationError> {
        let cells = self.known_cells(cells);
        let row = self
            .rows
            .add_with_id(id, cells)
            .inspect_err(|err| {
                warn!(
                    "event=row_add module=engine status=rejected table_id={} row_id={} error={}",
                    self.id, id, err
                );
            })?
            .clone();
        debug!(
            "event=row_add module=engine status=ok table_id={} row_id={} position={}",
            self.id, row.id, row.position
        );
        self.emit(TableChange::RowAdded(row.clone()));
        Ok(row)
    }

    /// Shallow-merges `patch` into a row. Returns `None` for unknown ids.
    pub fn update_row(&mut self, id: RowId, patch: Cells) -> Option<Row> {
        self.rows.get(id)?;
        let patch = self.known_cells(patch);
        let row = self.rows.update(id, patch)?.clone();
        self.emit(TableChange::RowUpdated(row.clone()));
        Some(row)
    }

    /// Deletes one row. Returns whether it existed.
    pub fn delete_row(&mut self, id: RowId) -> bool {
        if self.rows.remove(id).is_none() {
            return false;
        }
        debug!(
            "event=row_delete module=engine status=ok table_id={} row_id={}",
            self.id, id
        );
        self.emit(TableChange::RowsDeleted(vec![id]));
        true
    }

    /// Deletes every listed row, ignoring unknown ids. Returns the count
    /// actually removed.
    pub fn bulk_delete_rows(&mut self, ids: &[RowId]) -> usize {
        let removed = self.rows.remove_many(ids);
        let count = removed.len();
        debug!(
            "event=row_bulk_delete module=engine status=ok table_id={} requested={} removed={}",
            self.id,
            ids.len(),
            count
        );
        if count > 0 {
            self.emit(TableChange::RowsDeleted(removed));
        }
        count
    }

    /// Replaces the row order.
    ///
    /// # Errors
    /// - `ValidationError` unless `ordered_ids` is an exact permutation.
    pub fn reorder_rows(&mut self, ordered_ids: &[RowId]) -> Result<(), ValidationError> {
        self.rows.reorder(ordered_ids).inspect_err(|err| {
            warn!(
                "event=row_reorder module=engine status=rejected table_id={} error={}",
                self.id, err
            );
        })?;
        self.emit(TableChange::RowsReordered(ordered_ids.to_vec()));
        Ok(())
    }

    /// Appends a view at the next position.
    pub fn add_view(
        &mut self,
        name: impl Into<String>,
        kind: ViewKind,
        config: Option<ViewConfig>,
    ) -> View {
        let view = self.views.add(name, kind, config).clone();
        debug!(
            "event=view_add module=engine status=ok table_id={} view_id={} position={}",
            self.id, view.id, view.position
        );
        self.emit(TableChange::ViewAdded(view.clone()));
        view
    }

    /// Appends a view under a caller-supplied id.
    ///
    /// # Errors
    /// - `ValidationError` for a nil id or one already registered.
    pub fn add_view_with_id(
        &mut self,
        id: ViewId,
        name: impl Into<String>,
        kind: ViewKind,
        config: Option<ViewConfig>,
    ) -> Result<View, ValidationError> {
        let view = self
            .views
            .add_with_id(id, name, kind, config)
            .inspect_err(|err| {
                warn!(
                    "event=view_add module=engine status=rejected table_id={} view_id={} error={}",
                    self.id, id, err
                );
            })?
            .clone();
        debug!(
            "event=view_add module=engine status=ok table_id={} view_id={} position={}",
            self.id, view.id, view.position
        );
        self.emit(TableChange::ViewAdded(view.clone()));
        Ok(view)
    }

    /// Merges `patch` into a view. Returns `None` for unknown ids.
    pub fn update_view(&mut self, id: ViewId, patch: ViewPatch) -> Option<View> {
        let view = self.views.update(id, patch)?.clone();
        self.emit(TableChange::ViewUpdated(view.clone()));
        Some(view)
    }

    /// Deletes one view. Returns whether it existed.
    ///
    /// Hosts tracking a selected view should fall back to
    /// [`TableEngine::fallback_view_id`].
    pub fn delete_view(&mut self, id: ViewId) -> bool {
        if self.views.remove(id).is_none() {
            return false;
        }
        debug!(
            "event=view_delete module=engine status=ok table_id={} view_id={}",
            self.id, id
        );
        self.emit(TableChange::ViewDeleted(id));
        true
    }

    /// Replaces the view order.
    ///
    /// # Errors
    /// - `ValidationError` unless `ordered_ids` is an exact permutation.
    pub fn reorder_views(&mut self, ordered_ids: &[ViewId]) -> Result<(), ValidationError> {
        self.views.reorder(ordered_ids).inspect_err(|err| {
            warn!(
                "event=view_reorder module=engine status=rejected table_id={} error={}",
                self.id, err
            );
        })?;
        self.emit(TableChange::ViewsReordered(ordered_ids.to_vec()));
        Ok(())
    }

    /// First view in position order, if any.
    pub fn fallback_view_id(&self) -> Option<ViewId> {
        self.views.first().map(|view| view.id)
    }

    /// Resolves `view_id`, falling back to the first view when it is `None`
    /// or unknown.
    pub fn resolve_view(&self, view_id: Option<ViewId>) -> Option<&View> {
        view_id
            .and_then(|id| self.views.get(id))
            .or_else(|| self.views.first())
    }

    /// Filtered and sorted projection through the resolved view.
    ///
    /// With no views at all, every row is returned in position order.
    pub fn evaluate(&self, view_id: Option<ViewId>) -> Vec<&Row> {
        eval::evaluate(
            self.resolve_view(view_id),
            self.rows.all(),
            self.properties.all(),
        )
    }

    /// Projection bucketed by the resolved view's `group_by` property.
    ///
    /// Without a resolvable grouping property the whole projection comes back
    /// as one bucket keyed `None`.
    pub fn evaluate_grouped(&self, view_id: Option<ViewId>) -> Vec<RowGroup<'_>> {
        let view = self.resolve_view(view_id);
        let projection = eval::evaluate(view, self.rows.all(), self.properties.all());
        match view
            .and_then(View::group_by)
            .and_then(|id| self.properties.get(id))
        {
            Some(property) => eval::group_rows(&projection, property),
            None => vec![RowGroup {
                key: None,
                rows: projection,
            }],
        }
    }

    /// Columns shown by the resolved view, in position order.
    pub fn visible_properties(&self, view_id: Option<ViewId>) -> Vec<&Property> {
        match self.resolve_view(view_id) {
            Some(view) => view.visible_properties(self.properties.all()),
            None => self.properties.all().iter().collect(),
        }
    }

    fn known_cells(&self, mut cells: Cells) -> Cells {
        let before = cells.len();
        cells.retain(|property_id, _| self.properties.contains(*property_id));
        let dropped = before - cells.len();
        if dropped > 0 {
            debug!(
                "event=cells_filter module=engine status=dropped table_id={} dropped_cells={}",
                self.id, dropped
            );
        }
        for (property_id, value) in &cells {
            if let Some(property) = self.properties.get(*property_id) {
                if !property.kind.accepts(value) {
                    debug!(
                        "event=cells_filter module=engine status=type_mismatch table_id={} property_id={} expected={} actual={}",
                        self.id,
                        property_id,
                        property.kind.as_str(),
                        value.variant_name()
                    );
                }
            }
        }
        cells
    }

    fn emit(&mut self, change: TableChange) {
        let table_id = self.id;
        for listener in &mut self.listeners {
            listener(table_id, &change);
        }
    }
}
