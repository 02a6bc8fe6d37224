use std::cell::RefCell;
use std::rc::Rc;
use tabula_core::{
    CellValue, Cells, FilterOperator, Predicate, PropertyConfig, PropertyPatch, PropertyType,
    SortKey, TableChange, TableEngine, ValidationError, ViewConfig, ViewKind, ViewPatch,
};
use uuid::Uuid;

fn positions<T>(items: &[T], position: impl Fn(&T) -> usize) -> Vec<usize> {
    items.iter().map(position).collect()
}

#[test]
fn add_property_appends_at_next_position() {
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None);
    let status = engine.add_property(
        "Status",
        PropertyType::Select,
        Some(PropertyConfig::with_options(["Todo", "Done"])),
    );

    assert_eq!(name.position, 0);
    assert_eq!(status.position, 1);
    assert_eq!(engine.properties().len(), 2);
    assert_eq!(
        engine.property(status.id).unwrap().config.as_ref().unwrap().options[1].name,
        "Done"
    );
}

#[test]
fn blank_names_become_untitled() {
    let mut engine = TableEngine::new("   ");
    let property = engine.add_property("  ", PropertyType::Text, None);
    let view = engine.add_view("", ViewKind::Table, None);

    assert_eq!(engine.name(), "Untitled");
    assert_eq!(property.name, "Untitled");
    assert_eq!(view.name, "Untitled");
}

#[test]
fn update_property_merges_fields_and_keeps_stale_cells() {
    let mut engine = TableEngine::new("Tasks");
    let estimate = engine.add_property("Estimate", PropertyType::Text, None);
    let row = engine.add_row(Cells::from([(estimate.id, CellValue::text("three"))]));

    let updated = engine
        .update_property(
            estimate.id,
            PropertyPatch {
                name: Some("Points".to_string()),
                kind: Some(PropertyType::Number),
                config: None,
            },
        )
        .unwrap();

    assert_eq!(updated.name, "Points");
    assert_eq!(updated.kind, PropertyType::Number);
    assert_eq!(updated.position, 0);
    assert_eq!(
        engine.row(row.id).unwrap().cell(estimate.id),
        Some(&CellValue::text("three"))
    );
}

#[test]
fn update_property_with_unknown_id_returns_none() {
    let mut engine = TableEngine::new("Tasks");
    assert!(engine
        .update_property(Uuid::new_v4(), PropertyPatch::rename("x"))
        .is_none());
}

#[test]
fn remove_property_cascades_to_rows_and_views() {
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None);
    let score = engine.add_property("Score", PropertyType::Number, None);
    let tag = engine.add_property("Tag", PropertyType::Select, None);
    for value in [1.0, 2.0] {
        engine.add_row(Cells::from([
            (name.id, CellValue::text("n")),
            (score.id, CellValue::Number(value)),
        ]));
    }
    let view = engine.add_view(
        "Board",
        ViewKind::Kanban,
        Some(ViewConfig {
            filters: vec![
                Predicate::new(score.id, FilterOperator::Gt, 0.0),
                Predicate::new(name.id, FilterOperator::Contains, "n"),
            ],
            sorts: vec![SortKey::desc(score.id), SortKey::asc(name.id)],
            hidden_properties: vec![score.id],
            group_by: Some(score.id),
        }),
    );

    let removed = engine.remove_property(score.id).unwrap();
    assert_eq!(removed.id, score.id);

    for row in engine.rows() {
        assert!(!row.cells.contains_key(&score.id));
        assert!(row.cells.contains_key(&name.id));
    }
    let config = engine.view(view.id).unwrap().config.clone().unwrap();
    assert_eq!(config.filters.len(), 1);
    assert_eq!(config.filters[0].property_id, name.id);
    assert_eq!(config.sorts, vec![SortKey::asc(name.id)]);
    assert!(config.hidden_properties.is_empty());
    assert_eq!(config.group_by, None);

    assert_eq!(positions(engine.properties(), |p| p.position), vec![0, 1]);
    assert_eq!(engine.property(tag.id).unwrap().position, 1);
    assert!(engine.remove_property(score.id).is_none());
}

#[test]
fn reorder_properties_requires_exact_permutation() {
    let mut engine = TableEngine::new("Tasks");
    let a = engine.add_property("A", PropertyType::Text, None).id;
    let b = engine.add_property("B", PropertyType::Text, None).id;
    let c = engine.add_property("C", PropertyType::Text, None).id;

    assert_eq!(
        engine.reorder_properties(&[a, b]).unwrap_err(),
        ValidationError::LengthMismatch {
            expected: 3,
            actual: 2
        }
    );
    assert_eq!(
        engine.reorder_properties(&[a, a, b]).unwrap_err(),
        ValidationError::DuplicateId(a)
    );
    let stranger = Uuid::new_v4();
    assert_eq!(
        engine.reorder_properties(&[a, b, stranger]).unwrap_err(),
        ValidationError::UnknownId(stranger)
    );
    // Rejected calls leave the order untouched.
    let order: Vec<Uuid> = engine.properties().iter().map(|p| p.id).collect();
    assert_eq!(order, vec![a, b, c]);

    engine.reorder_properties(&[c, a, b]).unwrap();
    let order: Vec<Uuid> = engine.properties().iter().map(|p| p.id).collect();
    assert_eq!(order, vec![c, a, b]);
    assert_eq!(positions(engine.properties(), |p| p.position), vec![0, 1, 2]);
}

#[test]
fn add_row_defaults_to_empty_cells_and_drops_unknown_keys() {
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None);

    let empty = engine.add_row(Cells::new());
    let row = engine.add_row(Cells::from([
        (name.id, CellValue::text("a")),
        (Uuid::new_v4(), CellValue::text("ghost")),
    ]));

    assert!(empty.cells.is_empty());
    assert_eq!(empty.position, 0);
    assert_eq!(row.position, 1);
    assert_eq!(row.cells.len(), 1);
}

#[test]
fn update_row_shallow_merges_and_null_keeps_key() {
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None);
    let score = engine.add_property("Score", PropertyType::Number, None);
    let row = engine.add_row(Cells::from([
        (name.id, CellValue::text("a")),
        (score.id, CellValue::Number(1.0)),
    ]));

    let updated = engine
        .update_row(row.id, Cells::from([(score.id, CellValue::Null)]))
        .unwrap();

    assert_eq!(updated.cell(name.id), Some(&CellValue::text("a")));
    assert_eq!(updated.cell(score.id), Some(&CellValue::Null));
    assert_eq!(updated.cells.len(), 2);
    assert!(engine
        .update_row(Uuid::new_v4(), Cells::from([(name.id, CellValue::text("b"))]))
        .is_none());
}

#[test]
fn delete_row_reindexes_remaining_rows() {
    let mut engine = TableEngine::new("Tasks");
    let ids: Vec<Uuid> = (0..3).map(|_| engine.add_row(Cells::new()).id).collect();

    assert!(engine.delete_row(ids[0]));
    assert!(!engine.delete_row(ids[0]));

    let remaining: Vec<(Uuid, usize)> = engine.rows().iter().map(|r| (r.id, r.position)).collect();
    assert_eq!(remaining, vec![(ids[1], 0), (ids[2], 1)]);
}

#[test]
fn bulk_delete_counts_only_existing_rows() {
    let mut engine = TableEngine::new("Tasks");
    let ids: Vec<Uuid> = (0..4).map(|_| engine.add_row(Cells::new()).id).collect();

    let removed = engine.bulk_delete_rows(&[ids[3], Uuid::new_v4(), ids[1], ids[1]]);

    assert_eq!(removed, 2);
    let remaining: Vec<(Uuid, usize)> = engine.rows().iter().map(|r| (r.id, r.position)).collect();
    assert_eq!(remaining, vec![(ids[0], 0), (ids[2], 1)]);
    assert_eq!(engine.bulk_delete_rows(&[Uuid::new_v4()]), 0);
}

#[test]
fn reorder_rows_rejects_partial_sets() {
    let mut engine = TableEngine::new("Tasks");
    let ids: Vec<Uuid> = (0..3).map(|_| engine.add_row(Cells::new()).id).collect();

    assert!(engine.reorder_rows(&ids[..2]).is_err());
    engine.reorder_rows(&[ids[2], ids[0], ids[1]]).unwrap();

    let order: Vec<(Uuid, usize)> = engine.rows().iter().map(|r| (r.id, r.position)).collect();
    assert_eq!(order, vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]);
}

#[test]
fn update_view_replaces_config_or_single_fields() {
    let mut engine = TableEngine::new("Tasks");
    let score = engine.add_property("Score", PropertyType::Number, None).id;
    let view = engine.add_view(
        "All",
        ViewKind::Table,
        Some(ViewConfig {
            filters: vec![Predicate::new(score, FilterOperator::Gt, 1.0)],
            sorts: vec![SortKey::asc(score)],
            ..ViewConfig::default()
        }),
    );

    let sorted = engine
        .update_view(view.id, ViewPatch::sorts(vec![SortKey::desc(score)]))
        .unwrap();
    let config = sorted.config.unwrap();
    assert_eq!(config.filters.len(), 1);
    assert_eq!(config.sorts, vec![SortKey::desc(score)]);

    let renamed = engine
        .update_view(
            view.id,
            ViewPatch {
                name: Some("Board".to_string()),
                kind: Some(ViewKind::Kanban),
                config: Some(None),
                ..ViewPatch::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Board");
    assert_eq!(renamed.kind, ViewKind::Kanban);
    assert!(renamed.config.is_none());

    let refiltered = engine
        .update_view(view.id, ViewPatch::filters(Vec::new()))
        .unwrap();
    assert_eq!(refiltered.config, Some(ViewConfig::default()));

    assert!(engine
        .update_view(Uuid::new_v4(), ViewPatch::default())
        .is_none());
}

#[test]
fn delete_view_reindexes_and_exposes_fallback() {
    let mut engine = TableEngine::new("Tasks");
    let first = engine.add_view("First", ViewKind::Table, None).id;
    let second = engine.add_view("Second", ViewKind::List, None).id;
    let third = engine.add_view("Third", ViewKind::Gallery, None).id;

    assert!(engine.delete_view(first));
    assert!(!engine.delete_view(first));
    assert_eq!(engine.fallback_view_id(), Some(second));
    assert_eq!(engine.view(third).unwrap().position, 1);

    engine.reorder_views(&[third, second]).unwrap();
    assert_eq!(engine.fallback_view_id(), Some(third));

    assert!(engine.delete_view(second));
    assert!(engine.delete_view(third));
    assert_eq!(engine.fallback_view_id(), None);
}

#[test]
fn engines_are_independent() {
    let mut left = TableEngine::new("Left");
    let right = TableEngine::new("Right");
    left.add_row(Cells::new());

    assert_ne!(left.id(), right.id());
    assert_eq!(left.rows().len(), 1);
    assert!(right.rows().is_empty());
}

#[test]
fn add_with_id_keeps_caller_ids_and_notifies() {
    let mut engine = TableEngine::new("Tasks");
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.subscribe(move |_, change| sink.borrow_mut().push(change.clone()));

    let (property_id, row_id, view_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let property = engine
        .add_property_with_id(property_id, "Name", PropertyType::Text, None)
        .unwrap();
    let row = engine
        .add_row_with_id(
            row_id,
            Cells::from([
                (property_id, CellValue::text("a")),
                (Uuid::new_v4(), CellValue::text("ghost")),
            ]),
        )
        .unwrap();
    let view = engine
        .add_view_with_id(view_id, "All", ViewKind::Table, None)
        .unwrap();

    assert_eq!(property.id, property_id);
    assert_eq!(row.id, row_id);
    assert_eq!(row.cells.len(), 1);
    assert_eq!(engine.row(row_id).unwrap().cell(property_id), Some(&CellValue::text("a")));
    assert_eq!(view.id, view_id);
    assert_eq!(engine.fallback_view_id(), Some(view_id));
    assert_eq!(
        *log.borrow(),
        vec![
            TableChange::PropertyAdded(property),
            TableChange::RowAdded(row),
            TableChange::ViewAdded(view),
        ]
    );
}

#[test]
fn add_with_id_rejects_nil_and_taken_ids_without_notifying() {
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None).id;
    let row = engine.add_row(Cells::new()).id;
    let view = engine.add_view("All", ViewKind::Table, None).id;
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.subscribe(move |_, change| sink.borrow_mut().push(change.clone()));

    assert_eq!(
        engine
            .add_property_with_id(Uuid::nil(), "X", PropertyType::Text, None)
            .unwrap_err(),
        ValidationError::NilId
    );
    assert_eq!(
        engine
            .add_property_with_id(name, "X", PropertyType::Text, None)
            .unwrap_err(),
        ValidationError::DuplicateId(name)
    );
    assert_eq!(
        engine.add_row_with_id(Uuid::nil(), Cells::new()).unwrap_err(),
        ValidationError::NilId
    );
    assert_eq!(
        engine.add_row_with_id(row, Cells::new()).unwrap_err(),
        ValidationError::DuplicateId(row)
    );
    assert_eq!(
        engine
            .add_view_with_id(view, "Again", ViewKind::List, None)
            .unwrap_err(),
        ValidationError::DuplicateId(view)
    );

    assert!(log.borrow().is_empty());
    assert_eq!(engine.properties().len(), 1);
    assert_eq!(engine.rows().len(), 1);
    assert_eq!(engine.views().len(), 1);
    assert_eq!(engine.view(view).unwrap().name, "All");
}
