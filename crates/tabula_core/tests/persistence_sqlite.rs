use rusqlite::Connection;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tabula_core::{
    open_db, open_db_in_memory, CellValue, Cells, DbError, EntityKind, FilterOperator, PersistOp,
    PersistRequest, Persistence, PersistenceError, Predicate, PropertyType, SortKey,
    SqlitePersistence, TableChange, TableEngine, TableId, ViewConfig, ViewKind,
};
use uuid::Uuid;

/// Subscribes a listener that mirrors every change into `conn`.
fn mirror(engine: &mut TableEngine, conn: Rc<Connection>) -> Rc<RefCell<Vec<String>>> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    engine.subscribe(move |table_id, change| {
        let store = SqlitePersistence::try_new(&conn).unwrap();
        let request = change.persist_request(table_id).unwrap();
        if let Err(err) = store.persist(&request) {
            sink.borrow_mut().push(err.to_string());
        }
    });
    errors
}

fn create_table(store: &SqlitePersistence<'_>, table_id: TableId, name: &str) {
    store
        .persist(&PersistRequest {
            table_id,
            entity: EntityKind::Table,
            operation: PersistOp::Create,
            payload: json!({ "name": name }),
        })
        .unwrap();
}

#[test]
fn mirrored_mutations_round_trip_through_load_table() {
    let conn = Rc::new(open_db_in_memory().unwrap());
    let mut engine = TableEngine::new("Tasks");
    create_table(&SqlitePersistence::try_new(&conn).unwrap(), engine.id(), "Tasks");
    let errors = mirror(&mut engine, Rc::clone(&conn));

    let name = engine.add_property("Name", PropertyType::Text, None).id;
    let score = engine.add_property("Score", PropertyType::Number, None).id;
    let r1 = engine
        .add_row(Cells::from([
            (name, CellValue::text("Charlie")),
            (score, CellValue::Number(10.0)),
        ]))
        .id;
    let r2 = engine
        .add_row(Cells::from([(name, CellValue::text("Alice"))]))
        .id;
    let r3 = engine.add_row(Cells::new()).id;
    engine.update_row(r2, Cells::from([(score, CellValue::Number(30.0))]));
    engine.add_view(
        "Sorted",
        ViewKind::Table,
        Some(ViewConfig {
            sorts: vec![SortKey::asc(name)],
            ..ViewConfig::default()
        }),
    );
    engine.reorder_rows(&[r3, r1, r2]).unwrap();
    engine.delete_row(r1);
    engine.rename("Renamed");

    assert!(errors.borrow().is_empty(), "{:?}", errors.borrow());

    let store = SqlitePersistence::try_new(&conn).unwrap();
    let stored = store.load_table(engine.id()).unwrap().unwrap();
    assert_eq!(stored, engine.snapshot());

    let hydrated = TableEngine::from_snapshot(stored).unwrap();
    let order: Vec<Uuid> = hydrated.evaluate(None).iter().map(|row| row.id).collect();
    // r3 has no name and sorts first.
    assert_eq!(order, vec![r3, r2]);
}

#[test]
fn property_removal_cascades_in_store() {
    let conn = Rc::new(open_db_in_memory().unwrap());
    let mut engine = TableEngine::new("Tasks");
    create_table(&SqlitePersistence::try_new(&conn).unwrap(), engine.id(), "Tasks");
    let errors = mirror(&mut engine, Rc::clone(&conn));

    let name = engine.add_property("Name", PropertyType::Text, None).id;
    let score = engine.add_property("Score", PropertyType::Number, None).id;
    engine.add_row(Cells::from([
        (name, CellValue::text("a")),
        (score, CellValue::Number(1.0)),
    ]));
    engine.add_view(
        "Filtered",
        ViewKind::Table,
        Some(ViewConfig {
            filters: vec![Predicate::new(score, FilterOperator::Gt, 0.0)],
            sorts: vec![SortKey::desc(score)],
            hidden_properties: vec![score],
            group_by: Some(score),
        }),
    );
    engine.remove_property(score);

    assert!(errors.borrow().is_empty(), "{:?}", errors.borrow());
    let stored = SqlitePersistence::try_new(&conn)
        .unwrap()
        .load_table(engine.id())
        .unwrap()
        .unwrap();
    assert_eq!(stored.properties.len(), 1);
    assert_eq!(stored.properties[0].id, name);
    assert!(!stored.rows[0].cells.contains_key(&score));
    assert_eq!(stored.views[0].config, Some(ViewConfig::default()));
}

#[test]
fn deleting_unstored_property_leaves_stale_references_alone() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePersistence::try_new(&conn).unwrap();
    let mut engine = TableEngine::new("Tasks");
    let name = engine.add_property("Name", PropertyType::Text, None).id;
    let legacy = engine.add_property("Legacy", PropertyType::Number, None).id;
    engine.add_row(Cells::from([
        (name, CellValue::text("a")),
        (legacy, CellValue::Number(1.0)),
    ]));
    engine.add_view(
        "Sorted",
        ViewKind::Table,
        Some(ViewConfig {
            sorts: vec![SortKey::asc(legacy)],
            ..ViewConfig::default()
        }),
    );
    // Stored rows and views still mention a property the store never saw.
    let mut snapshot = engine.snapshot();
    snapshot.properties.retain(|property| property.id != legacy);
    store.save_snapshot(&snapshot).unwrap();
    let before = store.load_table(engine.id()).unwrap().unwrap();

    let response = store
        .persist(&PersistRequest {
            table_id: engine.id(),
            entity: EntityKind::Property,
            operation: PersistOp::Delete,
            payload: json!({ "ids": [legacy] }),
        })
        .unwrap();

    assert_eq!(response, json!({ "deleted": 0 }));
    let after = store.load_table(engine.id()).unwrap().unwrap();
    assert_eq!(after, before);
    assert!(after.rows[0].cells.contains_key(&legacy));
    assert_eq!(
        after.views[0].config.as_ref().unwrap().sorts,
        vec![SortKey::asc(legacy)]
    );
}

#[test]
fn create_into_unknown_table_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePersistence::try_new(&conn).unwrap();
    let mut engine = TableEngine::new("Orphan");
    let property = engine.add_property("Name", PropertyType::Text, None);

    let request = TableChange::PropertyAdded(property)
        .persist_request(engine.id())
        .unwrap();
    match store.persist(&request).unwrap_err() {
        PersistenceError::NotFound { entity, id } => {
            assert_eq!(entity, EntityKind::Table);
            assert_eq!(id, engine.id());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_create_and_unknown_update_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePersistence::try_new(&conn).unwrap();
    let mut engine = TableEngine::new("Tasks");
    create_table(&store, engine.id(), "Tasks");
    let row = engine.add_row(Cells::new());

    let create = TableChange::RowAdded(row.clone())
        .persist_request(engine.id())
        .unwrap();
    let stored = store.persist(&create).unwrap();
    assert_eq!(stored["id"], json!(row.id));
    assert_eq!(stored["position"], json!(0));
    assert!(matches!(
        store.persist(&create).unwrap_err(),
        PersistenceError::Validation(_)
    ));

    let mut ghost = row;
    ghost.id = Uuid::new_v4();
    let update = TableChange::RowUpdated(ghost)
        .persist_request(engine.id())
        .unwrap();
    assert!(matches!(
        store.persist(&update).unwrap_err(),
        PersistenceError::NotFound {
            entity: EntityKind::Row,
            ..
        }
    ));
}

#[test]
fn malformed_payloads_and_bad_reorders_are_validation_errors() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePersistence::try_new(&conn).unwrap();
    let table_id = Uuid::new_v4();
    create_table(&store, table_id, "Tasks");

    let malformed = PersistRequest {
        table_id,
        entity: EntityKind::Row,
        operation: PersistOp::Create,
        payload: json!({ "cells": "nope" }),
    };
    assert!(matches!(
        store.persist(&malformed).unwrap_err(),
        PersistenceError::Validation(_)
    ));

    let mut engine = TableEngine::with_id(table_id, "Tasks");
    for _ in 0..2 {
        let row = engine.add_row(Cells::new());
        store
            .persist(
                &TableChange::RowAdded(row)
                    .persist_request(table_id)
                    .unwrap(),
            )
            .unwrap();
    }
    let ids: Vec<Uuid> = engine.rows().iter().map(|row| row.id).collect();

    let partial = PersistRequest {
        table_id,
        entity: EntityKind::Row,
        operation: PersistOp::Reorder,
        payload: json!({ "ids": [ids[0]] }),
    };
    assert!(matches!(
        store.persist(&partial).unwrap_err(),
        PersistenceError::Validation(_)
    ));

    let reversed = PersistRequest {
        payload: json!({ "ids": [ids[1], ids[0]] }),
        ..partial
    };
    store.persist(&reversed).unwrap();
    let stored = store.load_table(table_id).unwrap().unwrap();
    let order: Vec<Uuid> = stored.rows.iter().map(|row| row.id).collect();
    assert_eq!(order, vec![ids[1], ids[0]]);
    assert_eq!(stored.rows[1].position, 1);

    let table_reorder = PersistRequest {
        entity: EntityKind::Table,
        ..reversed
    };
    assert!(matches!(
        store.persist(&table_reorder).unwrap_err(),
        PersistenceError::Validation(_)
    ));
}

#[test]
fn delete_table_removes_entities() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePersistence::try_new(&conn).unwrap();
    let mut engine = TableEngine::new("Tasks");
    engine.add_property("Name", PropertyType::Text, None);
    engine.add_row(Cells::new());
    store.save_snapshot(&engine.snapshot()).unwrap();

    let deleted = store
        .persist(&PersistRequest {
            table_id: engine.id(),
            entity: EntityKind::Table,
            operation: PersistOp::Delete,
            payload: json!({}),
        })
        .unwrap();
    assert_eq!(deleted, json!({ "deleted": 1 }));
    assert!(store.load_table(engine.id()).unwrap().is_none());

    let leftovers: i64 = conn
        .query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(leftovers, 0);
}

#[test]
fn snapshot_survives_reopening_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabula.sqlite3");
    let mut engine = TableEngine::new("Tasks");
    let done = engine.add_property("Done", PropertyType::Checkbox, None).id;
    engine.add_row(Cells::from([(done, CellValue::Boolean(true))]));
    engine.add_view("All", ViewKind::List, None);

    {
        let conn = open_db(&path).unwrap();
        SqlitePersistence::try_new(&conn)
            .unwrap()
            .save_snapshot(&engine.snapshot())
            .unwrap();
    }

    let conn = open_db(&path).unwrap();
    let stored = SqlitePersistence::try_new(&conn)
        .unwrap()
        .load_table(engine.id())
        .unwrap()
        .unwrap();
    assert_eq!(stored, engine.snapshot());
}

#[test]
fn unmigrated_connection_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    match SqlitePersistence::try_new(&conn) {
        Err(PersistenceError::Storage(DbError::UninitializedConnection {
            actual_version, ..
        })) => assert_eq!(actual_version, 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection accepted"),
    }
}
