//! SQLite-backed reference persistence collaborator.
//!
//! # Responsibility
//! - Store tables and their entities as JSON payloads with a position column.
//! - Answer each request with the canonical stored entity.
//! - Hydrate a stored table back into a [`TableSnapshot`].
//!
//! # Invariants
//! - Stored positions per `(table_id, kind)` stay dense `0..N-1`.
//! - Property deletion strips the property from stored rows and views in
//!   the same transaction.
//! - Reorders validate the full id set and apply in one transaction.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::property::{Property, PropertyId};
use crate::model::row::Row;
use crate::model::table::{TableId, TableSnapshot};
use crate::model::view::View;
use crate::persist::{
    EntityKind, PersistOp, PersistRequest, PersistResult, Persistence, PersistenceError,
};
use crate::position::{self, Positioned};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct IdList {
    ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct TablePayload {
    name: String,
}

/// Persistence collaborator over a migrated SQLite connection.
pub struct SqlitePersistence<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersistence<'conn> {
    /// Creates the collaborator from a migrated connection.
    ///
    /// # Errors
    /// - `Storage` when the connection is not at the latest schema version or
    ///   required tables are missing.
    pub fn try_new(conn: &'conn Connection) -> PersistResult<Self> {
        ensure_store_ready(conn)?;
        Ok(Self { conn })
    }

    /// Loads one stored table. Returns `Ok(None)` when it does not exist.
    pub fn load_table(&self, table_id: TableId) -> PersistResult<Option<TableSnapshot>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM tables WHERE table_id = ?1;",
                [table_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(name) = name else {
            return Ok(None);
        };

        Ok(Some(TableSnapshot {
            id: table_id,
            name,
            properties: load_entities::<Property>(self.conn, table_id, EntityKind::Property)?,
            rows: load_entities::<Row>(self.conn, table_id, EntityKind::Row)?,
            views: load_entities::<View>(self.conn, table_id, EntityKind::View)?,
        }))
    }

    /// Replaces the stored state of one table with `snapshot`.
    pub fn save_snapshot(&self, snapshot: &TableSnapshot) -> PersistResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        upsert_table(&tx, snapshot.id, snapshot.name.as_str())?;
        tx.execute(
            "DELETE FROM entities WHERE table_id = ?1;",
            [snapshot.id.to_string()],
        )?;
        insert_all(&tx, snapshot.id, EntityKind::Property, &snapshot.properties)?;
        insert_all(&tx, snapshot.id, EntityKind::Row, &snapshot.rows)?;
        insert_all(&tx, snapshot.id, EntityKind::View, &snapshot.views)?;
        tx.commit()?;

        info!(
            "event=snapshot_save module=persist status=ok table_id={} properties={} rows={} views={}",
            snapshot.id,
            snapshot.properties.len(),
            snapshot.rows.len(),
            snapshot.views.len()
        );
        Ok(())
    }
}

impl Persistence for SqlitePersistence<'_> {
    fn persist(&self, request: &PersistRequest) -> PersistResult<Value> {
        let started_at = Instant::now();
        let result = match (request.entity, request.operation) {
            (EntityKind::Table, PersistOp::Create) => create_table(self.conn, request),
            (EntityKind::Table, PersistOp::Update) => update_table(self.conn, request),
            (EntityKind::Table, PersistOp::Delete) => delete_table(self.conn, request),
            (EntityKind::Table, PersistOp::Reorder) => Err(PersistenceError::Validation(
                "tables have no sibling order".to_string(),
            )),
            (_, PersistOp::Create) => create_entity(self.conn, request),
            (_, PersistOp::Update) => update_entity(self.conn, request),
            (_, PersistOp::Delete) => delete_entities(self.conn, request),
            (_, PersistOp::Reorder) => reorder_entities(self.conn, request),
        };

        match &result {
            Ok(_) => info!(
                "event=persist module=persist status=ok table_id={} entity={} op={} duration_ms={}",
                request.table_id,
                request.entity.as_str(),
                request.operation.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=persist module=persist status=error table_id={} entity={} op={} duration_ms={} error={}",
                request.table_id,
                request.entity.as_str(),
                request.operation.as_str(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn create_table(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let payload = parse_payload::<TablePayload>(&request.payload, "table")?;
    upsert_table(conn, request.table_id, payload.name.as_str())?;
    load_table_value(conn, request.table_id)
}

fn update_table(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let payload = parse_payload::<TablePayload>(&request.payload, "table")?;
    let changed = conn.execute(
        "UPDATE tables
         SET name = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE table_id = ?1;",
        params![request.table_id.to_string(), payload.name],
    )?;
    if changed == 0 {
        return Err(PersistenceError::NotFound {
            entity: EntityKind::Table,
            id: request.table_id,
        });
    }
    load_table_value(conn, request.table_id)
}

fn delete_table(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let deleted = conn.execute(
        "DELETE FROM tables WHERE table_id = ?1;",
        [request.table_id.to_string()],
    )?;
    Ok(json!({ "deleted": deleted }))
}

fn create_entity(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let entity_id = validate_entity(request.entity, &request.payload)?;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    ensure_table_exists(&tx, request.table_id)?;

    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM entities WHERE entity_id = ?1);",
        [entity_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Err(PersistenceError::Validation(format!(
            "{} already stored: {entity_id}",
            request.entity.as_str()
        )));
    }

    let position = next_position(&tx, request.table_id, request.entity)?;
    tx.execute(
        "INSERT INTO entities (entity_id, table_id, kind, position, payload)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            entity_id.to_string(),
            request.table_id.to_string(),
            request.entity.as_str(),
            position,
            request.payload.to_string(),
        ],
    )?;
    let stored = load_entity_value(&tx, entity_id)?;
    tx.commit()?;
    Ok(stored)
}

fn update_entity(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let entity_id = validate_entity(request.entity, &request.payload)?;
    let changed = conn.execute(
        "UPDATE entities
         SET payload = ?4,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE entity_id = ?1
           AND table_id = ?2
           AND kind = ?3;",
        params![
            entity_id.to_string(),
            request.table_id.to_string(),
            request.entity.as_str(),
            request.payload.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(PersistenceError::NotFound {
            entity: request.entity,
            id: entity_id,
        });
    }
    load_entity_value(conn, entity_id)
}

fn delete_entities(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let ids = parse_payload::<IdList>(&request.payload, "id list")?.ids;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let mut removed = Vec::with_capacity(ids.len());
    for id in &ids {
        let changed = tx.execute(
            "DELETE FROM entities
             WHERE entity_id = ?1
               AND table_id = ?2
               AND kind = ?3;",
            params![
                id.to_string(),
                request.table_id.to_string(),
                request.entity.as_str()
            ],
        )?;
        if changed > 0 {
            removed.push(*id);
        }
    }

    if request.entity == EntityKind::Property && !removed.is_empty() {
        strip_properties(&tx, request.table_id, &removed)?;
    }
    reindex_stored(&tx, request.table_id, request.entity)?;
    tx.commit()?;
    Ok(json!({ "deleted": removed.len() }))
}

fn reorder_entities(conn: &Connection, request: &PersistRequest) -> PersistResult<Value> {
    let ids = parse_payload::<IdList>(&request.payload, "id list")?.ids;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let stored = list_entity_ids(&tx, request.table_id, request.entity)?;
    position::validate_id_permutation(&stored, &ids)
        .map_err(|err| PersistenceError::Validation(err.to_string()))?;
    write_positions(&tx, &ids)?;
    tx.commit()?;
    Ok(json!({ "ids": ids }))
}

/// Mirrors the in-memory cascade: drops cells and view config entries that
/// reference removed properties.
fn strip_properties(
    conn: &Connection,
    table_id: TableId,
    property_ids: &[PropertyId],
) -> PersistResult<()> {
    for (entity_id, mut row) in load_entities_with_ids::<Row>(conn, table_id, EntityKind::Row)? {
        let before = row.cells.len();
        row.cells.retain(|id, _| !property_ids.contains(id));
        if row.cells.len() != before {
            rewrite_payload(conn, entity_id, &row)?;
        }
    }

    for (entity_id, mut view) in load_entities_with_ids::<View>(conn, table_id, EntityKind::View)?
    {
        let Some(config) = view.config.as_mut() else {
            continue;
        };
        let mut touched = false;
        for property_id in property_ids {
            if config.references(*property_id) {
                config.forget_property(*property_id);
                touched = true;
            }
        }
        if touched {
            rewrite_payload(conn, entity_id, &view)?;
        }
    }
    Ok(())
}

fn upsert_table(conn: &Connection, table_id: TableId, name: &str) -> PersistResult<()> {
    conn.execute(
        "INSERT INTO tables (table_id, name) VALUES (?1, ?2)
         ON CONFLICT(table_id) DO UPDATE
         SET name = excluded.name,
             updated_at = (strftime('%s', 'now') * 1000);",
        params![table_id.to_string(), name],
    )?;
    Ok(())
}

fn insert_all<T: Serialize + Positioned>(
    conn: &Connection,
    table_id: TableId,
    kind: EntityKind,
    items: &[T],
) -> PersistResult<()> {
    for (index, item) in items.iter().enumerate() {
        let payload = serde_json::to_string(item).map_err(|err| {
            PersistenceError::InvalidData(format!("cannot serialize {}: {err}", kind.as_str()))
        })?;
        conn.execute(
            "INSERT INTO entities (entity_id, table_id, kind, position, payload)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item.id().to_string(),
                table_id.to_string(),
                kind.as_str(),
                index as i64,
                payload,
            ],
        )?;
    }
    Ok(())
}

fn rewrite_payload<T: Serialize>(conn: &Connection, entity_id: Uuid, value: &T) -> PersistResult<()> {
    let payload = serde_json::to_string(value)
        .map_err(|err| PersistenceError::InvalidData(format!("cannot serialize entity: {err}")))?;
    conn.execute(
        "UPDATE entities
         SET payload = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE entity_id = ?1;",
        params![entity_id.to_string(), payload],
    )?;
    Ok(())
}

fn reindex_stored(conn: &Connection, table_id: TableId, kind: EntityKind) -> PersistResult<()> {
    let ids = list_entity_ids(conn, table_id, kind)?;
    write_positions(conn, &ids)
}

fn write_positions(conn: &Connection, ordered_ids: &[Uuid]) -> PersistResult<()> {
    for (index, id) in ordered_ids.iter().enumerate() {
        conn.execute(
            "UPDATE entities
             SET position = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE entity_id = ?1;",
            params![id.to_string(), index as i64],
        )?;
    }
    Ok(())
}

fn next_position(conn: &Connection, table_id: TableId, kind: EntityKind) -> PersistResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1
         FROM entities
         WHERE table_id = ?1
           AND kind = ?2;",
        params![table_id.to_string(), kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn list_entity_ids(conn: &Connection, table_id: TableId, kind: EntityKind) -> PersistResult<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT entity_id
         FROM entities
         WHERE table_id = ?1
           AND kind = ?2
         ORDER BY position ASC, entity_id ASC;",
    )?;
    let mut rows = stmt.query(params![table_id.to_string(), kind.as_str()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value)?);
    }
    Ok(ids)
}

fn load_entities<T>(conn: &Connection, table_id: TableId, kind: EntityKind) -> PersistResult<Vec<T>>
where
    T: DeserializeOwned + Positioned,
{
    Ok(load_entities_with_ids(conn, table_id, kind)?
        .into_iter()
        .map(|(_, entity)| entity)
        .collect())
}

fn load_entities_with_ids<T>(
    conn: &Connection,
    table_id: TableId,
    kind: EntityKind,
) -> PersistResult<Vec<(Uuid, T)>>
where
    T: DeserializeOwned + Positioned,
{
    let mut stmt = conn.prepare(
        "SELECT entity_id, position, payload
         FROM entities
         WHERE table_id = ?1
           AND kind = ?2
         ORDER BY position ASC, entity_id ASC;",
    )?;
    let mut rows = stmt.query(params![table_id.to_string(), kind.as_str()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let entity_id = parse_uuid(&row.get::<_, String>(0)?)?;
        let position = parse_position(row.get(1)?)?;
        let payload: String = row.get(2)?;
        let mut entity: T = serde_json::from_str(&payload).map_err(|err| {
            PersistenceError::InvalidData(format!(
                "invalid {} payload for {entity_id}: {err}",
                kind.as_str()
            ))
        })?;
        entity.set_position(position);
        items.push((entity_id, entity));
    }
    Ok(items)
}

fn load_entity_value(conn: &Connection, entity_id: Uuid) -> PersistResult<Value> {
    let (position, payload): (i64, String) = conn.query_row(
        "SELECT position, payload FROM entities WHERE entity_id = ?1;",
        [entity_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let mut value: Value = serde_json::from_str(&payload).map_err(|err| {
        PersistenceError::InvalidData(format!("invalid payload for {entity_id}: {err}"))
    })?;
    if let Value::Object(map) = &mut value {
        map.insert("position".to_string(), json!(parse_position(position)?));
    }
    Ok(value)
}

fn load_table_value(conn: &Connection, table_id: TableId) -> PersistResult<Value> {
    let name: String = conn.query_row(
        "SELECT name FROM tables WHERE table_id = ?1;",
        [table_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(json!({ "id": table_id, "name": name }))
}

fn validate_entity(kind: EntityKind, payload: &Value) -> PersistResult<Uuid> {
    let id = match kind {
        EntityKind::Property => parse_payload::<Property>(payload, "property")?.id,
        EntityKind::Row => parse_payload::<Row>(payload, "row")?.id,
        EntityKind::View => parse_payload::<View>(payload, "view")?.id,
        EntityKind::Table => {
            return Err(PersistenceError::Validation(
                "table payloads are not entities".to_string(),
            ))
        }
    };
    if id.is_nil() {
        return Err(PersistenceError::Validation(format!(
            "{} id must not be nil",
            kind.as_str()
        )));
    }
    Ok(id)
}

fn parse_payload<T: DeserializeOwned>(payload: &Value, label: &str) -> PersistResult<T> {
    T::deserialize(payload)
        .map_err(|err| PersistenceError::Validation(format!("invalid {label} payload: {err}")))
}

fn parse_uuid(value: &str) -> PersistResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| PersistenceError::InvalidData(format!("invalid uuid `{value}` in entities")))
}

fn parse_position(value: i64) -> PersistResult<usize> {
    usize::try_from(value)
        .map_err(|_| PersistenceError::InvalidData(format!("invalid position `{value}`")))
}

fn ensure_table_exists(conn: &Connection, table_id: TableId) -> PersistResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tables WHERE table_id = ?1);",
        [table_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(PersistenceError::NotFound {
            entity: EntityKind::Table,
            id: table_id,
        })
    }
}

fn ensure_store_ready(conn: &Connection) -> PersistResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        }
        .into());
    }

    for table in ["tables", "entities"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(DbError::MissingRequiredTable(table).into());
        }
    }
    Ok(())
}
