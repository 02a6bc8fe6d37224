//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tabula_core` linkage and print a deterministic sample projection.
//! - Optionally persist the sample table when a config names `db_path`.
//!
//! Usage: `tabula_cli [config.json]`

use log::info;
use serde_json::json;
use std::process::ExitCode;
use tabula_core::{
    open_db, CellValue, Cells, CoreConfig, PropertyType, SortKey, SqlitePersistence, TableEngine,
    ViewConfig, ViewKind,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tabula_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(&path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    config.init_logging().map_err(|err| err.to_string())?;

    println!("tabula_core ping={}", tabula_core::ping());
    println!("tabula_core version={}", tabula_core::core_version());

    let engine = sample_table();
    let name = engine.properties()[0].id;
    let score = engine.properties()[1].id;
    let projection: Vec<_> = engine
        .evaluate(None)
        .into_iter()
        .map(|row| {
            json!({
                "position": row.position,
                "name": row.cell(name).map(CellValue::to_text),
                "score": row.cell(score).and_then(CellValue::as_number),
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&projection).map_err(|err| err.to_string())?;
    println!("{rendered}");

    if let Some(db_path) = &config.db_path {
        let conn = open_db(db_path).map_err(|err| err.to_string())?;
        let store = SqlitePersistence::try_new(&conn).map_err(|err| err.to_string())?;
        store
            .save_snapshot(&engine.snapshot())
            .map_err(|err| err.to_string())?;
        info!(
            "event=cli_save module=cli status=ok table_id={}",
            engine.id()
        );
        println!("saved table_id={} to {}", engine.id(), db_path.display());
    }
    Ok(())
}

fn sample_table() -> TableEngine {
    let mut engine = TableEngine::new("Sample");
    let name = engine.add_property("Name", PropertyType::Text, None).id;
    let score = engine.add_property("Score", PropertyType::Number, None).id;
    for (label, value) in [("Charlie", 10.0), ("Alice", 30.0), ("Bob", 20.0)] {
        engine.add_row(Cells::from([
            (name, CellValue::text(label)),
            (score, CellValue::Number(value)),
        ]));
    }
    engine.add_view(
        "By name",
        ViewKind::Table,
        Some(ViewConfig {
            sorts: vec![SortKey::asc(name)],
            ..ViewConfig::default()
        }),
    );
    engine
}
