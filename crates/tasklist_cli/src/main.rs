//! Composition-root smoke binary.
//!
//! # Responsibility
//! - Wire logging, a SQLite medium and a `TodoStore` from environment settings.
//! - Run one add/toggle/delete pass to verify the core end to end.

use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use tasklist_core::db::open_db;
use tasklist_core::{
    core_version, default_log_level, init_logging, listener, FilterStatus, SqliteKvBackend,
    StoreConfig, Todo, TodoAdded, TodoDeleted, TodoStore,
};

const DB_PATH_ENV: &str = "TASKLIST_DB_PATH";
const LOG_LEVEL_ENV: &str = "TASKLIST_LOG_LEVEL";
const LOG_DIR_ENV: &str = "TASKLIST_LOG_DIR";
const DEFAULT_DB_FILE_NAME: &str = "tasklist.sqlite3";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tasklist error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().into());
        init_logging(&level, &log_dir)?;
    }

    let db_path = std::env::var_os(DB_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
    let conn = Rc::new(open_db(&db_path)?);
    let store = TodoStore::open(
        Rc::new(SqliteKvBackend::new(conn)),
        &StoreConfig::default(),
    );

    store.on::<TodoAdded>(listener(|todo: &Todo| {
        println!("added {}", todo.id);
        Ok(())
    }));
    store.on::<TodoDeleted>(listener(|id: &String| {
        println!("deleted {id}");
        Ok(())
    }));

    let todo = store.add_todo("smoke check")?;
    store.toggle_todo(&todo.id)?;
    let completed = store.get_todos(FilterStatus::Completed).len();
    store.delete_todo(&todo.id)?;

    info!(
        "event=cli_smoke module=cli status=ok completed_seen={}",
        completed
    );
    println!("tasklist_core version={}", core_version());
    println!(
        "db={} remaining={}",
        db_path.display(),
        store.get_todos(FilterStatus::All).len()
    );
    Ok(())
}
