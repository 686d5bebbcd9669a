use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tasklist_core::db::{open_db, open_db_in_memory};
use tasklist_core::kv::{BackendError, BackendResult, KvBackend, StoredEntry, WriteOutcome};
use tasklist_core::{KvError, KvStore, SqliteKvBackend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Settings {
    theme: String,
    page_size: u32,
}

fn sqlite() -> (Rc<Connection>, Rc<SqliteKvBackend>) {
    let conn = Rc::new(open_db_in_memory().unwrap());
    let backend = Rc::new(SqliteKvBackend::new(Rc::clone(&conn)));
    (conn, backend)
}

fn settings() -> Settings {
    Settings {
        theme: "dark".to_string(),
        page_size: 20,
    }
}

#[test]
fn value_survives_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.db");

    {
        let backend = Rc::new(SqliteKvBackend::new(Rc::new(open_db(&path).unwrap())));
        let store: KvStore<Settings> = KvStore::new(backend, "settings");
        assert!(store.save(&settings()));
    }

    let backend = Rc::new(SqliteKvBackend::new(Rc::new(open_db(&path).unwrap())));
    let store: KvStore<Settings> = KvStore::new(backend, "settings");
    assert_eq!(store.load(), Some(settings()));
}

#[test]
fn stored_value_is_plain_json_text() {
    let (conn, backend) = sqlite();
    let store: KvStore<Settings> = KvStore::new(backend, "settings");
    store.save(&settings());

    let raw: String = conn
        .query_row(
            "SELECT value FROM kv_entries WHERE key = 'settings';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["theme"], "dark");
    assert_eq!(json["page_size"], 20);
}

#[test]
fn every_load_rereads_the_medium() {
    let (conn, backend) = sqlite();
    let store: KvStore<Settings> = KvStore::new(backend, "settings");
    store.save(&settings());

    conn.execute(
        "UPDATE kv_entries SET value = '{\"theme\":\"light\",\"page_size\":5}' WHERE key = 'settings';",
        [],
    )
    .unwrap();

    assert_eq!(store.load().unwrap().theme, "light");
}

#[test]
fn malformed_shape_falls_back_to_default() {
    let (conn, backend) = sqlite();
    conn.execute(
        "INSERT INTO kv_entries (key, value) VALUES ('settings', '{\"theme\":1}');",
        [],
    )
    .unwrap();

    let store = KvStore::new(backend, "settings").with_default(settings());
    assert_eq!(store.load(), Some(settings()));
    assert_eq!(store.corrupt_loads(), 1);
    assert!(store.exists());
}

#[test]
fn malformed_value_is_replaced_by_next_save() {
    let (conn, backend) = sqlite();
    conn.execute(
        "INSERT INTO kv_entries (key, value) VALUES ('settings', 'garbage');",
        [],
    )
    .unwrap();
    let store: KvStore<Settings> = KvStore::new(backend, "settings");

    let loaded = store.load_versioned();
    assert_eq!(loaded.value, None);
    assert_eq!(loaded.revision, 1);

    store.save_at(&settings(), loaded.revision).unwrap();
    assert_eq!(store.load(), Some(settings()));
    assert_eq!(store.corrupt_loads(), 1);
}

#[test]
fn clear_removes_value_and_is_idempotent() {
    let (_conn, backend) = sqlite();
    let store: KvStore<Settings> = KvStore::new(backend, "settings");
    store.save(&settings());

    store.clear();
    store.clear();
    assert!(!store.exists());
    assert_eq!(store.load(), None);
}

#[test]
fn keys_are_independent() {
    let (_conn, backend) = sqlite();
    let first: KvStore<u32> = KvStore::new(backend.clone(), "first");
    let second: KvStore<u32> = KvStore::new(backend, "second");

    first.save(&1);
    second.save(&2);
    first.clear();

    assert_eq!(first.load(), None);
    assert_eq!(second.load(), Some(2));
}

#[test]
fn clear_does_not_let_an_older_writer_through() {
    let (conn, backend) = sqlite();
    let early: KvStore<Vec<u32>> = KvStore::new(backend.clone(), "numbers");
    let late: KvStore<Vec<u32>> = KvStore::new(backend, "numbers");

    let seen = early.save_at(&vec![1], 0).unwrap();
    late.clear();
    assert!(late.save(&vec![42]));

    let err = early.save_at(&vec![1, 2], seen).unwrap_err();
    assert!(matches!(
        err,
        KvError::StaleRevision {
            expected: 1,
            actual: 3,
            ..
        }
    ));
    assert_eq!(early.load(), Some(vec![42]));

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE key = 'numbers';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn cleared_key_reports_its_revision() {
    let (_conn, backend) = sqlite();
    let store: KvStore<Settings> = KvStore::new(backend, "settings");
    store.save(&settings());
    store.clear();

    let loaded = store.load_versioned();
    assert_eq!(loaded.value, None);
    assert_eq!(loaded.revision, 2);

    store.save_at(&settings(), loaded.revision).unwrap();
    assert_eq!(store.load(), Some(settings()));
}

struct BrokenBackend;

impl KvBackend for BrokenBackend {
    fn read(&self, _key: &str) -> BackendResult<Option<StoredEntry>> {
        Err(BackendError::Unavailable("disk detached".to_string()))
    }

    fn write(
        &self,
        _key: &str,
        _value: &str,
        _expected: Option<u64>,
    ) -> BackendResult<WriteOutcome> {
        Err(BackendError::Unavailable("quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> BackendResult<bool> {
        Err(BackendError::Unavailable("disk detached".to_string()))
    }
}

#[test]
fn medium_failures_are_recovered_locally() {
    let store = KvStore::new(Rc::new(BrokenBackend), "settings").with_default(settings());

    assert!(!store.save(&settings()));
    assert_eq!(store.load(), Some(settings()));
    assert!(!store.exists());
    store.clear();
}
