#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tempfile::TempDir;

use waterworks::schema::{Outcome, ReconciliationReport};

/// A database file in its own temp directory, removed on drop.
pub struct TestDb {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("waterworks.db");
        Self { temp_dir, path }
    }

    /// Creates the database with `sql` already applied.
    pub fn with_sql(sql: &str) -> Self {
        let db = Self::new();
        db.connect().execute_batch(sql).expect("seed database");
        db
    }

    pub fn connect(&self) -> Connection {
        open(&self.path)
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

pub fn open(path: &Path) -> Connection {
    let conn = Connection::open(path).expect("open database");
    conn.busy_timeout(Duration::from_secs(10))
        .expect("set busy timeout");
    conn.pragma_update(None, "foreign_keys", "ON")
        .expect("enable foreign keys");
    conn
}

pub fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .expect("prepare table_info");
    stmt.query_map([table], |row| row.get(0))
        .expect("query table_info")
        .collect::<Result<Vec<String>, _>>()
        .expect("read table_info")
}

pub fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .expect("prepare sqlite_master");
    stmt.query_map([], |row| row.get(0))
        .expect("query sqlite_master")
        .collect::<Result<Vec<String>, _>>()
        .expect("read sqlite_master")
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

/// `(kind, outcome)` pairs in report order.
pub fn outcomes(report: &ReconciliationReport) -> Vec<(&'static str, &Outcome)> {
    report
        .entries
        .iter()
        .map(|e| (e.operation.kind(), &e.outcome))
        .collect()
}
