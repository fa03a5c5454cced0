//! Durable log of applied operations in `_schema_reconciliations`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use uuid::Uuid;

use super::plan::Operation;
use crate::error::Result;

pub const HISTORY_TABLE: &str = "_schema_reconciliations";

#[derive(Debug, Clone, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub run_id: String,
    pub table_name: String,
    pub operation: String,
    pub op_hash: String,
    pub applied_at: DateTime<Utc>,
}

pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _schema_reconciliations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            table_name TEXT NOT NULL,
            operation TEXT NOT NULL,
            op_hash TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_schema_reconciliations_hash
            ON _schema_reconciliations(op_hash);",
    )?;
    Ok(())
}

/// Records one applied operation. Callers pass the transaction the
/// operation ran in so the record commits with it.
pub fn record(conn: &Connection, run_id: Uuid, operation: &Operation) -> Result<()> {
    conn.execute(
        "INSERT INTO _schema_reconciliations (run_id, table_name, operation, op_hash, applied_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run_id.to_string(),
            operation.table(),
            operation.to_string(),
            operation.content_hash(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, run_id, table_name, operation, op_hash, applied_at
         FROM _schema_reconciliations ORDER BY id",
    )?;
    let records = stmt
        .query_map([], |row| {
            let applied_at: String = row.get(5)?;
            Ok(MigrationRecord {
                id: row.get(0)?,
                run_id: row.get(1)?,
                table_name: row.get(2)?,
                operation: row.get(3)?,
                op_hash: row.get(4)?,
                applied_at: parse_datetime(&applied_at),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn count_applied(conn: &Connection, op_hash: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM _schema_reconciliations WHERE op_hash = ?1",
        params![op_hash],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        ensure_table(&conn).unwrap();

        let op = Operation::DropNotNull {
            table: "expenses".into(),
            column: "type".into(),
        };
        let run = Uuid::new_v4();
        record(&conn, run, &op).unwrap();

        assert_eq!(count_applied(&conn, &op.content_hash()).unwrap(), 1);
        let records = list(&conn).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].table_name, "expenses");
        assert_eq!(records[0].run_id, run.to_string());
        assert_eq!(records[0].operation, "drop not null on expenses.type");
    }
}
