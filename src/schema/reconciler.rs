//! Executes reconciliation plans against a SQLite connection.
//!
//! Every schema change runs in its own `BEGIN IMMEDIATE` transaction and
//! re-reads the catalog before acting, so a peer process that got there
//! first turns the operation into a skip rather than an error. Changes
//! SQLite cannot make with `ALTER TABLE` go through a table rebuild.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior, params};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::catalog::{LiveSchemaSnapshot, LiveTable};
use super::ddl::{TableDefinition, column_definition, create_table_sql, quote_ident};
use super::descriptor::{
    BackfillSource, ColumnSpec, ConstraintSpec, DefaultValue, FkAction, SchemaDescriptor, TableSpec,
};
use super::history;
use super::plan::{self, Operation, ReconciliationPlan};
use super::report::{FailureKind, Outcome, ReconciliationReport, ReportEntry, RunStatus, Warning};
use crate::error::{Error, Result};

pub const DEFAULT_BATCH_SIZE: usize = 500;

const SHUTDOWN_REASON: &str = "shutdown requested";

/// Attempts after the first when a peer holds the write lock past the
/// busy timeout.
const BUSY_RETRIES: u32 = 3;
const BUSY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Reconciler {
    batch_size: usize,
    record_history: bool,
    cancel: CancellationToken,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            record_history: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Rows updated per backfill transaction.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.record_history = enabled;
        self
    }

    /// Stops the run between operations once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Inspects and plans without changing anything.
    pub fn plan(&self, descriptor: &SchemaDescriptor, conn: &Connection) -> Result<ReconciliationPlan> {
        descriptor.validate()?;
        probe(conn)?;
        let snapshot = LiveSchemaSnapshot::read(conn).map_err(escalate)?;
        plan::build(descriptor, &snapshot)
    }

    pub fn reconcile(
        &self,
        descriptor: &SchemaDescriptor,
        conn: &mut Connection,
    ) -> Result<ReconciliationReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        descriptor.validate()?;
        probe(conn)?;

        info!(%run_id, phase = "inspecting", "Schema reconciliation started");
        let snapshot = LiveSchemaSnapshot::read(conn).map_err(escalate)?;

        info!(%run_id, phase = "planning", live_tables = snapshot.tables().count());
        let plan = plan::build(descriptor, &snapshot)?;
        for warning in &plan.warnings {
            warn!(%run_id, ?warning, "Schema drift detected");
        }

        info!(%run_id, phase = "executing", operations = plan.operations.len());

        let mut report = ReconciliationReport {
            run_id,
            started_at,
            finished_at: started_at,
            status: RunStatus::Completed,
            entries: Vec::with_capacity(plan.operations.len()),
            warnings: plan.warnings,
        };
        let mut failed_tables: HashSet<String> = HashSet::new();
        let mut failed_columns: HashSet<(String, String)> = HashSet::new();
        let mut interrupted = false;

        for operation in plan.operations {
            if interrupted || self.cancel.is_cancelled() {
                interrupted = true;
                report.entries.push(ReportEntry {
                    operation,
                    outcome: Outcome::skipped(SHUTDOWN_REASON),
                });
                continue;
            }

            let outcome = match blocked_by(&operation, &failed_tables, &failed_columns) {
                Some(reason) => Outcome::failed(FailureKind::Blocked, reason),
                None => match self.execute_with_retry(conn, run_id, &operation, &mut report.warnings) {
                    Ok(outcome) => outcome,
                    Err(err) => classify(&operation, err)?,
                },
            };

            match &outcome {
                Outcome::Applied => info!(%run_id, %operation, "Applied"),
                Outcome::Skipped { reason } => debug!(%run_id, %operation, reason, "Skipped"),
                Outcome::Failed { kind, error } => {
                    error!(%run_id, %operation, ?kind, reason = %error, "Operation failed");
                    match &operation {
                        Operation::CreateTable { table } => {
                            failed_tables.insert(table.name.to_ascii_lowercase());
                        }
                        Operation::AddColumn { table, column } => {
                            failed_columns.insert((
                                table.to_ascii_lowercase(),
                                column.name.to_ascii_lowercase(),
                            ));
                        }
                        _ => {}
                    }
                }
            }
            report.entries.push(ReportEntry { operation, outcome });
        }

        report.finished_at = Utc::now();
        report.settle_status(interrupted);
        if interrupted {
            warn!(%run_id, "Schema reconciliation interrupted; remaining operations resume next run");
        }
        info!(
            %run_id,
            status = ?report.status,
            applied = report.applied().count(),
            failed = report.failed().count(),
            warnings = report.warnings.len(),
            "Schema reconciliation finished"
        );
        Ok(report)
    }

    /// Re-runs an operation that lost the write lock to a peer. Every
    /// operation re-reads the catalog, so a retry after the peer applied the
    /// same change is a skip.
    fn execute_with_retry(
        &self,
        conn: &mut Connection,
        run_id: Uuid,
        operation: &Operation,
        warnings: &mut Vec<Warning>,
    ) -> Result<Outcome> {
        let mut attempt = 0;
        loop {
            match self.execute(conn, run_id, operation, warnings) {
                Err(Error::Database(e)) if is_busy(&e) && attempt < BUSY_RETRIES => {
                    attempt += 1;
                    debug!(%run_id, %operation, attempt, "Database busy, retrying");
                    thread::sleep(BUSY_BACKOFF * attempt);
                }
                result => return result,
            }
        }
    }

    fn execute(
        &self,
        conn: &mut Connection,
        run_id: Uuid,
        operation: &Operation,
        warnings: &mut Vec<Warning>,
    ) -> Result<Outcome> {
        match operation {
            Operation::CreateTable { table } => {
                self.in_transaction(conn, run_id, operation, |tx| create_table(tx, table))
            }
            Operation::AddColumn { table, column } => {
                if column.primary_key {
                    return Err(Error::Unsupported(format!(
                        "cannot add primary key column '{}' to existing table '{table}'",
                        column.name
                    )));
                }
                if column.default.as_ref().is_some_and(|d| !d.is_constant()) {
                    with_rebuild_pragmas(conn, |conn| {
                        self.in_transaction(conn, run_id, operation, |tx| {
                            add_column_by_rebuild(tx, table, column)
                        })
                    })
                } else {
                    self.in_transaction(conn, run_id, operation, |tx| add_column(tx, table, column))
                }
            }
            Operation::BackfillColumn {
                table,
                column,
                source,
                fallback,
            } => self.backfill(conn, run_id, operation, table, column, source, fallback.as_ref()),
            Operation::SetDefault {
                table,
                column,
                default,
            } => with_rebuild_pragmas(conn, |conn| {
                self.in_transaction(conn, run_id, operation, |tx| {
                    set_default(tx, table, column, default)
                })
            }),
            Operation::DropNotNull { table, column } => with_rebuild_pragmas(conn, |conn| {
                self.in_transaction(conn, run_id, operation, |tx| drop_not_null(tx, table, column))
            }),
            Operation::TightenNotNull { table, column } => with_rebuild_pragmas(conn, |conn| {
                self.in_transaction(conn, run_id, operation, |tx| {
                    tighten_not_null(tx, table, column, warnings)
                })
            }),
            Operation::AddConstraint {
                table,
                constraint: constraint @ ConstraintSpec::Unique { columns },
            } => self.in_transaction(conn, run_id, operation, |tx| {
                add_unique(tx, table, constraint, columns)
            }),
            Operation::AddConstraint { table, constraint } => with_rebuild_pragmas(conn, |conn| {
                self.in_transaction(conn, run_id, operation, |tx| {
                    add_constraint_by_rebuild(tx, table, constraint)
                })
            }),
        }
    }

    /// Runs `f` in an IMMEDIATE transaction. Only applied outcomes commit,
    /// together with their history record.
    fn in_transaction<F>(
        &self,
        conn: &mut Connection,
        run_id: Uuid,
        operation: &Operation,
        f: F,
    ) -> Result<Outcome>
    where
        F: FnOnce(&Transaction<'_>) -> Result<Outcome>,
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = f(&tx)?;
        if outcome.is_applied() {
            self.record(&tx, run_id, operation)?;
            tx.commit()?;
        }
        Ok(outcome)
    }

    fn record(&self, tx: &Transaction<'_>, run_id: Uuid, operation: &Operation) -> Result<()> {
        if self.record_history {
            history::ensure_table(tx)?;
            history::record(tx, run_id, operation)?;
        }
        Ok(())
    }

    /// Copies `source` into `column` where the column is still NULL, then
    /// writes `fallback` to the rows the source left empty. One bounded
    /// batch per transaction so writers are never locked out long; the
    /// history record commits with the last batch.
    #[allow(clippy::too_many_arguments)]
    fn backfill(
        &self,
        conn: &mut Connection,
        run_id: Uuid,
        operation: &Operation,
        table: &str,
        column: &str,
        source: &BackfillSource,
        fallback: Option<&DefaultValue>,
    ) -> Result<Outcome> {
        let Some(live) = LiveTable::read(conn, table)? else {
            return Ok(Outcome::failed(
                FailureKind::Blocked,
                format!("table '{table}' does not exist"),
            ));
        };
        if !live.has_column(column) {
            return Ok(Outcome::failed(
                FailureKind::Blocked,
                format!("column '{table}.{column}' does not exist"),
            ));
        }
        if let Some(source_column) = source.column() {
            if !live.has_column(source_column) {
                return Ok(Outcome::skipped(format!(
                    "source column '{source_column}' no longer exists"
                )));
            }
        }

        let target = quote_ident(column);
        let source_sql = source.sql();
        let mut passes = vec![(source_sql.clone(), format!("{target} IS NULL AND {source_sql} IS NOT NULL"))];
        if let Some(default) = fallback {
            passes.push((default.sql(), format!("{target} IS NULL")));
        }

        let table_sql = quote_ident(&live.name);
        let mut total = 0usize;
        let last_pass = passes.len() - 1;
        for (pass, (value, pending)) in passes.iter().enumerate() {
            loop {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let (updated, done) = if live.without_rowid {
                    let updated = tx.execute(
                        &format!("UPDATE {table_sql} SET {target} = {value} WHERE {pending}"),
                        [],
                    )?;
                    (updated, true)
                } else {
                    let updated = tx.execute(
                        &format!(
                            "UPDATE {table_sql} SET {target} = {value} WHERE rowid IN (
                                 SELECT rowid FROM {table_sql} WHERE {pending} LIMIT ?1
                             )"
                        ),
                        params![self.batch_size as i64],
                    )?;
                    (updated, updated < self.batch_size)
                };
                total += updated;
                if done && pass == last_pass && total > 0 {
                    self.record(&tx, run_id, operation)?;
                }
                tx.commit()?;
                debug!(table, column, pass, updated, total, "Backfill batch");
                if done {
                    break;
                }
            }
        }

        if total == 0 {
            return Ok(Outcome::skipped("no rows awaiting backfill"));
        }
        info!(table, column, rows = total, "Backfilled");
        Ok(Outcome::Applied)
    }
}

fn create_table(tx: &Transaction<'_>, table: &TableSpec) -> Result<Outcome> {
    if LiveTable::read(tx, &table.name)?.is_some() {
        return Ok(Outcome::skipped("table already exists"));
    }
    tx.execute_batch(&create_table_sql(table))?;
    Ok(Outcome::Applied)
}

fn add_column(tx: &Transaction<'_>, table: &str, column: &ColumnSpec) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    if live.has_column(&column.name) {
        return Ok(Outcome::skipped("column already exists"));
    }
    tx.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(&live.name),
        column_definition(column, false)
    ))?;
    Ok(Outcome::Applied)
}

fn add_column_by_rebuild(tx: &Transaction<'_>, table: &str, column: &ColumnSpec) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    if live.has_column(&column.name) {
        return Ok(Outcome::skipped("column already exists"));
    }
    let mut definition = TableDefinition::parse(&live.sql)?;
    definition.push_column(&column_definition(column, false))?;
    rebuild_table(tx, &live, &definition)?;
    Ok(Outcome::Applied)
}

fn set_default(tx: &Transaction<'_>, table: &str, column: &str, default: &DefaultValue) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    let Some(live_column) = live.column(column) else {
        return Err(missing_column(table, column));
    };
    if live_column.default.is_some() {
        return Ok(Outcome::skipped("default already set"));
    }
    let mut definition = TableDefinition::parse(&live.sql)?;
    definition.append_to_column(column, &format!("DEFAULT {}", default.sql()))?;
    rebuild_table(tx, &live, &definition)?;
    Ok(Outcome::Applied)
}

fn drop_not_null(tx: &Transaction<'_>, table: &str, column: &str) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    let Some(live_column) = live.column(column) else {
        return Err(missing_column(table, column));
    };
    if !live_column.not_null {
        return Ok(Outcome::skipped("column already nullable"));
    }
    let mut definition = TableDefinition::parse(&live.sql)?;
    if !definition.remove_not_null(column)? {
        return Err(Error::Unsupported(format!(
            "NOT NULL on '{table}.{column}' is not part of its column definition"
        )));
    }
    rebuild_table(tx, &live, &definition)?;
    Ok(Outcome::Applied)
}

fn tighten_not_null(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    warnings: &mut Vec<Warning>,
) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    let Some(live_column) = live.column(column) else {
        return Err(missing_column(table, column));
    };
    if live_column.not_null {
        return Ok(Outcome::skipped("column already NOT NULL"));
    }
    let null_rows: i64 = tx.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            quote_ident(&live.name),
            quote_ident(column)
        ),
        [],
        |row| row.get(0),
    )?;
    if null_rows > 0 {
        warn!(table, column, null_rows, "NOT NULL left unenforced");
        warnings.push(Warning::PartialConstraint {
            table: table.to_string(),
            column: column.to_string(),
            null_rows,
        });
        return Ok(Outcome::skipped(format!("{null_rows} rows hold NULL")));
    }
    let mut definition = TableDefinition::parse(&live.sql)?;
    definition.append_to_column(column, "NOT NULL")?;
    rebuild_table(tx, &live, &definition)?;
    Ok(Outcome::Applied)
}

fn add_unique(
    tx: &Transaction<'_>,
    table: &str,
    constraint: &ConstraintSpec,
    columns: &[String],
) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    if live.satisfies(constraint, |t| primary_key_of(tx, t)) {
        return Ok(Outcome::skipped("equivalent unique index exists"));
    }
    let index = free_index_name(
        tx,
        &format!(
            "uq_{}_{}",
            live.name.to_ascii_lowercase(),
            columns
                .iter()
                .map(|c| c.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join("_")
        ),
    )?;
    tx.execute_batch(&format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        quote_ident(&index),
        quote_ident(&live.name),
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    ))?;
    Ok(Outcome::Applied)
}

/// `base`, or `base_2`, `base_3`, ... when an unrelated object already
/// holds the name.
fn free_index_name(conn: &Connection, base: &str) -> Result<String> {
    let mut candidate = base.to_string();
    for suffix in 2.. {
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            break;
        }
        candidate = format!("{base}_{suffix}");
    }
    Ok(candidate)
}

fn add_constraint_by_rebuild(tx: &Transaction<'_>, table: &str, constraint: &ConstraintSpec) -> Result<Outcome> {
    let live = require_table(tx, table)?;
    if live.satisfies(constraint, |t| primary_key_of(tx, t)) {
        return Ok(Outcome::skipped("equivalent constraint exists"));
    }
    let table_sql = quote_ident(&live.name);

    let violations: i64 = match constraint {
        ConstraintSpec::ForeignKey {
            column,
            ref_table,
            ref_column,
            ..
        } => {
            let Some(parent) = LiveTable::read(tx, ref_table)? else {
                return Ok(Outcome::failed(
                    FailureKind::Blocked,
                    format!("referenced table '{ref_table}' does not exist"),
                ));
            };
            tx.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table_sql} AS c
                     WHERE c.{col} IS NOT NULL
                       AND NOT EXISTS (SELECT 1 FROM {parent} AS p WHERE p.{ref_col} = c.{col})",
                    col = quote_ident(column),
                    parent = quote_ident(&parent.name),
                    ref_col = quote_ident(ref_column),
                ),
                [],
                |row| row.get(0),
            )?
        }
        ConstraintSpec::Check { expression } => tx.query_row(
            &format!("SELECT COUNT(*) FROM {table_sql} WHERE NOT ({expression})"),
            [],
            |row| row.get(0),
        )?,
        ConstraintSpec::Unique { .. } => 0,
    };
    if violations > 0 {
        return Err(Error::ConstraintViolation(format!(
            "{violations} existing rows in '{table}' violate {constraint}"
        )));
    }

    let mut definition = TableDefinition::parse(&live.sql)?;
    if let ConstraintSpec::ForeignKey {
        column, ref_table, ..
    } = constraint
    {
        replace_plain_foreign_key(&live, &mut definition, column, ref_table)?;
    }
    definition.push_constraint(&constraint.sql());
    rebuild_table(tx, &live, &definition)?;
    Ok(Outcome::Applied)
}

/// Drops an existing `NO ACTION` reference from `column` to `ref_table` so
/// the declared one replaces it instead of sitting next to it. A reference
/// with any other action is left for an operator to resolve.
fn replace_plain_foreign_key(
    live: &LiveTable,
    definition: &mut TableDefinition,
    column: &str,
    ref_table: &str,
) -> Result<()> {
    let existing: Vec<_> = live
        .foreign_keys
        .iter()
        .filter(|fk| fk.column.eq_ignore_ascii_case(column) && fk.ref_table.eq_ignore_ascii_case(ref_table))
        .collect();
    if existing.is_empty() {
        return Ok(());
    }
    if let Some(fk) = existing.iter().find(|fk| fk.on_delete != FkAction::NoAction) {
        return Err(Error::Unsupported(format!(
            "'{}.{column}' already references '{ref_table}' with ON DELETE {}",
            live.name,
            fk.on_delete.sql()
        )));
    }
    if !definition.remove_foreign_key(column, ref_table)? {
        return Err(Error::Unsupported(format!(
            "reference from '{}.{column}' to '{ref_table}' is not part of the table's DDL",
            live.name
        )));
    }
    Ok(())
}

fn require_table(conn: &Connection, table: &str) -> Result<LiveTable> {
    LiveTable::read(conn, table)?
        .ok_or_else(|| Error::Unsupported(format!("table '{table}' does not exist")))
}

fn missing_column(table: &str, column: &str) -> Error {
    Error::Unsupported(format!("column '{table}.{column}' does not exist"))
}

fn primary_key_of(conn: &Connection, table: &str) -> Option<String> {
    LiveTable::read(conn, table)
        .ok()
        .flatten()
        .and_then(|t| t.primary_key().map(|c| c.name.clone()))
}

/// Foreign key enforcement must be off while a table is dropped and
/// renamed, and can only be toggled outside a transaction.
fn with_rebuild_pragmas<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T>,
{
    let foreign_keys: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = OFF; PRAGMA legacy_alter_table = ON;")?;
    let result = f(conn);
    let restore = if foreign_keys {
        "PRAGMA legacy_alter_table = OFF; PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA legacy_alter_table = OFF;"
    };
    let restored = conn.execute_batch(restore);
    let value = result?;
    restored?;
    Ok(value)
}

/// Re-creates `live` from `definition`, keeping every row, index, trigger
/// and the AUTOINCREMENT counter.
fn rebuild_table(tx: &Transaction<'_>, live: &LiveTable, definition: &TableDefinition) -> Result<()> {
    let name = quote_ident(&live.name);
    let temp_name = format!("_reconcile_{}", live.name);
    let temp = quote_ident(&temp_name);

    let mut stmt = tx.prepare(
        "SELECT sql FROM sqlite_master
         WHERE tbl_name = ?1 COLLATE NOCASE AND type IN ('index', 'trigger') AND sql IS NOT NULL",
    )?;
    let companions = stmt
        .query_map(params![live.name], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);

    let has_sequence: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
        [],
        |row| row.get(0),
    )?;
    let sequence: Option<i64> = if has_sequence {
        tx.query_row(
            "SELECT MAX(seq) FROM sqlite_sequence WHERE name = ?1",
            params![live.name],
            |row| row.get(0),
        )?
    } else {
        None
    };

    let columns = live
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    tx.execute_batch(&format!("DROP TABLE IF EXISTS {temp}"))?;
    tx.execute_batch(&definition.render(&temp_name))?;
    tx.execute(
        &format!("INSERT INTO {temp} ({columns}) SELECT {columns} FROM {name}"),
        [],
    )?;
    tx.execute_batch(&format!("DROP TABLE {name}; ALTER TABLE {temp} RENAME TO {name};"))?;
    for sql in companions {
        tx.execute_batch(&sql)?;
    }

    if let Some(seq) = sequence {
        let updated = tx.execute(
            "UPDATE sqlite_sequence SET seq = MAX(seq, ?2) WHERE name = ?1",
            params![live.name, seq],
        )?;
        if updated == 0 {
            tx.execute(
                "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
                params![live.name, seq],
            )?;
        }
    }

    let dangling: i64 = tx.query_row(
        "SELECT COUNT(*) FROM pragma_foreign_key_check(?1)",
        params![live.name],
        |row| row.get(0),
    )?;
    if dangling > 0 {
        return Err(Error::ConstraintViolation(format!(
            "rebuilding '{}' left {dangling} rows with dangling foreign keys",
            live.name
        )));
    }
    debug!(table = %live.name, "Table rebuilt");
    Ok(())
}

fn blocked_by(
    operation: &Operation,
    failed_tables: &HashSet<String>,
    failed_columns: &HashSet<(String, String)>,
) -> Option<String> {
    let table = operation.table().to_ascii_lowercase();
    if failed_tables.contains(&table) {
        return Some(format!("creating table '{}' failed", operation.table()));
    }
    operation
        .columns()
        .into_iter()
        .find(|c| failed_columns.contains(&(table.clone(), c.to_ascii_lowercase())))
        .map(|c| format!("adding column '{}.{c}' failed", operation.table()))
}

fn probe(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|e| Error::Connection(e.to_string()))
}

fn is_connection_error(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
        )
    )
}

/// A peer holds the lock past the busy timeout. The connection itself is
/// fine, so the operation fails on its own and the run goes on.
fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Maps connection-class engine errors to [`Error::Connection`].
fn escalate(err: Error) -> Error {
    match err {
        Error::Database(e) if is_connection_error(&e) => Error::Connection(e.to_string()),
        other => other,
    }
}

/// True when `message` says the object `operation` creates is already
/// there. Collisions with any other object are real failures.
fn already_applied(operation: &Operation, message: &str) -> bool {
    let message = message
        .to_ascii_lowercase()
        .replace(['"', '`', '[', ']'], "");
    match operation {
        Operation::CreateTable { table } => {
            message == format!("table {} already exists", table.name.to_ascii_lowercase())
        }
        Operation::AddColumn { column, .. } => {
            message == format!("duplicate column name: {}", column.name.to_ascii_lowercase())
        }
        _ => false,
    }
}

/// Turns an operation error into its report outcome. Connection-class
/// errors are returned as `Err` and end the run.
fn classify(operation: &Operation, err: Error) -> Result<Outcome> {
    match escalate(err) {
        Error::Database(e) => {
            let message = e.to_string();
            if already_applied(operation, &message) {
                Ok(Outcome::skipped(format!("already applied: {message}")))
            } else if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
                || message.contains("constraint failed")
            {
                Ok(Outcome::failed(FailureKind::ConstraintViolation, message))
            } else {
                Ok(Outcome::failed(FailureKind::Database, message))
            }
        }
        Error::ConstraintViolation(message) => {
            Ok(Outcome::failed(FailureKind::ConstraintViolation, message))
        }
        Error::Unsupported(message) => Ok(Outcome::failed(FailureKind::Unsupported, message)),
        fatal @ Error::Connection(_) => Err(fatal),
        other => Ok(Outcome::failed(FailureKind::Database, other)),
    }
}
