//! CLI integration tests for the `migrate` and `plan` commands.
//!
//! Each test uses an isolated temp directory for the database, so tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rusqlite::Connection;
use serde_json::Value;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self, subcommand: &str) -> Command {
        let mut cmd = Command::cargo_bin("waterworks").expect("failed to find binary");
        cmd.env("NO_COLOR", "1")
            .env_remove("WATERWORKS_DATA_DIR")
            .args([subcommand, "--data-dir", &self.data_dir_str()]);
        cmd
    }

    fn schema_file(&self, contents: &str) -> String {
        let file = self.temp_dir.child("schema.toml");
        file.write_str(contents).expect("write schema file");
        file.path().to_string_lossy().to_string()
    }

    fn db(&self) -> Connection {
        Connection::open(self.data_dir().join("waterworks.db")).expect("open database")
    }

    fn has_table(&self, name: &str) -> bool {
        self.db()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get::<_, i64>(0),
            )
            .expect("query sqlite_master")
            == 1
    }
}

#[test]
fn test_plan_is_a_dry_run() {
    let ctx = TestContext::new();

    ctx.cmd("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("create table clients"))
        .stdout(predicate::str::contains("create table expenses"));

    assert!(!ctx.has_table("clients"));
}

#[test]
fn test_migrate_then_plan_is_up_to_date() {
    let ctx = TestContext::new();

    ctx.cmd("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("applied  create table revenue"));

    assert!(ctx.has_table("revenue"));
    assert!(ctx.has_table("_schema_reconciliations"));

    ctx.cmd("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema is up to date"));
}

#[test]
fn test_migrate_json_report() {
    let ctx = TestContext::new();

    let output = ctx
        .cmd("migrate")
        .arg("--json")
        .output()
        .expect("run migrate");
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("report is JSON");
    assert_eq!(report["status"], "completed");
    let entries = report["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 7);
    assert!(entries.iter().all(|e| e["outcome"] == "applied"));
    assert_eq!(entries[0]["operation"]["op"], "create_table");
    assert_eq!(entries[0]["operation"]["table"]["name"], "clients");
}

#[test]
fn test_migrate_upgrades_legacy_database() {
    let ctx = TestContext::new();
    ctx.db()
        .execute_batch(
            "CREATE TABLE expenses (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 date TEXT NOT NULL,
                 type TEXT NOT NULL,
                 amount REAL NOT NULL,
                 recipient TEXT,
                 pay_method TEXT
             );
             INSERT INTO expenses (date, type, amount, recipient, pay_method)
                 VALUES ('2025-03-01', 'fuel', 20, 'Station', 'visa');",
        )
        .expect("seed legacy table");

    ctx.cmd("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "applied  backfill expenses.payment_method from \"pay_method\"",
        ))
        .stdout(predicate::str::contains(
            "applied  drop not null on expenses.type",
        ));

    let payment_method: String = ctx
        .db()
        .query_row("SELECT payment_method FROM expenses", [], |row| row.get(0))
        .expect("read payment_method");
    assert_eq!(payment_method, "visa");
}

#[test]
fn test_migrate_custom_schema() {
    let ctx = TestContext::new();
    let schema = ctx.schema_file(
        r#"
        [[tables]]
        name = "tank_readings"

        [[tables.columns]]
        name = "id"
        type = "integer"
        primary_key = true
        autoincrement = true

        [[tables.columns]]
        name = "litres"
        type = "real"
        nullable = false

        [[tables.constraints]]
        kind = "check"
        expression = "litres >= 0"
        "#,
    );

    ctx.cmd("migrate")
        .args(["--schema", &schema])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied  create table tank_readings"));

    assert!(ctx.has_table("tank_readings"));
    assert!(!ctx.has_table("clients"));
}

#[test]
fn test_migrate_fails_on_core_table_failure() {
    let ctx = TestContext::new();
    ctx.db()
        .execute_batch(
            "CREATE TABLE readings (id INTEGER PRIMARY KEY, litres REAL);
             INSERT INTO readings (litres) VALUES (-4);",
        )
        .expect("seed table");
    let schema = ctx.schema_file(
        r#"
        [[tables]]
        name = "readings"

        [[tables.columns]]
        name = "id"
        type = "integer"
        primary_key = true

        [[tables.columns]]
        name = "litres"
        type = "real"

        [[tables.constraints]]
        kind = "check"
        expression = "litres >= 0"
        "#,
    );

    ctx.cmd("migrate")
        .args(["--schema", &schema])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAILED"))
        .stderr(predicate::str::contains("failed on core tables"));

    // The same failure on an optional table is reported but not fatal.
    let optional = ctx.schema_file(
        r#"
        [[tables]]
        name = "readings"
        core = false

        [[tables.columns]]
        name = "id"
        type = "integer"
        primary_key = true

        [[tables.columns]]
        name = "litres"
        type = "real"

        [[tables.constraints]]
        kind = "check"
        expression = "litres >= 0"
        "#,
    );
    ctx.cmd("migrate")
        .args(["--schema", &optional])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn test_migrate_rejects_bad_descriptors() {
    let ctx = TestContext::new();

    let out_of_order = ctx.schema_file(
        r#"
        [[tables]]
        name = "revenue"

        [[tables.columns]]
        name = "id"
        type = "integer"
        primary_key = true

        [[tables.columns]]
        name = "client_id"
        type = "integer"

        [[tables.constraints]]
        kind = "foreign_key"
        column = "client_id"
        ref_table = "clients"
        ref_column = "id"

        [[tables]]
        name = "clients"

        [[tables.columns]]
        name = "id"
        type = "integer"
        primary_key = true
        "#,
    );
    ctx.cmd("migrate")
        .args(["--schema", &out_of_order])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "table 'revenue' references 'clients'",
        ));
    assert!(!ctx.has_table("revenue"));

    let malformed = ctx.schema_file("[[tables]]\nname = 5\n");
    ctx.cmd("plan")
        .args(["--schema", &malformed])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid schema descriptor"));

    ctx.cmd("migrate")
        .args(["--schema", "/nonexistent/schema.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load schema file"));
}
