use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::descriptor::SchemaDescriptor;
use super::plan::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings,
    /// Cancelled between operations; the next run picks up the rest.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConstraintViolation,
    /// An earlier failure on the same table or column made this one moot.
    Blocked,
    Unsupported,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Skipped { reason: String },
    Failed { kind: FailureKind, error: String },
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(kind: FailureKind, error: impl ToString) -> Self {
        Self::Failed {
            kind,
            error: error.to_string(),
        }
    }

    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    /// A NOT NULL could not be enforced because rows still hold NULL.
    PartialConstraint {
        table: String,
        column: String,
        null_rows: i64,
    },
    TypeDrift {
        table: String,
        column: String,
        live_type: String,
        declared_type: String,
    },
}

impl Warning {
    pub fn table(&self) -> &str {
        match self {
            Self::PartialConstraint { table, .. } | Self::TypeDrift { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub operation: Operation,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub entries: Vec<ReportEntry>,
    pub warnings: Vec<Warning>,
}

impl ReconciliationReport {
    pub fn applied(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_applied())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failed())
    }

    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Failures on tables the descriptor marks as core. A host should not
    /// start serving while this is non-empty.
    pub fn fatal_entries<'a>(&'a self, descriptor: &'a SchemaDescriptor) -> Vec<&'a ReportEntry> {
        self.failed()
            .filter(|e| {
                descriptor
                    .find_table(e.operation.table())
                    .is_none_or(|t| t.core)
            })
            .collect()
    }

    pub(crate) fn settle_status(&mut self, interrupted: bool) {
        self.status = if interrupted {
            RunStatus::Interrupted
        } else if !self.warnings.is_empty() || self.entries.iter().any(|e| e.outcome.is_failed()) {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Completed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::{ColumnSpec, ColumnType, TableSpec};

    fn report(entries: Vec<ReportEntry>) -> ReconciliationReport {
        let now = Utc::now();
        let mut report = ReconciliationReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            status: RunStatus::Completed,
            entries,
            warnings: Vec::new(),
        };
        report.settle_status(false);
        report
    }

    fn failed_on(table: &str) -> ReportEntry {
        ReportEntry {
            operation: Operation::DropNotNull {
                table: table.into(),
                column: "x".into(),
            },
            outcome: Outcome::failed(FailureKind::Database, "boom"),
        }
    }

    #[test]
    fn test_fatal_entries_only_cover_core_tables() {
        let descriptor = SchemaDescriptor::new()
            .table(TableSpec::new("clients").column(ColumnSpec::new("x", ColumnType::Text)))
            .table(
                TableSpec::new("notes")
                    .column(ColumnSpec::new("x", ColumnType::Text))
                    .optional(),
            );
        let report = report(vec![failed_on("clients"), failed_on("notes")]);
        assert_eq!(report.status, RunStatus::CompletedWithWarnings);
        let fatal = report.fatal_entries(&descriptor);
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].operation.table(), "clients");
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = failed_on("clients");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["kind"], "database");
        assert_eq!(json["operation"]["op"], "drop_not_null");
    }
}
