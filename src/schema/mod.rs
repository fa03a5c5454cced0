//! Declarative schema reconciliation for SQLite.
//!
//! A [`SchemaDescriptor`] states the tables and columns the application
//! needs. [`Reconciler::reconcile`] reads the live catalog, plans the
//! additive changes that close the gap, and applies them one at a time,
//! returning a [`ReconciliationReport`] that records every outcome.

pub mod catalog;
pub mod ddl;
pub mod descriptor;
pub mod history;
pub mod plan;
pub mod reconciler;
pub mod report;

pub use catalog::{LiveSchemaSnapshot, LiveTable};
pub use descriptor::{
    BackfillSource, ColumnSpec, ColumnType, ConstraintSpec, DefaultValue, FkAction,
    SchemaDescriptor, TableSpec,
};
pub use plan::{Operation, ReconciliationPlan};
pub use reconciler::{DEFAULT_BATCH_SIZE, Reconciler};
pub use report::{FailureKind, Outcome, ReconciliationReport, ReportEntry, RunStatus, Warning};
