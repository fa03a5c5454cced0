//! Diffing a descriptor against a live snapshot into additive operations.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::catalog::{LiveSchemaSnapshot, LiveTable};
use super::ddl::affinity;
use super::descriptor::{BackfillSource, ColumnSpec, ConstraintSpec, DefaultValue, SchemaDescriptor, TableSpec};
use super::report::Warning;
use crate::error::Result;

/// One schema change. There is deliberately no variant that drops or
/// narrows anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateTable {
        table: TableSpec,
    },
    AddColumn {
        table: String,
        column: ColumnSpec,
    },
    AddConstraint {
        table: String,
        constraint: ConstraintSpec,
    },
    DropNotNull {
        table: String,
        column: String,
    },
    TightenNotNull {
        table: String,
        column: String,
    },
    SetDefault {
        table: String,
        column: String,
        default: DefaultValue,
    },
    BackfillColumn {
        table: String,
        column: String,
        source: BackfillSource,
        /// Written to rows still NULL once the source is exhausted.
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback: Option<DefaultValue>,
    },
}

impl Operation {
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table } => &table.name,
            Self::AddColumn { table, .. }
            | Self::AddConstraint { table, .. }
            | Self::DropNotNull { table, .. }
            | Self::TightenNotNull { table, .. }
            | Self::SetDefault { table, .. }
            | Self::BackfillColumn { table, .. } => table,
        }
    }

    /// Columns of [`Self::table`] this operation touches or depends on.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::CreateTable { .. } => Vec::new(),
            Self::AddColumn { column, .. } => vec![column.name.as_str()],
            Self::AddConstraint { constraint, .. } => constraint.columns(),
            Self::DropNotNull { column, .. }
            | Self::TightenNotNull { column, .. }
            | Self::SetDefault { column, .. } => vec![column.as_str()],
            Self::BackfillColumn { column, source, .. } => {
                let mut cols = vec![column.as_str()];
                cols.extend(source.column());
                cols
            }
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::AddColumn { .. } => "add_column",
            Self::AddConstraint { .. } => "add_constraint",
            Self::DropNotNull { .. } => "drop_not_null",
            Self::TightenNotNull { .. } => "tighten_not_null",
            Self::SetDefault { .. } => "set_default",
            Self::BackfillColumn { .. } => "backfill_column",
        }
    }

    /// Hex SHA-256 of the operation's canonical JSON form.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_else(|_| self.to_string().into_bytes());
        hex::encode(Sha256::digest(&canonical))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table } => write!(
                f,
                "create table {} ({} columns, {} constraints)",
                table.name,
                table.columns.len(),
                table.effective_constraints().len()
            ),
            Self::AddColumn { table, column } => write!(
                f,
                "add column {table}.{} {}",
                column.name,
                column.column_type.sql()
            ),
            Self::AddConstraint { table, constraint } => {
                write!(f, "add constraint on {table}: {constraint}")
            }
            Self::DropNotNull { table, column } => write!(f, "drop not null on {table}.{column}"),
            Self::TightenNotNull { table, column } => write!(f, "set not null on {table}.{column}"),
            Self::SetDefault {
                table,
                column,
                default,
            } => write!(f, "set default {} on {table}.{column}", default.sql()),
            Self::BackfillColumn {
                table,
                column,
                source,
                fallback,
            } => {
                write!(f, "backfill {table}.{column} from {}", source.sql())?;
                match fallback {
                    Some(default) => write!(f, " else {}", default.sql()),
                    None => Ok(()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationPlan {
    pub operations: Vec<Operation>,
    /// Findings that need no operation, e.g. type drift.
    pub warnings: Vec<Warning>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Computes the operations that bring `snapshot` up to `descriptor`.
///
/// The descriptor is validated first, so dependency-order and naming errors
/// surface before anything is executed.
pub fn build(descriptor: &SchemaDescriptor, snapshot: &LiveSchemaSnapshot) -> Result<ReconciliationPlan> {
    descriptor.validate()?;

    let mut plan = ReconciliationPlan::default();
    for table in &descriptor.tables {
        match snapshot.table(&table.name) {
            None => plan.operations.push(Operation::CreateTable {
                table: table.clone(),
            }),
            Some(live) => diff_table(table, live, snapshot, &mut plan),
        }
    }
    Ok(plan)
}

fn diff_table(
    table: &TableSpec,
    live: &LiveTable,
    snapshot: &LiveSchemaSnapshot,
    plan: &mut ReconciliationPlan,
) {
    let mut add_columns = Vec::new();
    let mut backfills = Vec::new();
    let mut set_defaults = Vec::new();
    let mut drop_not_null = Vec::new();
    let mut tighten = Vec::new();
    let name = || table.name.clone();

    for column in &table.columns {
        // Only sources that exist right now have anything to copy.
        let backfill = column.backfill.as_ref().filter(|source| match source.column() {
            Some(source_column) => live.has_column(source_column),
            None => true,
        });

        let newly_added = live.column(&column.name).is_none();
        match live.column(&column.name) {
            None => {
                let mut added = column.clone();
                added.unique = false;
                added.backfill = None;
                if backfill.is_some() {
                    // Legacy values must win over the default, which SQLite
                    // would otherwise write into every existing row.
                    added.default = None;
                    if let Some(default) = &column.default {
                        set_defaults.push(Operation::SetDefault {
                            table: name(),
                            column: column.name.clone(),
                            default: default.clone(),
                        });
                    }
                }
                if !column.nullable && added.default.is_none() && !column.primary_key {
                    added.nullable = true;
                    tighten.push(Operation::TightenNotNull {
                        table: name(),
                        column: column.name.clone(),
                    });
                }
                add_columns.push(Operation::AddColumn {
                    table: name(),
                    column: added,
                });
            }
            Some(live_column) => {
                if !live_column.declared_type.is_empty()
                    && affinity(&live_column.declared_type) != affinity(column.column_type.sql())
                {
                    plan.warnings.push(Warning::TypeDrift {
                        table: name(),
                        column: column.name.clone(),
                        live_type: live_column.declared_type.clone(),
                        declared_type: column.column_type.sql().to_string(),
                    });
                }
                if let Some(default) = &column.default {
                    if live_column.default.is_none() {
                        set_defaults.push(Operation::SetDefault {
                            table: name(),
                            column: column.name.clone(),
                            default: default.clone(),
                        });
                    }
                }
                if !live_column.primary_key && !column.primary_key {
                    if column.nullable && live_column.not_null {
                        drop_not_null.push(Operation::DropNotNull {
                            table: name(),
                            column: column.name.clone(),
                        });
                    } else if !column.nullable && !live_column.not_null {
                        tighten.push(Operation::TightenNotNull {
                            table: name(),
                            column: column.name.clone(),
                        });
                    }
                }
            }
        }

        if let Some(source) = backfill {
            // Rows the source cannot fill take the default, as they would
            // have from a plain ADD COLUMN. Existing nullable columns keep
            // their NULLs.
            let fallback = column
                .default
                .clone()
                .filter(|_| newly_added || !column.nullable);
            backfills.push(Operation::BackfillColumn {
                table: name(),
                column: column.name.clone(),
                source: source.clone(),
                fallback,
            });
        }
    }

    let constraints = table
        .effective_constraints()
        .into_iter()
        .filter(|c| !live.satisfies(c, |t| snapshot.primary_key_of(t)))
        .map(|constraint| Operation::AddConstraint {
            table: name(),
            constraint,
        });

    plan.operations.extend(add_columns);
    plan.operations.extend(backfills);
    plan.operations.extend(set_defaults);
    plan.operations.extend(drop_not_null);
    plan.operations.extend(tighten);
    plan.operations.extend(constraints);
}
