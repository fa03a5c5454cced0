//! Declarative description of the schema a database should converge to.
//!
//! A [`SchemaDescriptor`] is configuration: it is built in code (see
//! [`crate::store::schema::business_schema`]) or loaded from TOML, and is
//! never persisted. Tables must be listed in dependency order.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Declared type written into DDL.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Date => "DATE",
            Self::Timestamp => "DATETIME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Text(String),
    Integer(i64),
    Real(f64),
    CurrentTimestamp,
    CurrentDate,
    /// Raw SQL expression, rendered inside parentheses.
    Expression(String),
}

impl DefaultValue {
    /// Literal defaults can be added with `ALTER TABLE ... ADD COLUMN`;
    /// anything evaluated per row cannot.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Integer(_) | Self::Real(_))
    }

    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Text(s) => super::ddl::quote_literal(s),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => {
                let rendered = r.to_string();
                if rendered.contains(['.', 'e', 'E']) || !r.is_finite() {
                    rendered
                } else {
                    format!("{rendered}.0")
                }
            }
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            Self::CurrentDate => "CURRENT_DATE".to_string(),
            Self::Expression(expr) => format!("({expr})"),
        }
    }
}

/// Where a newly introduced column takes its values from for existing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillSource {
    Column(String),
    Expression(String),
}

impl BackfillSource {
    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Column(name) => super::ddl::quote_ident(name),
            Self::Expression(expr) => format!("({expr})"),
        }
    }

    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            Self::Expression(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub autoincrement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill: Option<BackfillSource>,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            autoincrement: false,
            backfill: None,
        }
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`.
    pub fn id(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Integer);
        column.primary_key = true;
        column.autoincrement = true;
        column
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn default_text(self, value: impl Into<String>) -> Self {
        self.default(DefaultValue::Text(value.into()))
    }

    #[must_use]
    pub fn backfill_from(mut self, column: impl Into<String>) -> Self {
        self.backfill = Some(BackfillSource::Column(column.into()));
        self
    }

    #[must_use]
    pub fn backfill_with(mut self, expression: impl Into<String>) -> Self {
        self.backfill = Some(BackfillSource::Expression(expression.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the action text reported by `pragma_foreign_key_list`.
    #[must_use]
    pub fn from_catalog(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintSpec {
    ForeignKey {
        column: String,
        ref_table: String,
        ref_column: String,
        #[serde(default)]
        on_delete: FkAction,
    },
    Check {
        expression: String,
    },
    Unique {
        columns: Vec<String>,
    },
}

impl ConstraintSpec {
    pub fn foreign_key(
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
        on_delete: FkAction,
    ) -> Self {
        Self::ForeignKey {
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
            on_delete,
        }
    }

    pub fn check(expression: impl Into<String>) -> Self {
        Self::Check {
            expression: expression.into(),
        }
    }

    pub fn unique<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Unique {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Columns of the owning table this constraint depends on.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::ForeignKey { column, .. } => vec![column.as_str()],
            Self::Check { .. } => Vec::new(),
            Self::Unique { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Table-constraint clause as it appears inside `CREATE TABLE (...)`.
    #[must_use]
    pub fn sql(&self) -> String {
        use super::ddl::quote_ident;
        match self {
            Self::ForeignKey {
                column,
                ref_table,
                ref_column,
                on_delete,
            } => {
                let mut clause = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    quote_ident(column),
                    quote_ident(ref_table),
                    quote_ident(ref_column)
                );
                if *on_delete != FkAction::NoAction {
                    clause.push_str(" ON DELETE ");
                    clause.push_str(on_delete.sql());
                }
                clause
            }
            Self::Check { expression } => format!("CHECK ({expression})"),
            Self::Unique { columns } => format!(
                "UNIQUE ({})",
                columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey {
                column,
                ref_table,
                ref_column,
                on_delete,
            } => write!(
                f,
                "foreign key {column} -> {ref_table}({ref_column}) on delete {}",
                on_delete.sql().to_ascii_lowercase()
            ),
            Self::Check { expression } => write!(f, "check ({expression})"),
            Self::Unique { columns } => write!(f, "unique ({})", columns.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    /// Failures on core tables prevent the service from becoming ready.
    #[serde(default = "default_true")]
    pub core: bool,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            core: true,
        }
    }

    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintSpec) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.core = false;
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnSpec> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Declared constraints plus single-column UNIQUE flags, which the
    /// catalog reports the same way.
    pub fn effective_constraints(&self) -> Vec<ConstraintSpec> {
        let mut constraints: Vec<ConstraintSpec> = self
            .columns
            .iter()
            .filter(|c| c.unique && !c.primary_key)
            .map(|c| ConstraintSpec::unique([c.name.clone()]))
            .collect();
        for constraint in &self.constraints {
            if !constraints.contains(constraint) {
                constraints.push(constraint.clone());
            }
        }
        constraints
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub tables: Vec<TableSpec>,
}

impl SchemaDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn table(mut self, table: TableSpec) -> Self {
        self.tables.push(table);
        self
    }

    pub fn find_table(&self, name: &str) -> Option<&TableSpec> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Reads and validates a TOML descriptor file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let descriptor: Self =
            toml::from_str(source).map_err(|e| Error::InvalidDescriptor(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Rejects descriptors the planner cannot act on. Runs before anything
    /// touches the database, so a bad descriptor is never partially applied.
    pub fn validate(&self) -> Result<()> {
        let mut seen_tables: HashSet<String> = HashSet::new();

        for (index, table) in self.tables.iter().enumerate() {
            let table_key = table.name.to_ascii_lowercase();
            if table.name.trim().is_empty() {
                return Err(invalid("table name cannot be empty"));
            }
            if !seen_tables.insert(table_key) {
                return Err(invalid(format!("table '{}' declared twice", table.name)));
            }
            if table.columns.is_empty() {
                return Err(invalid(format!("table '{}' has no columns", table.name)));
            }

            let mut seen_columns: HashSet<String> = HashSet::new();
            for column in &table.columns {
                if !seen_columns.insert(column.name.to_ascii_lowercase()) {
                    return Err(invalid(format!(
                        "column '{}.{}' declared twice",
                        table.name, column.name
                    )));
                }
                if let Some(source) = column.backfill.as_ref().and_then(BackfillSource::column) {
                    if source.eq_ignore_ascii_case(&column.name) {
                        return Err(invalid(format!(
                            "column '{}.{}' cannot backfill from itself",
                            table.name, column.name
                        )));
                    }
                }
            }

            let keys = table.primary_key_columns();
            for column in &table.columns {
                if column.autoincrement
                    && (column.column_type != ColumnType::Integer
                        || !column.primary_key
                        || keys.len() != 1)
                {
                    return Err(invalid(format!(
                        "autoincrement on '{}.{}' requires a sole INTEGER primary key",
                        table.name, column.name
                    )));
                }
            }

            for constraint in &table.effective_constraints() {
                for column in constraint.columns() {
                    if table.find_column(column).is_none() {
                        return Err(invalid(format!(
                            "constraint '{constraint}' on '{}' names unknown column '{column}'",
                            table.name
                        )));
                    }
                }
                if let ConstraintSpec::Unique { columns } = constraint {
                    if columns.is_empty() {
                        return Err(invalid(format!(
                            "unique constraint on '{}' has no columns",
                            table.name
                        )));
                    }
                }
                if let ConstraintSpec::ForeignKey {
                    ref_table,
                    ref_column,
                    ..
                } = constraint
                {
                    let target = if ref_table.eq_ignore_ascii_case(&table.name) {
                        Some(table)
                    } else {
                        self.tables[..index]
                            .iter()
                            .find(|t| t.name.eq_ignore_ascii_case(ref_table))
                    };
                    let Some(target) = target else {
                        return Err(Error::DependencyOrder {
                            table: table.name.clone(),
                            references: ref_table.clone(),
                        });
                    };
                    if target.find_column(ref_column).is_none() {
                        return Err(invalid(format!(
                            "foreign key on '{}' references unknown column '{}.{}'",
                            table.name, ref_table, ref_column
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidDescriptor(message.into())
}
