//! Live schema as reported by SQLite's catalog.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, params};

use super::ddl::{TableDefinition, normalize_expression};
use super::descriptor::{ConstraintSpec, FkAction};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LiveColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone)]
pub struct LiveForeignKey {
    pub column: String,
    pub ref_table: String,
    /// `None` when the clause references the parent's primary key implicitly.
    pub ref_column: Option<String>,
    pub on_delete: FkAction,
}

#[derive(Debug, Clone)]
pub struct LiveTable {
    pub name: String,
    pub sql: String,
    pub columns: Vec<LiveColumn>,
    pub foreign_keys: Vec<LiveForeignKey>,
    /// Column sets of non-partial unique indexes, primary key included.
    pub unique_sets: Vec<Vec<String>>,
    /// Normalized CHECK expressions.
    pub checks: Vec<String>,
    pub without_rowid: bool,
}

impl LiveTable {
    /// Reads one table from the catalog; `None` when it does not exist.
    pub fn read(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT name, sql FROM sqlite_master
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((name, sql)) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![name], |row| {
                Ok(LiveColumn {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default: row.get(3)?,
                    primary_key: row.get::<_, i64>(4)? > 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Composite foreign keys share an id; only single-column keys are
        // expressible in a descriptor, so the rest are kept out of matching.
        let mut stmt = conn.prepare(
            "SELECT id, \"from\", \"table\", \"to\", on_delete FROM pragma_foreign_key_list(?1)
             ORDER BY id, seq",
        )?;
        let mut grouped: BTreeMap<i64, Vec<LiveForeignKey>> = BTreeMap::new();
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                LiveForeignKey {
                    column: row.get(1)?,
                    ref_table: row.get(2)?,
                    ref_column: row.get(3)?,
                    on_delete: FkAction::from_catalog(&row.get::<_, String>(4)?),
                },
            ))
        })?;
        for row in rows {
            let (id, fk) = row?;
            grouped.entry(id).or_default().push(fk);
        }
        let foreign_keys = grouped
            .into_values()
            .filter(|parts| parts.len() == 1)
            .flatten()
            .collect();

        let mut stmt = conn.prepare(
            "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND partial = 0",
        )?;
        let indexes = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut unique_sets = Vec::with_capacity(indexes.len() + 1);
        for index in indexes {
            let mut stmt =
                conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
            let cols = stmt
                .query_map(params![index], |row| row.get::<_, Option<String>>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            // Expression indexes report NULL column names.
            if cols.iter().all(Option::is_some) {
                unique_sets.push(cols.into_iter().flatten().collect());
            }
        }
        // INTEGER PRIMARY KEY aliases rowid and has no index of its own.
        let keys: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        if !keys.is_empty() {
            unique_sets.push(keys);
        }

        let definition = TableDefinition::parse(&sql)?;
        let checks = definition
            .check_expressions()
            .iter()
            .map(|c| normalize_expression(c))
            .collect();

        Ok(Some(Self {
            without_rowid: definition.without_rowid(),
            name,
            sql,
            columns,
            foreign_keys,
            unique_sets,
            checks,
        }))
    }

    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Whether an equivalent constraint is already in force, compared by
    /// meaning rather than by name. `resolve_pk` maps a referenced table to
    /// its primary key column for foreign keys declared without a column.
    pub fn satisfies<F>(&self, constraint: &ConstraintSpec, resolve_pk: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match constraint {
            ConstraintSpec::ForeignKey {
                column,
                ref_table,
                ref_column,
                on_delete,
            } => self.foreign_keys.iter().any(|fk| {
                let target = fk.ref_column.clone().or_else(|| resolve_pk(&fk.ref_table));
                fk.column.eq_ignore_ascii_case(column)
                    && fk.ref_table.eq_ignore_ascii_case(ref_table)
                    && target.is_some_and(|t| t.eq_ignore_ascii_case(ref_column))
                    && fk.on_delete == *on_delete
            }),
            ConstraintSpec::Check { expression } => {
                let wanted = normalize_expression(expression);
                self.checks.iter().any(|c| *c == wanted)
            }
            ConstraintSpec::Unique { columns } => {
                let mut wanted: Vec<String> =
                    columns.iter().map(|c| c.to_ascii_lowercase()).collect();
                wanted.sort();
                self.unique_sets.iter().any(|set| {
                    let mut live: Vec<String> = set.iter().map(|c| c.to_ascii_lowercase()).collect();
                    live.sort();
                    live == wanted
                })
            }
        }
    }
}

/// Every user table, read fresh. Never reused across runs.
#[derive(Debug, Clone, Default)]
pub struct LiveSchemaSnapshot {
    tables: BTreeMap<String, LiveTable>,
}

impl LiveSchemaSnapshot {
    pub fn read(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = BTreeMap::new();
        for name in names {
            if let Some(table) = LiveTable::read(conn, &name)? {
                tables.insert(name.to_ascii_lowercase(), table);
            }
        }
        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &LiveTable> {
        self.tables.values()
    }

    pub fn primary_key_of(&self, table: &str) -> Option<String> {
        self.table(table)
            .and_then(LiveTable::primary_key)
            .map(|c| c.name.clone())
    }
}
