//! SQL text for the reconciler: identifier/literal quoting, DDL rendering,
//! and a small lexer for editing the `CREATE TABLE` text SQLite stores in
//! `sqlite_master`.

use super::descriptor::{ColumnSpec, TableSpec};
use crate::error::{Error, Result};

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
/// `inline_key` is false when the key is declared as a table constraint.
pub fn column_definition(column: &ColumnSpec, inline_key: bool) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.column_type.sql());
    if column.primary_key && inline_key {
        def.push_str(" PRIMARY KEY");
        if column.autoincrement {
            def.push_str(" AUTOINCREMENT");
        }
    }
    if !column.nullable && !(column.primary_key && inline_key) {
        def.push_str(" NOT NULL");
    }
    if column.unique && !column.primary_key {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default.sql());
    }
    def
}

pub fn create_table_sql(table: &TableSpec) -> String {
    let keys = table.primary_key_columns();
    let inline_key = keys.len() == 1;

    let mut items: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_definition(c, inline_key))
        .collect();
    if keys.len() > 1 {
        items.push(format!(
            "PRIMARY KEY ({})",
            keys.iter()
                .map(|c| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    items.extend(table.constraints.iter().map(|c| c.sql()));

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(&table.name),
        items.join(",\n    ")
    )
}

/// SQLite type affinity of a declared column type (datatype3.html §3.1).
pub fn affinity(declared: &str) -> &'static str {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        "INTEGER"
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        "TEXT"
    } else if upper.is_empty() || upper.contains("BLOB") {
        "BLOB"
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        "REAL"
    } else {
        "NUMERIC"
    }
}

/// Canonical form for comparing CHECK expressions: whitespace dropped and
/// ASCII lowercased, except inside string literals.
pub fn normalize_expression(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == '\'' {
                        if chars.peek() == Some(&'\'') {
                            out.push('\'');
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    strip_outer_parens(&out).to_string()
}

fn strip_outer_parens(mut s: &str) -> &str {
    while s.starts_with('(') && s.ends_with(')') && encloses_all(s) {
        s = &s[1..s.len() - 1];
    }
    s
}

/// True when the opening paren at index 0 closes at the last byte.
fn encloses_all(s: &str) -> bool {
    let Ok(tokens) = tokenize(s) else {
        return false;
    };
    tokens
        .iter()
        .find(|t| t.kind == TokenKind::Close && t.depth == 0)
        .is_some_and(|t| t.end == s.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Quoted,
    Open,
    Close,
    Comma,
    Other,
}

/// `depth` is the parenthesis depth the token sits at; both parens of a
/// pair carry the depth outside them.
#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
    depth: usize,
}

impl Token {
    fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    fn is_word(&self, src: &str, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text(src).eq_ignore_ascii_case(word)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b if b.is_ascii_whitespace() => i += 1,
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'\'' | b'"' | b'`' | b'[' => {
                let close = if b == b'[' { b']' } else { b };
                let start = i;
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(Error::Unsupported("unterminated quote in DDL".into())),
                        Some(&c) if c == close => {
                            if close != b']' && bytes.get(i + 1) == Some(&close) {
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(_) => i += 1,
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted,
                    start,
                    end: i,
                    depth,
                });
            }
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::Open,
                    start: i,
                    end: i + 1,
                    depth,
                });
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::Unsupported("unbalanced ')' in DDL".into()))?;
                tokens.push(Token {
                    kind: TokenKind::Close,
                    start: i,
                    end: i + 1,
                    depth,
                });
                i += 1;
            }
            b',' => {
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    start: i,
                    end: i + 1,
                    depth,
                });
                i += 1;
            }
            b if is_word_byte(b) => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Word,
                    start,
                    end: i,
                    depth,
                });
            }
            _ => {
                tokens.push(Token {
                    kind: TokenKind::Other,
                    start: i,
                    end: i + 1,
                    depth,
                });
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn unquote(token: &str) -> String {
    let bytes = token.as_bytes();
    match bytes.first() {
        Some(b'"') | Some(b'\'') | Some(b'`') => {
            let q = &token[..1];
            token[1..token.len() - 1].replace(&q.repeat(2), q)
        }
        Some(b'[') => token[1..token.len() - 1].to_string(),
        _ => token.to_string(),
    }
}

const TABLE_CONSTRAINT_KEYWORDS: [&str; 5] = ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

/// A stored `CREATE TABLE` statement split into its definition items so
/// individual column definitions can be edited and the table re-created
/// under another name.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    items: Vec<String>,
    tail: String,
}

impl TableDefinition {
    pub fn parse(sql: &str) -> Result<Self> {
        let tokens = tokenize(sql)?;
        let open = tokens
            .iter()
            .position(|t| t.kind == TokenKind::Open && t.depth == 0)
            .ok_or_else(|| Error::Unsupported("CREATE TABLE without column list".into()))?;
        let close = tokens[open..]
            .iter()
            .position(|t| t.kind == TokenKind::Close && t.depth == 0)
            .map(|p| p + open)
            .ok_or_else(|| Error::Unsupported("unterminated CREATE TABLE".into()))?;

        let mut items = Vec::new();
        let mut item_start = tokens[open].end;
        for token in &tokens[open + 1..close] {
            if token.kind == TokenKind::Comma && token.depth == 1 {
                items.push(sql[item_start..token.start].to_string());
                item_start = token.end;
            }
        }
        items.push(sql[item_start..tokens[close].start].to_string());

        Ok(Self {
            items,
            tail: sql[tokens[close].end..].to_string(),
        })
    }

    /// The statement re-targeted at `table_name`.
    pub fn render(&self, table_name: &str) -> String {
        format!(
            "CREATE TABLE {} ({}){}",
            quote_ident(table_name),
            self.items.join(","),
            self.tail
        )
    }

    pub fn without_rowid(&self) -> bool {
        let Ok(tokens) = tokenize(&self.tail) else {
            return false;
        };
        tokens
            .windows(2)
            .any(|w| w[0].is_word(&self.tail, "WITHOUT") && w[1].is_word(&self.tail, "ROWID"))
    }

    fn column_item(&self, column: &str) -> Option<usize> {
        self.items.iter().position(|item| {
            let Ok(tokens) = tokenize(item) else {
                return false;
            };
            let Some(first) = tokens.first() else {
                return false;
            };
            if first.kind == TokenKind::Word
                && TABLE_CONSTRAINT_KEYWORDS
                    .iter()
                    .any(|k| first.text(item).eq_ignore_ascii_case(k))
            {
                return false;
            }
            unquote(first.text(item)).eq_ignore_ascii_case(column)
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_item(column).is_some()
    }

    /// Removes every `[CONSTRAINT name] NOT NULL [ON CONFLICT x]` clause from
    /// a column definition. Returns false when nothing was removed.
    pub fn remove_not_null(&mut self, column: &str) -> Result<bool> {
        let index = self
            .column_item(column)
            .ok_or_else(|| Error::Unsupported(format!("column '{column}' not found in DDL")))?;
        let mut removed = false;
        loop {
            let item = &self.items[index];
            let tokens = tokenize(item)?;
            let hit = tokens.windows(2).position(|w| {
                w[0].depth == 0 && w[0].is_word(item, "NOT") && w[1].is_word(item, "NULL")
            });
            let Some(i) = hit else {
                break;
            };
            let mut start = tokens[i].start;
            if i >= 2 && tokens[i - 2].is_word(item, "CONSTRAINT") {
                start = tokens[i - 2].start;
            }
            let mut end = tokens[i + 1].end;
            if tokens.len() > i + 4
                && tokens[i + 2].is_word(item, "ON")
                && tokens[i + 3].is_word(item, "CONFLICT")
            {
                end = tokens[i + 4].end;
            }
            self.items[index].replace_range(start..end, "");
            removed = true;
        }
        Ok(removed)
    }

    /// Appends a column-constraint clause (`NOT NULL`, `DEFAULT x`) to a
    /// column definition, before any trailing comment.
    pub fn append_to_column(&mut self, column: &str, clause: &str) -> Result<()> {
        let index = self
            .column_item(column)
            .ok_or_else(|| Error::Unsupported(format!("column '{column}' not found in DDL")))?;
        let item = &self.items[index];
        let end = tokenize(item)?
            .last()
            .map(|t| t.end)
            .unwrap_or(item.len());
        self.items[index].insert_str(end, &format!(" {clause}"));
        Ok(())
    }

    /// Adds a column definition or table constraint. Column definitions go
    /// before the first table constraint, as the grammar requires.
    pub fn push_column(&mut self, definition: &str) -> Result<()> {
        let mut position = self.items.len();
        for (index, item) in self.items.iter().enumerate() {
            let tokens = tokenize(item)?;
            if let Some(first) = tokens.first() {
                if first.kind == TokenKind::Word
                    && TABLE_CONSTRAINT_KEYWORDS
                        .iter()
                        .any(|k| first.text(item).eq_ignore_ascii_case(k))
                {
                    position = index;
                    break;
                }
            }
        }
        self.items.insert(position, format!("\n    {definition}"));
        Ok(())
    }

    /// Removes the reference from `column` to `ref_table`, declared either
    /// as a `FOREIGN KEY` table constraint or inline after the column type.
    /// Returns false when there was none.
    pub fn remove_foreign_key(&mut self, column: &str, ref_table: &str) -> Result<bool> {
        let before = self.items.len();
        let mut kept = Vec::with_capacity(before);
        for item in self.items.drain(..) {
            let tokens = tokenize(&item)?;
            if !is_foreign_key_item(&item, &tokens, column, ref_table) {
                kept.push(item);
            }
        }
        self.items = kept;
        let mut removed = self.items.len() < before;

        if let Some(index) = self.column_item(column) {
            loop {
                let item = &self.items[index];
                let tokens = tokenize(item)?;
                let Some(range) = inline_reference(item, &tokens, ref_table) else {
                    break;
                };
                self.items[index].replace_range(range, "");
                removed = true;
            }
        }
        Ok(removed)
    }

    pub fn push_constraint(&mut self, clause: &str) {
        self.items.push(format!("\n    {clause}"));
    }

    /// Bodies of every `CHECK (...)` clause, column-level or table-level.
    pub fn check_expressions(&self) -> Vec<String> {
        let mut checks = Vec::new();
        for item in &self.items {
            let Ok(tokens) = tokenize(item) else {
                continue;
            };
            for (i, token) in tokens.iter().enumerate() {
                if !token.is_word(item, "CHECK") {
                    continue;
                }
                let Some(open) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Open) else {
                    continue;
                };
                if let Some(close) = tokens[i + 2..]
                    .iter()
                    .find(|t| t.kind == TokenKind::Close && t.depth == open.depth)
                {
                    checks.push(item[open.end..close.start].trim().to_string());
                }
            }
        }
        checks
    }
}

/// `[CONSTRAINT name] FOREIGN KEY (column) REFERENCES ref_table ...`
fn is_foreign_key_item(item: &str, tokens: &[Token], column: &str, ref_table: &str) -> bool {
    let word = |i: usize, w: &str| tokens.get(i).is_some_and(|t| t.is_word(item, w));
    let start = if word(0, "CONSTRAINT") { 2 } else { 0 };
    if !(word(start, "FOREIGN") && word(start + 1, "KEY")) {
        return false;
    }
    let Some(open) = tokens.get(start + 2).filter(|t| t.kind == TokenKind::Open) else {
        return false;
    };
    let Some(close) = tokens[start + 3..]
        .iter()
        .position(|t| t.kind == TokenKind::Close && t.depth == open.depth)
        .map(|p| p + start + 3)
    else {
        return false;
    };
    let columns: Vec<String> = tokens[start + 3..close]
        .iter()
        .filter(|t| t.kind != TokenKind::Comma)
        .map(|t| unquote(t.text(item)))
        .collect();
    matches!(columns.as_slice(), [only] if only.eq_ignore_ascii_case(column))
        && word(close + 1, "REFERENCES")
        && tokens
            .get(close + 2)
            .is_some_and(|t| unquote(t.text(item)).eq_ignore_ascii_case(ref_table))
}

/// Byte range of an inline `[CONSTRAINT name] REFERENCES ref_table [(col)]`
/// clause and its actions within a column definition.
fn inline_reference(item: &str, tokens: &[Token], ref_table: &str) -> Option<std::ops::Range<usize>> {
    let word = |i: usize, w: &str| tokens.get(i).is_some_and(|t| t.is_word(item, w));
    let at = tokens
        .iter()
        .position(|t| t.depth == 0 && t.is_word(item, "REFERENCES"))?;
    if !unquote(tokens.get(at + 1)?.text(item)).eq_ignore_ascii_case(ref_table) {
        return None;
    }
    let start = if at >= 2 && word(at - 2, "CONSTRAINT") {
        tokens[at - 2].start
    } else {
        tokens[at].start
    };

    let mut next = at + 2;
    if tokens.get(next).is_some_and(|t| t.kind == TokenKind::Open) {
        next = tokens[next + 1..]
            .iter()
            .position(|t| t.kind == TokenKind::Close && t.depth == 0)?
            + next
            + 2;
    }
    loop {
        if word(next, "ON") {
            next += if word(next + 2, "SET") || word(next + 2, "NO") { 4 } else { 3 };
        } else if word(next, "MATCH") || word(next, "INITIALLY") || (word(next, "NOT") && word(next + 1, "DEFERRABLE")) {
            next += 2;
        } else if word(next, "DEFERRABLE") {
            next += 1;
        } else {
            break;
        }
    }
    let end = tokens[next.min(tokens.len()) - 1].end;
    Some(start..end)
}
