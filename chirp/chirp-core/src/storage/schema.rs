//! Schema - DDL script parsing and validation
//!
//! TigerStyle: The script is the single source of truth for both backends.
//! The SQLite backend executes it; the memory backend only needs to know that
//! the two relations exist with the columns the engine reads.
//!
//! # Supported statements
//!
//! ```text
//! CREATE [TEMP] TABLE [IF NOT EXISTS] name (col type [constraints], ...)
//! CREATE [UNIQUE] INDEX [IF NOT EXISTS] name ON table (col [ASC|DESC], ...)
//! PRAGMA ...
//! ```
//!
//! Statements are separated by `;`. `--` comments run to end of line.

use crate::constants::{
    FOLLOWS_COLUMNS, FOLLOWS_TABLE, POSTS_COLUMNS, POSTS_TABLE, SCHEMA_STATEMENTS_COUNT_MAX,
};

use super::error::SchemaError;

/// Schema script shipped with the crate.
pub const DEFAULT_SCHEMA: &str = include_str!("../../schema/timeline.sql");

// =============================================================================
// Definitions
// =============================================================================

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Lowercased column name
    pub name: String,
    /// Declared type, uppercased; empty when omitted
    pub type_name: String,
}

/// A declared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Lowercased table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Check whether the table declares a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// One key part of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// Lowercased column name
    pub name: String,
    /// `DESC` ordering
    pub descending: bool,
}

/// A declared secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Lowercased index name
    pub name: String,
    /// Indexed table
    pub table: String,
    /// Key parts in order
    pub columns: Vec<IndexColumn>,
    /// `CREATE UNIQUE INDEX`
    pub unique: bool,
}

// =============================================================================
// Schema
// =============================================================================

/// A parsed schema script.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    statements: Vec<String>,
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
}

impl Schema {
    /// Parse and validate a schema script.
    ///
    /// # Errors
    /// Returns `SchemaError` if a statement is malformed or unsupported, or if the
    /// script does not define the posts and follows relations.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let statements = split_statements(source);
        if statements.is_empty() {
            return Err(SchemaError::Empty);
        }
        if statements.len() > SCHEMA_STATEMENTS_COUNT_MAX {
            return Err(SchemaError::parse(
                SCHEMA_STATEMENTS_COUNT_MAX + 1,
                format!("script exceeds {SCHEMA_STATEMENTS_COUNT_MAX} statements"),
            ));
        }

        let mut schema = Self::default();
        for (i, statement) in statements.iter().enumerate() {
            schema.apply_statement(i + 1, statement)?;
        }
        schema.statements = statements;
        schema.validate()?;

        // Postcondition
        assert!(
            schema.table(POSTS_TABLE).is_some() && schema.table(FOLLOWS_TABLE).is_some(),
            "validated schema must define both relations"
        );

        Ok(schema)
    }

    /// Statements in script order, comments stripped.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Look up a table by name (case-insensitive).
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        let name = name.to_ascii_lowercase();
        self.tables.iter().find(|t| t.name == name)
    }

    /// All declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Check whether some index on `table` leads with `column`.
    #[must_use]
    pub fn has_index_leading_with(&self, table: &str, column: &str) -> bool {
        self.indexes.iter().any(|idx| {
            idx.table == table && idx.columns.first().is_some_and(|c| c.name == column)
        })
    }

    fn apply_statement(&mut self, index: usize, statement: &str) -> Result<(), SchemaError> {
        let upper = statement.to_ascii_uppercase();
        let mut words = upper.split_whitespace();

        match words.next() {
            Some("PRAGMA") => Ok(()),
            Some("CREATE") => {
                let kind = words
                    .find(|w| !matches!(*w, "TEMP" | "TEMPORARY" | "UNIQUE"))
                    .map(|w| w.split('(').next().unwrap_or(w));
                match kind {
                    Some("TABLE") => self.add_table(index, statement),
                    Some("INDEX") => self.add_index(index, statement),
                    Some(other) => Err(SchemaError::parse(
                        index,
                        format!("unsupported CREATE {other}"),
                    )),
                    None => Err(SchemaError::parse(index, "incomplete CREATE statement")),
                }
            }
            Some(other) => Err(SchemaError::parse(
                index,
                format!("unsupported statement `{other}`"),
            )),
            None => Err(SchemaError::parse(index, "empty statement")),
        }
    }

    fn add_table(&mut self, index: usize, statement: &str) -> Result<(), SchemaError> {
        let (head, body) = split_body(index, statement)?;
        let head_words: Vec<&str> = head.split_whitespace().collect();
        let if_not_exists = contains_if_not_exists(&head_words);
        let name = head_words
            .last()
            .map(|w| identifier(w))
            .filter(|n| !n.is_empty() && n != "table" && n != "exists")
            .ok_or_else(|| SchemaError::parse(index, "CREATE TABLE without a name"))?;

        let mut columns = Vec::new();
        for item in split_top_level(body) {
            let mut parts = item.split_whitespace();
            let Some(first) = parts.next() else {
                return Err(SchemaError::parse(index, "empty column definition"));
            };
            if is_table_constraint(first) {
                continue;
            }
            let column = ColumnDef {
                name: identifier(first),
                type_name: parts
                    .next()
                    .map(|t| t.split('(').next().unwrap_or(t).to_ascii_uppercase())
                    .unwrap_or_default(),
            };
            if columns.iter().any(|c: &ColumnDef| c.name == column.name) {
                return Err(SchemaError::parse(
                    index,
                    format!("duplicate column `{}` in table `{name}`", column.name),
                ));
            }
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(SchemaError::parse(
                index,
                format!("table `{name}` declares no columns"),
            ));
        }

        if self.table(&name).is_some() {
            if if_not_exists {
                tracing::debug!(table = %name, "table already defined, skipping");
                return Ok(());
            }
            return Err(SchemaError::parse(
                index,
                format!("table `{name}` already defined"),
            ));
        }

        self.tables.push(TableDef { name, columns });
        Ok(())
    }

    fn add_index(&mut self, index: usize, statement: &str) -> Result<(), SchemaError> {
        let (head, body) = split_body(index, statement)?;
        let head_words: Vec<&str> = head.split_whitespace().collect();
        let unique = head_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case("UNIQUE"));

        let on_pos = head_words
            .iter()
            .position(|w| w.eq_ignore_ascii_case("ON"))
            .ok_or_else(|| SchemaError::parse(index, "CREATE INDEX without ON clause"))?;
        if on_pos < 3 || on_pos + 1 >= head_words.len() {
            return Err(SchemaError::parse(index, "malformed CREATE INDEX header"));
        }
        let name = identifier(head_words[on_pos - 1]);
        let table = identifier(head_words[on_pos + 1]);

        let mut columns = Vec::new();
        for item in split_top_level(body) {
            let mut parts = item.split_whitespace();
            let Some(first) = parts.next() else {
                return Err(SchemaError::parse(index, "empty index column"));
            };
            let descending = parts.any(|p| p.eq_ignore_ascii_case("DESC"));
            columns.push(IndexColumn {
                name: identifier(first),
                descending,
            });
        }
        if columns.is_empty() {
            return Err(SchemaError::parse(
                index,
                format!("index `{name}` has no key columns"),
            ));
        }

        // The indexed table must already be declared, as when the script is applied.
        let def = self
            .table(&table)
            .ok_or_else(|| SchemaError::MissingTable(table.clone()))?;
        if let Some(missing) = columns.iter().find(|c| !def.has_column(&c.name)) {
            return Err(SchemaError::MissingColumn {
                table,
                column: missing.name.clone(),
            });
        }

        if self.indexes.iter().any(|i| i.name == name) {
            if contains_if_not_exists(&head_words) {
                return Ok(());
            }
            return Err(SchemaError::parse(
                index,
                format!("index `{name}` already defined"),
            ));
        }

        self.indexes.push(IndexDef {
            name,
            table,
            columns,
            unique,
        });
        Ok(())
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for (table, required) in [(POSTS_TABLE, POSTS_COLUMNS), (FOLLOWS_TABLE, FOLLOWS_COLUMNS)] {
            let def = self
                .table(table)
                .ok_or_else(|| SchemaError::MissingTable(table.to_string()))?;
            for column in required {
                if !def.has_column(column) {
                    return Err(SchemaError::MissingColumn {
                        table: table.to_string(),
                        column: (*column).to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Lexing helpers
// =============================================================================

/// Strip `--` comments and split on `;`, leaving `'...'` literals intact.
///
/// Whitespace runs outside literals collapse to one space.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_literal = false;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_literal {
            current.push(ch);
            if ch == '\'' {
                in_literal = false;
            }
            continue;
        }
        match ch {
            '\'' => {
                in_literal = true;
                current.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                push_space(&mut current);
            }
            ';' => {
                push_statement(&mut statements, &mut current);
            }
            c if c.is_whitespace() => push_space(&mut current),
            c => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_space(current: &mut String) {
    if !current.is_empty() && !current.ends_with(' ') {
        current.push(' ');
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Split `head (body) tail` at the outermost parentheses.
fn split_body(index: usize, statement: &str) -> Result<(&str, &str), SchemaError> {
    let open = statement
        .find('(')
        .ok_or_else(|| SchemaError::parse(index, "missing `(`"))?;

    let mut depth = 0usize;
    let mut in_literal = false;
    for (offset, ch) in statement[open..].char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            _ if in_literal => {}
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + offset;
                    return Ok((&statement[..open], &statement[open + 1..close]));
                }
            }
            _ => {}
        }
    }
    Err(SchemaError::parse(index, "unbalanced parentheses"))
}

/// Split a parenthesized body on commas that are not nested.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_literal = false;
    for (i, ch) in body.char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            _ if in_literal => {}
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(body[start..].trim());
    items
}

fn contains_if_not_exists(words: &[&str]) -> bool {
    words.windows(3).any(|w| {
        w[0].eq_ignore_ascii_case("IF")
            && w[1].eq_ignore_ascii_case("NOT")
            && w[2].eq_ignore_ascii_case("EXISTS")
    })
}

fn is_table_constraint(word: &str) -> bool {
    ["PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "CONSTRAINT"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Unquote and lowercase an identifier, dropping any `schema.` prefix.
fn identifier(raw: &str) -> String {
    let unqualified = raw.rsplit('.').next().unwrap_or(raw);
    unqualified
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_ascii_lowercase()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_parses() {
        let schema = Schema::parse(DEFAULT_SCHEMA).unwrap();

        assert_eq!(schema.statements().len(), 4);
        assert!(schema.table("posts").unwrap().has_column("seq"));
        assert!(schema.table("FOLLOWS").unwrap().has_column("followee_id"));
        assert!(schema.has_index_leading_with("follows", "follower_id"));
        assert!(schema.has_index_leading_with("posts", "author_id"));

        let posts_idx = schema
            .indexes()
            .iter()
            .find(|i| i.name == "idx_posts_author_seq")
            .unwrap();
        assert!(posts_idx.columns[1].descending);
    }

    #[test]
    fn test_empty_script() {
        assert_eq!(Schema::parse("  -- nothing here\n ;; ").unwrap_err(), SchemaError::Empty);
    }

    #[test]
    fn test_missing_table() {
        let err = Schema::parse("CREATE TABLE posts (seq INTEGER, author_id INTEGER, text TEXT);")
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingTable("follows".to_string()));
    }

    #[test]
    fn test_missing_column() {
        let err = Schema::parse(
            "CREATE TABLE posts (seq INTEGER, author_id INTEGER);
             CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                table: "posts".to_string(),
                column: "text".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_statement() {
        let err = Schema::parse("DROP TABLE posts;").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { statement: 1, .. }));
    }

    #[test]
    fn test_index_on_unknown_column() {
        let err = Schema::parse(
            "CREATE TABLE posts (seq INTEGER, author_id INTEGER, text TEXT);
             CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);
             CREATE INDEX idx ON posts (created_at);",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { .. }));
    }

    #[test]
    fn test_index_must_follow_its_table() {
        let err = Schema::parse(
            "CREATE INDEX idx_early ON posts (author_id);
             CREATE TABLE posts (seq INTEGER, author_id INTEGER, text TEXT);
             CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);",
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::MissingTable("posts".to_string()));
    }

    #[test]
    fn test_delimiters_inside_literals() {
        let schema = Schema::parse(
            "CREATE TABLE posts (
                seq INTEGER,
                author_id INTEGER,
                text TEXT DEFAULT '-- not a comment; nor a split, (really)' -- real comment
            );
            CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);",
        )
        .unwrap();

        assert_eq!(schema.statements().len(), 2);
        assert!(schema.statements()[0].contains("'-- not a comment; nor a split, (really)'"));
        assert!(!schema.statements()[0].contains("real comment"));
        assert_eq!(schema.table("posts").unwrap().columns.len(), 3);
    }

    #[test]
    fn test_quoted_identifiers_constraints_and_pragma() {
        let schema = Schema::parse(
            r#"PRAGMA journal_mode = MEMORY;
            CREATE TABLE "Posts" (
                seq INTEGER,
                author_id INTEGER NOT NULL,
                text VARCHAR(280) NOT NULL DEFAULT (''),
                PRIMARY KEY (seq)
            );
            CREATE TEMP TABLE `follows` (follower_id INTEGER, followee_id INTEGER);"#,
        )
        .unwrap();

        let posts = schema.table("posts").unwrap();
        assert_eq!(posts.columns.len(), 3);
        assert_eq!(posts.columns[2].type_name, "VARCHAR");
        assert!(schema.indexes().is_empty());
    }

    #[test]
    fn test_duplicate_table_without_if_not_exists() {
        let err = Schema::parse(
            "CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);
             CREATE TABLE follows (follower_id INTEGER, followee_id INTEGER);",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Parse { statement: 2, .. }));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = Schema::parse("CREATE TABLE posts (seq INTEGER;").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { statement: 1, .. }));
    }
}
