//! Multi-row INSERT and upsert suffixes.

use super::{Assembler, Built, push_value};
use crate::dialect::{Dialect, UpsertSyntax};
use crate::error::{OrmError, OrmResult};
use crate::query::{UpsertAction, UpsertClause};
use crate::value::Value;

/// Input for [`Assembler::build_insert`].
///
/// Every row must carry one value per column, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub upsert: Option<UpsertClause>,
    /// Used as the conflict target when the upsert names none.
    pub primary_keys: Vec<String>,
    pub returning: Vec<String>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn upsert(mut self, upsert: Option<UpsertClause>) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn primary_keys<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.primary_keys = keys.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }
}

impl Assembler {
    /// Build a single- or multi-row INSERT, with the upsert suffix when requested.
    ///
    /// MySQL spells "do nothing on conflict" as `INSERT IGNORE`.
    pub fn build_insert(&self, stmt: &InsertStatement) -> OrmResult<Built> {
        if stmt.table.is_empty() {
            return Err(OrmError::statement("INSERT requires a table name"));
        }
        if stmt.rows.is_empty() {
            return Err(OrmError::statement(format!(
                "INSERT into '{}' has no rows",
                stmt.table
            )));
        }
        if let Some(pos) = stmt.rows.iter().position(|r| r.len() != stmt.columns.len()) {
            return Err(OrmError::statement(format!(
                "INSERT into '{}': row {pos} has {} value(s) for {} column(s)",
                stmt.table,
                stmt.rows[pos].len(),
                stmt.columns.len()
            )));
        }
        if !stmt.returning.is_empty() && !self.dialect.supports_returning() {
            return Err(OrmError::unsupported(format!(
                "{} does not support INSERT ... RETURNING",
                self.dialect
            )));
        }

        let ignore = self.dialect == Dialect::MySql
            && stmt.upsert.as_ref().is_some_and(UpsertClause::is_do_nothing);

        let mut sql = String::with_capacity(64 + stmt.rows.len() * stmt.columns.len() * 3);
        let mut args = Vec::with_capacity(stmt.rows.len() * stmt.columns.len());
        sql.push_str(if ignore { "INSERT IGNORE INTO " } else { "INSERT INTO " });
        self.dialect.write_ident(&mut sql, &stmt.table);

        if stmt.columns.is_empty() {
            self.write_default_rows(&mut sql, stmt)?;
        } else {
            sql.push_str(" (");
            sql.push_str(&self.dialect.quote_list(&stmt.columns));
            sql.push_str(") VALUES ");
            for (i, row) in stmt.rows.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('(');
                for (j, value) in row.iter().enumerate() {
                    if j > 0 {
                        sql.push_str(", ");
                    }
                    push_value(&mut sql, &mut args, value);
                }
                sql.push(')');
            }
        }

        if let Some(upsert) = &stmt.upsert {
            let suffix = self.build_insert_suffix(upsert, &stmt.columns, &stmt.primary_keys)?;
            if !suffix.is_empty() {
                sql.push(' ');
                sql.push_str(&suffix);
            }
        }

        if !stmt.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.dialect.quote_list(&stmt.returning));
        }

        Ok(Built::new(sql, args))
    }

    /// Rows where every column takes its default.
    fn write_default_rows(&self, sql: &mut String, stmt: &InsertStatement) -> OrmResult<()> {
        let count = stmt.rows.len();
        match self.dialect {
            Dialect::MySql => {
                sql.push_str(" () VALUES ");
                sql.push_str(&vec!["()"; count].join(", "));
            }
            Dialect::Postgres | Dialect::Sqlite if count == 1 => {
                sql.push_str(" DEFAULT VALUES");
            }
            Dialect::Postgres | Dialect::Sqlite => {
                let Some(key) = stmt.primary_keys.first() else {
                    return Err(OrmError::statement(format!(
                        "multi-row INSERT into '{}' without columns needs a primary key",
                        stmt.table
                    )));
                };
                // SQLite has no DEFAULT keyword in VALUES; NULL picks the rowid.
                let filler = if self.dialect == Dialect::Postgres {
                    "(DEFAULT)"
                } else {
                    "(NULL)"
                };
                sql.push_str(" (");
                self.dialect.write_ident(sql, key);
                sql.push_str(") VALUES ");
                sql.push_str(&vec![filler; count].join(", "));
            }
        }
        Ok(())
    }

    /// Render the dialect's upsert suffix for an INSERT of `inserted_columns`.
    ///
    /// Conflict targets default to `primary_keys`; target and key columns are
    /// never part of the SET list. Returns an empty string when the dialect
    /// expresses the clause through the INSERT verb (`INSERT IGNORE`).
    pub fn build_insert_suffix<S: AsRef<str>>(
        &self,
        upsert: &UpsertClause,
        inserted_columns: &[S],
        primary_keys: &[S],
    ) -> OrmResult<String> {
        let explicit: Vec<&str> = upsert.conflict_targets.iter().map(String::as_str).collect();
        let pks: Vec<&str> = primary_keys.iter().map(AsRef::as_ref).collect();
        let targets = if explicit.is_empty() { pks.clone() } else { explicit.clone() };

        if upsert.is_do_nothing() {
            return Ok(match self.dialect.upsert_syntax() {
                UpsertSyntax::OnDuplicateKey => String::new(),
                UpsertSyntax::OnConflict if explicit.is_empty() => {
                    "ON CONFLICT DO NOTHING".to_string()
                }
                UpsertSyntax::OnConflict => format!(
                    "ON CONFLICT ({}) DO NOTHING",
                    self.dialect.quote_list(&explicit)
                ),
            });
        }

        let candidates: Vec<&str> = match &upsert.action {
            UpsertAction::UpdateSpecific(cols) => cols.iter().map(String::as_str).collect(),
            _ => inserted_columns.iter().map(AsRef::as_ref).collect(),
        };
        let set_columns: Vec<&str> = candidates
            .into_iter()
            .filter(|c| !targets.contains(c) && !pks.contains(c))
            .collect();
        if set_columns.is_empty() {
            return Err(OrmError::invalid_config(
                "upsert update has no columns left to SET after excluding conflict keys",
            ));
        }

        let mut sql = String::new();
        match self.dialect.upsert_syntax() {
            UpsertSyntax::OnDuplicateKey => {
                sql.push_str("ON DUPLICATE KEY UPDATE ");
                for (i, col) in set_columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    let col = self.quote(col);
                    sql.push_str(&format!("{col} = VALUES({col})"));
                }
            }
            UpsertSyntax::OnConflict => {
                if targets.is_empty() {
                    return Err(OrmError::invalid_config(format!(
                        "{} upsert update needs a conflict target or a primary key",
                        self.dialect
                    )));
                }
                sql.push_str("ON CONFLICT (");
                sql.push_str(&self.dialect.quote_list(&targets));
                sql.push_str(") DO UPDATE SET ");
                for (i, col) in set_columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    let col = self.quote(col);
                    sql.push_str(&format!("{col} = excluded.{col}"));
                }
            }
        }
        Ok(sql)
    }
}
