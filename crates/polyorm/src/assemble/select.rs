//! SELECT and COUNT rendering.

use super::{Assembler, Built};
use crate::compose::{compose, render_condition};
use crate::error::{OrmError, OrmResult};
use crate::query::{Cte, QueryState, SelectField, Source};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Full statement with pagination.
    Full,
    /// Embedded in another statement: no LIMIT/OFFSET.
    Subquery,
    /// `SELECT COUNT(*)` with no ordering or pagination.
    Count,
}

impl Assembler {
    /// Build a SELECT statement.
    ///
    /// With `for_subquery`, LIMIT/OFFSET are omitted.
    pub fn build_select(&self, state: &QueryState, for_subquery: bool) -> OrmResult<Built> {
        let mode = if for_subquery { Mode::Subquery } else { Mode::Full };
        self.render_select(state, mode)
    }

    /// Build a `SELECT COUNT(*)` for the rows `state` would return.
    ///
    /// Grouped or DISTINCT queries are wrapped in a derived table.
    pub fn build_count(&self, state: &QueryState) -> OrmResult<Built> {
        if state.group_by.is_some() || state.distinct {
            let inner = self.render_select(state, Mode::Subquery)?;
            return Ok(Built::new(
                format!(
                    "SELECT COUNT(*) FROM ({}) AS {}",
                    inner.sql,
                    self.quote("count_subquery")
                ),
                inner.args,
            ));
        }
        self.render_select(state, Mode::Count)
    }

    fn render_select(&self, state: &QueryState, mode: Mode) -> OrmResult<Built> {
        Self::check_build_errors(state)?;
        if state.dialect != self.dialect {
            return Err(OrmError::statement(format!(
                "query was built for {} but is being assembled for {}",
                state.dialect, self.dialect
            )));
        }

        let mut sql = String::with_capacity(128);
        let mut args = Vec::new();

        // WITH
        self.write_ctes(&mut sql, &mut args, &state.ctes)?;

        // SELECT [DISTINCT] fields
        sql.push_str("SELECT ");
        if mode == Mode::Count {
            sql.push_str("COUNT(*)");
        } else {
            if state.distinct {
                sql.push_str("DISTINCT ");
            }
            self.write_fields(&mut sql, &mut args, state)?;
        }

        // FROM
        sql.push_str(" FROM ");
        self.write_source(&mut sql, &mut args, state)?;

        // JOINs
        for join in &state.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            self.dialect.write_ident(&mut sql, &join.table);
            if let Some(on) = &join.on {
                sql.push_str(" ON ");
                sql.push_str(&render_condition(on, &mut args)?);
            }
        }

        // WHERE
        let scope = self.soft_delete_scope(state);
        let composed = compose(state, scope.as_deref())?;
        sql.push_str(&composed.where_clause());
        args.extend(composed.args);

        // GROUP BY / HAVING
        if let Some(group) = &state.group_by {
            sql.push_str(" GROUP BY ");
            for (i, term) in split_top_level(group).into_iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                self.dialect.write_ident(&mut sql, term);
            }
        }
        if let Some(having) = &state.having {
            let having_sql = render_condition(having, &mut args)?;
            if !having_sql.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&having_sql);
            }
        }

        if mode == Mode::Count {
            return Ok(Built::new(sql, args));
        }

        // ORDER BY
        if !state.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&state.order_by.join(", "));
        }

        // LIMIT / OFFSET
        if mode == Mode::Full {
            self.write_pagination(&mut sql, state.limit, state.offset);
        }

        Ok(Built::new(sql, args))
    }

    pub(crate) fn write_ctes(
        &self,
        sql: &mut String,
        args: &mut Vec<Value>,
        ctes: &[Cte],
    ) -> OrmResult<()> {
        if ctes.is_empty() {
            return Ok(());
        }
        sql.push_str("WITH ");
        if ctes.iter().any(|c| c.recursive) {
            sql.push_str("RECURSIVE ");
        }
        for (i, cte) in ctes.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            if cte.name.is_empty() {
                return Err(OrmError::statement("CTE without a name"));
            }
            self.dialect.write_ident(sql, &cte.name);
            sql.push_str(" AS (");
            let base = self.build_select(&cte.query, true)?;
            sql.push_str(&base.sql);
            args.extend(base.args);
            if let Some(step) = &cte.union_all {
                let step = self.build_select(step, true)?;
                sql.push_str(" UNION ALL ");
                sql.push_str(&step.sql);
                args.extend(step.args);
            }
            sql.push(')');
        }
        sql.push(' ');
        Ok(())
    }

    fn write_fields(&self, sql: &mut String, args: &mut Vec<Value>, state: &QueryState) -> OrmResult<()> {
        let model_columns = state
            .model
            .as_deref()
            .filter(|_| state.reads_model_table());

        for (i, field) in state.select_fields.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match field {
                SelectField::Column(col) if col == "*" && model_columns.is_some() => {
                    let qualify = !state.joins.is_empty();
                    let columns: Vec<String> = model_columns
                        .into_iter()
                        .flat_map(|m| m.stored_columns().map(move |c| (m, c)))
                        .map(|(m, c)| {
                            if qualify {
                                format!("{}.{}", m.name, c.db_column)
                            } else {
                                c.db_column.clone()
                            }
                        })
                        .collect();
                    if columns.is_empty() {
                        sql.push('*');
                    } else {
                        sql.push_str(&self.dialect.quote_list(&columns));
                    }
                }
                SelectField::Column(col) => self.dialect.write_ident(sql, col),
                SelectField::Subquery { query, alias } => {
                    let sub = self.build_select(query, true)?;
                    sql.push('(');
                    sql.push_str(&sub.sql);
                    sql.push_str(") AS ");
                    self.dialect.write_ident(sql, alias);
                    args.extend(sub.args);
                }
            }
        }
        Ok(())
    }

    fn write_source(&self, sql: &mut String, args: &mut Vec<Value>, state: &QueryState) -> OrmResult<()> {
        match &state.source {
            Source::Table(_) => {
                let table = state
                    .target_table()
                    .ok_or_else(|| OrmError::statement("SELECT requires a table name"))?;
                self.dialect.write_ident(sql, table);
            }
            Source::Subquery { query, alias } => {
                let sub = self.build_select(query, true)?;
                sql.push('(');
                sql.push_str(&sub.sql);
                sql.push_str(") AS ");
                self.dialect.write_ident(sql, alias);
                args.extend(sub.args);
            }
        }
        Ok(())
    }

    fn write_pagination(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
        match (limit, offset) {
            (Some(limit), _) => {
                sql.push_str(" LIMIT ");
                sql.push_str(&limit.to_string());
            }
            (None, Some(_)) if !self.dialect.supports_offset_without_limit() => {
                sql.push_str(" LIMIT ");
                sql.push_str(self.dialect.max_rows_limit());
            }
            _ => {}
        }
        if let Some(offset) = offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }
    }
}

/// Split `a, COALESCE(b, c)` on commas outside parentheses and quotes,
/// trimming each term and dropping empty ones.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                terms.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(list[start..].trim());
    terms.retain(|t| !t.is_empty());
    terms
}
