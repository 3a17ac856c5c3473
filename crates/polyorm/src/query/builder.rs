//! Consuming builder methods for [`QueryState`].
//!
//! Malformed input does not panic and does not abort the chain: the problem
//! is logged, recorded in `build_errors`, and reported by the terminal build.

use super::{
    Cte, Join, JoinKind, PreloadRequest, QueryState, SelectField, Source, UpsertAction,
    UpsertClause,
};
use crate::condition::Condition;
use crate::subquery::{MergeOutcome, merge_or_exists};
use crate::value::Value;

#[derive(Clone, Copy)]
enum Slot {
    Where,
    Or,
    Not,
}

impl QueryState {
    fn record_error(&mut self, message: String) {
        tracing::warn!(target: "polyorm.query", "{message}");
        self.build_errors.push(message);
    }

    fn push_condition(mut self, slot: Slot, condition: Condition) -> Self {
        if let Err(err) = condition.validate() {
            self.record_error(err.to_string());
            return self;
        }
        match slot {
            Slot::Where => self.where_group.push(condition),
            Slot::Or => self.or_group.push(condition),
            Slot::Not => self.not_group.push(condition),
        }
        self
    }

    fn push_query(mut self, slot: Slot, inner: QueryState) -> Self {
        let outcome = match merge_or_exists(&self, &inner) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_error(format!("nested query: {err}"));
                return self;
            }
        };
        match (slot, outcome) {
            // AND-joined groups take merged conditions one by one.
            (Slot::Where | Slot::Not, MergeOutcome::Merged(conditions)) => {
                conditions
                    .into_iter()
                    .fold(self, |state, c| state.push_condition(slot, c))
            }
            (slot, outcome) => match outcome.into_condition() {
                Some(condition) => self.push_condition(slot, condition),
                None => self,
            },
        }
    }

    // ==================== Source ====================

    /// Read from a named table.
    ///
    /// A name other than the model's table turns this into a plain table query.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.model.as_ref().is_some_and(|m| m.name != name) {
            self.model = None;
        }
        self.source = Source::Table(name);
        self
    }

    /// Read from `(<query>) AS alias`.
    pub fn from_subquery(mut self, query: QueryState, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if self.model.as_ref().is_some_and(|m| m.name != alias) {
            self.model = None;
        }
        self.source = Source::Subquery {
            query: Box::new(query),
            alias,
        };
        self
    }

    // ==================== Select list ====================

    /// Replace the select list.
    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.select_fields = columns
            .iter()
            .map(|c| SelectField::Column(c.as_ref().to_string()))
            .collect();
        self
    }

    /// Append one column to the select list.
    pub fn add_select(mut self, column: impl Into<String>) -> Self {
        self.select_fields.push(SelectField::Column(column.into()));
        self
    }

    /// Append `(<query>) AS alias` to the select list.
    pub fn select_subquery(mut self, query: QueryState, alias: impl Into<String>) -> Self {
        self.select_fields.push(SelectField::Subquery {
            query: Box::new(query),
            alias: alias.into(),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== Conditions ====================

    /// AND a condition: `filter("age > ?", [30])`.
    pub fn filter<V: Into<Value>>(
        self,
        fragment: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_condition(Slot::Where, Condition::new(fragment, args))
    }

    /// Add an alternative to the whole WHERE group.
    pub fn or_filter<V: Into<Value>>(
        self,
        fragment: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_condition(Slot::Or, Condition::new(fragment, args))
    }

    /// Add a condition to the negated group: `AND NOT (...)`.
    pub fn not_filter<V: Into<Value>>(
        self,
        fragment: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_condition(Slot::Not, Condition::new(fragment, args))
    }

    /// AND a prebuilt condition.
    pub fn where_condition(self, condition: Condition) -> Self {
        self.push_condition(Slot::Where, condition)
    }

    /// AND another query: merged when it reads the same table, `EXISTS` otherwise.
    pub fn filter_query(self, inner: QueryState) -> Self {
        self.push_query(Slot::Where, inner)
    }

    pub fn or_filter_query(self, inner: QueryState) -> Self {
        self.push_query(Slot::Or, inner)
    }

    pub fn not_filter_query(self, inner: QueryState) -> Self {
        self.push_query(Slot::Not, inner)
    }

    /// `column IN (?, ...)`; an empty list matches nothing.
    pub fn in_list<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let column = self.dialect.quote_ident(column);
        self.push_condition(Slot::Where, Condition::in_list(&column, values))
    }

    /// `column NOT IN (?, ...)`; an empty list matches everything.
    pub fn not_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let column = self.dialect.quote_ident(column);
        self.push_condition(Slot::Where, Condition::not_in(&column, values))
    }

    // ==================== Joins ====================

    pub fn join<V: Into<Value>>(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        let table = table.into();
        let on = Condition::new(on, args);
        if let Err(err) = on.validate() {
            self.record_error(format!("join on '{table}': {err}"));
            return self;
        }
        self.joins.push(Join {
            kind,
            table,
            on: Some(on),
        });
        self
    }

    pub fn inner_join<V: Into<Value>>(
        self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.join(JoinKind::Inner, table, on, args)
    }

    pub fn left_join<V: Into<Value>>(
        self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.join(JoinKind::Left, table, on, args)
    }

    pub fn right_join<V: Into<Value>>(
        self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        self.join(JoinKind::Right, table, on, args)
    }

    pub fn cross_join(mut self, table: impl Into<String>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Cross,
            table: table.into(),
            on: None,
        });
        self
    }

    // ==================== Grouping / ordering ====================

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by = Some(expr.into());
        self
    }

    /// Add a HAVING condition; repeated calls are AND-ed.
    pub fn having<V: Into<Value>>(
        mut self,
        fragment: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        let condition = Condition::new(fragment, args);
        if let Err(err) = condition.validate() {
            self.record_error(err.to_string());
            return self;
        }
        self.having = match self.having.take() {
            None => Some(condition),
            Some(existing) => crate::subquery::conjoin(vec![existing, condition]),
        };
        self
    }

    /// Append an ORDER BY term, e.g. `"created_at DESC"`.
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// One-based page of `per_page` rows. Page 0 is treated as page 1.
    pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
        if per_page == 0 {
            self.record_error("paginate: per_page must be greater than zero".to_string());
            return self;
        }
        let page = page.max(1);
        self.limit = Some(per_page);
        self.offset = Some((page - 1).saturating_mul(per_page));
        self
    }

    // ==================== CTEs ====================

    /// Prefix the statement with `WITH name AS (<query>)`.
    pub fn with_cte(mut self, name: impl Into<String>, query: QueryState) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            query: Box::new(query),
            union_all: None,
            recursive: false,
        });
        self
    }

    /// `WITH RECURSIVE name AS (<base> UNION ALL <step>)`.
    pub fn with_recursive_cte(
        mut self,
        name: impl Into<String>,
        base: QueryState,
        step: QueryState,
    ) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            query: Box::new(base),
            union_all: Some(Box::new(step)),
            recursive: true,
        });
        self
    }

    // ==================== Upsert ====================

    pub fn on_conflict(mut self, clause: UpsertClause) -> Self {
        self.upsert = Some(clause);
        self
    }

    fn set_upsert_action(mut self, action: UpsertAction) -> Self {
        let targets = self
            .upsert
            .take()
            .map(|u| u.conflict_targets)
            .unwrap_or_default();
        self.upsert = Some(UpsertClause {
            action,
            conflict_targets: targets,
        });
        self
    }

    pub fn on_conflict_do_nothing(self) -> Self {
        self.set_upsert_action(UpsertAction::DoNothing)
    }

    /// Update every inserted column except the conflict keys.
    pub fn on_conflict_update_all(self) -> Self {
        self.set_upsert_action(UpsertAction::UpdateAllExceptKeys)
    }

    pub fn on_conflict_update<S: AsRef<str>>(self, columns: &[S]) -> Self {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.set_upsert_action(UpsertAction::UpdateSpecific(columns))
    }

    /// Set the conflict target columns. Without an upsert action yet, the
    /// action defaults to "do nothing".
    pub fn conflict_targets<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        let targets = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let mut clause = self
            .upsert
            .take()
            .unwrap_or_else(|| UpsertClause::new(UpsertAction::DoNothing));
        clause.conflict_targets = targets;
        self.upsert = Some(clause);
        self
    }

    // ==================== Scope / preload ====================

    /// Drop the soft-delete scope: deleted rows become visible.
    pub fn unscoped(mut self) -> Self {
        self.soft_delete_scope = false;
        self
    }

    /// Request eager loading of an association.
    pub fn preload(mut self, association: impl Into<String>) -> Self {
        self.preloads.push(PreloadRequest {
            association: association.into(),
            condition: None,
        });
        self
    }

    /// Request eager loading of an association, filtered further.
    pub fn preload_where<V: Into<Value>>(
        mut self,
        association: impl Into<String>,
        fragment: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Self {
        let association = association.into();
        let condition = Condition::new(fragment, args);
        if let Err(err) = condition.validate() {
            self.record_error(format!("preload '{association}': {err}"));
            return self;
        }
        self.preloads.push(PreloadRequest {
            association,
            condition: Some(condition),
        });
        self
    }
}
