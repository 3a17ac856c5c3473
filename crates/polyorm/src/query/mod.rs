//! Query state and its fluent builder.
//!
//! A [`QueryState`] is the complete, dialect-bound description of one query.
//! It starts empty and is filled in by chained builder calls; the
//! [`Assembler`](crate::Assembler) only ever reads it.
//!
//! # Usage
//!
//! ```ignore
//! use polyorm::{args, Dialect, QueryState};
//!
//! let q = QueryState::new(Dialect::Postgres)
//!     .table("users")
//!     .filter("age > ?", [30])
//!     .or_filter("role = ?", ["admin"])
//!     .order_by("created_at DESC")
//!     .limit(20);
//! ```

mod builder;

use crate::condition::{BoolOp, Condition, ConditionGroup};
use crate::dialect::Dialect;
use crate::meta::TableDescriptor;
use std::sync::Arc;

/// Where rows come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A table name. An empty name means "the model's table".
    Table(String),
    /// A derived table: `(<subquery>) AS alias`.
    Subquery {
        query: Box<QueryState>,
        alias: String,
    },
}

/// One entry of the select list.
#[derive(Debug, Clone)]
pub enum SelectField {
    /// A column or expression, quoted per dialect when it is a plain identifier.
    Column(String),
    /// `(<subquery>) AS alias`.
    Subquery {
        query: Box<QueryState>,
        alias: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    /// `None` for CROSS JOIN.
    pub on: Option<Condition>,
}

/// A common table expression.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub query: Box<QueryState>,
    /// Recursive step, rendered as `<query> UNION ALL <step>`.
    pub union_all: Option<Box<QueryState>>,
    pub recursive: bool,
}

/// What an upsert does on a uniqueness conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    DoNothing,
    /// Update every inserted column except the conflict target / primary key.
    UpdateAllExceptKeys,
    /// Update only these columns.
    UpdateSpecific(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertClause {
    pub action: UpsertAction,
    /// Empty means "derive from the primary key".
    pub conflict_targets: Vec<String>,
}

impl UpsertClause {
    pub fn new(action: UpsertAction) -> Self {
        Self {
            action,
            conflict_targets: Vec::new(),
        }
    }

    pub fn do_nothing() -> Self {
        Self::new(UpsertAction::DoNothing)
    }

    pub fn update_all() -> Self {
        Self::new(UpsertAction::UpdateAllExceptKeys)
    }

    pub fn update(columns: &[&str]) -> Self {
        Self::new(UpsertAction::UpdateSpecific(
            columns.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn targets(mut self, columns: &[&str]) -> Self {
        self.conflict_targets = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn is_do_nothing(&self) -> bool {
        matches!(self.action, UpsertAction::DoNothing)
    }
}

/// Request to eager-load an association alongside the main query.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadRequest {
    pub association: String,
    /// Extra filter applied to the preload query.
    pub condition: Option<Condition>,
}

/// The full mutable description of one query.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub(crate) dialect: Dialect,
    pub(crate) source: Source,
    pub(crate) where_group: ConditionGroup,
    pub(crate) or_group: ConditionGroup,
    pub(crate) not_group: ConditionGroup,
    pub(crate) select_fields: Vec<SelectField>,
    pub(crate) distinct: bool,
    pub(crate) joins: Vec<Join>,
    pub(crate) order_by: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) group_by: Option<String>,
    pub(crate) having: Option<Condition>,
    pub(crate) ctes: Vec<Cte>,
    pub(crate) upsert: Option<UpsertClause>,
    pub(crate) soft_delete_scope: bool,
    pub(crate) model: Option<Arc<TableDescriptor>>,
    pub(crate) preloads: Vec<PreloadRequest>,
    pub(crate) build_errors: Vec<String>,
}

impl QueryState {
    /// An empty query: no source, `SELECT *`, soft-delete scope active.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            source: Source::Table(String::new()),
            where_group: ConditionGroup::new(BoolOp::And),
            or_group: ConditionGroup::new(BoolOp::Or),
            not_group: ConditionGroup::negated(BoolOp::And),
            select_fields: vec![SelectField::Column("*".to_string())],
            distinct: false,
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            group_by: None,
            having: None,
            ctes: Vec::new(),
            upsert: None,
            soft_delete_scope: true,
            model: None,
            preloads: Vec::new(),
            build_errors: Vec::new(),
        }
    }

    /// A query against a model's table, with the source left implicit.
    pub fn for_model(dialect: Dialect, model: Arc<TableDescriptor>) -> Self {
        let mut state = Self::new(dialect);
        state.model = Some(model);
        state
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn model(&self) -> Option<&Arc<TableDescriptor>> {
        self.model.as_ref()
    }

    pub fn where_group(&self) -> &ConditionGroup {
        &self.where_group
    }

    pub fn or_group(&self) -> &ConditionGroup {
        &self.or_group
    }

    pub fn not_group(&self) -> &ConditionGroup {
        &self.not_group
    }

    pub fn select_fields(&self) -> &[SelectField] {
        &self.select_fields
    }

    pub fn upsert(&self) -> Option<&UpsertClause> {
        self.upsert.as_ref()
    }

    pub fn preloads(&self) -> &[PreloadRequest] {
        &self.preloads
    }

    pub fn soft_delete_scope_active(&self) -> bool {
        self.soft_delete_scope
    }

    /// Construction problems recorded while building.
    pub fn build_errors(&self) -> &[String] {
        &self.build_errors
    }

    /// Whether any WHERE/OR/NOT condition has been added.
    pub fn has_conditions(&self) -> bool {
        !(self.where_group.is_empty() && self.or_group.is_empty() && self.not_group.is_empty())
    }

    /// The table the query reads from: the explicit table name, the model's
    /// table when the source is implicit, or `None` for subquery sources.
    pub fn target_table(&self) -> Option<&str> {
        match &self.source {
            Source::Table(name) if !name.is_empty() => Some(name),
            Source::Table(_) => self.model.as_deref().map(|m| m.name.as_str()),
            Source::Subquery { .. } => None,
        }
    }

    /// Whether the source is left implicit (taken from the model).
    pub fn has_implicit_source(&self) -> bool {
        matches!(&self.source, Source::Table(name) if name.is_empty())
    }

    /// Whether the FROM source is exactly the model's own table.
    pub(crate) fn reads_model_table(&self) -> bool {
        match (&self.model, self.target_table()) {
            (Some(model), Some(table)) => model.name == table,
            _ => false,
        }
    }
}
