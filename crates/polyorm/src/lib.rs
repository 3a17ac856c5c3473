//! # polyorm
//!
//! A dialect-aware ORM query layer for MySQL, PostgreSQL and SQLite.
//!
//! ## Features
//!
//! - **Condition model**: SQL fragments with `?` placeholders and their arguments
//! - **Query state**: a consuming builder that records filters, joins, CTEs and upserts
//! - **One assembler, three dialects**: quoting, pagination and upsert syntax per dialect
//! - **Subqueries**: any query can become a bound value, a FROM source or a CTE
//! - **Batch writes**: multi-row INSERT with generated-key backfill
//! - **Soft delete**: models with a `deleted_at` column are scoped automatically
//!
//! ## Example
//!
//! ```ignore
//! use polyorm::{args, Assembler, Dialect, QueryState};
//!
//! let q = QueryState::new(Dialect::Postgres)
//!     .table("users")
//!     .filter("age > ?", args![18])
//!     .or_filter("name = ?", args!["admin"])
//!     .order_by("id DESC")
//!     .limit(10);
//!
//! let built = Assembler::new(Dialect::Postgres).build_select(&q, false)?;
//! // SELECT * FROM "users" WHERE (age > ?) OR (name = ?) ORDER BY id DESC LIMIT 10
//! ```
//!
//! Execution goes through the [`Executor`] trait. With the default `postgres`
//! feature it is implemented for `tokio_postgres::Client`.

pub mod assemble;
pub mod batch;
pub mod compose;
pub mod condition;
pub mod config;
pub mod dialect;
pub mod error;
pub mod exec;
pub mod meta;
pub mod preload;
pub mod query;
pub mod session;
pub mod subquery;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use assemble::{Assembler, Assignment, Built, InsertStatement};
pub use batch::{BatchOutcome, write_batch};
pub use compose::{Composed, compose};
pub use condition::{BoolOp, Condition, ConditionGroup};
pub use config::OrmConfig;
pub use dialect::{Dialect, UpsertSyntax};
pub use error::{OrmError, OrmResult};
pub use exec::{DriverFeature, ExecResult, Executor, Row};
pub use meta::{
    AssociationDescriptor, AssociationKind, ColumnDescriptor, ColumnFlags, Record, Registry,
    TableDescriptor,
};
pub use preload::{owner_key_column, preload_query, preload_request_query};
pub use query::{
    Cte, Join, JoinKind, PreloadRequest, QueryState, SelectField, Source, UpsertAction,
    UpsertClause,
};
pub use session::Session;
pub use subquery::{MergeOutcome, as_subquery, merge_or_exists, targets_same_table};
pub use value::{BindValue, SubqueryExpr, Value};
