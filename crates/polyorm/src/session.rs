//! Terminal operations over an [`Executor`].
//!
//! A [`Session`] ties an executor, a finalized [`Registry`] and an
//! [`OrmConfig`] together and offers the usual verbs: find, first, count,
//! create, save, updates and delete. Every verb returns an [`OrmResult`].
//!
//! # Example
//! ```ignore
//! use polyorm::{Assignment, OrmConfig, Session};
//!
//! let session = Session::new(&executor, &registry, OrmConfig::new(Dialect::MySql))?;
//! let adults: Vec<User> = session
//!     .find(&session.model("users")?.filter("age >= ?", [18]).order_by("id"))
//!     .await?;
//! session
//!     .updates(
//!         &session.model("users")?.filter("id = ?", [7]),
//!         &[Assignment::set("name", "ann")],
//!     )
//!     .await?;
//! ```

use crate::assemble::{Assembler, Assignment, Built};
use crate::batch::{BatchOutcome, fill_timestamps, write_batch};
use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};
use crate::exec::{DriverFeature, Executor};
use crate::meta::{Record, Registry, TableDescriptor};
use crate::preload::{owner_key_column, preload_request_query};
use crate::query::QueryState;
use crate::value::Value;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug)]
pub struct Session<'a, E: Executor> {
    executor: &'a E,
    registry: &'a Registry,
    config: OrmConfig,
}

impl<'a, E: Executor> Session<'a, E> {
    /// Fails when the config is invalid, the registry is not finalized, or
    /// the executor speaks another dialect.
    pub fn new(executor: &'a E, registry: &'a Registry, config: OrmConfig) -> OrmResult<Self> {
        config.validate()?;
        if !registry.is_finalized() {
            return Err(OrmError::invalid_config(
                "registry must be finalized before opening a session",
            ));
        }
        if executor.dialect() != config.dialect {
            return Err(OrmError::invalid_config(format!(
                "session configured for {} but executor speaks {}",
                config.dialect,
                executor.dialect()
            )));
        }
        Ok(Self {
            executor,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn executor(&self) -> &'a E {
        self.executor
    }

    fn assembler(&self) -> Assembler {
        Assembler::new(self.config.dialect)
            .warn_unscoped_mutations(self.config.warn_unscoped_mutations)
    }

    fn descriptor(&self, state: &QueryState) -> OrmResult<Arc<TableDescriptor>> {
        state
            .model()
            .cloned()
            .ok_or_else(|| OrmError::invalid_config("operation requires a model query"))
    }

    /// An empty query in the session's dialect.
    pub fn query(&self) -> QueryState {
        QueryState::new(self.config.dialect)
    }

    /// A query against a registered model.
    pub fn model(&self, table: &str) -> OrmResult<QueryState> {
        Ok(QueryState::for_model(
            self.config.dialect,
            self.registry.get(table)?,
        ))
    }

    async fn run(&self, built: Built) -> OrmResult<u64> {
        tracing::debug!(target: "polyorm.sql", sql = %built.sql, args = built.args.len());
        let result = self.executor.execute(&built.sql, &built.args).await?;
        Ok(result.rows_affected.unwrap_or(0))
    }

    /// Load every row matched by `state`.
    pub async fn find<R: Record + Default>(&self, state: &QueryState) -> OrmResult<Vec<R>> {
        let built = self.assembler().build_select(state, false)?;
        tracing::debug!(target: "polyorm.sql", sql = %built.sql, args = built.args.len());
        let rows = self.executor.query(&built.sql, &built.args).await?;
        rows.iter()
            .map(|row| {
                let mut record = R::default();
                row.apply_to(&mut record)?;
                Ok(record)
            })
            .collect()
    }

    /// Load the first row, ordered by primary key unless an order is given.
    pub async fn first<R: Record + Default>(&self, state: &QueryState) -> OrmResult<R> {
        let mut state = state.clone().limit(1);
        let pk = state
            .model()
            .and_then(|m| m.primary_keys().first().map(|k| k.to_string()));
        if let (true, Some(pk)) = (state.order_by.is_empty(), pk) {
            state = state.order_by(self.config.dialect.quote_ident(&pk));
        }
        self.find(&state)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found("no row matched the query"))
    }

    pub async fn count(&self, state: &QueryState) -> OrmResult<u64> {
        let built = self.assembler().build_count(state)?;
        tracing::debug!(target: "polyorm.sql", sql = %built.sql, args = built.args.len());
        let rows = self.executor.query(&built.sql, &built.args).await?;
        let value = rows
            .first()
            .and_then(|row| row.values.first())
            .ok_or_else(|| OrmError::mapping("COUNT query returned no value"))?;
        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| OrmError::mapping(format!("COUNT returned a {} value", value.kind())))
    }

    /// Insert objects into the model table of `state`, honoring its upsert clause.
    ///
    /// Objects are written in chunks of `batch_size`. More than one chunk runs
    /// inside a transaction when the driver has them.
    pub async fn create<R: Record>(&self, state: &QueryState, objects: &mut [R]) -> OrmResult<BatchOutcome> {
        let descriptor = self.descriptor(state)?;
        let upsert = state.upsert();
        let chunks = objects.len().div_ceil(self.config.batch_size);

        let in_transaction = if chunks > 1 {
            if self.executor.supports_feature(DriverFeature::Transactions) {
                self.executor.begin().await?;
                true
            } else if self.config.require_transactions {
                return Err(OrmError::unsupported(format!(
                    "creating {} objects needs {chunks} statements but the driver has no transactions",
                    objects.len()
                )));
            } else {
                tracing::warn!(
                    target: "polyorm.batch",
                    table = %descriptor.name,
                    chunks,
                    "driver has no transactions; chunks are committed independently"
                );
                false
            }
        } else {
            false
        };

        let mut total = BatchOutcome::default();
        for chunk in objects.chunks_mut(self.config.batch_size) {
            match write_batch(self.executor, &descriptor, chunk, upsert).await {
                Ok(outcome) => {
                    total.written += outcome.written;
                    total.backfilled += outcome.backfilled;
                }
                Err(error) if in_transaction => {
                    return match self.executor.rollback().await {
                        Ok(()) => Err(error),
                        Err(rollback_err) => Err(OrmError::Other(format!(
                            "{error} (rollback failed: {rollback_err})"
                        ))),
                    };
                }
                Err(error) => return Err(error),
            }
        }
        if in_transaction {
            self.executor.commit().await?;
        }
        Ok(total)
    }

    /// Update a persisted object by primary key, or insert a new one.
    pub async fn save<R: Record>(&self, table: &str, object: &mut R) -> OrmResult<u64> {
        let descriptor = self.registry.get(table)?;
        if !object.is_persisted() {
            let state = QueryState::for_model(self.config.dialect, descriptor);
            let outcome = self.create(&state, std::slice::from_mut(object)).await?;
            return Ok(outcome.written);
        }

        let pks = descriptor.primary_keys();
        if pks.is_empty() {
            return Err(OrmError::mapping(format!(
                "cannot save '{table}' by primary key: none declared"
            )));
        }
        fill_timestamps(&descriptor, std::slice::from_mut(object), false)?;

        let mut state = QueryState::for_model(self.config.dialect, Arc::clone(&descriptor));
        for pk in &pks {
            let value = object
                .get(pk)
                .filter(|v| !v.is_null())
                .ok_or_else(|| OrmError::mapping(format!("'{table}.{pk}' is not set")))?;
            let column = self.config.dialect.quote_ident(pk);
            state = state.filter(format!("{column} = ?"), [value]);
        }

        let assignments: Vec<Assignment> = descriptor
            .stored_columns()
            .filter(|c| !c.flags.primary_key && !c.flags.created_at && !c.flags.deleted_at)
            .filter_map(|c| object.get(&c.db_column).map(|v| Assignment::set(&c.db_column, v)))
            .collect();
        if assignments.is_empty() {
            return Ok(0);
        }
        self.run(self.assembler().build_update(&state, &assignments)?).await
    }

    /// Apply assignments to every row matched by `state`, stamping `updated_at`
    /// when the model has one and it is not assigned explicitly.
    pub async fn updates(&self, state: &QueryState, assignments: &[Assignment]) -> OrmResult<u64> {
        let mut assignments = assignments.to_vec();
        let stamp = state
            .model()
            .and_then(|m| m.stored_columns().find(|c| c.flags.updated_at))
            .map(|c| c.db_column.clone());
        if let Some(column) = stamp {
            if !assignments.iter().any(|a| a.column() == Some(column.as_str())) {
                assignments.push(Assignment::set(column, Utc::now().naive_utc()));
            }
        }
        self.run(self.assembler().build_update(state, &assignments)?).await
    }

    /// Delete matched rows: soft delete for scoped models with a `deleted_at`
    /// column, hard delete otherwise.
    pub async fn delete(&self, state: &QueryState) -> OrmResult<u64> {
        let asm = self.assembler();
        let built = if asm.soft_delete_scope(state).is_some() {
            asm.build_soft_delete(state, Utc::now().naive_utc())?
        } else {
            asm.build_delete(state)?
        };
        self.run(built).await
    }

    /// Batched queries for every preload requested on `state`, keyed by the
    /// matching column values of `owners`.
    pub fn preload_queries<R: Record>(
        &self,
        state: &QueryState,
        owners: &[R],
    ) -> OrmResult<Vec<(String, QueryState)>> {
        let Some(owner) = state.model() else {
            if state.preloads().is_empty() {
                return Ok(Vec::new());
            }
            return Err(OrmError::invalid_config("preload requires a model query"));
        };
        state
            .preloads()
            .iter()
            .map(|request| {
                let assoc = owner.find_association(&request.association).ok_or_else(|| {
                    OrmError::mapping(format!(
                        "'{}' has no association named '{}'",
                        owner.name, request.association
                    ))
                })?;
                let key = owner_key_column(owner, assoc)?;
                let keys = owners.iter().filter_map(|o| o.get(key)).collect::<Vec<Value>>();
                let query =
                    preload_request_query(self.config.dialect, self.registry, owner, request, keys)?;
                Ok((request.association.clone(), query))
            })
            .collect()
    }
}
