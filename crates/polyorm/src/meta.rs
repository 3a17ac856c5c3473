//! Model metadata.
//!
//! Tables are described with plain data ([`TableDescriptor`]) and collected in
//! an explicit [`Registry`]. The registry is finalized once at startup; after
//! that it is read-only and can be shared by reference.
//!
//! # Example
//! ```ignore
//! use polyorm::meta::{ColumnDescriptor, Registry, TableDescriptor};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     TableDescriptor::new("users")
//!         .column(ColumnDescriptor::new("id").primary_key().auto_increment())
//!         .column(ColumnDescriptor::new("email").unique())
//!         .column(ColumnDescriptor::new("deleted_at").deleted_at()),
//! )?;
//! registry.finalize()?;
//! let users = registry.get("users")?;
//! # Ok::<(), polyorm::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-column flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub created_at: bool,
    pub updated_at: bool,
    pub deleted_at: bool,
    pub association: bool,
}

/// A mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub db_column: String,
    pub field_name: String,
    pub flags: ColumnFlags,
}

impl ColumnDescriptor {
    /// A column whose field name equals the column name.
    pub fn new(db_column: impl Into<String>) -> Self {
        let db_column = db_column.into();
        Self {
            field_name: db_column.clone(),
            db_column,
            flags: ColumnFlags::default(),
        }
    }

    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.flags.primary_key = true;
        self.flags.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.flags.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.flags.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self
    }

    pub fn created_at(mut self) -> Self {
        self.flags.created_at = true;
        self
    }

    pub fn updated_at(mut self) -> Self {
        self.flags.updated_at = true;
        self
    }

    pub fn deleted_at(mut self) -> Self {
        self.flags.deleted_at = true;
        self
    }

    /// Mark this entry as an association field (never selected or written).
    pub fn association(mut self) -> Self {
        self.flags.association = true;
        self
    }

    /// Whether the column takes part in SELECT and INSERT column lists.
    pub fn is_stored(&self) -> bool {
        !self.flags.association
    }
}

/// Relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// Foreign key lives on the owning table.
    BelongsTo,
    /// Foreign key lives on the target table, at most one row.
    HasOne,
    /// Foreign key lives on the target table.
    HasMany,
    /// Joined through a link table.
    ManyToMany,
}

/// A relationship from one table to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub field_name: String,
    pub kind: AssociationKind,
    pub foreign_key_column: String,
    pub target_table: String,
}

impl AssociationDescriptor {
    pub fn new(
        field_name: impl Into<String>,
        kind: AssociationKind,
        foreign_key_column: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            kind,
            foreign_key_column: foreign_key_column.into(),
            target_table: target_table.into(),
        }
    }
}

/// Column and association metadata of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub associations: Vec<AssociationDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    pub fn find_column(&self, db_column: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.db_column == db_column)
    }

    pub fn find_association(&self, field_name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.field_name == field_name)
    }

    /// Non-association columns, in declaration order.
    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_stored())
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.stored_columns()
            .filter(|c| c.flags.primary_key)
            .map(|c| c.db_column.as_str())
            .collect()
    }

    pub fn auto_increment_key(&self) -> Option<&ColumnDescriptor> {
        self.stored_columns()
            .find(|c| c.flags.primary_key && c.flags.auto_increment)
    }

    pub fn deleted_at_column(&self) -> Option<&str> {
        self.stored_columns()
            .find(|c| c.flags.deleted_at)
            .map(|c| c.db_column.as_str())
    }
}

/// Explicit registry of table descriptors.
#[derive(Debug, Default)]
pub struct Registry {
    tables: HashMap<String, Arc<TableDescriptor>>,
    finalized: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table. Fails once the registry has been finalized.
    pub fn register(&mut self, table: TableDescriptor) -> OrmResult<()> {
        if self.finalized {
            return Err(OrmError::invalid_config(format!(
                "cannot register '{}': registry is already finalized",
                table.name
            )));
        }
        if table.name.is_empty() {
            return Err(OrmError::invalid_config("table descriptor without a name"));
        }
        self.tables.insert(table.name.clone(), Arc::new(table));
        Ok(())
    }

    /// Validate all descriptors and freeze the registry.
    pub fn finalize(&mut self) -> OrmResult<()> {
        for table in self.tables.values() {
            let auto_keys = table
                .stored_columns()
                .filter(|c| c.flags.auto_increment)
                .count();
            if auto_keys > 1 {
                return Err(OrmError::invalid_config(format!(
                    "table '{}' declares {auto_keys} auto-increment columns",
                    table.name
                )));
            }
            if let Some(col) = table
                .stored_columns()
                .find(|c| c.flags.auto_increment && !c.flags.primary_key)
            {
                return Err(OrmError::invalid_config(format!(
                    "auto-increment column '{}.{}' is not a primary key",
                    table.name, col.db_column
                )));
            }
            if table.auto_increment_key().is_some() && table.primary_keys().len() > 1 {
                return Err(OrmError::invalid_config(format!(
                    "table '{}' mixes an auto-increment key with a composite primary key",
                    table.name
                )));
            }

            for assoc in &table.associations {
                let Some(target) = self.tables.get(&assoc.target_table) else {
                    return Err(OrmError::invalid_config(format!(
                        "association '{}.{}' targets unknown table '{}'",
                        table.name, assoc.field_name, assoc.target_table
                    )));
                };
                let fk_owner = match assoc.kind {
                    AssociationKind::BelongsTo => table.as_ref(),
                    AssociationKind::HasOne | AssociationKind::HasMany => target.as_ref(),
                    AssociationKind::ManyToMany => continue,
                };
                if fk_owner.find_column(&assoc.foreign_key_column).is_none() {
                    return Err(OrmError::mapping(format!(
                        "association '{}.{}': foreign key column '{}' not found on '{}'",
                        table.name, assoc.field_name, assoc.foreign_key_column, fk_owner.name
                    )));
                }
            }
        }
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Look up a table descriptor. Only available after [`Registry::finalize`].
    pub fn get(&self, table: &str) -> OrmResult<Arc<TableDescriptor>> {
        if !self.finalized {
            return Err(OrmError::invalid_config(
                "registry must be finalized before it is used",
            ));
        }
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| OrmError::mapping(format!("no descriptor registered for table '{table}'")))
    }
}

/// An in-memory object that maps onto one table row.
pub trait Record {
    /// Current value of `column`. `None` means the field is unset and the
    /// database default applies.
    fn get(&self, column: &str) -> Option<Value>;

    /// Assign a column value (used for key backfill, timestamps and row mapping).
    fn set(&mut self, column: &str, value: Value) -> OrmResult<()>;

    fn is_persisted(&self) -> bool;

    fn set_persisted(&mut self, persisted: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .column(ColumnDescriptor::new("id").primary_key().auto_increment())
            .column(ColumnDescriptor::new("email").unique())
            .column(ColumnDescriptor::new("deleted_at").deleted_at())
            .column(ColumnDescriptor::new("posts").association())
            .association(AssociationDescriptor::new(
                "posts",
                AssociationKind::HasMany,
                "user_id",
                "posts",
            ))
    }

    fn posts() -> TableDescriptor {
        TableDescriptor::new("posts")
            .column(ColumnDescriptor::new("id").primary_key().auto_increment())
            .column(ColumnDescriptor::new("user_id"))
    }

    #[test]
    fn test_descriptor_helpers() {
        let t = users();
        assert_eq!(t.primary_keys(), vec!["id"]);
        assert_eq!(t.auto_increment_key().unwrap().db_column, "id");
        assert_eq!(t.deleted_at_column(), Some("deleted_at"));
        let stored: Vec<_> = t.stored_columns().map(|c| c.db_column.as_str()).collect();
        assert_eq!(stored, vec!["id", "email", "deleted_at"]);
    }

    #[test]
    fn test_registry_requires_finalize() {
        let mut r = Registry::new();
        r.register(users()).unwrap();
        r.register(posts()).unwrap();
        assert!(r.get("users").unwrap_err().is_invalid_configuration());
        r.finalize().unwrap();
        assert_eq!(r.get("users").unwrap().name, "users");
        assert!(r.get("missing").unwrap_err().is_mapping());
        assert!(r.register(TableDescriptor::new("late")).is_err());
    }

    #[test]
    fn test_finalize_rejects_unknown_target() {
        let mut r = Registry::new();
        r.register(users()).unwrap();
        assert!(r.finalize().unwrap_err().is_invalid_configuration());
    }

    #[test]
    fn test_finalize_rejects_missing_fk() {
        let mut r = Registry::new();
        r.register(users()).unwrap();
        r.register(
            TableDescriptor::new("posts")
                .column(ColumnDescriptor::new("id").primary_key().auto_increment()),
        )
        .unwrap();
        assert!(r.finalize().unwrap_err().is_mapping());
    }

    #[test]
    fn test_finalize_rejects_composite_with_auto_increment() {
        let mut r = Registry::new();
        r.register(
            TableDescriptor::new("memberships")
                .column(ColumnDescriptor::new("id").primary_key().auto_increment())
                .column(ColumnDescriptor::new("group_id").primary_key()),
        )
        .unwrap();
        assert!(r.finalize().unwrap_err().is_invalid_configuration());
    }
}
