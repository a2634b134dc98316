//! In-memory relational store for crudql.
//!
//! [`MemoryStore`] implements the runtime's [`DataSource`] over plain
//! tables guarded by a tokio `RwLock`. It enforces what a relational
//! database would: autoincrement ids, column defaults, not-null columns,
//! unique columns and foreign keys (restrict on delete).
//!
//! This crate provides:
//! - `blog`: The storage layout of `User`, `Post` and `Profile`
//! - `seed`: Sample data

pub mod blog;
pub mod seed;
mod table;

pub use blog::blog_model;
pub use seed::seed;

use async_trait::async_trait;
use crudql_runtime::datasource::{DataSource, DataSourceError, DataSourceResult, Filter, Record};
use crudql_runtime::model::{DataModel, ModelDef, RelationKind};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use table::Table;
use tokio::sync::RwLock;
use tracing::debug;

/// A relational store held in memory.
pub struct MemoryStore {
    model: Arc<DataModel>,
    tables: RwLock<FxHashMap<String, Table>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty table for every model entity.
    pub fn new(model: Arc<DataModel>) -> Self {
        let tables = model
            .models()
            .map(|def| (def.name.clone(), Table::default()))
            .collect();
        Self {
            model,
            tables: RwLock::new(tables),
            available: AtomicBool::new(true),
        }
    }

    pub fn model(&self) -> &Arc<DataModel> {
        &self.model
    }

    /// Takes the store offline or back online. While offline every call
    /// fails with [`DataSourceError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of rows in a table.
    pub async fn count(&self, entity: &str) -> usize {
        self.tables.read().await.get(entity).map_or(0, Table::len)
    }

    fn ensure_available(&self) -> DataSourceResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DataSourceError::Unavailable("store is offline".to_string()))
        }
    }

    fn def(&self, entity: &str) -> DataSourceResult<&ModelDef> {
        self.model
            .get(entity)
            .ok_or_else(|| DataSourceError::UnknownEntity(entity.to_string()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn table<'t>(tables: &'t FxHashMap<String, Table>, entity: &str) -> DataSourceResult<&'t Table> {
    tables
        .get(entity)
        .ok_or_else(|| DataSourceError::UnknownEntity(entity.to_string()))
}

fn table_mut<'t>(
    tables: &'t mut FxHashMap<String, Table>,
    entity: &str,
) -> DataSourceResult<&'t mut Table> {
    tables
        .get_mut(entity)
        .ok_or_else(|| DataSourceError::UnknownEntity(entity.to_string()))
}

/// Checks not-null, unique and foreign key constraints for `row`, which is
/// about to be stored at `position` (or appended when `None`).
fn check_row(
    def: &ModelDef,
    tables: &FxHashMap<String, Table>,
    row: &Record,
    position: Option<usize>,
) -> DataSourceResult<()> {
    let own = table(tables, &def.name)?;

    for field in def.fields.values() {
        let value = row.get(&field.column).unwrap_or(&Value::Null);
        if value.is_null() {
            if field.required {
                return Err(DataSourceError::Constraint(format!(
                    "Null constraint violation on the fields: (`{}`)",
                    field.column
                )));
            }
            continue;
        }
        if field.unique && own.position_where(&field.column, value, position).is_some() {
            return Err(DataSourceError::Constraint(format!(
                "Unique constraint failed on the fields: (`{}`)",
                field.column
            )));
        }
    }

    for relation in def.relations.values() {
        if relation.kind != RelationKind::BelongsTo {
            continue;
        }
        let Some(key) = row.get(&relation.key).filter(|v| !v.is_null()) else {
            continue;
        };
        let target = table(tables, &relation.target)?;
        if target.position_where(&relation.references, key, None).is_none() {
            return Err(DataSourceError::Constraint(format!(
                "Foreign key constraint failed on the field: `{}`",
                relation.key
            )));
        }
    }

    Ok(())
}

#[async_trait]
impl DataSource for MemoryStore {
    async fn find_one(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(table(&tables, entity)?.find(filter).cloned())
    }

    async fn find_many(
        &self,
        entity: &str,
        filter: Option<&Filter>,
    ) -> DataSourceResult<Vec<Record>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        let table = table(&tables, entity)?;
        Ok(match filter {
            Some(filter) => table.filter(filter).cloned().collect(),
            None => table.rows().to_vec(),
        })
    }

    async fn create(&self, entity: &str, data: Record) -> DataSourceResult<Record> {
        self.ensure_available()?;
        let def = self.def(entity)?;
        let mut tables = self.tables.write().await;

        if let Some(column) = data.keys().find(|c| def.field_by_column(c).is_none()) {
            return Err(DataSourceError::Constraint(format!(
                "Unknown column `{column}` on `{entity}`"
            )));
        }

        let next_id = table(&tables, entity)?.peek_id();
        let mut row = Record::new();
        for field in def.fields.values() {
            let value = match data.get(&field.column) {
                Some(value) if !value.is_null() => value.clone(),
                _ if field.id => Value::from(next_id),
                _ => field.default.clone().unwrap_or(Value::Null),
            };
            row.insert(field.column.clone(), value);
        }

        check_row(def, &tables, &row, None)?;
        let table = table_mut(&mut tables, entity)?;
        table.insert(row.clone(), def.id_field().map(|f| f.column.as_str()));
        debug!(entity, rows = table.len(), "record created");
        Ok(row)
    }

    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        patch: Record,
    ) -> DataSourceResult<Option<Record>> {
        self.ensure_available()?;
        let def = self.def(entity)?;
        let mut tables = self.tables.write().await;

        let Some(position) = table(&tables, entity)?.position(filter) else {
            return Ok(None);
        };

        let mut row = table(&tables, entity)?.rows()[position].clone();
        for (column, value) in patch {
            match def.field_by_column(&column) {
                Some(field) if field.id => {
                    return Err(DataSourceError::Constraint(format!(
                        "Column `{column}` cannot be updated"
                    )));
                }
                Some(_) => {
                    row.insert(column, value);
                }
                None => {
                    return Err(DataSourceError::Constraint(format!(
                        "Unknown column `{column}` on `{entity}`"
                    )));
                }
            }
        }

        check_row(def, &tables, &row, Some(position))?;
        table_mut(&mut tables, entity)?.replace(position, row.clone());
        debug!(entity, position, "record updated");
        Ok(Some(row))
    }

    async fn delete(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>> {
        self.ensure_available()?;
        self.def(entity)?;
        let mut tables = self.tables.write().await;

        let Some(position) = table(&tables, entity)?.position(filter) else {
            return Ok(None);
        };
        let row = &table(&tables, entity)?.rows()[position];

        // Restrict: a referenced row stays.
        for (referrer, relation) in self.model.referencing(entity) {
            let key = row.get(&relation.references).unwrap_or(&Value::Null);
            if table(&tables, &referrer.name)?
                .position_where(&relation.key, key, None)
                .is_some()
            {
                return Err(DataSourceError::Constraint(format!(
                    "Foreign key constraint failed on the field: `{}`",
                    relation.key
                )));
            }
        }

        let removed = table_mut(&mut tables, entity)?.remove(position);
        debug!(entity, "record deleted");
        Ok(Some(removed))
    }
}
