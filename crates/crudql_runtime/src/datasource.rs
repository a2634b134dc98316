//! Data source adapter contract.
//!
//! The runtime never talks to storage directly. Every read and write goes
//! through a [`DataSource`], addressed by entity name and storage column
//! names. Implementations own their own pooling and locking and must tolerate
//! concurrent calls from many in-flight requests.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// A stored row, keyed by storage column name.
pub type Record = serde_json::Map<String, Value>;

/// Result type for data source calls.
pub type DataSourceResult<T> = Result<T, DataSourceError>;

/// Errors reported by a data source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataSourceError {
    /// The store cannot be reached.
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// A write violated a unique or referential constraint.
    #[error("{0}")]
    Constraint(String),

    /// The entity has no backing table.
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    /// Any other store failure.
    #[error("internal data source error: {0}")]
    Internal(String),
}

impl DataSourceError {
    /// Returns true if the failure is on the infrastructure side rather than
    /// caused by the request.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Internal(_) | Self::UnknownEntity(_)
        )
    }
}

/// An equality filter over storage columns. All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter on a single column.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(column, value)
    }

    /// Adds a condition.
    #[must_use]
    pub fn and(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true if the record satisfies every condition.
    ///
    /// A missing column compares equal to `null`.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| record.get(column).unwrap_or(&Value::Null) == expected)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map: Record = self.conditions.iter().cloned().collect();
        write!(f, "{}", Value::Object(map))
    }
}

/// Typed CRUD access to the underlying store.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Returns the first record matching the filter.
    async fn find_one(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>>;

    /// Returns every record matching the filter, or every record when no
    /// filter is given, in insertion order.
    async fn find_many(&self, entity: &str, filter: Option<&Filter>)
        -> DataSourceResult<Vec<Record>>;

    /// Inserts a record and returns it as stored, with generated columns.
    async fn create(&self, entity: &str, data: Record) -> DataSourceResult<Record>;

    /// Applies `patch` to the first record matching the filter.
    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        patch: Record,
    ) -> DataSourceResult<Option<Record>>;

    /// Removes the first record matching the filter and returns it.
    async fn delete(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>>;
}
