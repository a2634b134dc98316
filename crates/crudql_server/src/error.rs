//! Server error types.

use crudql_runtime::{ResolverError, SchemaError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("http error: {0}")]
    Http(String),

    #[error("seeding failed: {0}")]
    Seed(#[from] ResolverError),
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }
}

impl From<toml::de::Error> for ServerError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
