//! Request-scoped context.
//!
//! A [`ContextFactory`] is created once per process around the shared data
//! source. Every request gets a fresh [`Context`] from it: the data source
//! `Arc` is cloned, never reconnected, and only the wrapper is new.

use crate::datasource::DataSource;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Snapshot of the caller's session, taken when the request arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    id: Option<String>,
    data: serde_json::Map<String, Value>,
}

impl Session {
    /// A session with no id, used when no session middleware runs.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(id: impl Into<String>, data: serde_json::Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            data,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a session value as a specific type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn data(&self) -> &serde_json::Map<String, Value> {
        &self.data
    }
}

/// Typed request-scoped values keyed by type.
#[derive(Default)]
pub struct Extensions {
    map: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// The context handed to every resolver of one request.
///
/// Cloning is cheap; clones share the data source, session, and extensions.
#[derive(Clone)]
pub struct Context {
    datasource: Arc<dyn DataSource>,
    session: Arc<Session>,
    extensions: Arc<Extensions>,
}

impl Context {
    /// The process-wide data source.
    pub fn datasource(&self) -> &dyn DataSource {
        self.datasource.as_ref()
    }

    /// A shared handle to the data source, for moving into spawned work.
    pub fn datasource_handle(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.datasource)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Gets a request-scoped extension by type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("session", &self.session)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Builds one [`Context`] per request around a shared data source.
#[derive(Clone)]
pub struct ContextFactory {
    datasource: Arc<dyn DataSource>,
}

impl ContextFactory {
    pub fn new(datasource: Arc<dyn DataSource>) -> Self {
        Self { datasource }
    }

    /// Creates a context for one request. The data source is not contacted.
    pub fn create(&self, session: Session) -> Context {
        self.create_with(session, Extensions::new())
    }

    /// Creates a context carrying request-scoped extensions.
    pub fn create_with(&self, session: Session, extensions: Extensions) -> Context {
        Context {
            datasource: Arc::clone(&self.datasource),
            session: Arc::new(session),
            extensions: Arc::new(extensions),
        }
    }

    pub fn datasource(&self) -> &Arc<dyn DataSource> {
        &self.datasource
    }
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory").finish_non_exhaustive()
    }
}
