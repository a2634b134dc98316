use async_trait::async_trait;
use crudql_runtime::{DataSource, DataSourceResult, Filter, Record};
use crudql_store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts every call before handing it to the wrapped store.
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataSource for CountingStore {
    async fn find_one(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>> {
        self.hit();
        self.inner.find_one(entity, filter).await
    }

    async fn find_many(
        &self,
        entity: &str,
        filter: Option<&Filter>,
    ) -> DataSourceResult<Vec<Record>> {
        self.hit();
        self.inner.find_many(entity, filter).await
    }

    async fn create(&self, entity: &str, data: Record) -> DataSourceResult<Record> {
        self.hit();
        self.inner.create(entity, data).await
    }

    async fn update(
        &self,
        entity: &str,
        filter: &Filter,
        data: Record,
    ) -> DataSourceResult<Option<Record>> {
        self.hit();
        self.inner.update(entity, filter, data).await
    }

    async fn delete(&self, entity: &str, filter: &Filter) -> DataSourceResult<Option<Record>> {
        self.hit();
        self.inner.delete(entity, filter).await
    }
}
