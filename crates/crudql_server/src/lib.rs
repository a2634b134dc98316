//! The crudql blog API server.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the configured address (default 127.0.0.1:8081/graphql)
//! crudql serve
//!
//! # Write schema.graphql and crudql-typegen.d.ts
//! crudql typegen
//!
//! # Print the records the seed creates
//! crudql seed
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod typegen;

pub use config::{ServerConfig, SessionConfig, TypegenConfig};
pub use error::{ServerError, ServerResult};
pub use http::HttpServer;
pub use pipeline::{RequestId, RequestPipeline};
pub use session::SessionStore;

use crudql_runtime::ContextFactory;
use crudql_store::MemoryStore;
use std::sync::Arc;
use tracing::info;

/// A fully wired server: schema, store, sessions and pipeline.
pub struct App {
    pub store: Arc<MemoryStore>,
    pub pipeline: Arc<RequestPipeline>,
    pub sessions: Arc<SessionStore>,
}

impl App {
    /// Builds the schema, opens the store and seeds it when configured.
    ///
    /// A schema that fails validation stops startup here.
    pub async fn build(config: Arc<ServerConfig>) -> ServerResult<Self> {
        let schema = Arc::new(schema::build_schema()?);

        let store = Arc::new(MemoryStore::new(Arc::new(crudql_store::blog_model())));
        if config.seed {
            crudql_store::seed(&store).await?;
        } else {
            info!("starting with an empty store");
        }

        if !config.typegen.is_empty() {
            typegen::write(schema.schema(), &config.typegen)?;
        }

        let contexts = ContextFactory::new(store.clone());
        let sessions = Arc::new(SessionStore::new(&config.session));
        let pipeline = Arc::new(RequestPipeline::new(schema, contexts, config));
        Ok(Self {
            store,
            pipeline,
            sessions,
        })
    }

    pub fn http(&self) -> HttpServer {
        HttpServer::new(Arc::clone(&self.pipeline), Arc::clone(&self.sessions))
    }
}
