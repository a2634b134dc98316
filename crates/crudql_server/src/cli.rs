//! Command-line interface.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::{schema, typegen, App};
use clap::{Parser, Subcommand};
use crudql_codegen::Language;
use crudql_runtime::{DataSource, ResolverError};
use crudql_store::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crudql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./crudql.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Path of the GraphQL endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Start with an empty store
        #[arg(long)]
        no_seed: bool,
    },

    /// Write SDL and TypeScript declarations for the schema
    Typegen {
        /// SDL output path
        #[arg(long)]
        sdl: Option<PathBuf>,

        /// TypeScript declarations output path
        #[arg(long)]
        typescript: Option<PathBuf>,
    },

    /// Seed an empty store and print the created records
    Seed,
}

impl Cli {
    /// Loads configuration and applies this invocation's flags on top.
    pub fn config(&self) -> ServerResult<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        match &self.command {
            Some(Commands::Serve {
                host,
                port,
                endpoint,
                no_seed,
            }) => {
                if let Some(host) = host {
                    config.host.clone_from(host);
                }
                if let Some(port) = port {
                    config.port = *port;
                }
                if let Some(endpoint) = endpoint {
                    config.endpoint.clone_from(endpoint);
                }
                if *no_seed {
                    config.seed = false;
                }
            }
            Some(Commands::Typegen { sdl, typescript }) => {
                let sdl = sdl.clone().or_else(|| config.typegen.sdl.take());
                let typescript = typescript.clone().or_else(|| config.typegen.typescript.take());
                config.typegen.sdl =
                    Some(sdl.unwrap_or_else(|| Language::Sdl.default_file_name().into()));
                config.typegen.typescript = Some(
                    typescript.unwrap_or_else(|| Language::TypeScript.default_file_name().into()),
                );
            }
            Some(Commands::Seed) | None => {}
        }
        config.validate()?;
        Ok(config)
    }
}

/// Runs a parsed command with its resolved configuration.
pub async fn run(command: Option<Commands>, config: ServerConfig) -> ServerResult<()> {
    match command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        endpoint: None,
        no_seed: false,
    }) {
        Commands::Serve { .. } => {
            let app = App::build(Arc::new(config)).await?;
            let server = Arc::new(app.http());
            let listener = server.bind().await?;
            server
                .serve(listener, async {
                    // Without a signal handler the server runs until killed.
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await
        }
        Commands::Typegen { .. } => {
            let schema = schema::build_schema()?;
            for path in typegen::write(schema.schema(), &config.typegen)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Seed => {
            let store = MemoryStore::new(Arc::new(crudql_store::blog_model()));
            let user = crudql_store::seed(&store).await?;
            info!(id = ?user.get("id"), "seeded user");
            for entity in ["User", "Post", "Profile"] {
                let rows = store
                    .find_many(entity, None)
                    .await
                    .map_err(ResolverError::from)?;
                let json = serde_json::to_string_pretty(&rows).map_err(std::io::Error::from)?;
                println!("{entity}: {json}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from(["crudql", "serve", "--port", "9000", "--no-seed"]);
        assert_eq!(
            cli.command,
            Some(Commands::Serve {
                host: None,
                port: Some(9000),
                endpoint: None,
                no_seed: true,
            })
        );
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("crudql-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "port = 9000\nhost = \"0.0.0.0\"\n").unwrap();

        let cli = Cli::parse_from([
            "crudql",
            "--config",
            path.to_str().unwrap(),
            "serve",
            "--port",
            "9100",
            "--endpoint",
            "/api",
        ]);
        let config = cli.config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert_eq!(config.endpoint, "/api");
    }

    #[test]
    fn test_typegen_defaults() {
        let path = std::env::temp_dir().join(format!("crudql-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[typegen]\nsdl = \"out/schema.graphql\"\n").unwrap();

        let cli = Cli::parse_from(["crudql", "--config", path.to_str().unwrap(), "typegen"]);
        let config = cli.config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.typegen.sdl, Some(PathBuf::from("out/schema.graphql")));
        assert_eq!(
            config.typegen.typescript,
            Some(PathBuf::from("crudql-typegen.d.ts"))
        );
    }
}
