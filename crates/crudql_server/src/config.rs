//! Server configuration.
//!
//! A [`ServerConfig`] is assembled once at startup from, in order of
//! increasing precedence:
//! 1. built-in defaults
//! 2. a TOML file (`crudql.toml` in the working directory, or `--config`)
//! 3. `CRUDQL_*` environment variables
//! 4. command-line flags
//!
//! The result is shared as `Arc<ServerConfig>`; nothing reads configuration
//! from a global.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File read when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crudql.toml";

/// 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path of the GraphQL endpoint.
    pub endpoint: String,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
    pub session: SessionConfig,
    pub typegen: TypegenConfig,
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Seed the store with the demo user at startup.
    pub seed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            endpoint: "/graphql".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            session: SessionConfig::default(),
            typegen: TypegenConfig::default(),
            log_filter: "crudql=info".to_string(),
            seed: true,
        }
    }

    /// Loads defaults, then the config file, then the process environment.
    ///
    /// An explicit `path` must exist. Without one, `crudql.toml` is read only
    /// if present.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::new(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        debug!(path = %path.display(), "reading config file");
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `CRUDQL_HOST`, `CRUDQL_PORT`, `CRUDQL_ENDPOINT` and
    /// `CRUDQL_LOG` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(host) = lookup("CRUDQL_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CRUDQL_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ServerError::config(format!("CRUDQL_PORT is not a port: {port}")))?;
        }
        if let Some(endpoint) = lookup("CRUDQL_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(filter) = lookup("CRUDQL_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> ServerResult<()> {
        if !self.endpoint.starts_with('/') {
            return Err(ServerError::config(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }
        if self.endpoint == "/health" {
            return Err(ServerError::config("endpoint cannot be /health"));
        }
        if self.body_limit == 0 {
            return Err(ServerError::config("body_limit must be positive"));
        }
        if self.session.max_age == 0 {
            return Err(ServerError::config("session.max_age must be positive"));
        }
        if self.session.cookie_name.is_empty()
            || !self.session.cookie_name.bytes().all(is_cookie_name_byte)
        {
            return Err(ServerError::config(format!(
                "invalid session cookie name: {:?}",
                self.session.cookie_name
            )));
        }
        Ok(())
    }

    /// The `host:port` pair to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the endpoint path.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the request body limit in bytes.
    #[must_use]
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Disables seeding.
    #[must_use]
    pub fn no_seed(mut self) -> Self {
        self.seed = false;
        self
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Lifetime of a session in seconds, counted from its creation.
    pub max_age: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "crudql.sid".to_string(),
            max_age: 24 * 60 * 60,
        }
    }
}

/// Where to write generated type information at startup. Unset paths are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypegenConfig {
    pub sdl: Option<PathBuf>,
    pub typescript: Option<PathBuf>,
}

impl TypegenConfig {
    pub fn is_empty(&self) -> bool {
        self.sdl.is_none() && self.typescript.is_none()
    }
}

// RFC 6265 token characters.
fn is_cookie_name_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}
