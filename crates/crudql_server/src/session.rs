//! Cookie-backed sessions.
//!
//! Session data lives in a process-wide [`SessionStore`] keyed by an opaque id
//! carried in a cookie. Requests only see a [`Session`] snapshot taken when
//! they arrive. Sessions expire `max_age` after they start; expired entries
//! are dropped whenever a new session is started.

use crate::config::SessionConfig;
use crudql_runtime::Session;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

/// The session resolved for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    pub session: Session,
    /// `Set-Cookie` value to send back when the session is new.
    pub set_cookie: Option<String>,
}

#[derive(Debug)]
struct Entry {
    data: Map<String, Value>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Sessions {
    by_id: FxHashMap<String, Entry>,
    /// Ids in creation order. Every session lives equally long, so this is
    /// also expiry order.
    expiry: VecDeque<(Instant, String)>,
}

impl Sessions {
    fn prune(&mut self, now: Instant) -> usize {
        let mut pruned = 0;
        while self.expiry.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, id)) = self.expiry.pop_front() {
                pruned += usize::from(self.by_id.remove(&id).is_some());
            }
        }
        pruned
    }
}

/// Process-wide session storage.
#[derive(Debug)]
pub struct SessionStore {
    cookie_name: String,
    max_age: Duration,
    sessions: RwLock<Sessions>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            max_age: Duration::from_secs(config.max_age),
            sessions: RwLock::new(Sessions::default()),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolves the session named by a `Cookie` header, starting a new one
    /// when the header carries no live id.
    pub async fn resolve(&self, cookie_header: Option<&str>) -> ResolvedSession {
        self.resolve_at(cookie_header, Instant::now()).await
    }

    async fn resolve_at(&self, cookie_header: Option<&str>, now: Instant) -> ResolvedSession {
        let id = cookie_header.and_then(|header| parse_cookie(header, &self.cookie_name));

        if let Some(id) = id {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.by_id.get(id).filter(|e| e.expires_at > now) {
                trace!(session = id, "session resumed");
                return ResolvedSession {
                    session: Session::new(id, entry.data.clone()),
                    set_cookie: None,
                };
            }
        }

        let id = Uuid::new_v4().to_string();
        let expires_at = now + self.max_age;
        let mut sessions = self.sessions.write().await;
        let pruned = sessions.prune(now);
        if pruned > 0 {
            trace!(pruned, "expired sessions dropped");
        }
        sessions.by_id.insert(
            id.clone(),
            Entry {
                data: Map::new(),
                expires_at,
            },
        );
        sessions.expiry.push_back((expires_at, id.clone()));
        trace!(session = %id, "session started");

        ResolvedSession {
            set_cookie: Some(set_cookie(&self.cookie_name, &id, self.max_age)),
            session: Session::new(id, Map::new()),
        }
    }

    #[cfg(test)]
    async fn set(&self, id: &str, key: &str, value: Value) -> bool {
        match self.sessions.write().await.by_id.get_mut(id) {
            Some(entry) => {
                entry.data.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Number of stored sessions, expired ones not yet dropped included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.by_id.is_empty()
    }
}

/// Finds a cookie value in a `Cookie` header.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Builds the `Set-Cookie` value for a new session.
pub fn set_cookie(name: &str, id: &str, max_age: Duration) -> String {
    format!(
        "{name}={id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        max_age.as_secs()
    )
}
