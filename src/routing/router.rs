//! Route table construction.
//!
//! # Responsibilities
//! - Collect every route served by the HTTP listeners, in registration order
//! - Refuse a route that collides with one already registered
//! - Freeze into an axum `Router` once all owners have registered
//!
//! # Design Decisions
//! - Conflicts are a structured [`RouteError`], detected before axum sees the route
//! - Immutable after `into_router` (shared read-only by every listener)

use std::path::PathBuf;

use axum::routing::MethodRouter;
use thiserror::Error;

use crate::routing::matcher::RoutePattern;

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {pattern} registered by {owner} conflicts with {existing} registered by {existing_owner}")]
    Conflict {
        pattern: String,
        owner: String,
        existing: String,
        existing_owner: String,
    },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to read webroot {path:?}: {source}")]
    Webroot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One registered route.
pub struct RouteEntry {
    pattern: RoutePattern,
    owner: String,
    handler: MethodRouter,
}

impl RouteEntry {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Name of the component that registered the route.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern.as_str())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Conflict-checked set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `pattern` on behalf of `owner`.
    pub fn register(
        &mut self,
        owner: &str,
        pattern: &str,
        handler: MethodRouter,
    ) -> Result<(), RouteError> {
        let pattern = RoutePattern::parse(pattern)?;

        if let Some(existing) = self.entries.iter().find(|e| e.pattern.conflicts_with(&pattern)) {
            return Err(RouteError::Conflict {
                pattern: pattern.to_string(),
                owner: owner.to_string(),
                existing: existing.pattern.to_string(),
                existing_owner: existing.owner.clone(),
            });
        }

        tracing::debug!(pattern = %pattern, owner = %owner, "Route registered");
        self.entries.push(RouteEntry {
            pattern,
            owner: owner.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Routes registered by `owner`.
    pub fn count_owned_by(&self, owner: &str) -> usize {
        self.entries.iter().filter(|e| e.owner == owner).count()
    }

    /// Freeze the table into a router.
    ///
    /// A catch-all entry is also mounted at its parent path; the conflict
    /// check already treats that path as taken.
    pub fn into_router(self) -> axum::Router {
        self.entries
            .into_iter()
            .fold(axum::Router::new(), |router, entry| {
                let router = entry
                    .pattern
                    .subtree_aliases()
                    .iter()
                    .fold(router, |router, alias| router.route(alias, entry.handler.clone()));
                router.route(entry.pattern.as_str(), entry.handler)
            })
    }
}
