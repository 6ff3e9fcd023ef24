//! HKP key lookup.
//!
//! The lookup handler is the first component to register routes, ahead of
//! the webroot. It serves `GET /pks/lookup`:
//!
//! | `op`    | Response                                       |
//! |---------|------------------------------------------------|
//! | `get`   | stored key for `search`, `application/pgp-keys` |
//! | `stats` | JSON status snapshot                           |
//! | other   | `501 Not Implemented`                          |

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json,
};
use serde::Deserialize;

use crate::routing::{RouteError, RouteTable};
use crate::stats::StatsAggregator;
use crate::storage::{KeyStore, StoreError};

/// Owner name recorded for HKP routes.
pub const HKP_OWNER: &str = "hkp";

pub const LOOKUP_PATH: &str = "/pks/lookup";

const PGP_KEYS: &str = "application/pgp-keys";

/// A component that contributes the key-lookup routes.
pub trait KeyLookup: Send + Sync {
    fn register(&self, routes: &mut RouteTable, stats: StatsAggregator) -> Result<(), RouteError>;
}

/// Lookup handler backed by a [`KeyStore`].
#[derive(Clone)]
pub struct LookupHandler {
    store: Arc<dyn KeyStore>,
}

impl LookupHandler {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }
}

#[derive(Clone)]
struct LookupState {
    store: Arc<dyn KeyStore>,
    stats: StatsAggregator,
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    op: String,
    search: Option<String>,
}

impl KeyLookup for LookupHandler {
    fn register(&self, routes: &mut RouteTable, stats: StatsAggregator) -> Result<(), RouteError> {
        let state = LookupState {
            store: Arc::clone(&self.store),
            stats,
        };
        routes.register(HKP_OWNER, LOOKUP_PATH, get(lookup).with_state(state))
    }
}

async fn lookup(State(state): State<LookupState>, Query(params): Query<LookupParams>) -> Response {
    match params.op.as_str() {
        "get" => get_key(state.store, params.search).await,
        "stats" => Json(state.stats.snapshot()).into_response(),
        other => (
            StatusCode::NOT_IMPLEMENTED,
            format!("operation {other:?} not implemented\n"),
        )
            .into_response(),
    }
}

async fn get_key(store: Arc<dyn KeyStore>, search: Option<String>) -> Response {
    let Some(search) = search.filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing search parameter\n").into_response();
    };
    let id = search
        .strip_prefix("0x")
        .or_else(|| search.strip_prefix("0X"))
        .unwrap_or(&search)
        .to_ascii_lowercase();

    match tokio::task::spawn_blocking(move || store.fetch_key(&id)).await {
        Ok(Ok(key)) => ([(header::CONTENT_TYPE, PGP_KEYS)], key.packets).into_response(),
        Ok(Err(StoreError::NotFound(_))) => (StatusCode::NOT_FOUND, "key not found\n").into_response(),
        Ok(Err(StoreError::InvalidId(_))) => {
            (StatusCode::BAD_REQUEST, "invalid search\n").into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Key lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Key lookup task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
