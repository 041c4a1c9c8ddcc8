//! API key authentication.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use parking_lot::RwLock;

const BEARER_PREFIX: &str = "Bearer ";

/// Accepted bearer keys. Authentication is off while the set is empty.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    keys: RwLock<HashSet<String>>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `keys`; empty strings are ignored.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            store.add_key(key);
        }
        store
    }

    pub fn add_key(&self, key: impl Into<String>) {
        let key = key.into();
        if !key.is_empty() {
            self.keys.write().insert(key);
        }
    }

    pub fn remove_key(&self, key: &str) -> bool {
        self.keys.write().remove(key)
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys.read().contains(key)
    }

    pub fn count(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether requests must carry a key.
    pub fn is_enabled(&self) -> bool {
        self.count() > 0
    }

    /// Extract the key from an `Authorization` header value.
    pub fn extract_key(header_value: &str) -> Option<&str> {
        header_value.strip_prefix(BEARER_PREFIX).map(str::trim)
    }
}

/// Authentication middleware for axum.
///
/// `/health` is always reachable.
pub async fn auth_middleware(
    State(store): State<Arc<ApiKeyStore>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !store.is_enabled() || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ApiKeyStore::extract_key)
        .is_some_and(|key| store.is_valid(key));

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "rejected unauthenticated request");
        Err(StatusCode::UNAUTHORIZED)
    }
}
