//! API router configuration.

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, ApiKeyStore};
use super::handlers::{
    api_info, connection_status, connection_test, disconnect, execute, health, list_operations,
    run_operation, validate, AppState,
};
use crate::error::GatewayError;

/// Create the API router.
pub fn create_router(state: AppState, keys: Arc<ApiKeyStore>) -> Router {
    let api_v1 = Router::new()
        .route("/execute", post(execute))
        .route("/validate", post(validate))
        .route("/connection", get(connection_status).delete(disconnect))
        .route("/connection/test", post(connection_test))
        .route("/ops", get(list_operations))
        .route("/ops/{name}", post(run_operation));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1", get(api_info))
        .nest("/api/v1", api_v1)
        .layer(middleware::from_fn_with_state(keys, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: &str, router: Router, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting openwrt-gate API server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(GatewayError::Io)
}
