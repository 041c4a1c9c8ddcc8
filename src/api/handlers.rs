//! REST API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{ErrorResponse, ExecuteRequest, ValidateRequest};
use crate::gateway::{CommandResponse, ConnectionTest, Gateway, GatewayStatus, Outcome};
use crate::ops::{
    Operation, OperationError, OperationInfo, OperationReport, OperationRunner, OPERATIONS,
};
use crate::policy::ValidationVerdict;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "openwrt-gate",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Validate and run one command.
///
/// Malformed requests answer 400 and policy denials 403; every other
/// outcome answers 200 with the structured result.
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> (StatusCode, Json<CommandResponse>) {
    let outcome = state.gateway.execute_request(req.into_command()).await;
    let status = match outcome {
        Outcome::Rejected { .. } => StatusCode::BAD_REQUEST,
        Outcome::Denied { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    };

    (status, Json(outcome.to_response()))
}

/// Dry-run the policy.
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidationVerdict> {
    Json(state.gateway.validate(&req.command))
}

/// Current connection status.
pub async fn connection_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    Json(state.gateway.status())
}

/// Connect if needed and run a test echo.
pub async fn connection_test(State(state): State<AppState>) -> Json<ConnectionTest> {
    Json(state.gateway.test_connection().await)
}

/// Close the router connection.
pub async fn disconnect(State(state): State<AppState>) -> StatusCode {
    state.gateway.shutdown().await;
    StatusCode::NO_CONTENT
}

/// List the operation catalog.
pub async fn list_operations() -> Json<&'static [OperationInfo]> {
    Json(OPERATIONS)
}

/// Run one named operation. The body is a JSON object of arguments and may
/// be empty.
///
/// Unknown operations answer 404 and bad arguments 400. Once started, the
/// report answers 200 whether or not the operation succeeded.
pub async fn run_operation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<OperationReport>, (StatusCode, Json<ErrorResponse>)> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(err.to_string())),
            )
        })?
    };

    let operation = Operation::parse(&name, args).map_err(|err| match err {
        OperationError::Unknown(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("NOT_FOUND", err.to_string())),
        ),
        OperationError::InvalidArguments { .. } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(err.to_string())),
        ),
    })?;

    Ok(Json(OperationRunner::new(&state.gateway).run(&operation).await))
}
