//! HTTP API over the gateway.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET /api/v1` - API information
//! - `POST /api/v1/execute` - Validate and run a command
//! - `POST /api/v1/validate` - Dry-run the command policy
//! - `GET /api/v1/connection` - Connection status
//! - `POST /api/v1/connection/test` - Connect and run a test echo
//! - `DELETE /api/v1/connection` - Disconnect
//! - `GET /api/v1/ops` - Operation catalog
//! - `POST /api/v1/ops/{name}` - Run a named operation
//!
//! When API keys are configured, every other route requires
//! `Authorization: Bearer <key>`.

pub mod auth;
pub mod handlers;
pub mod router;
pub mod types;

pub use auth::{auth_middleware, ApiKeyStore};
pub use handlers::AppState;
pub use router::{create_router, serve};
pub use types::{ErrorResponse, ExecuteRequest, ValidateRequest};
