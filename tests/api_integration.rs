//! API integration tests.
//!
//! These tests drive the full router with axum's test utilities. The router
//! session is an in-process fake; no network is involved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use openwrt_gate::api::{create_router, ApiKeyStore, AppState};
use openwrt_gate::audit::AuditLog;
use openwrt_gate::session::{
    Connector, Credential, RemoteOutput, RemoteProcess, RemoteShell, Target,
};
use openwrt_gate::{Gateway, PolicyEngine, SessionManager};

struct EchoShell {
    closed: AtomicBool,
}

struct EchoProcess {
    command: String,
}

#[async_trait]
impl RemoteProcess for EchoProcess {
    async fn wait(&mut self) -> openwrt_gate::Result<RemoteOutput> {
        Ok(RemoteOutput {
            stdout: format!("ran: {}", self.command),
            stderr: String::new(),
            exit_status: Some(0),
        })
    }

    async fn abort(&mut self) {}
}

#[async_trait]
impl RemoteShell for EchoShell {
    async fn spawn(&self, command: &str) -> openwrt_gate::Result<Box<dyn RemoteProcess>> {
        Ok(Box::new(EchoProcess {
            command: command.to_string(),
        }))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> openwrt_gate::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct EchoConnector;

#[async_trait]
impl Connector for EchoConnector {
    async fn connect(&self, _target: &Target) -> openwrt_gate::Result<Arc<dyn RemoteShell>> {
        Ok(Arc::new(EchoShell {
            closed: AtomicBool::new(false),
        }))
    }
}

fn gateway() -> Arc<Gateway> {
    let audit = Arc::new(AuditLog::disabled());
    let target = Target::new("192.168.1.1", 22, "root", Credential::Password("pw".into()));
    let session = Arc::new(SessionManager::new(
        target,
        Arc::new(EchoConnector),
        Arc::clone(&audit),
    ));
    Arc::new(Gateway::new(
        PolicyEngine::new(true).unwrap(),
        session,
        audit,
        std::time::Duration::from_secs(5),
        1,
    ))
}

fn app() -> Router {
    create_router(AppState::new(gateway()), Arc::new(ApiKeyStore::new()))
}

fn app_with_key(key: &str) -> Router {
    create_router(AppState::new(gateway()), Arc::new(ApiKeyStore::from_keys([key])))
}

/// Helper to create a JSON request.
fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Helper to extract body as string.
async fn response_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Helper to extract JSON from response.
async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = app()
        .oneshot(json_request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "OK");
}

#[tokio::test]
async fn test_api_info_endpoint() {
    let response = app()
        .oneshot(json_request(Method::GET, "/api/v1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["name"], "openwrt-gate");
    assert_eq!(json["status"], "running");
}

// ============================================================================
// Execution Tests
// ============================================================================

#[tokio::test]
async fn test_execute_whitelisted_command() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/execute",
            Some(json!({"command": "uptime"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["output"], "ran: uptime");
    assert_eq!(json["error"], "");
    assert_eq!(json["exit_code"], 0);
    assert!(json["execution_time"].is_number());
}

#[tokio::test]
async fn test_execute_denied_command() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/execute",
            Some(json!({"command": "reboot"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = response_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("reboot"));
    assert!(json.get("output").is_none());
}

#[tokio::test]
async fn test_execute_empty_command() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/execute",
            Some(json!({"command": "   "})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "command must not be empty");
}

#[tokio::test]
async fn test_execute_zero_timeout() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/execute",
            Some(json!({"command": "uptime", "timeout_secs": 0})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["error"],
        "timeout must be positive"
    );
}

#[tokio::test]
async fn test_validate_endpoint() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/validate",
            Some(json!({"command": "echo hello"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["allowed"], false);
    assert_eq!(json["reason"], "not in whitelist");
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_connection_lifecycle() {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/connection", None))
        .await
        .unwrap();
    let json = response_json(response).await;
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["endpoint"], "root@192.168.1.1:22");
    assert_eq!(json["auth_method"], "password");

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/connection/test", None))
        .await
        .unwrap();
    let json = response_json(response).await;
    assert_eq!(json["connected"], true);
    assert_eq!(
        json["router_response"],
        "ran: echo 'Connection test successful'"
    );

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["state"], "connected");

    let response = app
        .clone()
        .oneshot(json_request(Method::DELETE, "/api/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(json_request(Method::GET, "/api/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["connected"], false);
}

// ============================================================================
// Operation Tests
// ============================================================================

#[tokio::test]
async fn test_operation_catalog() {
    let response = app()
        .oneshot(json_request(Method::GET, "/api/v1/ops", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    let names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"thread_create_network".to_string()));
    assert!(names.contains(&"opkg_list_available".to_string()));
}

#[tokio::test]
async fn test_run_operation_without_body() {
    let response = app()
        .oneshot(json_request(Method::POST, "/api/v1/ops/get_firewall_rules", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["operation"], "get_firewall_rules");
    assert_eq!(json["success"], true);
    assert_eq!(json["rules"], "ran: iptables -L -n -v");
}

#[tokio::test]
async fn test_run_operation_with_arguments() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/ops/read_config",
            Some(json!({"config_name": "wireless"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["config_name"], "wireless");
    assert_eq!(json["config"], "ran: uci show wireless");
}

#[tokio::test]
async fn test_unknown_operation() {
    let response = app()
        .oneshot(json_request(Method::POST, "/api/v1/ops/format_flash", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_operation_bad_arguments() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/ops/opkg_install",
            Some(json!({"package_name": "luci; reboot"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Invalid package name"));
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_auth_required_when_key_configured() {
    let response = app_with_key("secret")
        .oneshot(json_request(Method::GET, "/api/v1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_accepts_bearer_key() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();

    let response = app_with_key("secret").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();

    let response = app_with_key("secret").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_skips_auth() {
    let response = app_with_key("secret")
        .oneshot(json_request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn test_invalid_json_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/execute")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ invalid json }"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_method_not_allowed() {
    let response = app()
        .oneshot(json_request(Method::PUT, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_not_found_route() {
    let response = app()
        .oneshot(json_request(Method::GET, "/nonexistent", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
