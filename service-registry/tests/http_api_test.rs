// Integration tests for the HTTP transport.
//
// The LinkedIn API and token endpoint are mockito servers; the token store is
// an in-memory SQLite database.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use linkgate::config::LinkedInConfig;
use linkgate::credentials::{CredentialStore, TokenStore};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use service_registry::api::{create_router, AppState};
use service_registry::services::linkedin::LinkedInService;
use service_registry::state::StateManager;
use service_registry::ServiceRegistry;
use std::sync::Arc;
use tower::ServiceExt;

// ── Test app ──────────────────────────────────────────────────────────────────

fn create_test_app(server: &ServerGuard) -> (Router, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::new(":memory:", &BASE64.encode([0u8; 32])).unwrap());
    let config = LinkedInConfig {
        client_id: Some("client-abc".to_string()),
        client_secret: Some("secret-xyz".to_string()),
        api_base_url: server.url(),
        token_url: format!("{}/oauth/v2/accessToken", server.url()),
        ..LinkedInConfig::default()
    };

    let dyn_store: Arc<dyn TokenStore> = store.clone();
    let mut registry = ServiceRegistry::new();
    registry.register(Arc::new(LinkedInService::new(config, dyn_store).unwrap()));

    let router = create_router(AppState {
        registry: Arc::new(registry),
        state_manager: StateManager::new(600),
    });
    (router, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_and_health() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    assert!(body["version"].is_string());

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_services() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = get(&app, "/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"], json!(["linkedin"]));
    assert_eq!(body["methods"]["linkedin"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_generic_route_unknown_service_is_404() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = post_json(&app, "/services/nonexistent/anything", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Service 'nonexistent' not found");
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn test_generic_route_without_body() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let request = Request::builder()
        .method("POST")
        .uri("/services/linkedin/get_profile")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No valid stored token found. Please authenticate first.");
}

#[tokio::test]
async fn test_malformed_json_body_is_rejected() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    for uri in ["/services/linkedin/get_profile", "/linkedin/auth-url"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error_kind"], "validation");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }
}

#[tokio::test]
async fn test_auth_url_without_body_uses_defaults() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let request = Request::builder()
        .method("POST")
        .uri("/linkedin/auth-url")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    let body: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(body["auth_url"].as_str().unwrap().contains("state="));
}

#[tokio::test]
async fn test_generic_route_success_returns_data() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v2/userinfo")
        .with_status(200)
        .with_body(r#"{"sub": "abc123", "name": "Alice"}"#)
        .create_async()
        .await;
    let (app, _) = create_test_app(&server);

    let (status, body) = post_json(
        &app,
        "/services/linkedin/get_profile",
        json!({"access_token": "tok"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"sub": "abc123", "name": "Alice"}));
}

#[tokio::test]
async fn test_bearer_header_is_inline_credential() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/userinfo")
        .match_header("authorization", "Bearer header-token")
        .with_status(200)
        .with_body(r#"{"sub": "abc123"}"#)
        .create_async()
        .await;
    let (app, _) = create_test_app(&server);

    let request = Request::builder()
        .uri("/linkedin/profile")
        .header(header::AUTHORIZATION, "Bearer header-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_read_route_uses_stored_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/connections")
        .match_header("authorization", "Bearer stored-token")
        .with_status(200)
        .with_body(r#"{"elements": []}"#)
        .create_async()
        .await;
    let (app, store) = create_test_app(&server);
    store
        .store(
            "alice",
            &linkgate::credentials::TokenPayload {
                access_token: "stored-token".to_string(),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let (status, body) = get(&app, "/linkedin/connections?user_id=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["elements"], json!([]));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_permission_denied_is_403_with_scope_issue() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Regex(r"^/v2/me".to_string()))
        .with_status(403)
        .create_async()
        .await;
    let (app, _) = create_test_app(&server);

    let (status, body) = get(&app, "/linkedin/courses?access_token=tok").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["scope_issue"], true);
    assert_eq!(body["error_kind"], "permission_denied");
}

#[tokio::test]
async fn test_remote_failure_is_502() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v2/connections")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    let (app, _) = create_test_app(&server);

    let (status, body) = get(&app, "/linkedin/connections?access_token=tok").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_kind"], "remote");
}

#[tokio::test]
async fn test_create_post_validation_is_400() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = post_json(&app, "/linkedin/posts", json!({"content": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Post content cannot be empty");
}

#[tokio::test]
async fn test_auth_url_route() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = post_json(&app, "/linkedin/auth-url", json!({"state": "s-1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "s-1");
    assert!(body["auth_url"].as_str().unwrap().contains("state=s-1"));
}

#[tokio::test]
async fn test_browser_flow_binds_state_to_user() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", "/oauth/v2/accessToken")
        .with_status(200)
        .with_body(r#"{"access_token": "AQV-alice", "expires_in": 3600, "scope": "openid"}"#)
        .create_async()
        .await;
    let _userinfo = server
        .mock("GET", "/v2/userinfo")
        .with_status(200)
        .with_body(r#"{"sub": "abc123", "email": "alice@example.com"}"#)
        .create_async()
        .await;
    let (app, store) = create_test_app(&server);

    // Step 1: redirect to LinkedIn with a minted state.
    let request = Request::builder()
        .uri("/linkedin/auth?user_id=alice")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);

    let location = headers[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://www.linkedin.com/oauth/v2/authorization?"));
    let state = location
        .split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap()
        .to_string();

    // Step 2: LinkedIn redirects back; the token lands under the bound user.
    let uri = format!("/linkedin/callback?code=abc123&state={}", state);
    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("LinkedIn Authentication Successful"));
    assert!(page.contains("alice"));

    let record = store.get_valid("alice").unwrap().unwrap();
    assert_eq!(record.access_token, "AQV-alice");
    assert_eq!(record.email.as_deref(), Some("alice@example.com"));

    // Step 3: the state is single-use.
    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired OAuth state");
}

#[tokio::test]
async fn test_callback_error_parameters() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = get(
        &app,
        "/linkedin/callback?error=access_denied&error_description=User+cancelled",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "LinkedIn OAuth error: access_denied - User cancelled");

    let (status, body) = get(&app, "/linkedin/callback?state=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No authorization code received");
}

#[tokio::test]
async fn test_tool_protocol_over_http() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let (status, body) = post_json(
        &app,
        "/mcp",
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {
                "name": "linkedin_request",
                "arguments": {
                    "service_name": "linkedin",
                    "method": "get_profile",
                    "parameters": {"user_id": "bob"}
                }
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 7);
    assert_eq!(body["result"]["isError"], true);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("No valid stored token found"));

    // Notifications get no body.
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        ))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
