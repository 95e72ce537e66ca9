//! HTTP transport.
//!
//! Every route builds a [`ServiceRequest`] and hands it to
//! [`ServiceRegistry::dispatch`]; failures are rendered with a status picked
//! from their [`ErrorKind`].
//!
//! Routes:
//! - `GET /`, `GET /health`
//! - `GET /services`, `POST /services/:service/:method`
//! - `/linkedin/*` convenience routes over the LinkedIn service
//! - `POST /mcp` tool protocol (see [`crate::tool`])

use crate::registry::ServiceRegistry;
use crate::services::linkedin::config::{DEFAULT_USER_ID, SERVICE_NAME};
use crate::state::StateManager;
use crate::tool;
use crate::types::{ErrorKind, Parameters, ServiceError, ServiceRequest, ServiceResponse};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use linkgate::auth::optional_bearer_token;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub state_manager: StateManager,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_kind: ErrorKind,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    scope_issue: bool,
}

/// HTTP status for a failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Remote => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage | ErrorKind::Configuration | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug)]
struct AppError(ServiceError);

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError(err) = self;
        let body = ErrorBody {
            scope_issue: err.kind == ErrorKind::PermissionDenied,
            error_kind: err.kind,
            error: err.message,
        };
        (status_for(err.kind), Json(body)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/services", get(list_services))
        .route("/services/:service/:method", post(call_service_method))
        .route("/linkedin/auth", get(start_auth))
        .route("/linkedin/callback", get(oauth_callback))
        .route("/linkedin/auth-url", post(auth_url))
        .route("/linkedin/exchange-token", post(exchange_token))
        .route("/linkedin/profile", get(get_profile))
        .route("/linkedin/user-info", get(get_user_info))
        .route("/linkedin/connections", get(get_connections))
        .route("/linkedin/posts", get(get_posts).post(create_post))
        .route("/linkedin/certifications", get(get_certifications))
        .route("/linkedin/courses", get(get_courses))
        .route("/linkedin/experience", get(get_experience))
        .route("/linkedin/search-jobs", get(search_jobs))
        .route("/mcp", post(tool::handle_rpc))
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "LinkedIn gateway is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "server_type": "mcp" }))
}

async fn list_services(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "services": state.registry.list_names(),
        "methods": state.registry.all_methods(),
    }))
}

async fn call_service_method(
    State(state): State<Arc<AppState>>,
    Path((service, method)): Path<(String, String)>,
    body: Result<Json<Parameters>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let parameters = optional_json(body)?.unwrap_or_default();
    let request = ServiceRequest::new(service, method).with_params(parameters);
    respond(state.registry.dispatch(request).await)
}

/// A request without a JSON content type carries no body; a JSON body that
/// fails to parse is a validation error.
fn optional_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<Option<T>, AppError> {
    match body {
        Ok(Json(value)) => Ok(Some(value)),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(None),
        Err(rejection) => Err(AppError(ServiceError::validation(format!(
            "Invalid JSON body: {}",
            rejection.body_text()
        )))),
    }
}

fn respond(response: ServiceResponse) -> Result<Json<Value>, AppError> {
    response.into_result().map(Json).map_err(AppError)
}

async fn linkedin(
    state: &AppState,
    method: &str,
    parameters: Parameters,
) -> Result<Json<Value>, AppError> {
    let request = ServiceRequest::new(SERVICE_NAME, method).with_params(parameters);
    respond(state.registry.dispatch(request).await)
}

// ---------------------------------------------------------------------------
// Browser OAuth flow
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StartAuthQuery {
    scope: Option<String>,
    user_id: Option<String>,
}

/// GET /linkedin/auth
///
/// Mints a state bound to `user_id` and redirects to LinkedIn.
async fn start_auth(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StartAuthQuery>,
) -> Result<Redirect, AppError> {
    let user_id = query.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    let csrf_state = state.state_manager.create_state(&user_id);

    let mut parameters = Parameters::new();
    parameters.insert("state".into(), json!(csrf_state));
    if let Some(scope) = query.scope {
        parameters.insert("scope".into(), json!(scope));
    }

    let Json(data) = linkedin(&state, "start_auth_flow", parameters).await?;
    let redirect_url = data
        .get("redirect_url")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::internal("Authorization flow returned no redirect_url"))?;

    info!(user_id = %user_id, "Redirecting to LinkedIn authorization");
    Ok(Redirect::temporary(redirect_url))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /linkedin/callback
///
/// Consumes the state, exchanges the code for the bound user and renders a
/// confirmation page.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<CallbackQuery>,
) -> Result<Html<String>, AppError> {
    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "LinkedIn authorization failed");
        return Err(ServiceError::validation(format!(
            "LinkedIn OAuth error: {} - {}",
            error, description
        ))
        .into());
    }

    let code = callback
        .code
        .ok_or_else(|| ServiceError::validation("No authorization code received"))?;
    let csrf_state = callback
        .state
        .ok_or_else(|| ServiceError::validation("Missing 'state' parameter"))?;

    let pending = state
        .state_manager
        .validate_and_consume(&csrf_state)
        .ok_or_else(|| {
            warn!("Invalid or expired OAuth state");
            ServiceError::unauthenticated("Invalid or expired OAuth state")
        })?;
    debug!(user_id = %pending.user_id, "OAuth state validated");

    let mut parameters = Parameters::new();
    parameters.insert("code".into(), json!(code));
    parameters.insert("user_id".into(), json!(pending.user_id));

    let Json(data) = linkedin(&state, "exchange_code_for_token", parameters)
        .await
        .map_err(|AppError(err)| {
            ServiceError::new(err.kind, format!("Token exchange failed: {}", err.message))
        })?;

    Ok(Html(render_auth_complete(&data)))
}

fn render_auth_complete(data: &Value) -> String {
    let field = |key: &str, fallback: &str| {
        escape_html(data.get(key).and_then(Value::as_str).unwrap_or(fallback))
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>LinkedIn Authentication Complete</title>
    <style>
        body {{ font-family: Arial, sans-serif; text-align: center; padding: 50px; }}
        .success {{ color: green; font-size: 24px; margin-bottom: 20px; }}
        .details {{ background: #f5f5f5; padding: 20px; border-radius: 5px; max-width: 600px; margin: 0 auto; }}
    </style>
</head>
<body>
    <div class="success">LinkedIn Authentication Successful!</div>
    <div class="details">
        <p><strong>User ID:</strong> {}</p>
        <p><strong>Token Type:</strong> {}</p>
        <p><strong>Expires:</strong> {}</p>
        <p><strong>Scope:</strong> {}</p>
        <hr>
        <p>You can now close this window. Your LinkedIn token has been stored.</p>
    </div>
</body>
</html>"#,
        field("user_id", DEFAULT_USER_ID),
        field("token_type", "Bearer"),
        field("expires_at", "Not specified"),
        field("scope", "Not specified"),
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// JSON routes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AuthUrlBody {
    scope: Option<String>,
    state: Option<String>,
}

async fn auth_url(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AuthUrlBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let mut parameters = Parameters::new();
    if let Some(body) = optional_json(body)? {
        parameters.insert("scope".into(), json!(body.scope));
        parameters.insert("state".into(), json!(body.state));
    }
    linkedin(&state, "get_auth_url", parameters).await
}

#[derive(Deserialize)]
struct ExchangeBody {
    code: String,
    user_id: Option<String>,
}

async fn exchange_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeBody>,
) -> Result<Json<Value>, AppError> {
    let mut parameters = Parameters::new();
    parameters.insert("code".into(), json!(body.code));
    parameters.insert("user_id".into(), json!(body.user_id));
    linkedin(&state, "exchange_code_for_token", parameters).await
}

#[derive(Deserialize)]
struct CredentialQuery {
    user_id: Option<String>,
    access_token: Option<String>,
}

/// `user_id` plus the inline credential: the `access_token` query parameter,
/// else an `Authorization: Bearer` header.
fn credential_params(
    user_id: Option<String>,
    access_token: Option<String>,
    headers: &HeaderMap,
) -> Result<Parameters, AppError> {
    let access_token = match access_token {
        Some(token) => Some(token),
        None => optional_bearer_token(headers).map_err(|e| {
            ServiceError::unauthenticated(format!("Invalid authorization header: {}", e))
        })?,
    };

    let mut parameters = Parameters::new();
    parameters.insert("user_id".into(), json!(user_id));
    parameters.insert("access_token".into(), json!(access_token));
    Ok(parameters)
}

macro_rules! read_route {
    ($handler:ident, $method:literal) => {
        async fn $handler(
            State(state): State<Arc<AppState>>,
            Query(query): Query<CredentialQuery>,
            headers: HeaderMap,
        ) -> Result<Json<Value>, AppError> {
            let parameters = credential_params(query.user_id, query.access_token, &headers)?;
            linkedin(&state, $method, parameters).await
        }
    };
}

read_route!(get_profile, "get_profile");
read_route!(get_user_info, "get_user_info");
read_route!(get_connections, "get_connections");
read_route!(get_posts, "get_posts");
read_route!(get_certifications, "get_certifications");
read_route!(get_courses, "get_courses");
read_route!(get_experience, "get_experience");

#[derive(Deserialize)]
struct CreatePostBody {
    content: Option<String>,
    user_id: Option<String>,
    access_token: Option<String>,
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePostBody>,
) -> Result<Json<Value>, AppError> {
    let mut parameters = credential_params(body.user_id, body.access_token, &headers)?;
    parameters.insert("content".into(), json!(body.content));
    linkedin(&state, "create_post", parameters).await
}

#[derive(Deserialize)]
struct SearchJobsQuery {
    title: Option<String>,
    count: Option<u64>,
    location: Option<String>,
    company: Option<String>,
    user_id: Option<String>,
    access_token: Option<String>,
}

async fn search_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchJobsQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let mut parameters = credential_params(query.user_id, query.access_token, &headers)?;
    parameters.insert("title".into(), json!(query.title));
    parameters.insert("count".into(), json!(query.count));
    parameters.insert("location".into(), json!(query.location));
    parameters.insert("company".into(), json!(query.company));
    linkedin(&state, "search_jobs", parameters).await
}
