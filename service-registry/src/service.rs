use crate::types::{ServiceRequest, ServiceResponse};
use async_trait::async_trait;

/// A named backend routable through the [`ServiceRegistry`](crate::ServiceRegistry).
///
/// Services hold no per-request state; credentials come either from the
/// request itself or from the shared token store.
///
/// # Contract
/// - `name()` is stable and is the registry key.
/// - `available_methods()` advertises what `handle` understands. The registry
///   uses it for listings only; rejecting unknown methods is the service's job.
/// - `handle()` never fails outward: every failure path ends in a
///   `ServiceResponse` with `success == false`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use service_registry::{Service, ServiceError, ServiceRequest, ServiceResponse};
/// use serde_json::json;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Service for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn available_methods(&self) -> Vec<String> {
///         vec!["say".to_string()]
///     }
///
///     async fn handle(&self, request: ServiceRequest) -> ServiceResponse {
///         match request.method.as_str() {
///             "say" => ServiceResponse::ok(json!(request.parameters)),
///             other => ServiceResponse::failure(ServiceError::not_found(format!(
///                 "Unknown method: {}",
///                 other
///             ))),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync {
    /// Registry key, e.g. "linkedin".
    fn name(&self) -> &str;

    /// Method names `handle` dispatches on.
    fn available_methods(&self) -> Vec<String>;

    /// Runs one request to completion.
    async fn handle(&self, request: ServiceRequest) -> ServiceResponse;
}
