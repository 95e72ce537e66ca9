use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Parameter bag carried by a [`ServiceRequest`].
pub type Parameters = Map<String, Value>;

/// A single invocation of a named service method.
///
/// Built per call by a transport; never persisted.
///
/// # Example
/// ```
/// use service_registry::ServiceRequest;
/// use serde_json::json;
///
/// let request = ServiceRequest::new("linkedin", "get_profile")
///     .with_param("user_id", json!("alice"));
/// assert_eq!(request.param_str("user_id"), Some("alice"));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service_name: String,
    pub method: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ServiceRequest {
    pub fn new(service_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method: method.into(),
            parameters: Parameters::new(),
        }
    }

    /// Adds a parameter. `null` values are dropped so that optional transport
    /// fields behave like absent ones.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        if !value.is_null() {
            self.parameters.insert(key.into(), value);
        }
        self
    }

    pub fn with_params(mut self, parameters: Parameters) -> Self {
        for (key, value) in parameters {
            self = self.with_param(key, value);
        }
        self
    }

    /// String parameter, treating `null` and non-strings as absent.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// String parameter that is present and not blank.
    pub fn param_non_empty(&self, key: &str) -> Option<&str> {
        self.param_str(key).filter(|s| !s.trim().is_empty())
    }

    /// Unsigned parameter; numeric strings are accepted since query-string
    /// transports cannot carry typed numbers.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.parameters.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Failure categories a transport can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown service or method
    NotFound,
    /// No usable credential, inline or stored
    Unauthenticated,
    /// The provider refused the call for lack of a granted scope
    PermissionDenied,
    /// Missing or malformed input, rejected before any remote call
    Validation,
    /// Network failure or unclassified non-2xx provider response
    Remote,
    /// Token store unreachable or write failure
    Storage,
    /// The gateway itself is missing required settings
    Configuration,
    /// A defect inside a service
    Internal,
}

/// Error produced by a service operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Wraps a token store failure, keeping its full cause chain.
    pub fn storage(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Storage, format!("Token store error: {:#}", err))
    }
}

/// Outcome of a service operation before it is flattened for the wire.
pub type ServiceResult = Result<Value, ServiceError>;

/// Uniform response returned for every request.
///
/// `data` is present iff `success`; `error` and `error_kind` are present iff
/// not. `scope_issue` is set when the provider rejected the call for a
/// missing permission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scope_issue: bool,
}

impl ServiceResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            scope_issue: false,
        }
    }

    pub fn failure(err: ServiceError) -> Self {
        Self {
            success: false,
            data: None,
            scope_issue: err.kind == ErrorKind::PermissionDenied,
            error_kind: Some(err.kind),
            error: Some(err.message),
        }
    }

    /// Reconstructs the typed outcome, e.g. for transports that prefer `?`.
    pub fn into_result(self) -> ServiceResult {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(ServiceError::new(
                self.error_kind.unwrap_or(ErrorKind::Internal),
                self.error.unwrap_or_default(),
            ))
        }
    }
}

impl From<ServiceResult> for ServiceResponse {
    fn from(result: ServiceResult) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(err),
        }
    }
}
