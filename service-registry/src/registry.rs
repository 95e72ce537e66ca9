//! Name-keyed service table and the single dispatch chokepoint.
//!
//! Every transport goes through [`ServiceRegistry::dispatch`]. A missing
//! service and a panicking service both come back as structured failures.

use crate::service::Service;
use crate::types::{ErrorKind, ServiceError, ServiceRequest, ServiceResponse};
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Registered services, keyed by [`Service::name`].
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a service, replacing any previous one with the same name.
    pub fn register(&mut self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        if self.services.insert(name.clone(), service).is_some() {
            warn!(service = %name, "Replaced previously registered service");
        } else {
            debug!(service = %name, "Registered service");
        }
    }

    /// Removes a service; unknown names are ignored.
    pub fn unregister(&mut self, name: &str) {
        if self.services.remove(name).is_some() {
            debug!(service = %name, "Unregistered service");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }

    /// Registered names, sorted for stable listings.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all_methods(&self) -> BTreeMap<String, Vec<String>> {
        self.services
            .iter()
            .map(|(name, service)| (name.clone(), service.available_methods()))
            .collect()
    }

    /// Routes a request to its service.
    ///
    /// A panic inside the service is caught here and reported as
    /// `Error in service '<name>': <message>`.
    pub async fn dispatch(&self, request: ServiceRequest) -> ServiceResponse {
        let service_name = request.service_name.clone();

        let Some(service) = self.get(&service_name) else {
            warn!(service = %service_name, method = %request.method, "Service not found");
            return ServiceResponse::failure(ServiceError::not_found(format!(
                "Service '{}' not found",
                service_name
            )));
        };

        let method = request.method.clone();
        debug!(service = %service_name, method = %method, "Dispatching request");

        match AssertUnwindSafe(service.handle(request)).catch_unwind().await {
            Ok(response) => {
                if !response.success {
                    debug!(
                        service = %service_name,
                        method = %method,
                        error_kind = ?response.error_kind,
                        "Service reported failure"
                    );
                }
                response
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    service = %service_name,
                    method = %method,
                    panic = %message,
                    "Service panicked while handling request"
                );
                ServiceResponse::failure(ServiceError::new(
                    ErrorKind::Internal,
                    format!("Error in service '{}': {}", service_name, message),
                ))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
