//! Service layer of the LinkedIn gateway.
//!
//! Transports (HTTP routes, the tool protocol, scripts) build a
//! [`ServiceRequest`] and hand it to [`ServiceRegistry::dispatch`], which
//! routes it to a named [`Service`] and always answers with a
//! [`ServiceResponse`].
//!
//! # Architecture
//!
//! ```text
//!   HTTP routes      POST /mcp (JSON-RPC)
//!        ↓                  ↓
//! ┌─────────────────────────────────────────┐
//! │       ServiceRegistry                    │
//! │  - name → Arc<dyn Service>               │
//! │  - not-found and panic containment       │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       LinkedInService                    │
//! │  - typed method dispatch                 │
//! │  - inline or stored credential           │
//! └─────────────────────────────────────────┘
//!          ↓                    ↓
//!   LinkedIn REST API     TokenStore (linkgate)
//! ```
//!
//! # Core Types
//!
//! - [`Service`] - Trait every backend implements
//! - [`ServiceRegistry`] - Name-keyed routing table
//! - [`ServiceRequest`] / [`ServiceResponse`] - Uniform request and result
//! - [`ErrorKind`] - Failure category transports branch on

pub mod api;
pub mod registry;
pub mod service;
pub mod services;
pub mod state;
pub mod tool;
pub mod types;

pub use registry::ServiceRegistry;
pub use service::Service;
pub use types::{ErrorKind, Parameters, ServiceError, ServiceRequest, ServiceResponse, ServiceResult};
