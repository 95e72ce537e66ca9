// Per-user OAuth credential persistence
pub mod credentials;

// TOML + environment configuration
pub mod config;

// Bearer credential extraction for HTTP transports
pub mod auth;
