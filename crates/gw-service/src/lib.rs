//! Identity Gateway service library
//!
//! The gateway brokers between browser clients and the external OIDC
//! identity provider: authorization-code exchange, refresh-token rotation
//! through a server-held cookie, and route-level access decisions derived
//! from verified token claims.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `cookies` - Refresh-token and login-state cookie codec
//! - `errors` - Error types and HTTP mapping
//! - `handlers` - HTTP request handlers (session orchestration, account)
//! - `middleware` - Token verification and route access policy
//! - `models` - Request/response data models
//! - `routes` - Router construction
//! - `services` - Reset-token bookkeeping and IdP directory collaborators

pub mod config;
pub mod cookies;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
