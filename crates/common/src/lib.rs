//! Common utilities shared across identity-gateway components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for identity-provider claims and authorization facts
pub mod claims;

/// Module for the IdP token-endpoint client (code exchange, refresh rotation)
pub mod token_client;
