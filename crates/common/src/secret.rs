//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use them for all
//! sensitive values the gateway handles: the OAuth client secret, refresh
//! tokens extracted from cookies, and admin tokens for the IdP directory API.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` on a field of this type gets safe logging behavior for free, and
//! the inner value is zeroized on drop. Accessing the value requires an
//! explicit `expose_secret()` call at the site that genuinely needs it.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ClientCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = ClientCredentials {
//!     client_id: "identity-gateway".to_string(),
//!     client_secret: SecretString::from("hunter2"),
//! };
//!
//! // Debug output redacts the secret
//! assert!(!format!("{creds:?}").contains("hunter2"));
//!
//! // Explicit access only
//! let secret: &str = creds.client_secret.expose_secret();
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
