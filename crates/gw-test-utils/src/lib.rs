//! Shared test utilities for gateway integration tests.
//!
//! Provides a server harness that runs the real gateway against a mock IdP,
//! plus builders for signed test tokens.

pub mod idp;
pub mod server_harness;
pub mod token_builders;

pub use idp::MockIdp;
pub use server_harness::TestGateway;
