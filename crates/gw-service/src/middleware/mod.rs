//! Request-path middleware: token verification and the route policy gate.

pub mod policy;
pub mod verifier;
