//! Router Module Index
//!
//! Splits the routing table by access level. The guard is applied per module by
//! `create_router`, never per handler.

/// Routes reachable without a token.
pub mod public;

/// Routes behind the authentication guard. Handlers that act on a specific user
/// or photo additionally run the ownership check through their extractors.
pub mod authenticated;
