//! Request-level helpers shared by handlers.
//!
//! - **Client identity**: Peer address resolution with CIDR-based trusted
//!   proxy validation, used as the rate limiting key
//!
//! Request IDs and HTTP tracing come from `tower-http` layers configured in
//! [`crate::routes`].

pub mod ip;

pub use ip::{CidrRange, TrustedProxyConfig, UNKNOWN_IP, client_identifier, peer_addr};
