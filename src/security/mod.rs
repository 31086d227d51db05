// Security primitives: reconnection tokens and host access-token verification

pub mod host_auth;
pub mod tokens;

pub use host_auth::{HmacTokenVerifier, HostAccessClaims, HostTokenVerifier};
