//! Authentication infrastructure module
//!
//! HS256 JWT issuance and validation for user sessions.

mod jwt;

pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService};
