//! Credential handling: password hashing and access tokens.
pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtKeys};
pub use password::{hash_password, verify_password};
