//! Admin authentication.
//!
//! A single administrator signs in with a username and a bcrypt-hashed
//! password taken from the environment. A successful login yields an HS256
//! JWT carried in an HTTP-only `access_token` cookie.

pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{AccessTokenClaims, JwtKeys};
pub use session::ACCESS_TOKEN_COOKIE;
