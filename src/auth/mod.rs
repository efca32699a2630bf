//! Admin authentication: password hashing, JWT sessions and the request guard.

pub mod hashing;
pub mod jwt;
pub mod login_service;
pub mod middleware;
pub mod models;

pub use jwt::{Claims, JwtService};
pub use login_service::LoginService;
pub use models::{AdminContext, LoginRequest, LoginResponse, NewAdmin};
