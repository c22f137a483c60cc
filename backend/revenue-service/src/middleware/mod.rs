/// HTTP middleware for revenue-service
pub mod jwt_auth;

pub use jwt_auth::{Claims, JwtAuthMiddleware, UserId};
