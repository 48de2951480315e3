// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Routed behind `jwt_auth_middleware`, which places an `AuthUser` in the
// request extensions before any handler here runs.

pub mod cafes;

pub use cafes::*;
