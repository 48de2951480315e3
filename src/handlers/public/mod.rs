// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Café reads and the account endpoints used to obtain a token.

pub mod cafes;
pub mod users;

pub use cafes::*;
pub use users::*;
