// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer JWT). Handlers stay thin: they parse
// input, call a service, and wrap the result in the response envelope.

pub mod extract;
pub mod public;    // Tier 1: café reads, signup, login
pub mod protected; // Tier 2: café writes
