pub mod cafe;
pub mod user;

pub use cafe::{Cafe, CafeFilter, CafeUpdate, Location, NewCafe};
pub use user::{NewUser, User};
