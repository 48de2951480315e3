pub mod accounts;
pub mod error;
pub mod geocoder;
pub mod ownership;
pub mod retry;

pub use accounts::{AccountService, LoginRequest, Session, SignupRequest};
pub use error::CafeError;
pub use geocoder::{GeocodeError, Geocoder, LocationIqGeocoder, StaticGeocoder};
pub use ownership::{validate_listing, OwnershipManager};
pub use retry::RetryPolicy;
