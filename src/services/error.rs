use thiserror::Error;

use crate::auth::AuthError;
use crate::database::store::StoreError;
use crate::services::geocoder::GeocodeError;

/// Domain failures returned by the ownership manager and account service
#[derive(Debug, Error)]
pub enum CafeError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authenticated, but not the café's creator
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// The transaction could not commit; nothing was written and the call may be repeated
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(String),

    #[error("Geocoding failed: {0}")]
    GeocodeFailure(#[from] GeocodeError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Auth error: {0}")]
    Auth(#[source] AuthError),

    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl CafeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CafeError::TransientStoreFailure(_))
    }
}

impl From<StoreError> for CafeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => CafeError::NotFound(msg),
            StoreError::Duplicate(msg) => CafeError::Conflict(msg),
            err if err.is_transient() => CafeError::TransientStoreFailure(err.to_string()),
            other => CafeError::Store(other),
        }
    }
}

impl From<AuthError> for CafeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                CafeError::Unauthorized("Invalid credentials".to_string())
            }
            other => CafeError::Auth(other),
        }
    }
}
