//! Storage seam for cafés and users.
//!
//! Reads go straight through [`Store`]. Every write that touches more than one
//! document runs inside a [`StoreTransaction`], which either commits as a whole
//! or leaves nothing behind. A transaction dropped without `commit` is rolled
//! back by the backend.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Cafe, CafeFilter, CafeUpdate, NewUser, User};

/// Errors surfaced by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated (e.g. email already registered)
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Concurrent writers collided; the transaction was aborted and may be retried
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when retrying the whole transaction unchanged may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction scope. Writes made through it are invisible to every
    /// other reader until `commit` returns.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn find_cafe(&self, id: Uuid) -> Result<Option<Cafe>, StoreError>;

    async fn find_cafes(&self, filter: &CafeFilter) -> Result<Vec<Cafe>, StoreError>;

    /// Cafés in the owner's owned set, or `None` when the owner does not exist
    async fn find_cafes_by_owner(&self, owner_id: Uuid) -> Result<Option<Vec<Cafe>>, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Insert a user with an empty owned set. Fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// One open transaction scope.
///
/// `lock_*` reads take a write lock on the row for the rest of the scope, so
/// checks made on the returned value still hold at commit time.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn lock_cafe(&mut self, id: Uuid) -> Result<Option<Cafe>, StoreError>;

    async fn insert_cafe(&mut self, cafe: &Cafe) -> Result<(), StoreError>;

    /// Append `cafe_id` to the owner's owned set
    async fn link_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError>;

    /// Remove `cafe_id` from the owner's owned set
    async fn unlink_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError>;

    async fn delete_cafe(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Append one sample to the end of the café's rating sequence
    async fn push_rating(&mut self, id: Uuid, rating: f64) -> Result<Cafe, StoreError>;

    async fn update_cafe(&mut self, id: Uuid, update: &CafeUpdate) -> Result<Cafe, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
