use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::models::{Cafe, CafeFilter, CafeUpdate, NewUser, User};
use crate::database::store::{Store, StoreError, StoreTransaction};

/// Named steps at which a [`MemoryStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    LockUser,
    LockCafe,
    InsertCafe,
    LinkOwner,
    UnlinkOwner,
    DeleteCafe,
    PushRating,
    UpdateCafe,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    cafes: Vec<Cafe>,
    users: Vec<User>,
}

impl MemoryState {
    fn cafe(&self, id: Uuid) -> Option<&Cafe> {
        self.cafes.iter().find(|c| c.id == id)
    }

    fn cafe_mut(&mut self, id: Uuid) -> Result<&mut Cafe, StoreError> {
        self.cafes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("cafe {}", id)))
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }
}

type Faults = Arc<std::sync::Mutex<HashMap<FaultPoint, usize>>>;

fn trip(faults: &Faults, point: FaultPoint) -> Result<(), StoreError> {
    let mut faults = faults.lock().unwrap_or_else(PoisonError::into_inner);
    match faults.get_mut(&point) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            Err(StoreError::Conflict(format!("injected fault at {:?}", point)))
        }
        _ => Ok(()),
    }
}

/// In-process store.
///
/// A transaction holds the state lock for its whole lifetime and mutates a
/// staged copy; commit swaps the copy in. Transactions are therefore fully
/// serialized and readers only ever see committed state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Faults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` visits to `point` fail with a retryable conflict
    pub fn inject_fault(&self, point: FaultPoint, times: usize) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point, times);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub async fn all_cafes(&self) -> Vec<Cafe> {
        self.state.lock().await.cafes.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        trip(&self.faults, FaultPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn find_cafe(&self, id: Uuid) -> Result<Option<Cafe>, StoreError> {
        Ok(self.state.lock().await.cafe(id).cloned())
    }

    async fn find_cafes(&self, filter: &CafeFilter) -> Result<Vec<Cafe>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.cafes.iter().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn find_cafes_by_owner(&self, owner_id: Uuid) -> Result<Option<Vec<Cafe>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.user(owner_id).map(|user| {
            user.cafes
                .iter()
                .filter_map(|id| state.cafe(*id).cloned())
                .collect()
        }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.user(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state.lock().await.users.clone())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        let user = user.into_user(Uuid::new_v4());
        state.users.push(user.clone());
        Ok(user)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    faults: Faults,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        trip(&self.faults, FaultPoint::LockUser)?;
        Ok(self.staged.user(id).cloned())
    }

    async fn lock_cafe(&mut self, id: Uuid) -> Result<Option<Cafe>, StoreError> {
        trip(&self.faults, FaultPoint::LockCafe)?;
        Ok(self.staged.cafe(id).cloned())
    }

    async fn insert_cafe(&mut self, cafe: &Cafe) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::InsertCafe)?;
        if self.staged.cafe(cafe.id).is_some() {
            return Err(StoreError::Duplicate(format!("cafe {}", cafe.id)));
        }
        if self.staged.user(cafe.creator).is_none() {
            return Err(StoreError::NotFound(format!("user {}", cafe.creator)));
        }
        self.staged.cafes.push(cafe.clone());
        Ok(())
    }

    async fn link_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::LinkOwner)?;
        self.staged.user_mut(owner_id)?.cafes.push(cafe_id);
        Ok(())
    }

    async fn unlink_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::UnlinkOwner)?;
        self.staged.user_mut(owner_id)?.cafes.retain(|id| *id != cafe_id);
        Ok(())
    }

    async fn delete_cafe(&mut self, id: Uuid) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::DeleteCafe)?;
        let before = self.staged.cafes.len();
        self.staged.cafes.retain(|c| c.id != id);
        if self.staged.cafes.len() == before {
            return Err(StoreError::NotFound(format!("cafe {}", id)));
        }
        Ok(())
    }

    async fn push_rating(&mut self, id: Uuid, rating: f64) -> Result<Cafe, StoreError> {
        trip(&self.faults, FaultPoint::PushRating)?;
        let cafe = self.staged.cafe_mut(id)?;
        cafe.overall_rating.push(rating);
        Ok(cafe.clone())
    }

    async fn update_cafe(&mut self, id: Uuid, update: &CafeUpdate) -> Result<Cafe, StoreError> {
        trip(&self.faults, FaultPoint::UpdateCafe)?;
        let cafe = self.staged.cafe_mut(id)?;
        update.apply_to(cafe);
        Ok(cafe.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        trip(&self.faults, FaultPoint::Commit)?;
        let MemoryTransaction { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged copy is discarded with the guard
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Location, NewCafe};
    use std::time::Duration;

    async fn seed_user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser {
                email: email.to_string(),
                username: email.split('@').next().unwrap_or(email).to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn cafe_for(owner: Uuid) -> Cafe {
        NewCafe {
            name: "Grounds".to_string(),
            address: "2 Side St".to_string(),
            city: "Lisbon".to_string(),
            location: Location { lat: 38.7, lng: -9.1 },
            num_of_seats: 8,
            coffee_rating: "good".to_string(),
            socket_availability: "few".to_string(),
            wifi_strength: "ok".to_string(),
            overall_rating: vec![],
        }
        .into_cafe(Uuid::new_v4(), owner)
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = MemoryStore::new();
        seed_user(&store, "a@example.com").await;

        let err = store
            .insert_user(NewUser {
                email: "a@example.com".to_string(),
                username: "other".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let cafe = cafe_for(user.id);

        let mut tx = store.begin().await.unwrap();
        tx.insert_cafe(&cafe).await.unwrap();
        tx.link_owned_cafe(user.id, cafe.id).await.unwrap();
        drop(tx);

        assert!(store.find_cafe(cafe.id).await.unwrap().is_none());
        assert!(store.find_user(user.id).await.unwrap().unwrap().cafes.is_empty());
    }

    #[tokio::test]
    async fn readers_wait_for_open_transaction() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let cafe = cafe_for(user.id);

        let mut tx = store.begin().await.unwrap();
        tx.insert_cafe(&cafe).await.unwrap();

        // A read issued mid-transaction cannot complete until the scope ends
        let reader = {
            let store = store.clone();
            let id = cafe.id;
            tokio::spawn(async move { store.find_cafe(id).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        tx.link_owned_cafe(user.id, cafe.id).await.unwrap();
        tx.commit().await.unwrap();

        let seen = reader.await.unwrap().unwrap();
        assert_eq!(seen.map(|c| c.id), Some(cafe.id));
    }

    #[tokio::test]
    async fn injected_fault_fires_requested_number_of_times() {
        let store = MemoryStore::new();
        store.inject_fault(FaultPoint::Begin, 2);

        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn owner_listing_follows_owned_set() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@example.com").await;
        let first = cafe_for(user.id);
        let second = cafe_for(user.id);

        let mut tx = store.begin().await.unwrap();
        for cafe in [&first, &second] {
            tx.insert_cafe(cafe).await.unwrap();
            tx.link_owned_cafe(user.id, cafe.id).await.unwrap();
        }
        tx.commit().await.unwrap();

        let owned = store.find_cafes_by_owner(user.id).await.unwrap().unwrap();
        assert_eq!(owned.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert!(store.find_cafes_by_owner(Uuid::new_v4()).await.unwrap().is_none());
    }
}
