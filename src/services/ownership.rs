//! Ownership consistency for cafés.
//!
//! A café's `creator` and the creator's owned set (`User::cafes`) must agree at
//! all times: `cafe.id ∈ user.cafes ⇔ cafe.creator == user.id`. Every write that
//! touches that relationship goes through [`OwnershipManager`], which runs it
//! inside one store transaction and retries the whole transaction on conflict.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{Cafe, CafeUpdate, NewCafe};
use crate::database::store::{Store, StoreTransaction};
use crate::services::error::CafeError;
use crate::services::retry::{retry_with_predicate, RetryPolicy};
use crate::types::Operation;

pub struct OwnershipManager {
    store: Arc<dyn Store>,
    retry: RetryPolicy,
}

impl OwnershipManager {
    pub fn new(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Persist a new café owned by `owner_id` and add it to the owner's owned set.
    ///
    /// The id is chosen once, up front, so a retried attempt writes the same row.
    pub async fn create(&self, owner_id: Uuid, fields: NewCafe) -> Result<Cafe, CafeError> {
        validate_new_cafe(&fields)?;
        let cafe = fields.into_cafe(Uuid::new_v4(), owner_id);
        let (store, cafe) = (&self.store, &cafe);

        let created = self
            .transactional(Operation::Create, move || async move {
                let mut tx = store.begin().await?;
                let outcome = create_steps(tx.as_mut(), cafe).await;
                finish(tx, outcome).await
            })
            .await?;

        info!("Created cafe {} for owner {}", created.id, owner_id);
        Ok(created)
    }

    /// Remove a café and its owned-set entry. Only the creator may delete.
    pub async fn delete(&self, cafe_id: Uuid, requester_id: Uuid) -> Result<(), CafeError> {
        let store = &self.store;
        self.transactional(Operation::Delete, move || async move {
            let mut tx = store.begin().await?;
            let outcome = delete_steps(tx.as_mut(), cafe_id, requester_id).await;
            finish(tx, outcome).await
        })
        .await?;

        info!("Deleted cafe {} owned by {}", cafe_id, requester_id);
        Ok(())
    }

    /// Append one rating sample. Any authenticated caller may rate any café.
    pub async fn append_rating(&self, cafe_id: Uuid, rating: f64) -> Result<Cafe, CafeError> {
        if !rating.is_finite() {
            return Err(CafeError::ValidationFailure(
                "overallRating must be a finite number".to_string(),
            ));
        }

        let store = &self.store;
        let cafe = self
            .transactional(Operation::Rate, move || async move {
                let mut tx = store.begin().await?;
                let outcome = rating_steps(tx.as_mut(), cafe_id, rating).await;
                finish(tx, outcome).await
            })
            .await?;

        info!(
            "Appended rating {} to cafe {} ({} samples)",
            rating,
            cafe_id,
            cafe.overall_rating.len()
        );
        Ok(cafe)
    }

    /// Owner-only update of the mutable amenity fields. The owned set is untouched.
    pub async fn update_attributes(
        &self,
        cafe_id: Uuid,
        requester_id: Uuid,
        fields: CafeUpdate,
    ) -> Result<Cafe, CafeError> {
        validate_update(&fields)?;
        let (store, fields) = (&self.store, &fields);

        let cafe = self
            .transactional(Operation::Update, move || async move {
                let mut tx = store.begin().await?;
                let outcome = update_steps(tx.as_mut(), cafe_id, requester_id, fields).await;
                finish(tx, outcome).await
            })
            .await?;

        info!("Updated cafe {}", cafe_id);
        Ok(cafe)
    }

    async fn transactional<F, Fut, T>(
        &self,
        operation: Operation,
        attempt: F,
    ) -> Result<T, CafeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CafeError>>,
    {
        retry_with_predicate(&self.retry, operation.as_str(), attempt, CafeError::is_transient)
            .await
    }
}

/// Commit on success, roll back on failure. The rollback happens before the
/// error is handed back so a retry never overlaps a half-finished attempt.
async fn finish<T>(
    tx: Box<dyn StoreTransaction>,
    outcome: Result<T, CafeError>,
) -> Result<T, CafeError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

async fn create_steps(tx: &mut dyn StoreTransaction, cafe: &Cafe) -> Result<Cafe, CafeError> {
    if tx.lock_user(cafe.creator).await?.is_none() {
        return Err(CafeError::NotFound(format!(
            "Could not find user for provided id {}",
            cafe.creator
        )));
    }

    tx.insert_cafe(cafe).await?;
    tx.link_owned_cafe(cafe.creator, cafe.id).await?;
    Ok(cafe.clone())
}

async fn delete_steps(
    tx: &mut dyn StoreTransaction,
    cafe_id: Uuid,
    requester_id: Uuid,
) -> Result<(), CafeError> {
    let cafe = tx
        .lock_cafe(cafe_id)
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Could not find cafe for id {}", cafe_id)))?;

    ensure_creator(&cafe, requester_id, "delete")?;

    // Lock the owner before touching either side of the relationship
    if tx.lock_user(cafe.creator).await?.is_none() {
        return Err(CafeError::NotFound(format!(
            "Owner {} of cafe {} does not exist",
            cafe.creator, cafe_id
        )));
    }

    tx.delete_cafe(cafe_id).await?;
    tx.unlink_owned_cafe(cafe.creator, cafe_id).await?;
    Ok(())
}

async fn rating_steps(
    tx: &mut dyn StoreTransaction,
    cafe_id: Uuid,
    rating: f64,
) -> Result<Cafe, CafeError> {
    if tx.lock_cafe(cafe_id).await?.is_none() {
        return Err(CafeError::NotFound(format!("Could not find cafe for id {}", cafe_id)));
    }
    Ok(tx.push_rating(cafe_id, rating).await?)
}

async fn update_steps(
    tx: &mut dyn StoreTransaction,
    cafe_id: Uuid,
    requester_id: Uuid,
    fields: &CafeUpdate,
) -> Result<Cafe, CafeError> {
    let cafe = tx
        .lock_cafe(cafe_id)
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Could not find cafe for id {}", cafe_id)))?;

    ensure_creator(&cafe, requester_id, "edit")?;
    Ok(tx.update_cafe(cafe_id, fields).await?)
}

fn ensure_creator(cafe: &Cafe, requester_id: Uuid, action: &str) -> Result<(), CafeError> {
    if cafe.creator != requester_id {
        warn!(
            "User {} attempted to {} cafe {} owned by {}",
            requester_id, action, cafe.id, cafe.creator
        );
        return Err(CafeError::Forbidden(format!("You are not allowed to {} this cafe", action)));
    }
    Ok(())
}

/// Field checks that need no external lookup. The create handler runs these
/// before geocoding so invalid input never reaches the provider.
pub fn validate_listing(
    texts: &[(&str, &str)],
    num_of_seats: i32,
    ratings: &[f64],
) -> Result<(), CafeError> {
    if let Some((field, _)) = texts.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(CafeError::ValidationFailure(format!("{} must not be empty", field)));
    }
    if num_of_seats < 0 {
        return Err(CafeError::ValidationFailure(
            "numOfSeats must not be negative".to_string(),
        ));
    }
    if ratings.iter().any(|r| !r.is_finite()) {
        return Err(CafeError::ValidationFailure(
            "overallRating must contain finite numbers".to_string(),
        ));
    }
    Ok(())
}

fn validate_new_cafe(fields: &NewCafe) -> Result<(), CafeError> {
    validate_listing(
        &[
            ("name", &fields.name),
            ("address", &fields.address),
            ("city", &fields.city),
            ("coffeeRating", &fields.coffee_rating),
            ("socketAvailability", &fields.socket_availability),
            ("wifiStrength", &fields.wifi_strength),
        ],
        fields.num_of_seats,
        &fields.overall_rating,
    )?;
    if !fields.location.lat.is_finite() || !fields.location.lng.is_finite() {
        return Err(CafeError::ValidationFailure("location must be resolved".to_string()));
    }
    Ok(())
}

fn validate_update(fields: &CafeUpdate) -> Result<(), CafeError> {
    validate_listing(
        &[
            ("coffeeRating", &fields.coffee_rating),
            ("socketAvailability", &fields.socket_availability),
            ("wifiStrength", &fields.wifi_strength),
        ],
        fields.num_of_seats,
        &[],
    )
}
