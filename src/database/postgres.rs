use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{Cafe, CafeFilter, CafeUpdate, NewUser, User};
use crate::database::store::{Store, StoreError, StoreTransaction};

const CAFE_COLUMNS: &str = "id, name, address, city, lat, lng, num_of_seats, coffee_rating, \
     socket_availability, wifi_strength, overall_rating, creator";

const USER_COLUMNS: &str = "id, email, username, password_hash, cafes";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => {
                classify_sqlstate(db.code().as_deref(), db.message())
                    .unwrap_or_else(|| StoreError::Backend(err.to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Map the SQLSTATE codes the store cares about; anything else is a plain
/// backend error.
fn classify_sqlstate(code: Option<&str>, message: &str) -> Option<StoreError> {
    match code? {
        // serialization_failure, deadlock_detected
        "40001" | "40P01" => Some(StoreError::Conflict(message.to_string())),
        // unique_violation
        "23505" => Some(StoreError::Duplicate(message.to_string())),
        // foreign_key_violation
        "23503" => Some(StoreError::NotFound(message.to_string())),
        _ => None,
    }
}

/// PostgreSQL-backed store.
///
/// Owned sets live in `users.cafes` (uuid[]) next to `cafes.creator`, so both
/// halves of the relationship are written in the same transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_cafe(&self, id: Uuid) -> Result<Option<Cafe>, StoreError> {
        let sql = format!("SELECT {} FROM cafes WHERE id = $1", CAFE_COLUMNS);
        let cafe = sqlx::query_as::<_, Cafe>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cafe)
    }

    async fn find_cafes(&self, filter: &CafeFilter) -> Result<Vec<Cafe>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cafes \
             WHERE ($1::text IS NULL OR city = $1) AND ($2::uuid IS NULL OR creator = $2) \
             ORDER BY name, id",
            CAFE_COLUMNS
        );
        let cafes = sqlx::query_as::<_, Cafe>(&sql)
            .bind(filter.city.as_deref())
            .bind(filter.creator)
            .fetch_all(&self.pool)
            .await?;
        Ok(cafes)
    }

    async fn find_cafes_by_owner(&self, owner_id: Uuid) -> Result<Option<Vec<Cafe>>, StoreError> {
        let Some(owner) = self.find_user(owner_id).await? else {
            return Ok(None);
        };

        // Preserve owned-set order
        let sql = format!(
            "SELECT {} FROM cafes WHERE id = ANY($1) ORDER BY array_position($1, id)",
            CAFE_COLUMNS
        );
        let cafes = sqlx::query_as::<_, Cafe>(&sql)
            .bind(&owner.cafes)
            .fetch_all(&self.pool)
            .await?;
        Ok(Some(cafes))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY username, id", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, username, password_hash, cafes) \
             VALUES ($1, $2, $3, $4, '{{}}') RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn lock_cafe(&mut self, id: Uuid) -> Result<Option<Cafe>, StoreError> {
        let sql = format!("SELECT {} FROM cafes WHERE id = $1 FOR UPDATE", CAFE_COLUMNS);
        let cafe = sqlx::query_as::<_, Cafe>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(cafe)
    }

    async fn insert_cafe(&mut self, cafe: &Cafe) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cafes (id, name, address, city, lat, lng, num_of_seats, coffee_rating, \
             socket_availability, wifi_strength, overall_rating, creator) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(cafe.id)
        .bind(&cafe.name)
        .bind(&cafe.address)
        .bind(&cafe.city)
        .bind(cafe.location.lat)
        .bind(cafe.location.lng)
        .bind(cafe.num_of_seats)
        .bind(&cafe.coffee_rating)
        .bind(&cafe.socket_availability)
        .bind(&cafe.wifi_strength)
        .bind(&cafe.overall_rating)
        .bind(cafe.creator)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn link_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET cafes = array_append(cafes, $2) WHERE id = $1")
            .bind(owner_id)
            .bind(cafe_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", owner_id)));
        }
        Ok(())
    }

    async fn unlink_owned_cafe(&mut self, owner_id: Uuid, cafe_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET cafes = array_remove(cafes, $2) WHERE id = $1")
            .bind(owner_id)
            .bind(cafe_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", owner_id)));
        }
        Ok(())
    }

    async fn delete_cafe(&mut self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM cafes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("cafe {}", id)));
        }
        Ok(())
    }

    async fn push_rating(&mut self, id: Uuid, rating: f64) -> Result<Cafe, StoreError> {
        let sql = format!(
            "UPDATE cafes SET overall_rating = array_append(overall_rating, $2) \
             WHERE id = $1 RETURNING {}",
            CAFE_COLUMNS
        );
        sqlx::query_as::<_, Cafe>(&sql)
            .bind(id)
            .bind(rating)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("cafe {}", id)))
    }

    async fn update_cafe(&mut self, id: Uuid, update: &CafeUpdate) -> Result<Cafe, StoreError> {
        let sql = format!(
            "UPDATE cafes SET num_of_seats = $2, coffee_rating = $3, socket_availability = $4, \
             wifi_strength = $5 WHERE id = $1 RETURNING {}",
            CAFE_COLUMNS
        );
        sqlx::query_as::<_, Cafe>(&sql)
            .bind(id)
            .bind(update.num_of_seats)
            .bind(&update.coffee_rating)
            .bind(&update.socket_availability)
            .bind(&update.wifi_strength)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("cafe {}", id)))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
