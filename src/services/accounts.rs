use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password};
use crate::config::SecurityConfig;
use crate::database::models::{NewUser, User};
use crate::database::store::Store;
use crate::services::error::CafeError;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct AccountService {
    store: Arc<dyn Store>,
    security: SecurityConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<Session, CafeError> {
        let email = request.email.trim().to_lowercase();
        let username = request.username.trim().to_string();
        self.validate_signup(&username, &email, &request.password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(CafeError::Conflict(format!("User with email {} already exists", email)));
        }

        let password_hash = hash_password(&request.password)?;
        // The unique index still guards against a concurrent signup slipping past the check
        let user = self
            .store
            .insert_user(NewUser {
                email,
                username,
                password_hash,
            })
            .await?;

        info!("Registered user {} ({})", user.id, user.email);
        self.session_for(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Session, CafeError> {
        let email = request.email.trim().to_lowercase();

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            warn!("Login attempt for unknown email {}", email);
            return Err(CafeError::Unauthorized("Invalid credentials".to_string()));
        };

        if let Err(err) = verify_password(&request.password, &user.password_hash) {
            warn!("Failed login for user {}", user.id);
            return Err(err.into());
        }

        info!("User {} logged in", user.id);
        self.session_for(&user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, CafeError> {
        Ok(self.store.list_users().await?)
    }

    fn session_for(&self, user: &User) -> Result<Session, CafeError> {
        let token = issue_token(user.id, &user.email, &self.security)?;
        Ok(Session {
            user_id: user.id,
            email: user.email.clone(),
            token,
        })
    }

    fn validate_signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), CafeError> {
        if username.is_empty() {
            return Err(CafeError::ValidationFailure("username must not be empty".to_string()));
        }

        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
            .unwrap_or(false);
        if !well_formed {
            return Err(CafeError::ValidationFailure(format!("'{}' is not a valid email", email)));
        }

        if password.chars().count() < self.security.min_password_length {
            return Err(CafeError::ValidationFailure(format!(
                "password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        Ok(())
    }
}
