use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Owned set: ids of cafés whose `creator` is this user
    pub cafes: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn into_user(self, id: Uuid) -> User {
        User {
            id,
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            cafes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_secret_is_never_serialized() {
        let user = NewUser {
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        }
        .into_user(Uuid::new_v4());

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["cafes"], serde_json::json!([]));
    }
}
