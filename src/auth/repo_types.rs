use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::PasswordHashing;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Registration input after normalisation, password still in plaintext.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// A user ready to persist: the plaintext is gone.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

impl NewUser {
    /// Replace the plaintext password with its salted hash.
    pub fn with_hashed_password(self, hashing: &PasswordHashing) -> anyhow::Result<UserDraft> {
        let password_hash = hashing.hash(&self.password)?;
        Ok(UserDraft {
            email: self.email,
            name: self.name,
            password_hash,
        })
    }
}
