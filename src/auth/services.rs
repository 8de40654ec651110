use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::PasswordHashing,
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
    error::{AppError, AuthError, StoreError},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Credential store: registration, password login and identity lookup.
#[derive(Clone)]
pub struct Credentials {
    users: Arc<dyn UserRepo>,
    hashing: PasswordHashing,
}

impl FromRef<AppState> for Credentials {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.hashing.clone())
    }
}

impl Credentials {
    pub fn new(users: Arc<dyn UserRepo>, hashing: PasswordHashing) -> Self {
        Self { users, hashing }
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let name = name.trim();
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(AppError::validation("Email, password, and name are required"));
        }
        if !is_valid_email(&email) {
            return Err(AppError::validation("Invalid email"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "Password must be at least 6 characters long",
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(duplicate_email());
        }

        let draft = NewUser {
            email,
            name: name.to_string(),
            password: password.to_string(),
        }
        .with_hashed_password(&self.hashing)?;

        match self.users.insert(draft).await {
            Ok(user) => Ok(user),
            // lost the race against a concurrent registration
            Err(StoreError::Duplicate(_)) => Err(duplicate_email()),
            Err(e) => Err(e.into()),
        }
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hashing.verify_decoy(password);
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.hashing.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials.into());
        }

        debug!(user_id = %user.id, "credentials accepted");
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("User not found"))
    }
}

fn duplicate_email() -> AppError {
    AppError::conflict("User already exists with this email")
}
