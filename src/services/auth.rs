//! Credential store: registration, login, bearer-token resolution.
//!
//! Every login replaces the user's token wholesale, so a new login invalidates
//! all prior sessions for that account.

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use thiserror::Error;
use tokio::task;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::models::User;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Missing fields: username, email and password are required.")]
    MissingFields,

    #[error("Username must be at least {MIN_USERNAME_LEN} characters.")]
    UsernameTooShort,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters.")]
    PasswordTooShort,

    #[error("Invalid email.")]
    InvalidEmail,

    #[error("Username already exists!")]
    UsernameTaken,

    #[error("Email already in use!")]
    EmailTaken,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Missing fields: username and password are required.")]
    MissingFields,

    #[error("User not found!")]
    UserNotFound,

    #[error("Incorrect password!")]
    BadPassword,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result of a successful registration or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Store,
}

impl AuthService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Registers a new account.
    ///
    /// Validation runs in a fixed order: presence of all three fields, then
    /// username length, password length, email shape, and finally the two
    /// case-insensitive uniqueness checks. The uniqueness check and the insert
    /// happen under one store lock so concurrent registrations cannot race.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Session, RegisterError> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err(RegisterError::MissingFields);
        }
        if username.len() < MIN_USERNAME_LEN {
            return Err(RegisterError::UsernameTooShort);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(RegisterError::PasswordTooShort);
        }
        if !email.contains('@') {
            return Err(RegisterError::InvalidEmail);
        }

        // Hashing is CPU-heavy, so run it before taking the store lock and off
        // the async runtime.
        let password_hash = hash_password(password).await?;

        let mut store = self.store.lock().await;

        if store.user_by_username_ci(username).is_some() {
            return Err(RegisterError::UsernameTaken);
        }
        if store.user_by_email_ci(email).is_some() {
            return Err(RegisterError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            token: generate_token(),
            created_at: Utc::now(),
            last_login: None,
        };

        let session = Session {
            token: user.token.clone(),
            username: user.username.clone(),
            user_id: user.id.clone(),
        };

        store.users.push(user);
        store
            .persist_users()
            .await
            .context("Failed to save new user")?;

        info!("Registered new user: {username}");
        Ok(session)
    }

    /// Verifies credentials and issues a fresh token, invalidating any prior
    /// session for the account.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        let username = username.trim();

        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingFields);
        }

        // Verification is CPU-heavy, so clone the hash out and release the
        // store guard while it runs; only the token rotation needs the lock.
        let stored_hash = {
            let store = self.store.lock().await;
            store
                .user_by_username_ci(username)
                .map(|u| u.password_hash.clone())
                .ok_or(LoginError::UserNotFound)?
        };

        if !verify_password(password, stored_hash).await? {
            return Err(LoginError::BadPassword);
        }

        let token = generate_token();
        let mut store = self.store.lock().await;
        let user = store
            .users
            .iter_mut()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .ok_or(LoginError::UserNotFound)?;

        user.token = token.clone();
        user.last_login = Some(Utc::now());

        let session = Session {
            token,
            username: user.username.clone(),
            user_id: user.id.clone(),
        };

        store
            .persist_users()
            .await
            .context("Failed to save session token")?;

        info!("User logged in: {}", session.username);
        Ok(session)
    }

    /// Resolves a bearer token to its user. An empty token never resolves.
    pub async fn resolve_token(&self, token: &str) -> Option<User> {
        let store = self.store.lock().await;
        store.user_by_token(token).cloned()
    }
}

async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Password hashing task panicked")?
}

async fn verify_password(password: &str, stored_hash: String) -> Result<bool> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("Password verification task panicked")?
}

/// Generate a random bearer token (64 character hex string).
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
