use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand_core::OsRng;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::AccountRow;
use shared::RegisterRequest;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Account already exists")]
    AccountAlreadyExists,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password hashing error")]
    HashingError,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Look up an account by username and check the submitted password against
/// the stored argon2 hash. An absent account and a wrong password are
/// distinct variants here; callers present both as one generic failure.
pub async fn verify_credentials(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<AccountRow, AuthError> {
    let account = AccountRow::find_by_username(pool, username)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let parsed_hash = PasswordHash::new(&account.password_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    Ok(account)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingError)?
        .to_string();

    Ok(password_hash)
}

pub async fn register_account(
    pool: &SqlitePool,
    request: &RegisterRequest,
) -> Result<shared::Account, AuthError> {
    // Check if account exists
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM accounts WHERE username = ? OR email = ?",
    )
    .bind(&request.username)
    .bind(&request.email)
    .fetch_one(pool)
    .await?;

    if existing > 0 {
        return Err(AuthError::AccountAlreadyExists);
    }

    let password_hash = hash_password(&request.password)?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO accounts (id, name, username, email, password_hash, phone, avatar_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&request.name)
    .bind(&request.username)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.phone)
    .bind(&request.avatar_url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(shared::Account {
        id,
        name: request.name.clone(),
        username: request.username.clone(),
        email: request.email.clone(),
        phone: request.phone.clone(),
        avatar_url: request.avatar_url.clone(),
        created_at: now,
        updated_at: now,
    })
}
