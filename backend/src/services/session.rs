use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::AccountRow;
use crate::services::auth::{self, AuthError};
use crate::services::tokens::{TokenError, TokenKeys};
use shared::{Account, LoginRequest, TokenPair};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("No refresh token supplied")]
    MissingRefreshToken,
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("Refresh token does not match a known account")]
    UnknownAccount,
    #[error("Refresh token is expired or already used")]
    RefreshTokenRevoked,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Cookie mutation requested by a session operation. The handler layer turns
/// these into actual Set-Cookie headers; this module never touches the
/// response itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    Set { name: &'static str, value: String },
    Clear { name: &'static str },
}

/// Result of a successful login: the public projection of the account plus
/// the cookie mutations to apply.
#[derive(Debug)]
pub struct LoginOutcome {
    pub account: Account,
    pub cookies: [CookieDirective; 2],
}

/// Result of a successful refresh: the new token pair, returned in the body
/// and mirrored into the session cookies.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub tokens: TokenPair,
    pub cookies: [CookieDirective; 2],
}

fn set_session_cookies(tokens: &TokenPair) -> [CookieDirective; 2] {
    [
        CookieDirective::Set {
            name: ACCESS_TOKEN_COOKIE,
            value: tokens.access_token.clone(),
        },
        CookieDirective::Set {
            name: REFRESH_TOKEN_COOKIE,
            value: tokens.refresh_token.clone(),
        },
    ]
}

fn clear_session_cookies() -> [CookieDirective; 2] {
    [
        CookieDirective::Clear {
            name: ACCESS_TOKEN_COOKIE,
        },
        CookieDirective::Clear {
            name: REFRESH_TOKEN_COOKIE,
        },
    ]
}

fn issue_pair(keys: &TokenKeys, account_id: &Uuid) -> Result<TokenPair, SessionError> {
    Ok(TokenPair {
        access_token: keys.issue_access_token(account_id)?,
        refresh_token: keys.issue_refresh_token(account_id)?,
    })
}

/// Authenticate a username/password pair and open a session. On success the
/// freshly minted refresh token replaces whatever the account had stored,
/// invalidating any session opened earlier.
pub async fn login(
    pool: &SqlitePool,
    keys: &TokenKeys,
    request: &LoginRequest,
) -> Result<LoginOutcome, SessionError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(SessionError::MissingCredentials);
    }

    // Unknown username and wrong password collapse into one variant so the
    // response cannot be used to probe which usernames exist.
    let account = auth::verify_credentials(pool, &request.username, &request.password)
        .await
        .map_err(|err| match err {
            AuthError::DatabaseError(err) => SessionError::DatabaseError(err),
            _ => SessionError::InvalidCredentials,
        })?;

    let account_id = account.uuid();
    let tokens = issue_pair(keys, &account_id)?;

    AccountRow::update_refresh_token(pool, &account_id, Some(&tokens.refresh_token)).await?;

    // Re-read so the response reflects what is actually stored.
    let account = AccountRow::find_by_id(pool, &account_id)
        .await?
        .ok_or(SessionError::AccountNotFound)?;

    Ok(LoginOutcome {
        cookies: set_session_cookies(&tokens),
        account: account.to_shared(),
    })
}

/// Clear the stored refresh token and request removal of both session
/// cookies. Safe to repeat; a second logout is a no-op.
pub async fn logout(
    pool: &SqlitePool,
    account_id: &Uuid,
) -> Result<[CookieDirective; 2], SessionError> {
    let affected = AccountRow::update_refresh_token(pool, account_id, None).await?;
    if affected == 0 {
        log::warn!("Logout for unknown account {}", account_id);
    }

    Ok(clear_session_cookies())
}

/// Check a presented refresh token in four ordered steps: presence,
/// signature+expiry, account resolution, then equality against the stored
/// value. The token is not trusted to drive a lookup before its signature
/// checks out.
pub async fn validate_refresh_token(
    pool: &SqlitePool,
    keys: &TokenKeys,
    incoming: Option<&str>,
) -> Result<AccountRow, SessionError> {
    let incoming = match incoming {
        Some(token) if !token.is_empty() => token,
        _ => return Err(SessionError::MissingRefreshToken),
    };

    let account_id = keys
        .decode_refresh_token(incoming)
        .map_err(|_| SessionError::InvalidRefreshToken)?;

    let account = AccountRow::find_by_id(pool, &account_id)
        .await?
        .ok_or(SessionError::UnknownAccount)?;

    match account.refresh_token.as_deref() {
        Some(stored) if stored == incoming => Ok(account),
        _ => Err(SessionError::RefreshTokenRevoked),
    }
}

/// Rotate a session: validate the presented refresh token, mint a new pair,
/// and overwrite the stored token so the presented one cannot be used again.
/// Validation failures leave the store untouched.
pub async fn refresh_access_token(
    pool: &SqlitePool,
    keys: &TokenKeys,
    incoming: Option<&str>,
) -> Result<RefreshOutcome, SessionError> {
    let account = validate_refresh_token(pool, keys, incoming).await?;

    let account_id = account.uuid();
    let tokens = issue_pair(keys, &account_id)?;

    AccountRow::update_refresh_token(pool, &account_id, Some(&tokens.refresh_token)).await?;

    Ok(RefreshOutcome {
        cookies: set_session_cookies(&tokens),
        tokens,
    })
}

/// Pure read of the account identified by an already-verified access token.
pub async fn current_account(
    pool: &SqlitePool,
    account_id: &Uuid,
) -> Result<Account, SessionError> {
    let account = AccountRow::find_by_id(pool, account_id)
        .await?
        .ok_or(SessionError::AccountNotFound)?;

    Ok(account.to_shared())
}
