use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
    #[error("Token subject is not a valid account id")]
    InvalidSubject,
}

/// Claim set carried by both token kinds. `jti` is a fresh UUID per
/// issuance, so two tokens minted for the same account within the same
/// second still differ as signed strings.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Signing material for both token kinds. Built once at startup from config
/// and injected wherever tokens are minted or checked; read-only afterwards.
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    access_expiry: Duration,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_expiry: Duration,
}

impl TokenKeys {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_expiry: Duration::minutes(config.access_token_expiry_minutes),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_expiry: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn issue_access_token(&self, account_id: &Uuid) -> Result<String, TokenError> {
        sign(account_id, &self.access_encoding, self.access_expiry)
    }

    pub fn issue_refresh_token(&self, account_id: &Uuid) -> Result<String, TokenError> {
        sign(account_id, &self.refresh_encoding, self.refresh_expiry)
    }

    pub fn decode_access_token(&self, token: &str) -> Result<Uuid, TokenError> {
        verify(token, &self.access_decoding)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<Uuid, TokenError> {
        verify(token, &self.refresh_decoding)
    }
}

fn sign(account_id: &Uuid, key: &EncodingKey, expiry: Duration) -> Result<String, TokenError> {
    let now = Utc::now();

    let claims = Claims {
        sub: account_id.to_string(),
        exp: (now + expiry).timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    Ok(encode(&Header::default(), &claims, key)?)
}

fn verify(token: &str, key: &DecodingKey) -> Result<Uuid, TokenError> {
    let token_data = decode::<Claims>(token, key, &Validation::default())?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| TokenError::InvalidSubject)
}
