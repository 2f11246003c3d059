use actix_web::HttpRequest;
use uuid::Uuid;

use crate::services::session::ACCESS_TOKEN_COOKIE;
use crate::services::tokens::TokenKeys;

/// Extract the authenticated account id from the access token cookie or,
/// failing that, the Authorization header.
pub fn extract_account_id(
    req: &HttpRequest,
    keys: &TokenKeys,
) -> Result<Uuid, AuthMiddlewareError> {
    let token = match req.cookie(ACCESS_TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => bearer_token(req)?.to_string(),
    };

    keys.decode_access_token(&token)
        .map_err(|_| AuthMiddlewareError::InvalidToken)
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AuthMiddlewareError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AuthMiddlewareError::InvalidToken);
    }

    Ok(&auth_str[7..])
}

#[derive(Debug)]
pub enum AuthMiddlewareError {
    MissingToken,
    InvalidToken,
}

impl std::fmt::Display for AuthMiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMiddlewareError::MissingToken => write!(f, "Missing authorization token"),
            AuthMiddlewareError::InvalidToken => write!(f, "Invalid authorization token"),
        }
    }
}

impl std::error::Error for AuthMiddlewareError {}
