use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, LoginRequest, RefreshRequest, RegisterRequest};

use crate::middleware::auth::extract_account_id;
use crate::models::AppState;
use crate::services::auth as auth_service;
use crate::services::session::{self, CookieDirective, REFRESH_TOKEN_COOKIE, SessionError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/refresh", web::post().to(refresh))
            .route("/me", web::get().to(get_current_account)),
    );
}

/// Render the orchestrator's cookie directives onto the response. Session
/// cookies are always httpOnly + secure; a clear directive becomes a removal
/// cookie so the browser drops its copy.
fn build_cookies(directives: &[CookieDirective]) -> Vec<Cookie<'static>> {
    directives
        .iter()
        .map(|directive| match directive {
            CookieDirective::Set { name, value } => Cookie::build(*name, value.clone())
                .path("/")
                .http_only(true)
                .secure(true)
                .finish(),
            CookieDirective::Clear { name } => {
                let mut cookie = Cookie::build(*name, "")
                    .path("/")
                    .http_only(true)
                    .secure(true)
                    .finish();
                cookie.make_removal();
                cookie
            }
        })
        .collect()
}

fn session_error_response(err: SessionError) -> HttpResponse {
    match err {
        SessionError::MissingCredentials => HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "Username and password are required".to_string(),
        }),
        SessionError::InvalidCredentials => HttpResponse::BadRequest().json(ApiError {
            error: "authentication_error".to_string(),
            message: "Invalid username or password".to_string(),
        }),
        SessionError::MissingRefreshToken => HttpResponse::Unauthorized().json(ApiError {
            error: "unauthorized".to_string(),
            message: "No refresh token supplied".to_string(),
        }),
        SessionError::InvalidRefreshToken | SessionError::UnknownAccount => {
            HttpResponse::Unauthorized().json(ApiError {
                error: "invalid_token".to_string(),
                message: err.to_string(),
            })
        }
        SessionError::RefreshTokenRevoked => HttpResponse::Unauthorized().json(ApiError {
            error: "token_revoked".to_string(),
            message: "Refresh token is expired or already used".to_string(),
        }),
        SessionError::AccountNotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Account not found".to_string(),
        }),
        SessionError::TokenError(_) | SessionError::DatabaseError(_) => {
            log::error!("Session operation failed: {:?}", err);
            HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "Internal server error".to_string(),
            })
        }
    }
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    // Validate input
    if request.name.is_empty()
        || request.username.is_empty()
        || request.email.is_empty()
        || request.password.is_empty()
    {
        return Ok(HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "Name, username, email, and password are required".to_string(),
        }));
    }

    if request.password.len() < 8 {
        return Ok(HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "Password must be at least 8 characters".to_string(),
        }));
    }

    match auth_service::register_account(&state.db, &request).await {
        Ok(account) => Ok(HttpResponse::Created().json(ApiSuccess::new(account))),
        Err(auth_service::AuthError::AccountAlreadyExists) => {
            Ok(HttpResponse::BadRequest().json(ApiError {
                error: "registration_error".to_string(),
                message: "Account already exists".to_string(),
            }))
        }
        Err(e) => {
            log::error!("Registration error: {:?}", e);
            Ok(HttpResponse::InternalServerError().json(ApiError {
                error: "internal_error".to_string(),
                message: "Failed to register account".to_string(),
            }))
        }
    }
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse> {
    match session::login(&state.db, &state.token_keys, &body.into_inner()).await {
        Ok(outcome) => {
            let mut response = HttpResponse::Ok();
            for cookie in build_cookies(&outcome.cookies) {
                response.cookie(cookie);
            }
            Ok(response.json(ApiSuccess::new(outcome.account)))
        }
        Err(e) => Ok(session_error_response(e)),
    }
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let account_id = match extract_account_id(&req, &state.token_keys) {
        Ok(id) => id,
        Err(_) => {
            return Ok(HttpResponse::Unauthorized().json(ApiError {
                error: "unauthorized".to_string(),
                message: "Invalid or missing token".to_string(),
            }));
        }
    };

    match session::logout(&state.db, &account_id).await {
        Ok(cookies) => {
            let mut response = HttpResponse::Ok();
            for cookie in build_cookies(&cookies) {
                response.cookie(cookie);
            }
            Ok(response.json(ApiSuccess::new(serde_json::json!({}))))
        }
        Err(e) => Ok(session_error_response(e)),
    }
}

async fn refresh(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse> {
    // Cookie first, JSON body as a fallback for cookie-less clients.
    let incoming = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.and_then(|body| body.into_inner().refresh_token));

    match session::refresh_access_token(&state.db, &state.token_keys, incoming.as_deref()).await {
        Ok(outcome) => {
            let mut response = HttpResponse::Ok();
            for cookie in build_cookies(&outcome.cookies) {
                response.cookie(cookie);
            }
            Ok(response.json(ApiSuccess::new(outcome.tokens)))
        }
        Err(e) => Ok(session_error_response(e)),
    }
}

async fn get_current_account(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let account_id = match extract_account_id(&req, &state.token_keys) {
        Ok(id) => id,
        Err(_) => {
            return Ok(HttpResponse::Unauthorized().json(ApiError {
                error: "unauthorized".to_string(),
                message: "Invalid or missing token".to_string(),
            }));
        }
    };

    match session::current_account(&state.db, &account_id).await {
        Ok(account) => Ok(HttpResponse::Ok().json(ApiSuccess::new(account))),
        Err(e) => Ok(session_error_response(e)),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, App};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use super::*;
    use crate::config::Config;
    use crate::services::session::ACCESS_TOKEN_COOKIE;
    use crate::services::tokens::TokenKeys;
    use shared::Account;

    async fn setup_state() -> web::Data<AppState> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                phone TEXT,
                avatar_url TEXT,
                refresh_token TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let token_keys = TokenKeys::from_config(&Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            access_token_secret: "access-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_secret: "refresh-secret".to_string(),
            refresh_token_expiry_days: 7,
            cors_origins: vec![],
        });

        web::Data::new(AppState {
            db: pool,
            token_keys,
        })
    }

    async fn seed_alice(pool: &SqlitePool) -> Account {
        auth_service::register_account(
            pool,
            &RegisterRequest {
                name: "Alice Example".to_string(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "correct-horse".to_string(),
                phone: None,
                avatar_url: None,
            },
        )
        .await
        .unwrap()
    }

    fn login_json(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[actix_web::test]
    async fn test_login_sets_both_session_cookies() {
        let state = setup_state().await;
        seed_alice(&state.db).await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(login_json("alice", "correct-horse"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);

        let names: Vec<String> = resp
            .response()
            .cookies()
            .map(|cookie| cookie.name().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&ACCESS_TOKEN_COOKIE.to_string()));
        assert!(names.contains(&REFRESH_TOKEN_COOKIE.to_string()));

        for cookie in resp.response().cookies() {
            assert!(cookie.http_only().unwrap_or(false));
            assert!(cookie.secure().unwrap_or(false));
        }
    }

    #[actix_web::test]
    async fn test_login_failure_sets_no_cookies() {
        let state = setup_state().await;
        seed_alice(&state.db).await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(login_json("alice", "wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.response().cookies().count(), 0);
    }

    #[actix_web::test]
    async fn test_refresh_without_token_is_unauthorized() {
        let state = setup_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post().uri("/auth/refresh").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.response().cookies().count(), 0);
    }

    #[actix_web::test]
    async fn test_refresh_with_cookie_rotates_the_pair() {
        let state = setup_state().await;
        seed_alice(&state.db).await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let login_req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(login_json("alice", "correct-horse"))
            .to_request();
        let login_resp = test::call_service(&app, login_req).await;
        let refresh_cookie = login_resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == REFRESH_TOKEN_COOKIE)
            .unwrap()
            .into_owned();

        let req = test::TestRequest::post()
            .uri("/auth/refresh")
            .cookie(refresh_cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let rotated = resp
            .response()
            .cookies()
            .find(|cookie| cookie.name() == REFRESH_TOKEN_COOKIE)
            .unwrap()
            .into_owned();
        assert_ne!(rotated.value(), refresh_cookie.value());

        // Replaying the first cookie fails now that it was superseded.
        let replay = test::TestRequest::post()
            .uri("/auth/refresh")
            .cookie(refresh_cookie)
            .to_request();
        let replay_resp = test::call_service(&app, replay).await;
        assert_eq!(replay_resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_logout_clears_both_cookies() {
        let state = setup_state().await;
        let account = seed_alice(&state.db).await;
        let access_token = state.token_keys.issue_access_token(&account.id).unwrap();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/logout")
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, access_token))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);

        let cleared: Vec<_> = resp.response().cookies().collect();
        assert_eq!(cleared.len(), 2);
        for cookie in cleared {
            assert!(cookie.value().is_empty());
        }
    }

    #[actix_web::test]
    async fn test_logout_without_token_is_unauthorized() {
        let state = setup_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post().uri("/auth/logout").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_me_returns_projection() {
        let state = setup_state().await;
        let account = seed_alice(&state.db).await;
        let access_token = state.token_keys.issue_access_token(&account.id).unwrap();
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", access_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: ApiSuccess<Account> = test::read_body_json(resp).await;
        assert_eq!(body.data.id, account.id);
        assert_eq!(body.data.username, "alice");

        // The projection must not leak credential material.
        let value = serde_json::to_value(&body.data).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("refresh_token").is_none());
    }

    #[actix_web::test]
    async fn test_register_validates_password_length() {
        let state = setup_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .set_json(RegisterRequest {
                name: "Bob".to_string(),
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "short".to_string(),
                phone: None,
                avatar_url: None,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
