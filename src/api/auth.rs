//! Email/password authentication and the request identity resolver.
//!
//! Tokens are accepted from the `Authorization: Bearer` header first, then
//! from the HTTP-only `access_token` cookie set by the OAuth callback. Every
//! authenticated handler resolves the token to a fresh user row; there is no
//! caching.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::db::{LoginRequest, LoginResponse, SignupRequest, SignupResponse, User, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

/// Name of the session cookie set on OAuth completion
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Build the HTTP-only session cookie carrying a freshly issued token
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// The uniform credential failure. Unknown email and wrong password must be
/// indistinguishable to the caller.
fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password")
}

fn unauthenticated() -> ApiError {
    ApiError::unauthorized("Authentication required")
}

/// Extract the bearer token from request headers: Authorization header
/// first, session cookie as fallback.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    CookieJar::from_headers(&parts.headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
}

/// Resolve a bearer token to the authenticated user. Fails closed: a bad
/// signature, expired token, or missing user all yield the same 401.
pub async fn resolve_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state.tokens.verify(token).map_err(|_| unauthenticated())?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&claims.sub)
        .fetch_optional(&state.db)
        .await?;

    user.ok_or_else(unauthenticated)
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or_else(unauthenticated)?;
        resolve_user(state, &token).await
    }
}

fn validate_signup_request(req: &SignupRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }

    errors.finish()
}

/// Register a new email/password account
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    validate_signup_request(&req)?;

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'user', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.name)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("An account with this email already exists")
        } else {
            tracing::error!("Failed to create user: {}", e);
            ApiError::database("Failed to create account")
        }
    })?;

    tracing::info!("New signup: {}", req.email);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created".to_string(),
        }),
    ))
}

/// Login with email and password, returning a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(invalid_credentials)?;

    // OAuth-only accounts have no password credential; fail the same way
    let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
    if !verify_password(&req.password, hash) {
        return Err(invalid_credentials());
    }

    let token = state.tokens.issue(&user.email).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Return the authenticated user's profile
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Clear the session cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<SignupResponse>) {
    let mut cookie = Cookie::from(ACCESS_TOKEN_COOKIE);
    cookie.set_path("/");
    (
        jar.remove(cookie),
        Json(SignupResponse {
            message: "Logged out".to_string(),
        }),
    )
}
