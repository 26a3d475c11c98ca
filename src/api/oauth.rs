//! Google OAuth login.
//!
//! Completion sets the HTTP-only session cookie and redirects to the
//! frontend. The token is never placed in a URL, where it would leak through
//! browser history and referrer headers.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::User;
use crate::AppState;

use super::auth::session_cookie;
use super::error::ApiError;

/// Cookie holding the CSRF state between the consent redirect and callback
const OAUTH_STATE_COOKIE: &str = "oauth_state";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// URL-encode a string for use in query parameters
fn url_encode(s: &str) -> String {
    let mut encoded = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: String,
    pub state: Option<String>,
}

/// Profile claims returned by Google's userinfo endpoint
#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    /// Google's stable account identifier
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn google_config(state: &AppState) -> Result<&crate::config::OAuthProviderConfig, ApiError> {
    state
        .config
        .oauth
        .google
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Google OAuth is not configured"))
}

fn redirect_uri(state: &AppState, oauth: &crate::config::OAuthProviderConfig) -> String {
    oauth.redirect_uri.clone().unwrap_or_else(|| {
        format!(
            "http://{}:{}/api/auth/oauth/google/callback",
            state.config.server.host, state.config.server.port
        )
    })
}

/// Compare the CSRF state echoed by the provider against the value stashed
/// in the browser's cookie. Missing on either side is a mismatch.
fn verify_oauth_state(expected: Option<&str>, received: Option<&str>) -> Result<(), ApiError> {
    match (expected, received) {
        (Some(expected), Some(received)) if expected == received => Ok(()),
        _ => Err(ApiError::bad_request("OAuth state mismatch")),
    }
}

/// Redirect the browser to Google's consent page, stashing the CSRF state in
/// an HTTP-only cookie for the callback to check.
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let oauth = google_config(&state)?;

    let state_param = uuid::Uuid::new_v4().to_string();
    let state_cookie = Cookie::build((OAUTH_STATE_COOKIE, state_param.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    let url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        GOOGLE_AUTH_URL,
        oauth.client_id,
        url_encode(&redirect_uri(&state, oauth)),
        url_encode("openid email profile"),
        state_param
    );

    Ok((jar.add(state_cookie), Redirect::to(&url)))
}

/// Handle the OAuth callback: exchange the code, fetch the profile, upsert
/// the user, set the session cookie, and send the browser back to the
/// frontend.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthCallbackRequest>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let oauth = google_config(&state)?;

    let expected_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string());
    verify_oauth_state(expected_state.as_deref(), params.state.as_deref())?;

    let access_token = exchange_google_token(
        &oauth.client_id,
        &oauth.client_secret,
        &params.code,
        &redirect_uri(&state, oauth),
    )
    .await?;

    let user_info = get_google_user(&access_token).await?;

    let user = upsert_google_user(&state.db, &user_info).await.map_err(|e| {
        tracing::error!("Failed to upsert OAuth user: {}", e);
        ApiError::database("Failed to complete login")
    })?;

    let token = state.tokens.issue(&user.email).map_err(|e| {
        tracing::error!("Failed to issue token: {}", e);
        ApiError::internal("Failed to issue token")
    })?;

    tracing::info!("OAuth login: {}", user.email);

    // The state cookie is single-use
    let mut state_cookie = Cookie::from(OAUTH_STATE_COOKIE);
    state_cookie.set_path("/");

    Ok((
        jar.remove(state_cookie).add(session_cookie(token)),
        Redirect::to(&state.config.server.frontend_url),
    ))
}

/// Exchange an authorization code for a Google access token
async fn exchange_google_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
    }

    let client = reqwest::Client::new();
    let response = client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Google token exchange failed: {}", e);
            ApiError::internal("Failed to reach the OAuth provider")
        })?;

    if !response.status().is_success() {
        return Err(ApiError::bad_request(
            "Google rejected the authorization code",
        ));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
        tracing::error!("Malformed Google token response: {}", e);
        ApiError::internal("Failed to complete login")
    })?;

    Ok(token.access_token)
}

/// Fetch the user's profile claims from Google
async fn get_google_user(access_token: &str) -> Result<GoogleUserInfo, ApiError> {
    let client = reqwest::Client::new();
    let response = client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Google userinfo request failed: {}", e);
            ApiError::internal("Failed to reach the OAuth provider")
        })?;

    if !response.status().is_success() {
        return Err(ApiError::bad_request("Failed to fetch user information"));
    }

    response.json().await.map_err(|e| {
        tracing::error!("Malformed Google userinfo response: {}", e);
        ApiError::internal("Failed to complete login")
    })
}

/// Create or update the user for a Google identity in one statement.
///
/// The unique constraints do the coordination: concurrent callbacks for the
/// same account land on the same row, and an existing password account with
/// a matching email gets the Google identity linked instead of a duplicate.
pub async fn upsert_google_user(
    pool: &SqlitePool,
    info: &GoogleUserInfo,
) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let name = info.name.clone().unwrap_or_else(|| info.email.clone());
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, profile_picture, google_id, role, created_at, updated_at)
        VALUES (?, ?, NULL, ?, ?, ?, 'user', ?, ?)
        ON CONFLICT(google_id) DO UPDATE SET
            name = excluded.name,
            profile_picture = excluded.profile_picture,
            updated_at = excluded.updated_at
        ON CONFLICT(email) DO UPDATE SET
            google_id = excluded.google_id,
            name = excluded.name,
            profile_picture = excluded.profile_picture,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&id)
    .bind(&info.email)
    .bind(&name)
    .bind(&info.picture)
    .bind(&info.sub)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM users WHERE google_id = ?")
        .bind(&info.sub)
        .fetch_one(pool)
        .await
}
