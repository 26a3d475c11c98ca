//! HTTP API surface.
//!
//! Routes are grouped under `/api`, with auth endpoints nested at
//! `/api/auth`. Uploaded avatars are served statically from `/uploads`.

pub mod auth;
pub mod bookings;
pub mod error;
pub mod houses;
pub mod oauth;
pub mod profile;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

/// Build the CORS layer for the configured frontend origin.
///
/// Credentials are allowed so the session cookie flows on cross-origin
/// requests, which rules out a wildcard origin.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = match state.config.server.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(_) => {
            tracing::warn!(
                "Invalid frontend_url {:?}, falling back to http://localhost:3000",
                state.config.server.frontend_url
            );
            HeaderValue::from_static("http://localhost:3000")
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads_dir = state.config.server.data_dir.join("uploads");
    let cors = cors_layer(&state);

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/oauth/google/login", get(oauth::google_login))
        .route("/oauth/google/callback", get(oauth::google_callback));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route(
            "/houses",
            get(houses::list_houses).post(houses::create_house),
        )
        .route(
            "/houses/:id",
            get(houses::get_house)
                .patch(houses::update_house)
                .delete(houses::delete_house),
        )
        .route("/houses/:id/bookings", get(houses::list_house_bookings))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/:id/confirm", put(bookings::confirm_booking))
        .route("/bookings/:id/cancel", put(bookings::cancel_booking))
        .route("/me", patch(profile::update_profile))
        .route("/me/avatar", post(profile::upload_avatar));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
