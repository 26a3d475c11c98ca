//! House listing CRUD.
//!
//! Reads are public; every mutation requires the actor to own the listing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Booking, CreateHouseRequest, House, UpdateHouseRequest, User};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_description, validate_location, validate_price, validate_title,
};

fn validate_create_request(req: &CreateHouseRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_description(&req.description) {
        errors.add("description", e);
    }
    if let Err(e) = validate_price(req.price) {
        errors.add("price", e);
    }
    if let Err(e) = validate_location(&req.location) {
        errors.add("location", e);
    }

    errors.finish()
}

/// Validate an UpdateHouseRequest (only validates provided fields)
fn validate_update_request(req: &UpdateHouseRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", e);
        }
    }
    if let Some(ref description) = req.description {
        if let Err(e) = validate_description(description) {
            errors.add("description", e);
        }
    }
    if let Some(price) = req.price {
        if let Err(e) = validate_price(price) {
            errors.add("price", e);
        }
    }
    if let Some(ref location) = req.location {
        if let Err(e) = validate_location(location) {
            errors.add("location", e);
        }
    }

    errors.finish()
}

pub async fn list_houses(State(state): State<Arc<AppState>>) -> Result<Json<Vec<House>>, ApiError> {
    let houses = sqlx::query_as::<_, House>("SELECT * FROM houses ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(houses))
}

pub async fn get_house(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<House>, ApiError> {
    let house = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("House not found"))?;

    Ok(Json(house))
}

pub async fn create_house(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateHouseRequest>,
) -> Result<(StatusCode, Json<House>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO houses (id, title, description, price, location, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.price)
    .bind(&req.location)
    .bind(&user.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let house = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(house)))
}

pub async fn update_house(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: User,
    Json(req): Json<UpdateHouseRequest>,
) -> Result<Json<House>, ApiError> {
    validate_update_request(&req)?;

    let existing = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("House not found"))?;

    if existing.owner_id != user.id {
        return Err(ApiError::forbidden("Only the owner can update this house"));
    }

    let title = req.title.unwrap_or(existing.title);
    let description = req.description.unwrap_or(existing.description);
    let price = req.price.unwrap_or(existing.price);
    let location = req.location.unwrap_or(existing.location);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE houses
        SET title = ?, description = ?, price = ?, location = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(price)
    .bind(&location)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let house = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(house))
}

pub async fn delete_house(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: User,
) -> Result<Json<House>, ApiError> {
    let existing = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("House not found"))?;

    if existing.owner_id != user.id {
        return Err(ApiError::forbidden("Only the owner can delete this house"));
    }

    // Bookings cascade with the house
    sqlx::query("DELETE FROM houses WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(house = %id, "House deleted");

    Ok(Json(existing))
}

/// Owner's view of the bookings made against one of their listings
pub async fn list_house_bookings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let house = sqlx::query_as::<_, House>("SELECT * FROM houses WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("House not found"))?;

    if house.owner_id != user.id {
        return Err(ApiError::forbidden(
            "Only the owner can view this house's bookings",
        ));
    }

    let bookings =
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE house_id = ? ORDER BY check_in")
            .bind(&id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(bookings))
}
