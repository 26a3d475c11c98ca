//! Booking creation and lifecycle transitions.
//!
//! Creation runs the conflict engine; transitions are guarded in order:
//! unknown booking (404), non-owner actor (403), illegal move (400).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::conflict::{insert_unless_conflict, NewBooking};
use crate::booking::{format_timestamp, BookingAction, BookingStatus};
use crate::db::{Booking, CreateBookingRequest, User};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_date_range;

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    if let Err(e) = validate_date_range(req.check_in, req.check_out) {
        return Err(ApiError::validation_field("check_out", e));
    }

    let house: Option<(String,)> = sqlx::query_as("SELECT id FROM houses WHERE id = ?")
        .bind(&req.house_id)
        .fetch_optional(&state.db)
        .await?;
    house.ok_or_else(|| ApiError::not_found("House not found"))?;

    let id = Uuid::new_v4().to_string();
    let check_in = format_timestamp(req.check_in);
    let check_out = format_timestamp(req.check_out);
    let now = chrono::Utc::now().to_rfc3339();

    let created = insert_unless_conflict(
        &state.db,
        &NewBooking {
            id: &id,
            house_id: &req.house_id,
            user_id: &user.id,
            check_in: &check_in,
            check_out: &check_out,
            created_at: &now,
        },
    )
    .await?;

    if !created {
        return Err(ApiError::conflict(
            "Requested dates overlap an existing booking",
        ));
    }

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(booking = %id, house = %req.house_id, "Booking created");

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Guarded status write: succeeds only if the row is still in `from`, so a
/// transition that raced another cannot overwrite the winner's status.
async fn update_status_if(
    pool: &crate::DbPool,
    booking_id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE bookings SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(booking_id)
        .bind(from.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Apply a lifecycle action to a booking on behalf of the acting user
async fn apply_transition(
    state: &AppState,
    user: &User,
    booking_id: &str,
    action: BookingAction,
) -> Result<Json<Booking>, ApiError> {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let (owner_id,): (String,) = sqlx::query_as("SELECT owner_id FROM houses WHERE id = ?")
        .bind(&booking.house_id)
        .fetch_one(&state.db)
        .await?;

    if owner_id != user.id {
        return Err(ApiError::forbidden(
            "Only the house owner can manage this booking",
        ));
    }

    let status: BookingStatus = booking.status.parse().map_err(|e: String| {
        tracing::error!(booking = %booking_id, "Corrupt booking status: {}", e);
        ApiError::internal("Corrupt booking status")
    })?;

    let next = status.transition(action)?;

    if !update_status_if(&state.db, booking_id, status, next).await? {
        return Err(ApiError::conflict("Booking was modified concurrently"));
    }

    let updated = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(booking = %booking_id, from = %status, to = %next, "Booking transition");

    Ok(Json(updated))
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: User,
) -> Result<Json<Booking>, ApiError> {
    apply_transition(&state, &user, &id, BookingAction::Confirm).await
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    user: User,
) -> Result<Json<Booking>, ApiError> {
    apply_transition(&state, &user, &id, BookingAction::Cancel).await
}

/// The authenticated user's own bookings, newest first
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::api::houses::create_house;
    use crate::api::test_util::{create_user, test_state};
    use crate::db::CreateHouseRequest;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    async fn seed_house(state: &Arc<AppState>, owner: &User) -> String {
        let (_, Json(house)) = create_house(
            State(state.clone()),
            owner.clone(),
            Json(CreateHouseRequest {
                title: "Beach cottage".to_string(),
                description: "Two bedrooms by the sea".to_string(),
                price: 120.0,
                location: "Accra".to_string(),
            }),
        )
        .await
        .unwrap();
        house.id
    }

    fn booking_req(house_id: &str, check_in: u32, check_out: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            house_id: house_id.to_string(),
            check_in: day(check_in),
            check_out: day(check_out),
        }
    }

    #[tokio::test]
    async fn test_create_booking_starts_pending() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let (status, Json(booking)) = create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(booking.status, "pending");
        assert_eq!(booking.user_id, guest.id);
        assert_eq!(booking.check_in, "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        let err = create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 4, 8)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        // Boundary-touching range is adjacency, not overlap
        let (status, _) = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req(&house_id, 5, 10)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let err = create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 5, 5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req(&house_id, 8, 5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_booking_unknown_house_is_not_found() {
        let state = test_state().await;
        let guest = create_user(&state, "guest@example.com").await;

        let err = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req("missing", 1, 5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_lifecycle_confirm_then_cancel() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let (_, Json(booking)) = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        let Json(confirmed) = confirm_booking(
            State(state.clone()),
            Path(booking.id.clone()),
            owner.clone(),
        )
        .await
        .unwrap();
        assert_eq!(confirmed.status, "confirmed");

        // Confirming again is an illegal move
        let err = confirm_booking(
            State(state.clone()),
            Path(booking.id.clone()),
            owner.clone(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);

        // Cancel still works from confirmed, and the terminal state sticks
        let Json(cancelled) = cancel_booking(
            State(state.clone()),
            Path(booking.id.clone()),
            owner.clone(),
        )
        .await
        .unwrap();
        assert_eq!(cancelled.status, "cancelled");

        let err = cancel_booking(State(state.clone()), Path(booking.id.clone()), owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);

        let (status,): (String,) = sqlx::query_as("SELECT status FROM bookings WHERE id = ?")
            .bind(&booking.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(status, "cancelled");
    }

    #[tokio::test]
    async fn test_transition_by_non_owner_is_forbidden() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let (_, Json(booking)) = create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        // The guest who made the booking still cannot confirm it
        let err = confirm_booking(
            State(state.clone()),
            Path(booking.id.clone()),
            guest.clone(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let err = cancel_booking(State(state.clone()), Path(booking.id), guest)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_stale_transition_cannot_overwrite_terminal_status() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let (_, Json(booking)) = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        // A competing request commits a cancel after this one read `pending`
        sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE id = ?")
            .bind(&booking.id)
            .execute(&state.db)
            .await
            .unwrap();

        let wrote = update_status_if(
            &state.db,
            &booking.id,
            BookingStatus::Pending,
            BookingStatus::Confirmed,
        )
        .await
        .unwrap();
        assert!(!wrote);

        let (status,): (String,) = sqlx::query_as("SELECT status FROM bookings WHERE id = ?")
            .bind(&booking.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(status, "cancelled");
    }

    #[tokio::test]
    async fn test_transition_unknown_booking_is_not_found() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;

        let err = confirm_booking(State(state.clone()), Path("missing".to_string()), owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_the_dates() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        let (_, Json(booking)) = create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();

        cancel_booking(State(state.clone()), Path(booking.id), owner)
            .await
            .unwrap();

        let (status, _) = create_booking(
            State(state.clone()),
            guest,
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_my_bookings_lists_own_only() {
        let state = test_state().await;
        let owner = create_user(&state, "owner@example.com").await;
        let guest = create_user(&state, "guest@example.com").await;
        let other = create_user(&state, "other@example.com").await;
        let house_id = seed_house(&state, &owner).await;

        create_booking(
            State(state.clone()),
            guest.clone(),
            Json(booking_req(&house_id, 1, 5)),
        )
        .await
        .unwrap();
        create_booking(
            State(state.clone()),
            other,
            Json(booking_req(&house_id, 10, 12)),
        )
        .await
        .unwrap();

        let Json(mine) = my_bookings(State(state.clone()), guest.clone()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, guest.id);
    }
}
