//! Booking model and request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: String,
    pub house_id: String,
    pub user_id: String,
    /// Second-precision UTC timestamp, RFC 3339 with Z suffix.
    pub check_in: String,
    pub check_out: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub house_id: String,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
}
