//! Booking domain logic: the status state machine and the date-range
//! conflict engine.

pub mod conflict;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Format a timestamp the way bookings store them: second-precision UTC with
/// a Z suffix, so string comparison matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Confirm,
    Cancel,
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingAction::Confirm => f.write_str("confirm"),
            BookingAction::Cancel => f.write_str("cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a {from} booking")]
pub struct InvalidTransition {
    pub from: BookingStatus,
    pub action: BookingAction,
}

impl BookingStatus {
    /// Apply a lifecycle action.
    ///
    /// Legal moves: pending -> confirmed, pending -> cancelled,
    /// confirmed -> cancelled. Cancelled is terminal.
    pub fn transition(self, action: BookingAction) -> Result<BookingStatus, InvalidTransition> {
        match (self, action) {
            (BookingStatus::Pending, BookingAction::Confirm) => Ok(BookingStatus::Confirmed),
            (BookingStatus::Pending, BookingAction::Cancel) => Ok(BookingStatus::Cancelled),
            (BookingStatus::Confirmed, BookingAction::Cancel) => Ok(BookingStatus::Cancelled),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}
