//! Input validation for API requests.
//!
//! Each checker returns `Result<(), String>`; handlers collect failures into
//! a single `ApiError` with the `ValidationErrorBuilder` from the `error`
//! module. All checks run before any store mutation.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a password at signup
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a house title
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }

    if title.len() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }

    Ok(())
}

/// Validate a house description
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.len() > 5000 {
        return Err("Description is too long (max 5000 characters)".to_string());
    }

    Ok(())
}

/// Validate a house location
pub fn validate_location(location: &str) -> Result<(), String> {
    if location.trim().is_empty() {
        return Err("Location is required".to_string());
    }

    if location.len() > 200 {
        return Err("Location is too long (max 200 characters)".to_string());
    }

    Ok(())
}

/// Validate a nightly price
pub fn validate_price(price: f64) -> Result<(), String> {
    if !price.is_finite() {
        return Err("Price must be a number".to_string());
    }

    if price < 0.0 {
        return Err("Price must be non-negative".to_string());
    }

    Ok(())
}

/// Validate a booking date range: [check_in, check_out) must be non-empty
pub fn validate_date_range(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Result<(), String> {
    if check_out <= check_in {
        return Err("check_out must be after check_in".to_string());
    }

    Ok(())
}
