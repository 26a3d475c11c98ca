//! Profile updates and avatar upload.

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{UpdateProfileRequest, User, UserResponse};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_name;

/// Update the authenticated user's profile fields
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = match req.name {
        Some(name) => {
            if let Err(e) = validate_name(&name) {
                return Err(ApiError::validation_field("name", e));
            }
            name
        }
        None => user.name.clone(),
    };

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Accept a multipart image upload and set it as the user's avatar.
///
/// Files land under `<data_dir>/uploads` with a generated name; the stored
/// path is served by the static `/uploads` route.
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    user: User,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
        .ok_or_else(|| ApiError::bad_request("Missing file field"))?;

    let content_type = field
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_default();

    let ext = extension_for(&content_type).ok_or_else(|| {
        ApiError::validation_field(
            "file",
            "Unsupported image type (png, jpeg, webp or gif)".to_string(),
        )
    })?;

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

    if data.is_empty() {
        return Err(ApiError::validation_field(
            "file",
            "Uploaded file is empty".to_string(),
        ));
    }

    let filename = format!("{}.{}", Uuid::new_v4(), ext);
    let dir = state.config.server.data_dir.join("uploads");
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        tracing::error!("Failed to create upload directory: {}", e);
        ApiError::internal("Failed to store upload")
    })?;
    tokio::fs::write(dir.join(&filename), &data)
        .await
        .map_err(|e| {
            tracing::error!("Failed to write upload: {}", e);
            ApiError::internal("Failed to store upload")
        })?;

    let picture = format!("/uploads/{}", filename);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET profile_picture = ?, updated_at = ? WHERE id = ?")
        .bind(&picture)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user = %user.id, "Avatar updated");

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::api::test_util::{create_user, test_state};

    #[tokio::test]
    async fn test_update_profile_name() {
        let state = test_state().await;
        let user = create_user(&state, "alice@example.com").await;

        let Json(updated) = update_profile(
            State(state.clone()),
            user,
            Json(UpdateProfileRequest {
                name: Some("Alice B".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Alice B");
    }

    #[tokio::test]
    async fn test_update_profile_without_fields_is_noop() {
        let state = test_state().await;
        let user = create_user(&state, "alice@example.com").await;
        let original_name = user.name.clone();

        let Json(updated) = update_profile(
            State(state.clone()),
            user,
            Json(UpdateProfileRequest { name: None }),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, original_name);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_blank_name() {
        let state = test_state().await;
        let user = create_user(&state, "alice@example.com").await;

        let err = update_profile(
            State(state.clone()),
            user,
            Json(UpdateProfileRequest {
                name: Some("   ".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/webp"), Some("webp"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
    }
}
