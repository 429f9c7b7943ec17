use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    images::services::{self, AssetRef, UploadItem, MAX_IMAGE_BYTES},
    state::AppState,
    storage::DeleteOutcome,
};

const FIELD: &str = "image";

pub fn image_routes() -> Router<AppState> {
    Router::new()
        // room above the 2MB cap so oversized files get a proper message
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(2 * MAX_IMAGE_BYTES)),
        )
        .route("/api/images/*public_id", delete(remove))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub image: AssetRef,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub detail: &'static str,
}

#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut item = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "multipart read failed");
                return Err(AppError::invalid("Malformed upload or file size too large"));
            }
        };
        if field.name() != Some(FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|_| AppError::invalid("File size too large, maximum is 2MB"))?;
        item = Some(UploadItem { body, content_type });
        break;
    }

    let item = item.ok_or_else(|| AppError::invalid("No files were uploaded"))?;
    let image = services::upload_image(&state, user_id, item).await?;
    Ok(Json(UploadResponse {
        message: "Image uploaded successfully",
        image,
    }))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(public_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let outcome = services::delete_image(&state, user_id, &public_id).await?;
    let body = match outcome {
        DeleteOutcome::Deleted => DeleteResponse {
            message: "Image deleted successfully",
            detail: "deleted",
        },
        DeleteOutcome::AlreadyAbsent => DeleteResponse {
            message: "Image already deleted",
            detail: "The image may have already been deleted or does not exist",
        },
    };
    Ok(Json(body))
}
