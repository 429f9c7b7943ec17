use anyhow::Context;
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    storage::DeleteOutcome,
    store::{bounded, StoreError},
};

pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
const ROOT: &str = "emailbuilder";

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Reference to a stored image, as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub public_id: String,
    pub url: String,
    pub format: &'static str,
    pub size: usize,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Key prefix every object of `owner` lives under.
pub fn namespace(owner: Uuid) -> String {
    format!("{ROOT}/{owner}/")
}

pub async fn upload_image(
    st: &AppState,
    owner: Uuid,
    item: UploadItem,
) -> Result<AssetRef, AppError> {
    if item.body.len() > MAX_IMAGE_BYTES {
        warn!(%owner, size = item.body.len(), "image too large");
        return Err(AppError::invalid("File size too large, maximum is 2MB"));
    }
    let Some(format) = ext_from_mime(&item.content_type) else {
        warn!(%owner, content_type = %item.content_type, "unsupported image type");
        return Err(AppError::invalid(
            "Invalid file type, supported formats: JPEG, PNG, GIF, WEBP",
        ));
    };

    let key = format!("{}{}.{}", namespace(owner), Uuid::new_v4(), format);
    let size = item.body.len();
    bounded(st.config.store_timeout(), async {
        st.storage
            .put_object(&key, item.body, &item.content_type)
            .await
            .with_context(|| format!("put_object {}", key))
            .map_err(StoreError::from)
    })
    .await?;

    info!(%owner, key = %key, size, "image uploaded");
    Ok(AssetRef {
        url: st.storage.public_url(&key),
        public_id: key,
        format,
        size,
    })
}

/// Deleting an image that is already gone succeeds with `AlreadyAbsent`.
pub async fn delete_image(
    st: &AppState,
    owner: Uuid,
    public_id: &str,
) -> Result<DeleteOutcome, AppError> {
    let public_id = public_id.trim_start_matches('/');
    if public_id.is_empty() {
        return Err(AppError::invalid("Public ID is required"));
    }
    if !public_id.starts_with(&namespace(owner)) || public_id.contains("..") {
        warn!(%owner, public_id, "image delete outside own namespace");
        return Err(AppError::Forbidden(
            "Access denied, you can only delete your own images".into(),
        ));
    }

    let outcome = bounded(st.config.store_timeout(), async {
        st.storage
            .delete_object(public_id)
            .await
            .with_context(|| format!("delete_object {}", public_id))
            .map_err(StoreError::from)
    })
    .await?;

    info!(%owner, public_id, ?outcome, "image delete");
    Ok(outcome)
}
