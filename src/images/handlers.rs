use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    routing::post,
    Json, Router,
};
use anyhow::Context;
use bytes::Bytes;
use tracing::{instrument, warn};

use super::services::{replace_recipe_image, validate_image};
use crate::{
    auth::AuthUser, error::ApiError, recipes::dto::RecipeImageResponse, state::AppState,
};

const IMAGE_FIELD: &str = "image";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/recipes/:id/upload-image",
        post(upload_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}

async fn read_image_field(mut mp: Multipart) -> Result<Option<Bytes>, ApiError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(IMAGE_FIELD, e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid(IMAGE_FIELD, e.body_text()))?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// POST /recipes/:id/upload-image (multipart, field `image`)
/// The file is decoded before anything is stored.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeImageResponse>, ApiError> {
    let mp = mp.map_err(|e| ApiError::invalid(IMAGE_FIELD, e.body_text()))?;
    let body = read_image_field(mp)
        .await?
        .ok_or_else(|| ApiError::invalid(IMAGE_FIELD, "No file was submitted."))?;

    let checked = body.clone();
    let format = tokio::task::spawn_blocking(move || validate_image(&checked))
        .await
        .context("join image check")?;
    let format = format.ok_or_else(|| {
        warn!(%user_id, recipe_id = id, size = body.len(), "rejected non-image upload");
        ApiError::invalid(IMAGE_FIELD, INVALID_IMAGE)
    })?;

    let image = replace_recipe_image(&state, user_id, id, body, format).await?;
    Ok(Json(RecipeImageResponse { id, image }))
}
