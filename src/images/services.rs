use anyhow::Context;
use bytes::Bytes;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::recipes::{repo, services::image_url};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageFormat {
    pub fn ext(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
        }
    }

    fn decoder_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
        }
    }
}

/// Identifies the image by its leading bytes; the client's content type is not trusted.
pub fn detect_image_format(body: &[u8]) -> Option<ImageFormat> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    match body {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        b if b.starts_with(PNG) => Some(ImageFormat::Png),
        b if b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a") => Some(ImageFormat::Gif),
        b if b.len() >= 12 && &b[..4] == b"RIFF" && &b[8..12] == b"WEBP" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Sniffs the format and fully decodes the body; `None` for non-images and
/// for files that are truncated or corrupted past the signature.
pub fn validate_image(body: &[u8]) -> Option<ImageFormat> {
    let format = detect_image_format(body)?;
    match image::load_from_memory_with_format(body, format.decoder_format()) {
        Ok(_) => Some(format),
        Err(e) => {
            debug!(error = %e, ?format, "image failed to decode");
            None
        }
    }
}

fn new_image_key(format: ImageFormat) -> String {
    format!("uploads/recipe/{}.{}", Uuid::new_v4(), format.ext())
}

async fn store_key(
    mut tx: Transaction<'_, Postgres>,
    recipe_id: i64,
    key: &str,
) -> anyhow::Result<()> {
    repo::set_image_key_tx(&mut tx, recipe_id, key).await?;
    tx.commit().await.context("commit tx")?;
    Ok(())
}

/// Stores `body` as the recipe's image and removes the previous object.
/// Returns a presigned URL for the new image.
pub async fn replace_recipe_image(
    st: &AppState,
    user_id: Uuid,
    recipe_id: i64,
    body: Bytes,
    format: ImageFormat,
) -> Result<Option<String>, ApiError> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let previous = repo::lock_image_key_tx(&mut tx, user_id, recipe_id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;

    let key = new_image_key(format);
    st.storage
        .put_object(&key, body, format.mime())
        .await
        .with_context(|| format!("put_object {}", key))?;

    if let Err(e) = store_key(tx, recipe_id, &key).await {
        if let Err(cleanup) = st.storage.delete_object(&key).await {
            warn!(error = %cleanup, key = %key, "failed to remove orphaned upload");
        }
        return Err(e.into());
    }

    if let Some(old) = previous.as_deref() {
        if let Err(e) = st.storage.delete_object(old).await {
            warn!(error = %e, key = old, recipe_id, "failed to delete replaced image");
        }
    }

    info!(%user_id, recipe_id, key = %key, "image replaced");
    Ok(image_url(st, Some(&key)).await?)
}

#[cfg(test)]
mod image_tests {
    use super::*;

    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn detects_supported_formats() {
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some(ImageFormat::Jpeg));
        assert_eq!(detect_image_format(TINY_PNG), Some(ImageFormat::Png));
        assert_eq!(detect_image_format(b"GIF89a\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(detect_image_format(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
    }

    #[test]
    fn rejects_non_images() {
        assert_eq!(detect_image_format(b"notanimage"), None);
        assert_eq!(detect_image_format(b""), None);
        assert_eq!(detect_image_format(b"RIFF\x24\x00\x00\x00WAVE"), None);
        assert_eq!(detect_image_format(&TINY_PNG[..4]), None);
    }

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, format).expect("encode");
        out.into_inner()
    }

    #[test]
    fn decodable_images_validate() {
        assert_eq!(validate_image(&encoded(image::ImageFormat::Png)), Some(ImageFormat::Png));
        assert_eq!(validate_image(&encoded(image::ImageFormat::Jpeg)), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn signature_with_garbage_is_rejected() {
        let mut body = b"\x89PNG\r\n\x1a\n".to_vec();
        body.extend_from_slice(b"this is not really a png at all");
        assert_eq!(detect_image_format(&body), Some(ImageFormat::Png));
        assert_eq!(validate_image(&body), None);

        let png = encoded(image::ImageFormat::Png);
        assert_eq!(validate_image(&png[..png.len() / 2]), None);
    }

    #[test]
    fn keys_are_unique_and_carry_extension() {
        let a = new_image_key(ImageFormat::Png);
        let b = new_image_key(ImageFormat::Png);
        assert_ne!(a, b);
        assert!(a.starts_with("uploads/recipe/"));
        assert!(a.ends_with(".png"));
        assert_eq!(ImageFormat::WebP.mime(), "image/webp");
    }
}
