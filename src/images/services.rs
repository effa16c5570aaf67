use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::ImageStorage;

/// An upload that decoded as one of the accepted formats.
#[derive(Debug, Clone)]
pub struct CheckedImage {
    pub body: Bytes,
    pub format: ImageFormat,
}

impl CheckedImage {
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            _ => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            _ => "image/webp",
        }
    }
}

const NOT_AN_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Sniffs the format from the bytes themselves and makes sure they decode.
/// The client-supplied content type is not trusted. Decoding runs on the
/// blocking pool.
pub async fn check_image(body: Bytes) -> Result<CheckedImage, AppError> {
    tokio::task::spawn_blocking(move || decode_check(body))
        .await
        .context("image check task")?
}

fn decode_check(body: Bytes) -> Result<CheckedImage, AppError> {
    if body.is_empty() {
        return Err(AppError::field("image", "The submitted file is empty."));
    }
    let format = match image::guess_format(&body) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)) => f,
        _ => return Err(AppError::field("image", NOT_AN_IMAGE)),
    };
    if let Err(e) = image::load_from_memory_with_format(&body, format) {
        debug!(error = %e, ?format, "image failed to decode");
        return Err(AppError::field("image", NOT_AN_IMAGE));
    }
    Ok(CheckedImage { body, format })
}

/// `recipes/{user}/{recipe}-{uuid}.{ext}`; a fresh key per upload.
pub fn image_key(user_id: Uuid, recipe_id: i64, image: &CheckedImage) -> String {
    format!(
        "recipes/{}/{}-{}.{}",
        user_id,
        recipe_id,
        Uuid::new_v4(),
        image.extension()
    )
}

pub async fn store(
    storage: &dyn ImageStorage,
    key: &str,
    image: &CheckedImage,
) -> anyhow::Result<()> {
    storage
        .put_image(key, image)
        .await
        .with_context(|| format!("store image {}", key))
}

/// Best-effort removal of an object that is no longer referenced.
pub async fn discard(storage: &dyn ImageStorage, key: &str) {
    if let Err(e) = storage.delete_image(key).await {
        warn!(error = %e, key, "failed to delete image object");
    }
}

/// Resolves a stored key to a fetchable URL; `None` stays `None`.
pub async fn image_url(
    storage: &dyn ImageStorage,
    key: Option<&str>,
    ttl_secs: u64,
) -> anyhow::Result<Option<String>> {
    match key {
        Some(k) => Ok(Some(storage.image_url(k, ttl_secs).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) fn png_fixture() -> Bytes {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("encode png");
    Bytes::from(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FakeImageStorage;

    #[tokio::test]
    async fn png_is_accepted() {
        let checked = check_image(png_fixture()).await.unwrap();
        assert_eq!(checked.format, ImageFormat::Png);
        assert_eq!(checked.extension(), "png");
        assert_eq!(checked.content_type(), "image/png");
    }

    #[tokio::test]
    async fn text_is_rejected() {
        let err = check_image(Bytes::from_static(b"notanimage")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(f) if f.contains("image")));
    }

    #[tokio::test]
    async fn truncated_png_is_rejected() {
        let mut body = png_fixture().to_vec();
        body.truncate(20);
        assert!(check_image(Bytes::from(body)).await.is_err());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        assert!(check_image(Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn keys_are_unique_and_scoped() {
        let user = Uuid::new_v4();
        let checked = check_image(png_fixture()).await.unwrap();
        let a = image_key(user, 7, &checked);
        let b = image_key(user, 7, &checked);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("recipes/{}/7-", user)));
        assert!(a.ends_with(".png"));
    }

    #[tokio::test]
    async fn store_then_discard() {
        let storage = FakeImageStorage::default();
        let checked = check_image(png_fixture()).await.unwrap();
        store(&storage, "recipes/x/1-a.png", &checked).await.unwrap();
        assert_eq!(storage.keys(), vec!["recipes/x/1-a.png".to_string()]);
        discard(&storage, "recipes/x/1-a.png").await;
        assert!(storage.keys().is_empty());

        let url = image_url(&storage, Some("k"), 60).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://fake.local/k"));
        assert_eq!(image_url(&storage, None, 60).await.unwrap(), None);
    }
}
