//! Asset store: normalize an uploaded image and persist it to object
//! storage, or hand back a synthetic bucket URL when the service runs
//! without storage access (local mode is supported, not an error).

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::UploadedAsset;
use crate::secrets;

/// Longest-edge bound applied before encoding.
const MAX_WIDTH: u32 = 1920;
const MAX_HEIGHT: u32 = 1080;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid image data: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("storage error: {0}")]
    Store(String),
}

/// Decode, bound to 1920x1080 preserving aspect ratio, convert to RGB and
/// re-encode as JPEG. Fails only on malformed input or encoder errors.
pub(crate) fn process_image(raw: &[u8]) -> Result<Vec<u8>, UploadError> {
    let decoded = image::load_from_memory(raw).map_err(|e| UploadError::Decode(e.to_string()))?;
    let bounded = if decoded.width() > MAX_WIDTH || decoded.height() > MAX_HEIGHT {
        decoded.resize(MAX_WIDTH, MAX_HEIGHT, FilterType::Lanczos3)
    } else {
        decoded
    };
    let rgb = bounded.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| UploadError::Encode(e.to_string()))?;
    Ok(out)
}

pub struct AssetStore {
    client: reqwest::Client,
    bucket: String,
    /// Whether object storage was reachable at startup. When false, uploads
    /// still validate and normalize the image but return a synthetic URL.
    online: bool,
}

impl AssetStore {
    /// Probe storage credentials once and pick the persistent or offline
    /// mode for the process lifetime.
    pub async fn connect(bucket: impl Into<String>, client: reqwest::Client) -> Self {
        let bucket = bucket.into();
        match secrets::metadata_token(&client).await {
            Ok(_) => {
                info!(%bucket, "object storage enabled");
                Self { client, bucket, online: true }
            }
            Err(err) => {
                warn!(%bucket, error = %err, "object storage unavailable, uploads will return mock URLs");
                Self { client, bucket, online: false }
            }
        }
    }

    /// Build a store that never talks to object storage.
    pub fn offline(bucket: impl Into<String>, client: reqwest::Client) -> Self {
        Self { client, bucket: bucket.into(), online: false }
    }

    /// Validate, normalize and persist an image. Never panics and never
    /// returns an error: failures are folded into the asset's status.
    pub async fn upload(&self, raw: &[u8]) -> UploadedAsset {
        match self.try_upload(raw).await {
            Ok(url) => {
                info!(%url, "background image uploaded");
                UploadedAsset::success(url)
            }
            Err(err) => {
                warn!(error = %err, "background upload failed");
                UploadedAsset::failed(err.to_string())
            }
        }
    }

    async fn try_upload(&self, raw: &[u8]) -> Result<String, UploadError> {
        let jpeg = process_image(raw)?;

        if !self.online {
            return Ok(format!(
                "https://storage.googleapis.com/{}/mock-background-{}.jpg",
                self.bucket,
                Uuid::new_v4()
            ));
        }

        let key = format!("backgrounds/{}.jpg", Uuid::new_v4());
        let token = secrets::metadata_token(&self.client)
            .await
            .map_err(|e| UploadError::Store(e.to_string()))?;
        let url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket, key
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .await
            .map_err(|e| UploadError::Store(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UploadError::Store(format!("object storage returned {}", response.status())));
        }

        Ok(format!("https://storage.googleapis.com/{}/{}", self.bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetStatus;
    use pretty_assertions::assert_eq;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 30, 200]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn process_rejects_non_image_payloads() {
        let err = process_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, UploadError::Decode(_)));
    }

    #[test]
    fn process_keeps_small_images_and_outputs_jpeg() {
        let jpeg = process_image(&png_bytes(64, 48)).unwrap();
        let reread = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((reread.width(), reread.height()), (64, 48));
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn process_bounds_oversized_images_preserving_aspect() {
        let jpeg = process_image(&png_bytes(4000, 1000)).unwrap();
        let reread = image::load_from_memory(&jpeg).unwrap();
        assert!(reread.width() <= 1920);
        assert!(reread.height() <= 1080);
        // 4:1 aspect survives the resize.
        assert_eq!(reread.width() / reread.height(), 4);
    }

    #[tokio::test]
    async fn offline_upload_returns_mock_bucket_url() {
        let store = AssetStore::offline("online-boutique-images", reqwest::Client::new());
        let asset = store.upload(&png_bytes(10, 10)).await;
        assert_eq!(asset.status, AssetStatus::Success);
        assert!(asset.url.contains("online-boutique-images/mock-background-"));
        assert_eq!(asset.error_message, None);
    }

    #[tokio::test]
    async fn upload_folds_decode_failures_into_the_asset() {
        let store = AssetStore::offline("online-boutique-images", reqwest::Client::new());
        let asset = store.upload(b"garbage").await;
        assert_eq!(asset.status, AssetStatus::Failed);
        assert!(asset.url.is_empty());
        assert!(!asset.error_message.unwrap().is_empty());
    }
}
