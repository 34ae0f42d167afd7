//! Upload gateway boundary
//!
//! Finished captures leave the core through this trait: one blob, one
//! timestamped name, one mode-specific bucket. Failures are reported,
//! never retried automatically.

use crate::recorder::encoding;
use crate::session::state::CaptureMode;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Bucket for continuous recordings
pub const VIDEO_BUCKET: &str = "videos";
/// Bucket for selfies
pub const SELFIE_BUCKET: &str = "selfies";

/// A finished capture on its way to storage.
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub kind: CaptureMode,
}

impl CapturedArtifact {
    pub fn video(bytes: Vec<u8>, mime_type: &str) -> Self {
        Self {
            bytes,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
            kind: CaptureMode::Video,
        }
    }

    pub fn selfie(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
            created_at: Utc::now(),
            kind: CaptureMode::Selfie,
        }
    }

    pub fn bucket(&self) -> &'static str {
        match self.kind {
            CaptureMode::Video => VIDEO_BUCKET,
            CaptureMode::Selfie => SELFIE_BUCKET,
        }
    }

    /// Timestamp-derived, collision-free object name.
    pub fn filename(&self) -> String {
        let ts = timestamp_slug(self.created_at);
        match self.kind {
            CaptureMode::Video => {
                format!("video-{ts}.{}", encoding::extension_for(Some(&self.mime_type)))
            }
            CaptureMode::Selfie => format!("selfie-{ts}.jpg"),
        }
    }

    /// Declared upload content type. Videos are declared mp4 to match
    /// their extension even when the recorded container is WebM;
    /// selfies are always JPEG.
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            CaptureMode::Video => "video/mp4",
            CaptureMode::Selfie => "image/jpeg",
        }
    }
}

/// RFC 3339 with the characters object stores dislike swapped out.
pub fn timestamp_slug(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// A stored object, addressable by public URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub public_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Remote object store boundary.
#[async_trait]
pub trait UploadGateway: Send + Sync {
    /// Persist a blob under `filename` in `bucket`. Names must not
    /// collide; overwriting is refused by the store.
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> CaptureResult<StoredObject>;

    /// The newest object in `bucket`, if the bucket has any.
    async fn list_newest(&self, bucket: &str) -> CaptureResult<Option<StoredObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn test_timestamp_slug_has_no_reserved_characters() {
        let slug = timestamp_slug(fixed_time());
        assert!(!slug.contains(':'));
        assert!(!slug.contains('.'));
        assert!(slug.starts_with("2025-03-14"));
    }

    #[test]
    fn test_video_filename_follows_negotiated_container() {
        let webm = CapturedArtifact::video(vec![1], "video/webm;codecs=vp9");
        assert!(webm.filename().starts_with("video-"));
        assert!(webm.filename().ends_with(".webm"));

        let mp4 = CapturedArtifact::video(vec![1], "video/mp4");
        assert!(mp4.filename().ends_with(".mp4"));
    }

    #[test]
    fn test_selfie_filename_and_bucket() {
        let selfie = CapturedArtifact::selfie(vec![1, 2, 3]);
        assert!(selfie.filename().starts_with("selfie-"));
        assert!(selfie.filename().ends_with(".jpg"));
        assert_eq!(selfie.bucket(), SELFIE_BUCKET);
        assert_eq!(selfie.content_type(), "image/jpeg");
    }

    #[test]
    fn test_video_declares_mp4_regardless_of_container() {
        let webm = CapturedArtifact::video(vec![1], "video/webm");
        assert_eq!(webm.bucket(), VIDEO_BUCKET);
        assert_eq!(webm.content_type(), "video/mp4");
    }
}
