//! Supabase-flavored storage client
//!
//! Thin reqwest wrapper over the storage HTTP API: object upload,
//! newest-object listing, and public URL construction.

use crate::storage::gateway::{StoredObject, UploadGateway};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

pub struct SupabaseStorage {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseStorage {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{bucket}/{}",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    /// Public (unauthenticated) URL for an object.
    pub fn public_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{}",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    fn list_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/object/list/{bucket}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    created_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl UploadGateway for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> CaptureResult<StoredObject> {
        let size = bytes.len();
        let response = self
            .client
            .post(self.object_url(bucket, filename))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "3600")
            // Collisions are an error, never an overwrite.
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptureError::StorageError(format!(
                "upload of {filename} failed with {status}: {body}"
            )));
        }

        tracing::info!(bucket, filename, size, "upload complete");
        Ok(StoredObject {
            bucket: bucket.to_string(),
            name: filename.to_string(),
            public_url: self.public_url(bucket, filename),
            created_at: Some(Utc::now()),
        })
    }

    async fn list_newest(&self, bucket: &str) -> CaptureResult<Option<StoredObject>> {
        let response = self
            .client
            .post(self.list_url(bucket))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&json!({
                "prefix": "",
                "limit": 1,
                "offset": 0,
                "sortBy": { "column": "created_at", "order": "desc" },
            }))
            .send()
            .await
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::StorageError(format!(
                "listing {bucket} failed with {status}"
            )));
        }

        let objects: Vec<ListedObject> = response
            .json()
            .await
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        Ok(objects.into_iter().next().map(|obj| StoredObject {
            bucket: bucket.to_string(),
            public_url: self.public_url(bucket, &obj.name),
            name: obj.name,
            created_at: obj.created_at,
        }))
    }
}
