//! S3-backed gateway implementation
//!
//! Wraps the AWS SDK's multipart calls and presigns one PUT URL per part.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};

use crate::config::StorageConfig;
use crate::error::{Result, UploadError};
use crate::protocol::CompletedPartEntry;

use super::ObjectStoreGateway;

/// How long an issued part URL stays valid
const PART_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// S3 caps multipart uploads at 10,000 parts
const MAX_PART_NUMBER: i32 = 10_000;

/// Gateway over an S3-compatible store
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
    bucket: String,
}

impl S3Gateway {
    /// Create a new gateway from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "portage",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            // Path-style addressing for MinIO and other S3-compatible services
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Ok(Self { client, bucket })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn validate_object_key(object_key: &str) -> Result<()> {
        if object_key.is_empty() {
            return Err(UploadError::SessionError(
                "Object key must not be empty".to_string(),
            ));
        }
        if object_key.ends_with('/') {
            return Err(UploadError::SessionError(
                "Object key must not end with '/'".to_string(),
            ));
        }
        Ok(())
    }

    fn session_error(op: &str, e: impl std::fmt::Display) -> UploadError {
        let msg = e.to_string();
        if msg.contains("NoSuchUpload") {
            UploadError::SessionError("Upload session not found or expired".to_string())
        } else {
            UploadError::SessionError(format!("{} failed: {}", op, msg))
        }
    }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn begin_upload(&self, object_key: &str, content_type: &str) -> Result<String> {
        Self::validate_object_key(object_key)?;

        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Self::session_error("Create multipart upload", e))?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| {
                UploadError::SessionError("Store returned no upload id".to_string())
            })?
            .to_string();

        tracing::info!(
            object_key = %object_key,
            upload_id = %upload_id,
            "Started multipart upload session"
        );

        Ok(upload_id)
    }

    async fn part_upload_url(
        &self,
        object_key: &str,
        upload_id: &str,
        part_number: i32,
    ) -> Result<String> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(UploadError::SessionError(format!(
                "Part number {} out of range (1..={})",
                part_number, MAX_PART_NUMBER
            )));
        }

        let presigning = PresigningConfig::expires_in(PART_URL_TTL)
            .map_err(|e| UploadError::SessionError(format!("Presigning config: {}", e)))?;

        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(object_key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning)
            .await
            .map_err(|e| Self::session_error("Presign part upload", e))?;

        Ok(presigned.uri().to_string())
    }

    async fn complete_upload(
        &self,
        object_key: &str,
        upload_id: &str,
        manifest: &[CompletedPartEntry],
    ) -> Result<String> {
        let parts: Vec<CompletedPart> = manifest
            .iter()
            .map(|entry| {
                CompletedPart::builder()
                    .e_tag(&entry.etag)
                    .part_number(entry.part_number)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("InvalidPart") || msg.contains("InvalidPartOrder") {
                    UploadError::ValidationError(format!("Store rejected manifest: {}", msg))
                } else {
                    Self::session_error("Complete multipart upload", e)
                }
            })?;

        let location = output
            .location()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("s3://{}/{}", self.bucket, object_key));

        tracing::info!(
            object_key = %object_key,
            upload_id = %upload_id,
            parts = manifest.len(),
            location = %location,
            "Completed multipart upload"
        );

        Ok(location)
    }

    async fn abort_upload(&self, object_key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Self::session_error("Abort multipart upload", e))?;

        tracing::info!(
            object_key = %object_key,
            upload_id = %upload_id,
            "Aborted multipart upload session"
        );

        Ok(())
    }
}
