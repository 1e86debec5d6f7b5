//! Client transport
//!
//! Two seams between the coordinator and the network: `UploadApi` covers the
//! four protocol handshakes against the relay server, `PartTransport` covers
//! the direct PUT of one part's bytes to its presigned URL. Both have
//! `reqwest`-backed production implementations; tests substitute mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::PASS_HEADER;
use crate::error::{Result, UploadError};
use crate::protocol::{
    AbortUploadRequest, AbortUploadResponse, BeginUploadRequest, BeginUploadResponse,
    CompleteUploadRequest, CompleteUploadResponse, CompletedPartEntry, FailureResponse,
    PartUrlRequest, PartUrlResponse,
};

use super::progress::ProgressTracker;

/// Deadline for one protocol handshake
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for one part PUT (a part is up to 25 MB)
const PART_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Bytes handed to the transport per progress tick
///
/// Progress is counted when a slice enters the request body stream, not
/// when the store acknowledges it, so a reading can lead the delivered
/// bytes by the in-flight buffered window (at most a few of these chunks).
const STREAM_CHUNK: usize = 64 * 1024;

/// The four protocol handshakes, as seen from the client
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Start an upload session, returning the store's upload id.
    async fn begin(&self, file_name: &str, file_type: &str) -> Result<String>;

    /// Fetch the presigned transfer URL for one part.
    async fn part_url(&self, file_name: &str, part_number: i32, upload_id: &str)
        -> Result<String>;

    /// Submit the completion manifest, returning the final object location.
    async fn complete(
        &self,
        file_name: &str,
        parts: &[CompletedPartEntry],
        upload_id: &str,
    ) -> Result<String>;

    /// Abort the session.
    async fn abort(&self, file_name: &str, upload_id: &str) -> Result<()>;
}

/// Direct transfer of one part's bytes to its presigned URL
#[async_trait]
pub trait PartTransport: Send + Sync {
    /// PUT `body` to `url`, feeding byte counts into `progress` as the
    /// transfer advances. Returns the store's content tag for the part.
    async fn put_part(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        part_number: i32,
        progress: Arc<ProgressTracker>,
    ) -> Result<String>;
}

#[async_trait]
impl<A: UploadApi + ?Sized> UploadApi for Arc<A> {
    async fn begin(&self, file_name: &str, file_type: &str) -> Result<String> {
        (**self).begin(file_name, file_type).await
    }

    async fn part_url(
        &self,
        file_name: &str,
        part_number: i32,
        upload_id: &str,
    ) -> Result<String> {
        (**self).part_url(file_name, part_number, upload_id).await
    }

    async fn complete(
        &self,
        file_name: &str,
        parts: &[CompletedPartEntry],
        upload_id: &str,
    ) -> Result<String> {
        (**self).complete(file_name, parts, upload_id).await
    }

    async fn abort(&self, file_name: &str, upload_id: &str) -> Result<()> {
        (**self).abort(file_name, upload_id).await
    }
}

#[async_trait]
impl<T: PartTransport + ?Sized> PartTransport for Arc<T> {
    async fn put_part(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        part_number: i32,
        progress: Arc<ProgressTracker>,
    ) -> Result<String> {
        (**self)
            .put_part(url, body, content_type, part_number, progress)
            .await
    }
}

/// HTTP client for the relay server's protocol endpoints
pub struct HttpUploadApi {
    client: reqwest::Client,
    base_url: String,
    upload_key: String,
}

impl HttpUploadApi {
    /// `base_url` is the server root, e.g. `http://localhost:3005`.
    pub fn new(base_url: impl Into<String>, upload_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| UploadError::TransferError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_key: upload_key.into(),
        })
    }

    /// POST one protocol request, surfacing the server's failure message
    /// verbatim via `on_failure`.
    async fn post<Req, Resp>(
        &self,
        path: &str,
        request: &Req,
        on_failure: fn(String) -> UploadError,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(PASS_HEADER, &self.upload_key)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .json::<FailureResponse>()
                .await
                .map(|failure| failure.message)
                .unwrap_or_else(|_| "Upload request rejected".to_string());
            Err(on_failure(message))
        }
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn begin(&self, file_name: &str, file_type: &str) -> Result<String> {
        let request = BeginUploadRequest {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
        };
        let response: BeginUploadResponse = self
            .post("/api/upload/id", &request, UploadError::SessionError)
            .await?;
        Ok(response.upload_id)
    }

    async fn part_url(
        &self,
        file_name: &str,
        part_number: i32,
        upload_id: &str,
    ) -> Result<String> {
        let request = PartUrlRequest {
            file_name: file_name.to_string(),
            part_number,
            upload_id: upload_id.to_string(),
        };
        let response: PartUrlResponse = self
            .post("/api/upload/url", &request, UploadError::SessionError)
            .await?;
        Ok(response.upload_url)
    }

    async fn complete(
        &self,
        file_name: &str,
        parts: &[CompletedPartEntry],
        upload_id: &str,
    ) -> Result<String> {
        let request = CompleteUploadRequest {
            file_name: file_name.to_string(),
            parts: parts.to_vec(),
            upload_id: upload_id.to_string(),
        };
        let response: CompleteUploadResponse = self
            .post("/api/upload/location", &request, UploadError::ValidationError)
            .await?;
        Ok(response.location)
    }

    async fn abort(&self, file_name: &str, upload_id: &str) -> Result<()> {
        let request = AbortUploadRequest {
            file_name: file_name.to_string(),
            upload_id: upload_id.to_string(),
        };
        let _: AbortUploadResponse = self
            .post("/api/upload/abort", &request, UploadError::SessionError)
            .await?;
        Ok(())
    }
}

/// reqwest-backed part transport streaming bytes straight to the store
pub struct HttpPartTransport {
    client: reqwest::Client,
}

impl HttpPartTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PART_TIMEOUT)
            .build()
            .map_err(|e| UploadError::TransferError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put_part(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        part_number: i32,
        progress: Arc<ProgressTracker>,
    ) -> Result<String> {
        let total = body.len();

        // Hand the body over in small slices so the progress tracker moves
        // while the transfer is in flight, not only at the end.
        let mut slices = Vec::with_capacity(total.div_ceil(STREAM_CHUNK));
        let mut offset = 0;
        while offset < total {
            let end = (offset + STREAM_CHUNK).min(total);
            slices.push(body.slice(offset..end));
            offset = end;
        }

        let stream = futures::stream::iter(slices.into_iter().map(move |slice| {
            progress.add_bytes(part_number, slice.len() as u64);
            Ok::<Bytes, std::io::Error>(slice)
        }));

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| {
                UploadError::TransferError(format!("Part {} PUT failed: {}", part_number, e))
            })?;

        if !response.status().is_success() {
            return Err(UploadError::TransferError(format!(
                "Part {} PUT rejected with status {}",
                part_number,
                response.status()
            )));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .ok_or_else(|| {
                UploadError::TransferError(format!(
                    "Part {} response carried no ETag",
                    part_number
                ))
            })?;

        Ok(etag)
    }
}
