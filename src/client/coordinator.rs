//! Upload coordinator
//!
//! Drives one multipart upload end-to-end: begin a session, fan out one
//! presigned URL request and one part transfer per chunk, then submit the
//! completion manifest. There is no per-step retry; a failure at any stage
//! takes the terminal abort path, and the caller may resubmit from scratch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::error::{Result, UploadError};
use crate::protocol::CompletedPartEntry;

use super::chunker::plan_parts;
use super::progress::ProgressTracker;
use super::transport::{PartTransport, UploadApi};

/// Lifecycle of one upload session
///
/// `Done` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UploadPhase {
    Idle = 0,
    SessionStarting = 1,
    PartsUploading = 2,
    Completing = 3,
    Done = 4,
    Aborting = 5,
    Aborted = 6,
}

impl UploadPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SessionStarting,
            2 => Self::PartsUploading,
            3 => Self::Completing,
            4 => Self::Done,
            5 => Self::Aborting,
            6 => Self::Aborted,
            _ => Self::Idle,
        }
    }
}

/// Cooperative cancellation signal for an in-flight upload
///
/// Cancelling halts issuance of new part transfers and triggers the abort
/// path; transfers already handed to the transport are abandoned, their
/// bytes discarded by the store on abort.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Result of a finished upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Remote file name (display name with its uniqueness prefix)
    pub object_name: String,

    /// Final object location returned by the store
    pub location: String,
}

/// Single-use driver for one multipart upload
pub struct UploadCoordinator<A: UploadApi, T: PartTransport> {
    api: A,
    transport: T,
    progress: Arc<ProgressTracker>,
    phase: AtomicU8,
    cancelled: Arc<AtomicBool>,
}

impl<A: UploadApi, T: PartTransport> UploadCoordinator<A, T> {
    pub fn new(api: A, transport: T) -> Self {
        Self {
            api,
            transport,
            progress: Arc::new(ProgressTracker::new()),
            phase: AtomicU8::new(UploadPhase::Idle as u8),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current phase; safe to poll from another task
    pub fn phase(&self) -> UploadPhase {
        UploadPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Aggregated progress; safe to poll while the upload runs
    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    /// Handle for cancelling this upload from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancelled.clone(),
        }
    }

    fn set_phase(&self, phase: UploadPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancelled_error() -> UploadError {
        UploadError::TransferError("Upload cancelled".to_string())
    }

    /// Upload `file` under `display_name`, returning the final object
    /// location.
    ///
    /// The remote name is the display name behind a fresh UUID prefix, so
    /// concurrent uploads of the same display name never share an object
    /// key.
    pub async fn upload(
        &self,
        file: Bytes,
        display_name: &str,
        content_type: &str,
    ) -> Result<UploadOutcome> {
        // Claim the coordinator atomically; concurrent callers must never
        // both open a session through it.
        if self
            .phase
            .compare_exchange(
                UploadPhase::Idle as u8,
                UploadPhase::SessionStarting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(UploadError::InvalidInput(
                "Coordinator already drove an upload; create a new one".to_string(),
            ));
        }

        if display_name.is_empty() {
            self.set_phase(UploadPhase::Idle);
            return Err(UploadError::InvalidInput("File name is required".to_string()));
        }

        // Chunk before any network call; an empty file fails here
        let parts = match plan_parts(file.len() as u64) {
            Ok(parts) => parts,
            Err(e) => {
                self.set_phase(UploadPhase::Idle);
                return Err(e);
            }
        };

        // Timestamp plus a random tag: readable ordering, and concurrent
        // uploads of the same name can never share an object key
        let tag = Uuid::new_v4().simple().to_string();
        let object_name = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            &tag[..8],
            display_name
        );

        let upload_id = match self.api.begin(&object_name, content_type).await {
            Ok(upload_id) => upload_id,
            Err(e) => {
                // No session was opened; the caller may simply resubmit
                self.set_phase(UploadPhase::Idle);
                return Err(e);
            }
        };

        tracing::info!(
            object_name = %object_name,
            upload_id = %upload_id,
            parts = parts.len(),
            "Upload session started"
        );

        if self.is_cancelled() {
            return self
                .abort(&object_name, &upload_id, Self::cancelled_error())
                .await;
        }

        let sizes: Vec<u64> = parts.iter().map(|part| part.len()).collect();
        self.progress.init_parts(&sizes);
        self.set_phase(UploadPhase::PartsUploading);

        // The URL requests are independent reads of the session; fetch them
        // all concurrently, and use none of them unless every one succeeds.
        let urls = match try_join_all(parts.iter().map(|part| {
            self.api
                .part_url(&object_name, part.part_number, &upload_id)
        }))
        .await
        {
            Ok(urls) => urls,
            Err(e) => return self.abort(&object_name, &upload_id, e).await,
        };

        if self.is_cancelled() {
            return self
                .abort(&object_name, &upload_id, Self::cancelled_error())
                .await;
        }

        // Fan out one transfer per part; the first failure cancels the rest
        // of the join and the whole upload.
        let transfers = parts.iter().zip(urls).map(|(part, url)| {
            let slice = file.slice(part.start as usize..part.end as usize);
            let part_number = part.part_number;
            let progress = self.progress.clone();
            async move {
                if self.is_cancelled() {
                    return Err(Self::cancelled_error());
                }
                let etag = self
                    .transport
                    .put_part(&url, slice, content_type, part_number, progress)
                    .await?;
                self.progress.mark_complete(part_number);
                Ok(CompletedPartEntry { etag, part_number })
            }
        });

        let manifest = match try_join_all(transfers).await {
            Ok(manifest) => manifest,
            Err(e) => return self.abort(&object_name, &upload_id, e).await,
        };

        self.set_phase(UploadPhase::Completing);
        match self.api.complete(&object_name, &manifest, &upload_id).await {
            Ok(location) => {
                self.set_phase(UploadPhase::Done);
                tracing::info!(
                    object_name = %object_name,
                    location = %location,
                    "Upload complete"
                );
                Ok(UploadOutcome {
                    object_name,
                    location,
                })
            }
            // Retrying completion with a consumed manifest is not safe to
            // assume idempotent, so a rejected manifest aborts too.
            Err(e) => self.abort(&object_name, &upload_id, e).await,
        }
    }

    /// Read a file from disk and upload it under its file name.
    pub async fn upload_path(
        &self,
        path: impl AsRef<Path>,
        content_type: &str,
    ) -> Result<UploadOutcome> {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                UploadError::InvalidInput(format!("Not a file path: {}", path.display()))
            })?
            .to_string();

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::InvalidInput(format!("Cannot read file: {}", e)))?;

        self.upload(Bytes::from(data), &display_name, content_type).await
    }

    /// Terminal abort path: tell the store to drop the session, then
    /// surface `error`. The abort call's own failure cannot reopen the
    /// session; it is appended to the caller-visible message.
    async fn abort(
        &self,
        object_name: &str,
        upload_id: &str,
        error: UploadError,
    ) -> Result<UploadOutcome> {
        self.set_phase(UploadPhase::Aborting);
        tracing::warn!(
            object_name = %object_name,
            upload_id = %upload_id,
            error = %error,
            "Aborting upload session"
        );

        let result = self.api.abort(object_name, upload_id).await;
        self.set_phase(UploadPhase::Aborted);

        match result {
            Ok(()) => Err(error),
            Err(abort_error) => Err(UploadError::SessionError(format!(
                "{}; abort also failed: {}",
                error, abort_error
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Protocol mock recording every handshake
    #[derive(Default)]
    struct MockApi {
        begins: Mutex<Vec<String>>,
        url_calls: AtomicUsize,
        completes: Mutex<Vec<Vec<CompletedPartEntry>>>,
        aborts: AtomicUsize,
        fail_begin: bool,
        fail_url_for_part: Option<i32>,
        fail_complete: bool,
        fail_abort: bool,
    }

    impl MockApi {
        fn begin_names(&self) -> Vec<String> {
            self.begins.lock().unwrap().clone()
        }

        fn completed_manifests(&self) -> Vec<Vec<CompletedPartEntry>> {
            self.completes.lock().unwrap().clone()
        }

        fn abort_count(&self) -> usize {
            self.aborts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadApi for MockApi {
        async fn begin(&self, file_name: &str, _file_type: &str) -> Result<String> {
            self.begins.lock().unwrap().push(file_name.to_string());
            if self.fail_begin {
                return Err(UploadError::SessionError(
                    "store rejected the object key".to_string(),
                ));
            }
            Ok("upload-123".to_string())
        }

        async fn part_url(
            &self,
            _file_name: &str,
            part_number: i32,
            _upload_id: &str,
        ) -> Result<String> {
            self.url_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_url_for_part == Some(part_number) {
                return Err(UploadError::SessionError(format!(
                    "no URL for part {}",
                    part_number
                )));
            }
            Ok(format!("https://store.example/part/{}", part_number))
        }

        async fn complete(
            &self,
            _file_name: &str,
            parts: &[CompletedPartEntry],
            _upload_id: &str,
        ) -> Result<String> {
            self.completes.lock().unwrap().push(parts.to_vec());
            if self.fail_complete {
                return Err(UploadError::ValidationError(
                    "store rejected the manifest".to_string(),
                ));
            }
            Ok("https://store.example/final".to_string())
        }

        async fn abort(&self, _file_name: &str, _upload_id: &str) -> Result<()> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            if self.fail_abort {
                return Err(UploadError::SessionError("abort rejected".to_string()));
            }
            Ok(())
        }
    }

    /// Transport mock returning "a", "b", "c"... as part digests
    #[derive(Default)]
    struct MockTransport {
        puts: Mutex<Vec<(i32, usize)>>,
        fail_part: Option<i32>,
        cancel_on_first_put: Mutex<Option<CancelHandle>>,
    }

    impl MockTransport {
        fn put_log(&self) -> Vec<(i32, usize)> {
            self.puts.lock().unwrap().clone()
        }

        fn cancel_on_first_put(&self, handle: CancelHandle) {
            *self.cancel_on_first_put.lock().unwrap() = Some(handle);
        }
    }

    #[async_trait]
    impl PartTransport for MockTransport {
        async fn put_part(
            &self,
            _url: &str,
            body: Bytes,
            _content_type: &str,
            part_number: i32,
            progress: Arc<ProgressTracker>,
        ) -> Result<String> {
            self.puts.lock().unwrap().push((part_number, body.len()));

            if let Some(handle) = self.cancel_on_first_put.lock().unwrap().take() {
                handle.cancel();
            }
            if self.fail_part == Some(part_number) {
                return Err(UploadError::TransferError(format!(
                    "Part {} PUT timed out",
                    part_number
                )));
            }

            progress.add_bytes(part_number, body.len() as u64);
            let digest = char::from(b'a' + (part_number - 1) as u8).to_string();
            Ok(digest)
        }
    }

    fn coordinator(
        api: Arc<MockApi>,
        transport: Arc<MockTransport>,
    ) -> UploadCoordinator<Arc<MockApi>, Arc<MockTransport>> {
        UploadCoordinator::new(api, transport)
    }

    #[tokio::test]
    async fn test_three_part_upload_ends_done() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let file = Bytes::from(vec![7u8; 60_000_000]);
        let outcome = coordinator
            .upload(file, "video.mp4", "video/mp4")
            .await
            .unwrap();

        assert_eq!(outcome.location, "https://store.example/final");
        assert!(outcome.object_name.ends_with("-video.mp4"));
        assert_eq!(coordinator.phase(), UploadPhase::Done);
        assert_eq!(coordinator.progress().percent(), 100);
        assert_eq!(api.abort_count(), 0);

        // 25 MB + 25 MB + 10 MB
        let mut puts = transport.put_log();
        puts.sort();
        assert_eq!(
            puts,
            vec![(1, 25_000_000), (2, 25_000_000), (3, 10_000_000)]
        );

        // Manifest in ascending index order with the store's digests
        let manifests = api.completed_manifests();
        assert_eq!(manifests.len(), 1);
        let expected: Vec<CompletedPartEntry> = [(1, "a"), (2, "b"), (3, "c")]
            .into_iter()
            .map(|(part_number, etag)| CompletedPartEntry {
                etag: etag.to_string(),
                part_number,
            })
            .collect();
        assert_eq!(manifests[0], expected);
    }

    #[tokio::test]
    async fn test_begin_failure_stays_idle_without_abort() {
        let api = Arc::new(MockApi {
            fail_begin: true,
            ..Default::default()
        });
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let err = coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "application/octet-stream")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("store rejected the object key"));
        assert_eq!(coordinator.phase(), UploadPhase::Idle);
        assert_eq!(api.abort_count(), 0);
        assert!(transport.put_log().is_empty());
    }

    #[tokio::test]
    async fn test_url_failure_aborts_before_any_transfer() {
        let api = Arc::new(MockApi {
            fail_url_for_part: Some(2),
            ..Default::default()
        });
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let file = Bytes::from(vec![0u8; 60_000_000]);
        let err = coordinator
            .upload(file, "a.bin", "application/octet-stream")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no URL for part 2"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
        // No partial URL set is ever used
        assert!(transport.put_log().is_empty());
        assert!(api.completed_manifests().is_empty());
    }

    #[tokio::test]
    async fn test_part_timeout_aborts_without_complete() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport {
            fail_part: Some(2),
            ..Default::default()
        });
        let coordinator = coordinator(api.clone(), transport.clone());

        let file = Bytes::from(vec![0u8; 60_000_000]);
        let err = coordinator
            .upload(file, "a.bin", "application/octet-stream")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Part 2 PUT timed out"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
        assert!(api.completed_manifests().is_empty());
    }

    #[tokio::test]
    async fn test_complete_failure_aborts() {
        let api = Arc::new(MockApi {
            fail_complete: true,
            ..Default::default()
        });
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let err = coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("store rejected the manifest"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
    }

    #[tokio::test]
    async fn test_abort_failure_still_terminates_and_is_reported() {
        let api = Arc::new(MockApi {
            fail_complete: true,
            fail_abort: true,
            ..Default::default()
        });
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let err = coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("store rejected the manifest"));
        assert!(message.contains("abort also failed"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_remaining_transfers() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        // The first PUT flips the cancel flag; later parts must never be sent
        transport.cancel_on_first_put(coordinator.cancel_handle());

        let file = Bytes::from(vec![0u8; 60_000_000]);
        let err = coordinator
            .upload(file, "a.bin", "application/octet-stream")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
        // Only the transfer that triggered the cancel was issued
        assert_eq!(transport.put_log().len(), 1);
        assert!(api.completed_manifests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_transfers_aborts_with_no_puts() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        coordinator.cancel_handle().cancel();

        let err = coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
        assert_eq!(coordinator.phase(), UploadPhase::Aborted);
        assert_eq!(api.abort_count(), 1);
        assert!(transport.put_log().is_empty());
    }

    #[tokio::test]
    async fn test_same_display_name_gets_distinct_object_names() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());

        for _ in 0..2 {
            let coordinator = coordinator(api.clone(), transport.clone());
            coordinator
                .upload(Bytes::from_static(b"data"), "same.bin", "text/plain")
                .await
                .unwrap();
        }

        let names = api.begin_names();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert!(names.iter().all(|name| name.ends_with("-same.bin")));
    }

    #[tokio::test]
    async fn test_empty_file_rejected_before_any_network_call() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let err = coordinator
            .upload(Bytes::new(), "a.bin", "text/plain")
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidInput(_)));
        assert!(api.begin_names().is_empty());
        assert_eq!(coordinator.phase(), UploadPhase::Idle);
    }

    #[tokio::test]
    async fn test_coordinator_is_single_use() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
            .await
            .unwrap();

        let err = coordinator
            .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_upload_calls_open_one_session() {
        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = Arc::new(coordinator(api.clone(), transport.clone()));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    coordinator
                        .upload(Bytes::from_static(b"data"), "a.bin", "text/plain")
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(UploadError::InvalidInput(_)) => rejected += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        // Exactly one caller claims the coordinator; the other never
        // reaches the store.
        assert_eq!((succeeded, rejected), (1, 1));
        assert_eq!(api.begin_names().len(), 1);
        assert_eq!(api.abort_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"contents").unwrap();

        let api = Arc::new(MockApi::default());
        let transport = Arc::new(MockTransport::default());
        let coordinator = coordinator(api.clone(), transport.clone());

        let outcome = coordinator.upload_path(&path, "text/plain").await.unwrap();
        assert!(outcome.object_name.ends_with("-report.txt"));
        assert_eq!(transport.put_log(), vec![(1, 8)]);
    }
}
