use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use chrono::Utc;
use s3::primitives::ByteStream;
use std::{
    collections::{HashMap, HashSet},
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file area I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("object storage request failed: {0}")]
    Remote(String),
    #[error("Mock Storage Error: Simulation requested")]
    Simulated,
}

// 1. StorageService Contract
/// StorageService
///
/// The backing file area for photo bytes. Handlers only know filenames; where the
/// bytes live (a local directory, an S3 bucket, or memory in tests) is decided once
/// at startup.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the file area (creates the directory or bucket). Safe to call on
    /// every startup.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError>;

    /// Writes `bytes` under `filename`, replacing anything already stored there.
    async fn save(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<(), StorageError>;

    /// Deletes `filename`. Removing a file that is already gone succeeds.
    async fn remove(&self, filename: &str) -> Result<(), StorageError>;
}

// 2. Local directory, served under /public in Env::Local
/// LocalStorage
///
/// Stores each photo as a flat file inside `root`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(sanitize_key(filename))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn save(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(filename), &bytes).await?;
        tracing::debug!(filename, size = bytes.len(), "photo written to local file area");
        Ok(())
    }

    async fn remove(&self, filename: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(filename, "photo file already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// 3. The S3 Implementation (MinIO/Supabase/AWS)
/// S3StorageClient
///
/// Stores photos as objects in one bucket of an S3-compatible service.
///
/// The `force_path_style(true)` is critical for MinIO and Supabase compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key).
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket fails when the bucket already exists, which is the normal case
    /// after the first boot.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
        Ok(())
    }

    async fn save(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(filename))
            .body(ByteStream::from(bytes.to_vec()));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(())
    }

    /// DeleteObject on a missing key succeeds on S3, so removal stays idempotent.
    async fn remove(&self, filename: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(filename))
            .send()
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(())
    }
}

/// sanitize_key
///
/// Strips directory navigation components (`..`, `.`, empty segments) from a key so
/// a stored name can never escape the file area.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds `photos_<ownerId>_<unixNanos>_<name>` from the client-supplied filename.
/// Only the last path component of `original` is kept, and anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn unique_filename(owner_id: i64, original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        cleaned = "photo".to_string();
    }

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("photos_{owner_id}_{nanos}_{cleaned}")
}

/// The filename a public URL points at: its last `/` segment.
pub fn filename_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

pub fn public_url(base: &str, filename: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), filename)
}

// 4. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory file area. Clones share the same contents, so a test can keep a handle
/// after moving one into the application state.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every operation returns `StorageError::Simulated`.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    // Files whose removal fails even when `should_fail` is off.
    undeletable: Arc<Mutex<HashSet<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later `remove` of `filename` fail with `StorageError::Simulated`.
    pub fn fail_removal_of(&self, filename: &str) {
        self.undeletable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(sanitize_key(filename));
    }

    /// Places a file directly, bypassing `should_fail`.
    pub fn seed(&self, filename: &str, bytes: impl Into<Bytes>) {
        self.files().insert(filename.to_string(), bytes.into());
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files().contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<Bytes> {
        self.files().get(filename).cloned()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        self.files().insert(sanitize_key(filename), bytes);
        Ok(())
    }

    async fn remove(&self, filename: &str) -> Result<(), StorageError> {
        let key = sanitize_key(filename);
        let undeletable = self
            .undeletable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&key);
        if self.should_fail || undeletable {
            return Err(StorageError::Simulated);
        }
        self.files().remove(&key);
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service access across the application state.
pub type StorageState = Arc<dyn StorageService>;
