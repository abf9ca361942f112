//! Attachment storage backends.
//!
//! Files are written under `<folder>/<filename>`, where the folder is the lead
//! id and the filename a generated UUID plus the sanitized original
//! extension. Client-supplied names never reach the file system.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

use crate::config::{Config, S3Config, StorageKind};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store error: {0}")]
    ObjectStore(String),
}

/// Where a stored file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredFile, StorageError>;

    /// Backend name for logs
    fn kind(&self) -> &'static str;
}

/// Generated storage name: a UUID plus the lower-cased extension of the
/// original name when it is short and alphanumeric.
pub fn storage_filename(original_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

fn check_segment(segment: &str) -> Result<(), StorageError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(segment.to_string()))
    }
}

/// Stores files below a local directory served at `/uploads`
pub struct LocalFileStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: "/uploads".to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        _content_type: &str,
        data: Bytes,
    ) -> Result<StoredFile, StorageError> {
        check_segment(folder)?;
        check_segment(filename)?;

        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(filename), &data).await?;

        tracing::debug!(folder = %folder, filename = %filename, size = data.len(), "Stored file locally");

        Ok(StoredFile {
            filename: filename.to_string(),
            url: format!("{}/{}/{}", self.url_prefix, folder, filename),
        })
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

/// Stores files in an S3-compatible bucket
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    public_url: String,
}

impl S3FileStore {
    pub async fn from_config(s3_config: &S3Config) -> anyhow::Result<Self> {
        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(s3_config.region.clone()));

        if let Some(ref endpoint) = s3_config.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        let s3_sdk_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(s3_config.endpoint.is_some())
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_sdk_config);

        tracing::info!(
            "S3 attachment storage enabled: bucket={}, prefix={}",
            s3_config.bucket,
            s3_config.prefix
        );

        Ok(Self::with_client(client, s3_config))
    }

    /// Build with a pre-made client
    pub fn with_client(client: aws_sdk_s3::Client, s3_config: &S3Config) -> Self {
        let public_url = s3_config.public_url.clone().unwrap_or_else(|| {
            match &s3_config.endpoint {
                Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), s3_config.bucket),
                None => format!(
                    "https://{}.s3.{}.amazonaws.com",
                    s3_config.bucket, s3_config.region
                ),
            }
        });

        Self {
            client,
            bucket: s3_config.bucket.clone(),
            prefix: s3_config.prefix.clone(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn key(&self, folder: &str, filename: &str) -> String {
        format!("{}{}/{}", self.prefix, folder, filename)
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredFile, StorageError> {
        check_segment(folder)?;
        check_segment(filename)?;

        let key = self.key(folder, filename);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(data.into())
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("upload of {} failed: {}", key, e)))?;

        tracing::info!("Uploaded attachment to S3: s3://{}/{}", self.bucket, key);

        Ok(StoredFile {
            filename: filename.to_string(),
            url: format!("{}/{}", self.public_url, key),
        })
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}

/// Build the store selected in the configuration
pub async fn from_config(config: &Config) -> anyhow::Result<Arc<dyn FileStore>> {
    match config.uploads.storage {
        StorageKind::Local => {
            let dir = config.uploads.local_dir(&config.server.data_dir);
            std::fs::create_dir_all(&dir)?;
            Ok(Arc::new(LocalFileStore::new(dir)))
        }
        StorageKind::S3 => {
            let s3_config = config
                .uploads
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("uploads.s3 section is missing"))?;
            Ok(Arc::new(S3FileStore::from_config(s3_config).await?))
        }
    }
}
