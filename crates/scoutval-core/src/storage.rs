// Read-only access to the bucket holding uploaded CSV files.
//
// Uploads happen client-side; this side only downloads by key.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, StorageBackend};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    #[error("failed to read {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    #[error("storage request for {key} failed with status {status}: {message}")]
    Http {
        key: String,
        status: u16,
        message: String,
    },

    #[error("invalid storage base URL {url:?}")]
    BaseUrl { url: String },

    #[error("storage request for {key} failed: {source}")]
    Request {
        key: String,
        source: reqwest::Error,
    },
}

// ---------------------------------------------------------------------------
// BlobStore trait
// ---------------------------------------------------------------------------

/// A bucket of objects addressed by string key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full contents of the object stored under `key`.
    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the blob store selected by `config.storage`.
pub fn from_config(config: &Config) -> Arc<dyn BlobStore> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => Arc::new(LocalBlobStore::new(
            storage.root.clone().unwrap_or_default(),
            storage.bucket.clone(),
        )),
        StorageBackend::Http => Arc::new(HttpBlobStore::new(
            storage.base_url.clone().unwrap_or_default(),
            storage.bucket.clone(),
            config.credentials.storage_api_key.clone(),
        )),
    }
}

/// Reject keys that could escape the bucket or address a nested path.
fn check_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0');
    if bad {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// LocalBlobStore
// ---------------------------------------------------------------------------

/// Objects stored as files under `<root>/<bucket>/<key>`.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            dir: root.into().join(bucket.into()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        check_key(key)?;
        let path = self.dir.join(key);
        debug!("reading blob from {}", path.display());
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    source: e,
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// HttpBlobStore
// ---------------------------------------------------------------------------

/// Objects served by a storage REST API at
/// `{base_url}/storage/v1/object/{bucket}/{key}`.
pub struct HttpBlobStore {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: String, bucket: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            api_key,
        }
    }

    /// The key is pushed as a single encoded path segment, so `#`, `?` and
    /// `%` stay part of the object name.
    fn object_url(&self, key: &str) -> Result<reqwest::Url, StorageError> {
        let base_err = || StorageError::BaseUrl {
            url: self.base_url.clone(),
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| base_err())?;
        url.path_segments_mut()
            .map_err(|_| base_err())?
            .pop_if_empty()
            .extend(["storage", "v1", "object", self.bucket.as_str(), key]);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        check_key(key)?;
        let url = self.object_url(key)?;
        debug!("downloading blob from {url}");

        let mut request = self.http.get(url);
        if let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request
                .header("authorization", format!("Bearer {api_key}"))
                .header("apikey", api_key);
        }

        let request_err = |source| StorageError::Request {
            key: key.to_string(),
            source,
        };
        let response = request.send().await.map_err(request_err)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Http {
                key: key.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(request_err)?;
        Ok(bytes.to_vec())
    }
}
