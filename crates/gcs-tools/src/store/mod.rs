//! Object store abstraction.
//!
//! [`ObjectStore`] is the single seam between the operation handlers and the
//! storage service. Every method is one logical call; there are no retries
//! and multi-step operations (force delete, move) are composed by callers or
//! implementations without rollback.

mod gcs;
mod memory;

use async_trait::async_trait;
use serde::Serialize;

pub use gcs::{GcsConfig, GcsStore};
pub use memory::MemoryStore;

/// Errors from the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bucket or object does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Bucket name already taken.
    #[error("{0}")]
    AlreadyExists(String),
    /// Bucket still holds objects and `force` was not set.
    #[error("bucket '{0}' is not empty")]
    NotEmpty(String),
    /// Transport failure talking to the backend.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Anything else the backend reported.
    #[error("{0}")]
    Unexpected(String),
}

impl StoreError {
    /// Returns true for the not-found case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Full names of objects directly matched.
    pub objects: Vec<String>,
    /// Common prefixes (one delimiter level below the query prefix).
    pub prefixes: Vec<String>,
}

/// One IAM role binding on a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IamBinding {
    /// Role name, e.g. `roles/storage.objectViewer`.
    pub role: String,
    /// Members holding the role.
    pub members: Vec<String>,
}

/// Operations the tools need from a bucket/object service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket. Fails with [`StoreError::AlreadyExists`] on collision.
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Check a bucket exists, failing with [`StoreError::NotFound`] if not.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Delete a bucket. With `force`, its objects are deleted first.
    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), StoreError>;

    /// Create or overwrite an object.
    async fn put_object(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Returns true if the object exists.
    async fn object_exists(&self, bucket: &str, name: &str) -> Result<bool, StoreError>;

    /// Download an object's bytes.
    async fn get_object(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError>;

    /// List objects under `prefix`. With a delimiter, names past the next
    /// delimiter are folded into [`Listing::prefixes`].
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Listing, StoreError>;

    /// Delete an object.
    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StoreError>;

    /// Server-side copy of an object, possibly across buckets.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), StoreError>;

    /// Read the bucket's IAM policy bindings.
    async fn bucket_iam_bindings(&self, bucket: &str) -> Result<Vec<IamBinding>, StoreError>;
}
