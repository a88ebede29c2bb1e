//! Operation handlers.
//!
//! Each handler is one store interaction wrapped with sandboxing and an
//! optional role check. Results are caller-facing strings: failures are
//! reported in the text, not as errors. Two exceptions are kept as callers
//! depend on them:
//!
//! - [`StorageTools::read_file`] returns `Err` when the bucket or object is
//!   missing.
//! - [`StorageTools::list_objects`] returns a JSON object with an `error`
//!   field instead of a JSON array when the listing fails.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::json;

use crate::identity::Identity;
use crate::sandbox::Sandbox;
use crate::store::{ObjectStore, StoreError};

/// Text returned when an admin-only operation is attempted without the role.
pub const PERMISSION_DENIED: &str = "Error: This operation requires 'agent-admin' role.";

const SEPARATOR: char = '/';

#[derive(Serialize)]
struct Permission<'a> {
    role: &'a str,
    member: &'a str,
}

/// Admin operations are open in anonymous mode; otherwise the role decides.
fn is_permitted(identity: Option<&Identity>) -> bool {
    identity.is_none_or(Identity::is_admin)
}

fn base_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// The storage operations exposed as tools.
#[derive(Clone)]
pub struct StorageTools {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for StorageTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageTools").finish_non_exhaustive()
    }
}

impl StorageTools {
    /// Create handlers over a shared store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create a bucket. Admin only.
    pub async fn create_bucket(&self, identity: Option<&Identity>, bucket: &str) -> String {
        if !is_permitted(identity) {
            return PERMISSION_DENIED.to_string();
        }
        match self.store.create_bucket(bucket).await {
            Ok(()) => {
                tracing::info!("Created bucket '{}'", bucket);
                format!("Successfully created bucket '{}'.", bucket)
            }
            Err(StoreError::AlreadyExists(_)) => format!("Bucket '{}' already exists.", bucket),
            Err(e) => {
                tracing::error!("Failed to create bucket '{}': {}", bucket, e);
                format!("Failed to create bucket '{}': {}", bucket, e)
            }
        }
    }

    /// Upload base64 `content` to `path`, overwriting any existing object.
    pub async fn upload_file(
        &self,
        identity: Option<&Identity>,
        bucket: &str,
        path: &str,
        content: &str,
    ) -> String {
        if identity.is_none() {
            tracing::warn!("Operating in anonymous mode. Path: '{}'", path);
        }
        let storage_path = Sandbox::new(identity).to_storage(path);

        let result = async {
            self.store.ensure_bucket(bucket).await?;
            let data = BASE64.decode(content.trim()).map_err(|e| {
                StoreError::Unexpected(format!("invalid base64 content: {}", e))
            })?;
            self.store.put_object(bucket, &storage_path, data).await
        }
        .await;

        match result {
            Ok(()) => format!(
                "File '{}' successfully uploaded to bucket '{}'.",
                path, bucket
            ),
            Err(StoreError::NotFound(_)) => format!("Error: Bucket '{}' not found.", bucket),
            Err(e) => {
                tracing::error!("Upload of '{}' to '{}' failed: {}", path, bucket, e);
                format!("An error occurred: {}", e)
            }
        }
    }

    /// Read an object and return its content base64-encoded.
    ///
    /// Unlike the other handlers, a missing bucket or object is an `Err`.
    pub async fn read_file(
        &self,
        identity: Option<&Identity>,
        bucket: &str,
        path: &str,
    ) -> Result<String, StoreError> {
        let storage_path = Sandbox::new(identity).to_storage(path);

        self.store.ensure_bucket(bucket).await?;
        if !self.store.object_exists(bucket, &storage_path).await? {
            return Err(StoreError::NotFound(format!(
                "File '{}' not found in bucket '{}'.",
                path, bucket
            )));
        }
        let data = self.store.get_object(bucket, &storage_path).await?;
        Ok(BASE64.encode(data))
    }

    /// List one directory level as a JSON array of names and sub-prefixes.
    pub async fn list_objects(
        &self,
        identity: Option<&Identity>,
        bucket: &str,
        path: &str,
    ) -> String {
        let sandbox = Sandbox::new(identity);
        let mut prefix = sandbox.to_storage(path);
        if !prefix.is_empty() && !prefix.ends_with(SEPARATOR) {
            prefix.push(SEPARATOR);
        }

        let listing = match self.store.ensure_bucket(bucket).await {
            Ok(()) => {
                self.store
                    .list_objects(bucket, &prefix, Some("/"))
                    .await
            }
            Err(e) => Err(e),
        };
        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => return json!({ "error": e.to_string() }).to_string(),
        };

        let items: Vec<&str> = listing
            .objects
            .iter()
            .filter(|name| **name != prefix)
            .chain(listing.prefixes.iter())
            .map(|name| sandbox.to_caller(name))
            .collect();
        json!(items).to_string()
    }

    /// Delete one object, or everything under a path ending in `/`.
    pub async fn delete_object(
        &self,
        identity: Option<&Identity>,
        bucket: &str,
        path: &str,
    ) -> String {
        let storage_path = Sandbox::new(identity).to_storage(path);

        match self.try_delete(bucket, path, &storage_path).await {
            Ok(message) => message,
            Err(StoreError::NotFound(_)) => format!("Error: Bucket '{}' not found.", bucket),
            Err(e) => {
                tracing::error!("Delete of '{}' in '{}' failed: {}", path, bucket, e);
                format!("An error occurred: {}", e)
            }
        }
    }

    /// Move an object by copy then delete.
    ///
    /// A destination ending in `/` receives the source's base name. If the
    /// delete fails after the copy, the object is left in both places.
    pub async fn move_object(
        &self,
        identity: Option<&Identity>,
        source_bucket: &str,
        source_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> String {
        let sandbox = Sandbox::new(identity);
        let mut final_dest = dest_path.to_string();
        if dest_path.ends_with(SEPARATOR) {
            final_dest.push_str(base_name(source_path));
        }
        let storage_source = sandbox.to_storage(source_path);
        let storage_dest = sandbox.to_storage(&final_dest);

        let result = self
            .try_move(
                source_bucket,
                &storage_source,
                dest_bucket,
                &storage_dest,
            )
            .await;

        match result {
            Ok(true) => format!("Successfully moved '{}' to '{}'.", source_path, final_dest),
            Ok(false) => format!("Error: Source file '{}' not found.", source_path),
            Err(StoreError::NotFound(_)) => "Error: One of the buckets was not found.".to_string(),
            Err(e) => {
                tracing::error!(
                    "Move of '{}' to '{}' failed: {}",
                    source_path,
                    final_dest,
                    e
                );
                format!("An error occurred: {}", e)
            }
        }
    }

    /// Delete a bucket; `force` also deletes its objects. Admin only.
    pub async fn delete_bucket(
        &self,
        identity: Option<&Identity>,
        bucket: &str,
        force: bool,
    ) -> String {
        if !is_permitted(identity) {
            return PERMISSION_DENIED.to_string();
        }

        let result = async {
            self.store.ensure_bucket(bucket).await?;
            self.store.delete_bucket(bucket, force).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("Deleted bucket '{}' (force: {})", bucket, force);
                format!("Bucket '{}' has been deleted.", bucket)
            }
            Err(StoreError::NotFound(_)) => format!("Error: Bucket '{}' not found.", bucket),
            Err(e) => {
                tracing::error!("Delete of bucket '{}' failed: {}", bucket, e);
                format!("An error occurred: {}", e)
            }
        }
    }

    /// IAM bindings flattened into a JSON array of `{role, member}`. Admin only.
    pub async fn bucket_permissions(&self, identity: Option<&Identity>, bucket: &str) -> String {
        if !is_permitted(identity) {
            return PERMISSION_DENIED.to_string();
        }

        let result = async {
            self.store.ensure_bucket(bucket).await?;
            self.store.bucket_iam_bindings(bucket).await
        }
        .await;

        match result {
            Ok(bindings) => {
                let permissions: Vec<Permission<'_>> = bindings
                    .iter()
                    .flat_map(|b| {
                        b.members.iter().map(|member| Permission {
                            role: &b.role,
                            member,
                        })
                    })
                    .collect();
                json!(permissions).to_string()
            }
            Err(StoreError::NotFound(_)) => format!("Error: Bucket '{}' not found.", bucket),
            Err(e) => format!("An error occurred while fetching permissions: {}", e),
        }
    }
}

impl StorageTools {
    async fn try_delete(
        &self,
        bucket: &str,
        path: &str,
        storage_path: &str,
    ) -> Result<String, StoreError> {
        self.store.ensure_bucket(bucket).await?;

        if !storage_path.ends_with(SEPARATOR) {
            if !self.store.object_exists(bucket, storage_path).await? {
                return Ok(format!(
                    "Error: File '{}' not found in bucket '{}'.",
                    path, bucket
                ));
            }
            self.store.delete_object(bucket, storage_path).await?;
            return Ok(format!("File '{}' successfully deleted.", path));
        }

        let names = self
            .store
            .list_objects(bucket, storage_path, None)
            .await?
            .objects;
        if names.is_empty() {
            return Ok(format!(
                "Directory '{}' is already empty or does not exist.",
                path
            ));
        }
        for name in &names {
            self.store.delete_object(bucket, name).await?;
        }
        tracing::info!("Deleted {} objects under '{}'", names.len(), storage_path);
        Ok(format!(
            "Successfully deleted directory '{}' and its contents.",
            path
        ))
    }

    /// `Ok(false)` when the source object is missing.
    async fn try_move(
        &self,
        source_bucket: &str,
        storage_source: &str,
        dest_bucket: &str,
        storage_dest: &str,
    ) -> Result<bool, StoreError> {
        self.store.ensure_bucket(source_bucket).await?;
        if !self
            .store
            .object_exists(source_bucket, storage_source)
            .await?
        {
            return Ok(false);
        }
        // Copy-then-delete onto itself would remove the only copy.
        if source_bucket == dest_bucket && storage_source == storage_dest {
            return Ok(true);
        }
        self.store.ensure_bucket(dest_bucket).await?;
        self.store
            .copy_object(source_bucket, storage_source, dest_bucket, storage_dest)
            .await?;
        self.store.delete_object(source_bucket, storage_source).await?;
        Ok(true)
    }
}
