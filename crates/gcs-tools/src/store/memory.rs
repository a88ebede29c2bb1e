//! In-process object store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IamBinding, Listing, ObjectStore, StoreError};

#[derive(Default)]
struct Bucket {
    objects: BTreeMap<String, Vec<u8>>,
    bindings: Vec<IamBinding>,
}

/// Object store held entirely in memory.
///
/// Mirrors the error semantics of [`GcsStore`](super::GcsStore) closely enough
/// to stand in for it in tests.
#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

fn bucket_not_found(bucket: &str) -> StoreError {
    StoreError::NotFound(format!("Bucket '{}' not found.", bucket))
}

fn object_not_found(bucket: &str, name: &str) -> StoreError {
    StoreError::NotFound(format!("Object '{}' not found in bucket '{}'.", name, bucket))
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `member` to `role` on an existing bucket.
    pub async fn grant(
        &self,
        bucket: &str,
        role: impl Into<String>,
        member: impl Into<String>,
    ) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        let role = role.into();
        let member = member.into();
        match b.bindings.iter_mut().find(|binding| binding.role == role) {
            Some(binding) => binding.members.push(member),
            None => b.bindings.push(IamBinding {
                role,
                members: vec![member],
            }),
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StoreError::AlreadyExists(format!(
                "Bucket '{}' already exists.",
                bucket
            )));
        }
        buckets.insert(bucket.to_string(), Bucket::default());
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let buckets = self.buckets.read().await;
        if buckets.contains_key(bucket) {
            Ok(())
        } else {
            Err(bucket_not_found(bucket))
        }
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let b = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        if !force && !b.objects.is_empty() {
            return Err(StoreError::NotEmpty(bucket.to_string()));
        }
        buckets.remove(bucket);
        Ok(())
    }

    async fn put_object(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        b.objects.insert(name.to_string(), data);
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, name: &str) -> Result<bool, StoreError> {
        let buckets = self.buckets.read().await;
        let b = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(b.objects.contains_key(name))
    }

    async fn get_object(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.buckets.read().await;
        let b = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        b.objects
            .get(name)
            .cloned()
            .ok_or_else(|| object_not_found(bucket, name))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Listing, StoreError> {
        let buckets = self.buckets.read().await;
        let b = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;

        let mut listing = Listing::default();
        let mut prefixes = BTreeSet::new();
        for name in b.objects.keys() {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    prefixes.insert(format!("{}{}", prefix, &rest[..end]));
                }
                None => listing.objects.push(name.clone()),
            }
        }
        listing.prefixes = prefixes.into_iter().collect();
        Ok(listing)
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        b.objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| object_not_found(bucket, name))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        let data = self.get_object(src_bucket, src_name).await?;
        self.put_object(dst_bucket, dst_name, data).await
    }

    async fn bucket_iam_bindings(&self, bucket: &str) -> Result<Vec<IamBinding>, StoreError> {
        let buckets = self.buckets.read().await;
        let b = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(b.bindings.clone())
    }
}
