//! Google Cloud Storage backend over the JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use urlencoding::encode;

use super::{IamBinding, Listing, ObjectStore, StoreError};

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.full_control"];
/// Key file picked up from the working directory when no path is configured.
const LOCAL_KEY_FILE: &str = "service_account_key.json";

/// Connection settings for [`GcsStore`].
#[derive(Debug, Clone, Default)]
pub struct GcsConfig {
    /// Service-account key file. Already normalized.
    pub credentials_path: Option<PathBuf>,
    /// Project that owns newly created buckets.
    pub project_id: Option<String>,
    /// Alternate API endpoint, e.g. a storage emulator.
    pub endpoint: Option<String>,
}

/// Object store backed by Google Cloud Storage.
#[derive(Clone)]
pub struct GcsStore {
    http: reqwest::Client,
    auth: Option<Arc<dyn TokenProvider>>,
    project_id: Option<String>,
    endpoint: String,
}

impl std::fmt::Debug for GcsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStore")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    prefixes: Vec<String>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectResource {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    done: bool,
    rewrite_token: Option<String>,
}

#[derive(Deserialize)]
struct IamPolicy {
    #[serde(default)]
    bindings: Vec<PolicyBinding>,
}

#[derive(Deserialize)]
struct PolicyBinding {
    role: Option<String>,
    #[serde(default)]
    members: Vec<String>,
}

fn auth_error(e: gcp_auth::Error) -> StoreError {
    StoreError::Unexpected(format!("credentials error: {}", e))
}

impl GcsStore {
    /// Connect using `config`.
    ///
    /// Credentials come from the configured key file, else a local
    /// `service_account_key.json`, else application default credentials.
    /// When an emulator endpoint is set without a key file, requests go out
    /// unauthenticated.
    pub async fn connect(config: GcsConfig) -> Result<Self, StoreError> {
        let key_file = config
            .credentials_path
            .clone()
            .or_else(|| Some(PathBuf::from(LOCAL_KEY_FILE)).filter(|p| p.exists()));

        let auth: Option<Arc<dyn TokenProvider>> = match key_file {
            Some(path) => {
                tracing::info!("Using service account key: {}", path.display());
                Some(Arc::new(
                    CustomServiceAccount::from_file(&path).map_err(auth_error)?,
                ))
            }
            None if config.endpoint.is_some() => {
                tracing::info!("No credentials configured; using unauthenticated emulator access");
                None
            }
            None => {
                tracing::info!("No service account key found. Using default credentials.");
                Some(gcp_auth::provider().await.map_err(auth_error)?)
            }
        };

        let project_id = match (&config.project_id, &auth) {
            (Some(project), _) => Some(project.clone()),
            (None, Some(provider)) => match provider.project_id().await {
                Ok(project) => Some(project.to_string()),
                Err(e) => {
                    tracing::warn!("Could not determine project id: {}", e);
                    None
                }
            },
            (None, None) => None,
        };

        Ok(Self {
            http: reqwest::Client::new(),
            auth,
            project_id,
            endpoint: config
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/b/{}", self.endpoint, encode(bucket))
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/o/{}", self.bucket_url(bucket), encode(name))
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, StoreError> {
        let builder = self.http.request(method, url);
        match &self.auth {
            Some(provider) => {
                let token = provider.token(SCOPES).await.map_err(auth_error)?;
                Ok(builder.bearer_auth(token.as_str()))
            }
            None => Ok(builder),
        }
    }

    /// Send and map non-success statuses to [`StoreError`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(body) => serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body),
            Err(e) => e.to_string(),
        };
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::CONFLICT => StoreError::AlreadyExists(message),
            _ => StoreError::Unexpected(format!("{}: {}", status, message)),
        })
    }

    async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.list_objects(bucket, prefix, None).await?.objects)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let project = self.project_id.as_deref().ok_or_else(|| {
            StoreError::Unexpected("no project id configured for bucket creation".to_string())
        })?;
        let url = format!("{}/storage/v1/b", self.endpoint);
        let req = self
            .request(Method::POST, &url)
            .await?
            .query(&[("project", project)])
            .json(&json!({ "name": bucket }));
        self.send(req).await?;
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let req = self.request(Method::GET, &self.bucket_url(bucket)).await?;
        self.send(req).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), StoreError> {
        if force {
            for name in self.list_all(bucket, "").await? {
                self.delete_object(bucket, &name).await?;
            }
        }
        let req = self.request(Method::DELETE, &self.bucket_url(bucket)).await?;
        match self.send(req).await {
            Ok(_) => Ok(()),
            Err(StoreError::AlreadyExists(_)) => Err(StoreError::NotEmpty(bucket.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn put_object(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint,
            encode(bucket)
        );
        let req = self
            .request(Method::POST, &url)
            .await?
            .query(&[("uploadType", "media"), ("name", name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        self.send(req).await?;
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, name: &str) -> Result<bool, StoreError> {
        let req = self.request(Method::GET, &self.object_url(bucket, name)).await?;
        match self.send(req).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_object(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let req = self
            .request(Method::GET, &self.object_url(bucket, name))
            .await?
            .query(&[("alt", "media")]);
        let bytes = self.send(req).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Listing, StoreError> {
        let url = format!("{}/o", self.bucket_url(bucket));
        let mut listing = Listing::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .request(Method::GET, &url)
                .await?
                .query(&[("prefix", prefix)]);
            if let Some(delimiter) = delimiter {
                req = req.query(&[("delimiter", delimiter)]);
            }
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let page: ObjectsPage = self.send(req).await?.json().await?;
            listing
                .objects
                .extend(page.items.into_iter().map(|item| item.name));
            listing.prefixes.extend(page.prefixes);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(listing)
    }

    async fn delete_object(&self, bucket: &str, name: &str) -> Result<(), StoreError> {
        let req = self
            .request(Method::DELETE, &self.object_url(bucket, name))
            .await?;
        self.send(req).await?;
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}/rewriteTo/b/{}/o/{}",
            self.object_url(src_bucket, src_name),
            encode(dst_bucket),
            encode(dst_name)
        );
        let mut rewrite_token: Option<String> = None;

        // Large objects may need several rewrite calls.
        loop {
            let mut req = self.request(Method::POST, &url).await?.json(&json!({}));
            if let Some(token) = &rewrite_token {
                req = req.query(&[("rewriteToken", token.as_str())]);
            }
            let progress: RewriteResponse = self.send(req).await?.json().await?;
            if progress.done {
                return Ok(());
            }
            rewrite_token = progress.rewrite_token;
            if rewrite_token.is_none() {
                return Err(StoreError::Unexpected(
                    "rewrite incomplete without a continuation token".to_string(),
                ));
            }
        }
    }

    async fn bucket_iam_bindings(&self, bucket: &str) -> Result<Vec<IamBinding>, StoreError> {
        let url = format!("{}/iam", self.bucket_url(bucket));
        let req = self
            .request(Method::GET, &url)
            .await?
            .query(&[("optionsRequestedPolicyVersion", "3")]);
        let policy: IamPolicy = self.send(req).await?.json().await?;
        Ok(policy
            .bindings
            .into_iter()
            .filter_map(|b| {
                b.role.map(|role| IamBinding {
                    role,
                    members: b.members,
                })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn emulator_store() -> GcsStore {
        GcsStore::connect(GcsConfig {
            credentials_path: None,
            project_id: Some("test-project".to_string()),
            endpoint: Some("http://localhost:4443/".to_string()),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_emulator_connect_without_credentials() {
        let store = emulator_store().await;
        assert!(store.auth.is_none());
        assert_eq!(store.endpoint, "http://localhost:4443");
        assert_eq!(store.project_id.as_deref(), Some("test-project"));
    }

    #[tokio::test]
    async fn test_object_names_are_path_encoded() {
        let store = emulator_store().await;
        assert_eq!(
            store.object_url("b1", "dir/f 1.txt"),
            "http://localhost:4443/storage/v1/b/b1/o/dir%2Ff%201.txt"
        );
    }

    #[test]
    fn test_objects_page_parses_missing_fields() {
        let page: ObjectsPage = serde_json::from_str(r#"{"kind": "storage#objects"}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.prefixes.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_iam_policy_parses() {
        let policy: IamPolicy = serde_json::from_str(
            r#"{"version": 3, "bindings": [{"role": "roles/storage.admin", "members": ["user:a@x.com"]}]}"#,
        )
        .unwrap();
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members, vec!["user:a@x.com"]);
    }
}
