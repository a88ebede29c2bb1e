//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use gcs_tools::{AuthResolver, GcsConfig, GcsStore, StorageTools};

use crate::GcsServer;

/// Everything needed to start the server, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Auth gateway validation URL. `None` disables authentication.
    pub auth_gateway_url: Option<String>,
    /// Storage connection settings.
    pub gcs: GcsConfig,
    /// Reference document served by the documentation tool.
    pub docs_path: PathBuf,
}

impl ServerConfig {
    /// Build the store, the auth resolver and the server, in that order.
    pub async fn build_server(&self) -> anyhow::Result<GcsServer> {
        let store = GcsStore::connect(self.gcs.clone())
            .await
            .context("failed to initialize storage client")?;

        let auth = AuthResolver::from_url(self.auth_gateway_url.as_deref());

        Ok(GcsServer::new(
            StorageTools::new(Arc::new(store)),
            auth,
            self.docs_path.clone(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_emulator_server_without_auth() {
        let config = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            auth_gateway_url: Some(String::new()),
            gcs: GcsConfig {
                credentials_path: None,
                project_id: Some("local".to_string()),
                endpoint: Some("http://127.0.0.1:4443".to_string()),
            },
            docs_path: PathBuf::from("MCP_DOCUMENTATION.md"),
        };
        let server = config.build_server().await.unwrap();
        assert!(format!("{:?}", server).contains("auth_enabled: false"));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails_startup() {
        let config = ServerConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            auth_gateway_url: None,
            gcs: GcsConfig {
                credentials_path: Some(PathBuf::from("does-not-exist/key.json")),
                project_id: None,
                endpoint: None,
            },
            docs_path: PathBuf::from("MCP_DOCUMENTATION.md"),
        };
        let err = config.build_server().await.unwrap_err();
        assert!(err.to_string().contains("failed to initialize storage client"));
    }
}
