//! GCS MCP Server
//!
//! This binary serves the GCS tools over MCP's streamable HTTP transport at
//! `/mcp`. Setting `AUTH_GATEWAY_URL` turns on per-request token validation
//! and per-user path sandboxing.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gcs_mcp::ServerConfig;
use gcs_tools::{GcsConfig, normalize_credentials_path};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// GCS MCP Server - Google Cloud Storage tools for agents
#[derive(Parser, Debug)]
#[command(name = "gcs-mcp")]
#[command(about = "MCP server exposing Google Cloud Storage operations")]
struct Args {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Token validation endpoint; authentication is disabled when unset
    #[arg(long, env = "AUTH_GATEWAY_URL")]
    auth_gateway_url: Option<String>,

    /// Service account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<String>,

    /// Project that owns newly created buckets
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Alternate storage endpoint (e.g. a local emulator)
    #[arg(long, env = "STORAGE_EMULATOR_HOST")]
    endpoint: Option<String>,

    /// Reference document returned by get_mcp_documentation
    #[arg(long, default_value = "MCP_DOCUMENTATION.md")]
    docs: PathBuf,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let credentials_path = self
            .credentials
            .as_deref()
            .map(normalize_credentials_path)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        ServerConfig {
            bind: SocketAddr::new(self.host, self.port),
            auth_gateway_url: self.auth_gateway_url,
            gcs: GcsConfig {
                credentials_path,
                project_id: self.project,
                endpoint: self.endpoint,
            },
            docs_path: self.docs,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Args::parse().into_config();
    let server = config.build_server().await?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("GCS MCP server started on {}", config.bind);

    axum::serve(listener, gcs_mcp::router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("GCS MCP server shutting down");

    Ok(())
}
