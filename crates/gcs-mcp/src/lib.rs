//! GCS MCP Server
//!
//! An MCP server that exposes Google Cloud Storage operations as tools.
//! Every storage tool runs behind the auth gateway check: the caller's bearer
//! token is resolved to an identity, and object paths are rewritten into that
//! identity's namespace before they reach the store.

use std::path::PathBuf;
use std::sync::Arc;

use gcs_tools::{AuthResolver, Identity, StorageTools, read_documentation};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::*,
    schemars::{self, JsonSchema},
    service::{RequestContext, RoleServer},
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

mod config;

pub use config::ServerConfig;

/// Name of the unauthenticated documentation tool.
pub const DOCS_TOOL: &str = "get_mcp_documentation";

/// Tools that go through authentication.
const STORAGE_TOOLS: &[&str] = &[
    "create_bucket",
    "upload_file",
    "read_gcs_file",
    "list_gcs_objects",
    "delete_gcs_object",
    "move_gcs_object",
    "delete_bucket",
    "get_bucket_permissions",
];

/// Parameters naming a single bucket.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BucketParams {
    /// Name of the bucket.
    pub bucket_name: String,
}

/// Parameters for `upload_file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadParams {
    /// Name of the target bucket.
    pub bucket_name: String,
    /// Object path inside the bucket, e.g. `reports/q1.csv`.
    pub path: String,
    /// File content, Base64-encoded.
    pub content: String,
}

/// Parameters addressing one object.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObjectParams {
    /// Name of the bucket.
    pub bucket_name: String,
    /// Object path. For deletes, a path ending in `/` removes the whole directory.
    pub path: String,
}

/// Parameters for `list_gcs_objects`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListParams {
    /// Name of the bucket.
    pub bucket_name: String,
    /// Directory to list (default: bucket root).
    #[serde(default)]
    pub path: String,
}

/// Parameters for `move_gcs_object`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveParams {
    /// Bucket holding the object.
    pub source_bucket_name: String,
    /// Current object path.
    pub source_path: String,
    /// Bucket to move into (may be the same bucket).
    pub dest_bucket_name: String,
    /// New object path. A path ending in `/` keeps the source file name.
    pub dest_path: String,
}

/// Parameters for `delete_bucket`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteBucketParams {
    /// Name of the bucket.
    pub bucket_name: String,
    /// Delete the bucket even if it still contains objects (default: false).
    #[serde(default)]
    pub force: bool,
}

/// The documentation tool takes no parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoParams {}

/// MCP Server that provides bucket and object tools.
#[derive(Clone)]
pub struct GcsServer {
    tools: StorageTools,
    auth: Arc<AuthResolver>,
    docs_path: Arc<PathBuf>,
}

impl std::fmt::Debug for GcsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsServer")
            .field("auth_enabled", &self.auth.is_enabled())
            .field("docs_path", &self.docs_path)
            .finish_non_exhaustive()
    }
}

fn parse_params<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, McpError> {
    let value = serde_json::Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value)
        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {}", e), None))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

fn tool<P: JsonSchema>(name: &'static str, title: &'static str, description: &'static str) -> Tool {
    let schema = schemars::schema_for!(P);
    let schema_json = serde_json::to_value(schema).unwrap_or_default();
    let input_schema = match schema_json {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    };

    Tool {
        name: name.into(),
        title: Some(title.into()),
        description: Some(description.into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

/// Definitions of every tool the server exposes.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        tool::<BucketParams>(
            "create_bucket",
            "Create Bucket",
            "Creates a new Google Cloud Storage bucket. Requires 'agent-admin' role.",
        ),
        tool::<UploadParams>(
            "upload_file",
            "Upload File",
            "Uploads or overwrites a file in a GCS bucket. Content must be Base64-encoded.",
        ),
        tool::<ObjectParams>(
            "read_gcs_file",
            "Read File",
            "Reads the content of a file from a GCS bucket. Returns the file content as a \
            Base64-encoded string.",
        ),
        tool::<ListParams>(
            "list_gcs_objects",
            "List Objects",
            "Lists the contents of a GCS bucket or a directory. Returns a JSON list of file \
            names and sub-directory prefixes.",
        ),
        tool::<ObjectParams>(
            "delete_gcs_object",
            "Delete Object",
            "Deletes an object from a GCS bucket. A path ending in '/' deletes every object \
            in that directory.",
        ),
        tool::<MoveParams>(
            "move_gcs_object",
            "Move Object",
            "Moves or renames an object, possibly across buckets. A destination ending in '/' \
            keeps the source file name.",
        ),
        tool::<DeleteBucketParams>(
            "delete_bucket",
            "Delete Bucket",
            "Deletes an entire GCS bucket. Set force to delete a non-empty bucket. Requires \
            'agent-admin' role.",
        ),
        tool::<BucketParams>(
            "get_bucket_permissions",
            "Get Bucket Permissions",
            "Lists all IAM roles and members for a given bucket as a JSON list. Requires \
            'agent-admin' role.",
        ),
        tool::<NoParams>(
            DOCS_TOOL,
            "Get Documentation",
            "Retrieves the documentation for all available tools on this MCP server.",
        ),
    ]
}

impl GcsServer {
    /// Create a server over the given handlers and auth resolver.
    pub fn new(tools: StorageTools, auth: AuthResolver, docs_path: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            auth: Arc::new(auth),
            docs_path: Arc::new(docs_path.into()),
        }
    }

    /// Authenticate, then route a tool call by name.
    ///
    /// `supplied` is an identity resolved upstream; when present the auth
    /// gateway is not consulted. Authentication failures come back as text
    /// results, unknown tools and bad arguments as protocol errors.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        supplied: Option<Identity>,
        authorization: Option<&str>,
    ) -> Result<CallToolResult, McpError> {
        if name == DOCS_TOOL {
            return Ok(text_result(read_documentation(&self.docs_path).await));
        }
        if !STORAGE_TOOLS.contains(&name) {
            return Err(McpError::invalid_params(
                format!("Unknown tool: {}", name),
                None,
            ));
        }

        let identity = match self.auth.resolve(supplied, authorization).await {
            Ok(identity) => identity,
            Err(e) => return Ok(text_result(e.to_string())),
        };
        let identity = identity.as_ref();
        let tools = &self.tools;

        let text = match name {
            "create_bucket" => {
                let p: BucketParams = parse_params(arguments)?;
                tools.create_bucket(identity, &p.bucket_name).await
            }
            "upload_file" => {
                let p: UploadParams = parse_params(arguments)?;
                tools
                    .upload_file(identity, &p.bucket_name, &p.path, &p.content)
                    .await
            }
            "read_gcs_file" => {
                let p: ObjectParams = parse_params(arguments)?;
                match tools.read_file(identity, &p.bucket_name, &p.path).await {
                    Ok(content) => content,
                    Err(e) => {
                        return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
                    }
                }
            }
            "list_gcs_objects" => {
                let p: ListParams = parse_params(arguments)?;
                tools.list_objects(identity, &p.bucket_name, &p.path).await
            }
            "delete_gcs_object" => {
                let p: ObjectParams = parse_params(arguments)?;
                tools.delete_object(identity, &p.bucket_name, &p.path).await
            }
            "move_gcs_object" => {
                let p: MoveParams = parse_params(arguments)?;
                tools
                    .move_object(
                        identity,
                        &p.source_bucket_name,
                        &p.source_path,
                        &p.dest_bucket_name,
                        &p.dest_path,
                    )
                    .await
            }
            "delete_bucket" => {
                let p: DeleteBucketParams = parse_params(arguments)?;
                tools.delete_bucket(identity, &p.bucket_name, p.force).await
            }
            "get_bucket_permissions" => {
                let p: BucketParams = parse_params(arguments)?;
                tools.bucket_permissions(identity, &p.bucket_name).await
            }
            _ => {
                return Err(McpError::invalid_params(
                    format!("Unknown tool: {}", name),
                    None,
                ));
            }
        };

        Ok(text_result(text))
    }
}

impl ServerHandler for GcsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gcs-mcp".into(),
                title: Some("GCS MCP Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Tools for Google Cloud Storage buckets and objects. File content is always \
                Base64-encoded in both directions. Paths are relative to your own namespace \
                when authenticated. Call 'get_mcp_documentation' for the full reference."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: tool_definitions(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // Present when the call arrived over HTTP.
        let parts = context.extensions.get::<http::request::Parts>();
        let supplied = parts
            .and_then(|p| p.extensions.get::<Identity>())
            .cloned();
        let authorization = parts
            .and_then(|p| p.headers.get(http::header::AUTHORIZATION))
            .and_then(|v| v.to_str().ok());

        self.dispatch(&request.name, request.arguments, supplied, authorization)
            .await
    }
}

/// HTTP router serving the MCP endpoint at `/mcp`.
pub fn router(server: GcsServer) -> axum::Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    axum::Router::new().nest_service("/mcp", service)
}
