//! gcs-tools: sandboxed object storage operations
//!
//! This crate provides the pieces behind the `gcs-mcp` server: bearer-token
//! resolution against an external auth gateway, per-user path sandboxing,
//! an [`ObjectStore`] abstraction with a Google Cloud Storage backend, and the
//! operation handlers that turn store results into caller-facing text.
//!
//! # Request Flow
//!
//! ```text
//! Authorization header ──> AuthResolver ──> Option<Identity>
//!                                              │
//!                           tool arguments ──> StorageTools ──> Sandbox ──> ObjectStore
//! ```
//!
//! Nothing here holds state between requests. The store handle is built once
//! at startup and shared read-only behind an `Arc`.

mod auth;
mod config;
mod docs;
mod identity;
mod ops;
mod sandbox;
pub mod store;

pub use auth::{AuthError, AuthGateway, AuthResolver, bearer_token};
pub use config::normalize_credentials_path;
pub use docs::read_documentation;
pub use identity::{Identity, Role, UnknownRole};
pub use ops::{PERMISSION_DENIED, StorageTools};
pub use sandbox::Sandbox;
pub use store::{GcsConfig, GcsStore, IamBinding, Listing, MemoryStore, ObjectStore, StoreError};
