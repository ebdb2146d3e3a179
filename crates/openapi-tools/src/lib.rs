//! OpenAPI->MCP tool engine.
//!
//! Indexes a dereferenced `OpenAPI` document into tools, synthesizes their input schemas and
//! executes invocations against the upstream API, including PAT->bearer token exchange.
//!
//! It contains **no** protocol server: hosts list tools and dispatch calls through
//! [`resource::ToolResource`].

pub mod auth;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod indexer;
pub mod redact;
pub mod registry;
pub mod resource;
pub mod runtime;
pub mod schema;
pub mod semantics;

pub use config::{AuthConfig, ResourceConfig};
pub use document::ApiDocument;
pub use error::{OpenApiToolsError, Result};
pub use resource::{ResourceSet, ToolResource};
pub use runtime::OpenApiResource;
