//! Supabase Edge Functions provider
//!
//! An infrastructure-as-code provider that manages Supabase Edge Functions
//! through the Supabase Management API. It is a plugin binary: the host
//! starts it, reads a handshake line from stdout and then talks to it over
//! gRPC.
//!
//! # Types served
//!
//! - **`supabase_function`** (resource): deploys a function from a local
//!   source directory, reads it back, redeploys on change and deletes it.
//!   Changing `project_ref` or `slug` replaces the function.
//! - **`supabase_function_body`** (data source): fetches the deployed source
//!   body of a function.
//!
//! # Configuration
//!
//! ```text
//! provider "supabase" {
//!   endpoint     = "https://api.supabase.com"   # or SUPABASE_API_ENDPOINT
//!   access_token = "sbp_..."                    # or SUPABASE_ACCESS_TOKEN
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! On start the provider prints one line to stdout:
//!
//! ```text
//! SUPABASE_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `SUPABASE_PROVIDER|<protocol_version>|<address>`. All logging goes
//! to stderr.
//!
//! # Layout
//!
//! - [`client`]: typed Management API calls
//! - [`bundle`]: multipart deploy bodies built from a source directory
//! - [`function_resource`] and [`function_body`]: the resource and data source
//! - [`provider`]: configuration and dispatch
//! - [`plan`] and [`validation`]: schema-driven planning and config checks
//! - [`server`]: the gRPC protocol adapter

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod client;
pub mod error;
pub mod function_body;
pub mod function_resource;
pub mod logging;
pub mod plan;
pub mod proto;
pub mod provider;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

pub use client::ManagementClient;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::SupabaseProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, serve_with_shutdown,
    ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
