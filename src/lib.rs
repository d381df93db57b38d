//! Hemmer provider for JFrog Artifactory
//!
//! Translates Hemmer resource blocks into calls against the Artifactory REST
//! API. The binary is spawned by the Hemmer engine, prints a handshake line on
//! stdout and serves the provider protocol over gRPC.
//!
//! # Configuration
//!
//! ```hcl
//! provider "artifactory" {
//!   url          = "https://myinstance.jfrog.io/artifactory"
//!   access_token = var.artifactory_access_token
//! }
//! ```
//!
//! | Setting | Provider block | Environment |
//! |---|---|---|
//! | URL | `url` | `JFROG_URL`, `ARTIFACTORY_URL` |
//! | Access token | `access_token` | `JFROG_ACCESS_TOKEN`, `ARTIFACTORY_ACCESS_TOKEN` |
//! | API key (deprecated) | `api_key` | |
//! | OIDC exchange | `oidc_provider_name` | `TFC_WORKLOAD_IDENTITY_TOKEN` |
//! | License preflight | `check_license` (default `true`) | |
//!
//! The provider block wins over the environment. An access token from any
//! source wins over an API key; see [`config::resolve_credential`] for the
//! full order.
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it outputs a handshake string to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! # Resources
//!
//! - `artifactory_local_gradle_repository`
//! - `artifactory_user`
//! - `artifactory_group`
//! - `artifactory_user_lock_policy`
//! - `artifactory_password_expiration_policy`
//!
//! Data sources: `artifactory_repositories`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod preflight;
pub mod provider;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::ArtifactoryClient;
pub use config::{Credential, Environment, ProcessEnvironment, ProviderConfig, StaticEnvironment};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ArtifactoryProvider, ProviderMetadata, PRODUCT_ID};
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, serve_with_shutdown, ProviderService,
    ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderCatalog, ServerCapabilities, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
