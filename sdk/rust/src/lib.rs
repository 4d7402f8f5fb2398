//! hgql SDK
//!
//! GraphQL client for headless CMS front-ends rendered on the server and
//! hydrated in the browser.
//!
//! - `config`: endpoint resolution and execution context
//! - `client`: HTTP client with retries and a normalized cache
//! - `cache`: normalized entity cache and its serializable snapshot
//! - `merge`: the merge policy applied when hydrating a snapshot
//! - `hydration`: client provisioning, snapshot embedding and consumption
//! - `page`: page/template metadata served by the CMS
//!
//! # Server render pass
//!
//! ```ignore
//! use hgql_sdk::{embed_snapshot, ClientProvisioner, ExecutionContext};
//!
//! let provisioner = ClientProvisioner::from_env(ExecutionContext::Server)?;
//! let client = provisioner.initialize(None)?;
//! client.query::<serde_json::Value>(PAGE_BY_URI_QUERY)
//!     .variables(PageByUriVariables::new("/about/"))
//!     .execute()
//!     .await?;
//! let page_props = embed_snapshot(&client, serde_json::json!({"props": {}}));
//! ```
//!
//! # Interactive side
//!
//! ```ignore
//! use hgql_sdk::{ClientProvisioner, ExecutionContext, SnapshotConsumer};
//!
//! let provisioner = Arc::new(ClientProvisioner::from_env(ExecutionContext::Interactive)?);
//! let mut consumer = SnapshotConsumer::new(provisioner);
//! // On every render:
//! let client = consumer.client_for(&props)?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hydration;
pub mod merge;
pub mod page;

// Re-exports for convenience
pub use cache::{CacheSnapshot, NormalizedCache, OperationKind};
pub use client::{Client, ClientConfig, GraphQLError, QueryBuilder, Request, Response};
pub use config::{EndpointConfig, ExecutionContext, ENDPOINT_VAR, PUBLIC_ENDPOINT_VAR};
pub use error::{ErrorCode, ResultExt, SdkError, SdkResult};
pub use hydration::{
    embed_snapshot, snapshot_from_props, ClientProvisioner, SnapshotConsumer, APOLLO_STATE_KEY,
};
pub use merge::{merge_snapshots, merge_values};
pub use page::{HeadMeta, Page, PageByUriVariables, Template, PAGE_BY_URI_QUERY};
