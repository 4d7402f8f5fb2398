//! Server-rendered cache hydration.
//!
//! A server render pass creates a fresh [`Client`], runs its queries and
//! embeds the resulting cache into the page props with [`embed_snapshot`].
//! The interactive side reads the snapshot back through a
//! [`SnapshotConsumer`] and merges it into its single long-lived client, so
//! data fetched on the server is not fetched again.
//!
//! ```
//! use hgql_sdk::cache::OperationKind;
//! use hgql_sdk::client::ClientConfig;
//! use hgql_sdk::config::ExecutionContext;
//! use hgql_sdk::hydration::{embed_snapshot, ClientProvisioner, SnapshotConsumer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::new("https://cms.example.com/graphql");
//!
//! // Server render pass.
//! let server = ClientProvisioner::new(ExecutionContext::Server, config.clone());
//! let client = server.initialize(None)?;
//! client.write_result(
//!     OperationKind::Query,
//!     &json!({"post": {"__typename": "Post", "id": 1, "title": "A"}}),
//!     None,
//! );
//! let page = embed_snapshot(&client, json!({"props": {"uri": "/a"}}));
//!
//! // Interactive side.
//! let interactive = Arc::new(ClientProvisioner::new(ExecutionContext::Interactive, config));
//! let mut consumer = SnapshotConsumer::new(interactive);
//! let hydrated = consumer.client_for(&page["props"])?;
//! assert_eq!(hydrated.entity("Post:1").unwrap()["title"], "A");
//! # Ok::<(), hgql_sdk::SdkError>(())
//! ```

use crate::cache::CacheSnapshot;
use crate::client::{Client, ClientConfig};
use crate::config::{EndpointConfig, ExecutionContext};
use crate::error::SdkResult;
use crate::merge::merge_snapshots;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Key under which the cache snapshot travels inside page props.
pub const APOLLO_STATE_KEY: &str = "__APOLLO_STATE__";

/// Hands out clients for one execution context.
///
/// Build one per process at bootstrap and share it with the rendering layer.
/// In the [`ExecutionContext::Interactive`] context it owns the single client
/// of the session; in the [`ExecutionContext::Server`] context every call
/// yields a new client so one request's data cannot reach another.
#[derive(Debug)]
pub struct ClientProvisioner {
    context: ExecutionContext,
    config: ClientConfig,
    singleton: OnceLock<Client>,
}

impl ClientProvisioner {
    /// Creates a provisioner for an explicit client configuration.
    pub fn new(context: ExecutionContext, config: ClientConfig) -> Self {
        Self {
            context,
            config,
            singleton: OnceLock::new(),
        }
    }

    /// Creates a provisioner bound to the endpoint found in the environment.
    ///
    /// Fails with [`ErrorCode::MissingEndpoint`](crate::error::ErrorCode::MissingEndpoint)
    /// when no endpoint is configured for `context`.
    pub fn from_env(context: ExecutionContext) -> SdkResult<Self> {
        let endpoint = EndpointConfig::from_env(context)?;
        info!(%context, endpoint = %endpoint, "Resolved GraphQL endpoint");
        Ok(Self::new(context, ClientConfig::from_endpoint(&endpoint)))
    }

    /// The execution context this provisioner serves.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// The configuration every client is built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the memoized interactive client, if one was created.
    pub fn memoized(&self) -> Option<&Client> {
        self.singleton.get()
    }

    /// Returns a client for the current context.
    ///
    /// Server: always a new client. Interactive: the session client, created
    /// on first use.
    pub fn get_or_create_client(&self) -> SdkResult<Client> {
        if self.context.is_server() {
            return Client::with_config(self.config.clone());
        }

        if let Some(client) = self.singleton.get() {
            return Ok(client.clone());
        }
        let client = Client::with_config(self.config.clone())?;
        Ok(self.memoize(client))
    }

    /// Returns a client whose cache also holds `snapshot`.
    ///
    /// The snapshot is merged into the client's current entries with
    /// [`merge_snapshots`]: existing values win, arrays are replaced rather
    /// than concatenated. An absent or empty snapshot leaves the cache as is.
    pub fn initialize(&self, snapshot: Option<CacheSnapshot>) -> SdkResult<Client> {
        let client = self.get_or_create_client()?;

        if let Some(snapshot) = snapshot.filter(|snapshot| !snapshot.is_empty()) {
            let incoming = snapshot.len();
            let merged = merge_snapshots(snapshot, client.extract());
            debug!(
                context = %self.context,
                incoming,
                entries = merged.len(),
                "Hydrating client cache"
            );
            client.restore(merged);
        }

        if self.context.is_server() {
            return Ok(client);
        }
        Ok(self.memoize(client))
    }

    /// Like [`initialize`](Self::initialize), reading the snapshot from raw
    /// JSON. Anything that is not a JSON object counts as no snapshot.
    pub fn initialize_from_value(&self, snapshot: Option<&Value>) -> SdkResult<Client> {
        let snapshot = snapshot.and_then(|value| {
            let parsed = CacheSnapshot::from_value(value);
            if parsed.is_none() && !value.is_null() {
                debug!("Ignoring malformed cache snapshot");
            }
            parsed
        });
        self.initialize(snapshot)
    }

    fn memoize(&self, client: Client) -> Client {
        self.singleton.get_or_init(|| client).clone()
    }
}

/// Writes the client's cache into `page_props.props` under [`APOLLO_STATE_KEY`].
///
/// Props without an object-valued `props` field are returned untouched.
pub fn embed_snapshot(client: &Client, mut page_props: Value) -> Value {
    if let Some(props) = page_props.get_mut("props").and_then(Value::as_object_mut) {
        props.insert(APOLLO_STATE_KEY.to_string(), client.extract().to_value());
    }
    page_props
}

/// Reads the embedded snapshot out of component props.
pub fn snapshot_from_props(props: &Value) -> Option<&Value> {
    props.get(APOLLO_STATE_KEY)
}

/// View-layer accessor for the hydrated client.
///
/// In the interactive context hydration runs again only when the snapshot in
/// the props changes; renders carrying the same snapshot get the previously
/// returned client. On the server every call is its own render pass and gets
/// a fresh client.
#[derive(Debug)]
pub struct SnapshotConsumer {
    provisioner: Arc<ClientProvisioner>,
    last: Option<(Option<Value>, Client)>,
}

impl SnapshotConsumer {
    pub fn new(provisioner: Arc<ClientProvisioner>) -> Self {
        Self {
            provisioner,
            last: None,
        }
    }

    /// Returns the client for a render with the given component props.
    pub fn client_for(&mut self, props: &Value) -> SdkResult<Client> {
        let snapshot = snapshot_from_props(props);
        if self.provisioner.context().is_server() {
            return self.provisioner.initialize_from_value(snapshot);
        }
        if let Some((previous, client)) = &self.last {
            if previous.as_ref() == snapshot {
                return Ok(client.clone());
            }
        }

        let client = self.provisioner.initialize_from_value(snapshot)?;
        self.last = Some((snapshot.cloned(), client.clone()));
        Ok(client)
    }

    /// The provisioner backing this consumer.
    pub fn provisioner(&self) -> &Arc<ClientProvisioner> {
        &self.provisioner
    }
}
