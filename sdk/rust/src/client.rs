//! GraphQL client with a normalized cache.
//!
//! Provides:
//! - Automatic retries with exponential backoff
//! - A normalized entity cache filled by every successful operation
//! - Cache extraction/restoration for server-rendered hydration
//!
//! ```ignore
//! use hgql_sdk::client::Client;
//!
//! #[derive(serde::Deserialize)]
//! struct Posts { posts: Vec<Post> }
//!
//! let client = Client::new("https://cms.example.com/graphql")?;
//! let posts: Posts = client
//!     .query("query Posts($first: Int) { posts(first: $first) { __typename id title } }")
//!     .variables(serde_json::json!({"first": 10}))
//!     .operation_name("Posts")
//!     .execute()
//!     .await?;
//!
//! // Every post is now in the cache, ready to be embedded into page output.
//! let snapshot = client.extract();
//! ```

use crate::cache::{CacheSnapshot, NormalizedCache, OperationKind};
use crate::config::EndpointConfig;
use crate::error::{ErrorCode, SdkError, SdkResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the GraphQL endpoint.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts.
    pub max_retries: u32,
    /// Default headers.
    pub headers: HashMap<String, String>,
    /// Retry delay base (in milliseconds) - exponential backoff will be applied.
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            headers: HashMap::new(),
            retry_delay_ms: 100,
        }
    }
}

impl ClientConfig {
    /// Creates a new config with a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Creates a config bound to a resolved endpoint.
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(endpoint.url())
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the max retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Adds a default header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the retry delay base in milliseconds.
    pub fn retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

/// A GraphQL request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip)]
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Creates a request with no variables.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
            headers: HashMap::new(),
        }
    }

    /// Sets the variables.
    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Kind of the operation, used to pick the cache root.
    pub fn kind(&self) -> OperationKind {
        OperationKind::detect(&self.query)
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
}

impl Response {
    /// Returns the `data` payload, failing on GraphQL errors or missing data.
    pub fn into_data(self) -> SdkResult<Value> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            let first = &errors[0];
            let mut err = SdkError::new(ErrorCode::ExecutionError, first.message.clone())
                .with_extension("error_count", errors.len());
            if let Some(path) = &first.path {
                err = err.with_extension("path", path);
            }
            return Err(err);
        }

        match self.data {
            Some(Value::Null) | None => Err(SdkError::new(ErrorCode::NoData, "No data in response")),
            Some(data) => Ok(data),
        }
    }
}

/// A GraphQL error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, Value>>,
}

/// HTTP binding to the endpoint.
struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    fn new(timeout: Duration) -> SdkResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SdkError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    async fn post(
        &self,
        url: &str,
        request: &Request,
        headers: &HashMap<String, String>,
    ) -> SdkResult<Response> {
        let mut builder = self.http.post(url).json(request);
        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(
                SdkError::new(ErrorCode::HttpError, format!("HTTP error: {status}"))
                    .with_extension("status", status.as_u16()),
            );
        }

        let body = response.text().await?;
        serde_json::from_str::<Response>(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            SdkError::new(
                ErrorCode::InvalidResponse,
                format!("Failed to parse response: {e}. Body: {preview}"),
            )
        })
    }
}

struct ClientInner {
    config: ClientConfig,
    transport: HttpTransport,
    cache: RwLock<NormalizedCache>,
}

/// The GraphQL client.
///
/// Cloning is cheap and yields a handle to the same cache; use
/// [`Client::ptr_eq`] to tell instances apart.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a new client with the given URL.
    pub fn new(url: impl Into<String>) -> SdkResult<Self> {
        Self::with_config(ClientConfig::new(url))
    }

    /// Creates a new client with configuration and an empty cache.
    pub fn with_config(config: ClientConfig) -> SdkResult<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        debug!(endpoint = %config.url, "Creating GraphQL client");
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                cache: RwLock::new(NormalizedCache::new()),
            }),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.inner.config.url
    }

    /// Returns true if both handles point to the same client.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn cache(&self) -> RwLockReadGuard<'_, NormalizedCache> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, NormalizedCache> {
        self.inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the cache contents into a snapshot.
    pub fn extract(&self) -> CacheSnapshot {
        self.cache().extract()
    }

    /// Replaces the cache contents with a snapshot.
    pub fn restore(&self, snapshot: CacheSnapshot) {
        self.cache_mut().restore(snapshot);
    }

    /// Normalizes an operation result into the cache.
    pub fn write_result(&self, kind: OperationKind, data: &Value, variables: Option<&Value>) -> usize {
        self.cache_mut().write_result(kind, data, variables)
    }

    /// Reads a cached root field, resolving references.
    pub fn read_field(
        &self,
        kind: OperationKind,
        field: &str,
        variables: Option<&Value>,
    ) -> Option<Value> {
        self.cache().read_field(kind, field, variables)
    }

    /// Gets a cached entry by cache id.
    pub fn entity(&self, id: &str) -> Option<Value> {
        self.cache().entity(id).cloned()
    }

    /// Number of cached entries.
    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    /// Creates a query builder.
    pub fn query<T: DeserializeOwned>(&self, query: impl Into<String>) -> QueryBuilder<T> {
        QueryBuilder {
            client: self.clone(),
            request: Request::new(query),
            _phantom: PhantomData,
        }
    }

    /// Creates a mutation builder.
    pub fn mutate<T: DeserializeOwned>(&self, mutation: impl Into<String>) -> QueryBuilder<T> {
        self.query(mutation)
    }

    /// Executes a request with retry logic.
    ///
    /// Successful `data` is written into the cache, even when the response
    /// also carries GraphQL errors.
    pub async fn execute(&self, request: Request) -> SdkResult<Response> {
        let config = &self.inner.config;
        let mut headers = config.headers.clone();
        headers.extend(request.headers.clone());

        let mut last_error = SdkError::network("No attempts made");
        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                let delay = config.backoff(attempt);
                warn!(attempt, ?delay, error = %last_error, "Retrying GraphQL request");
                tokio::time::sleep(delay).await;
            }

            match self
                .inner
                .transport
                .post(&config.url, &request, &headers)
                .await
            {
                Ok(response) => {
                    if let Some(data) = &response.data {
                        let written =
                            self.write_result(request.kind(), data, request.variables.as_ref());
                        debug!(
                            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
                            written,
                            "Cached operation result"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint())
            .field("cache_entries", &self.cache_len())
            .finish()
    }
}

/// A query builder.
pub struct QueryBuilder<T> {
    client: Client,
    request: Request,
    _phantom: PhantomData<T>,
}

impl<T: DeserializeOwned> QueryBuilder<T> {
    /// Sets the variables.
    pub fn variables<V: Serialize>(mut self, variables: V) -> Self {
        self.request.variables = serde_json::to_value(variables).ok();
        self
    }

    /// Sets the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.request.operation_name = Some(name.into());
        self
    }

    /// Adds a header to this request only.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(key.into(), value.into());
        self
    }

    /// Executes the query and deserializes `data`.
    pub async fn execute(self) -> SdkResult<T> {
        let data = self.client.execute(self.request).await?.into_data()?;
        serde_json::from_value(data).map_err(|e| SdkError::deserialize(e.to_string()))
    }

    /// Executes the query and returns the raw response.
    pub async fn execute_raw(self) -> SdkResult<Response> {
        self.client.execute(self.request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("http://localhost:4000/graphql")
            .timeout(Duration::from_secs(10))
            .max_retries(5)
            .header("Authorization", "Bearer token");

        assert_eq!(config.url, "http://localhost:4000/graphql");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
        assert!(config.headers.contains_key("Authorization"));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = ClientConfig::new("http://localhost").retry_delay_ms(100);
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::new("query Hello { hello }")
            .variables(json!({"id": 1}))
            .operation_name("Hello");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["query"], "query Hello { hello }");
        assert_eq!(json["variables"]["id"], 1);
        assert_eq!(json["operationName"], "Hello");
        assert!(json.get("headers").is_none());
    }

    #[test]
    fn test_response_into_data() {
        let ok: Response = serde_json::from_value(json!({"data": {"hello": "world"}})).unwrap();
        assert_eq!(ok.into_data().unwrap()["hello"], "world");

        let failed: Response = serde_json::from_value(json!({
            "data": null,
            "errors": [{"message": "Not allowed", "path": ["page"]}]
        }))
        .unwrap();
        let err = failed.into_data().unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionError);
        assert_eq!(err.message, "Not allowed");

        let empty: Response = serde_json::from_value(json!({"errors": []})).unwrap();
        assert_eq!(empty.into_data().unwrap_err().code, ErrorCode::NoData);
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new("http://localhost:4000/graphql").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4000/graphql");
        assert_eq!(client.cache_len(), 0);
    }

    #[test]
    fn test_clones_share_cache() {
        let client = Client::new("http://localhost:4000/graphql").unwrap();
        let handle = client.clone();
        let other = Client::new("http://localhost:4000/graphql").unwrap();

        handle.write_result(
            OperationKind::Query,
            &json!({"post": {"__typename": "Post", "id": 1, "title": "A"}}),
            None,
        );

        assert!(Client::ptr_eq(&client, &handle));
        assert!(!Client::ptr_eq(&client, &other));
        assert_eq!(client.entity("Post:1").unwrap()["title"], "A");
        assert!(other.entity("Post:1").is_none());
    }

    #[test]
    fn test_query_builder() {
        let client = Client::new("http://localhost:4000/graphql").unwrap();
        let builder = client
            .query::<Value>("query { hello }")
            .variables(json!({"id": 1}))
            .operation_name("HelloQuery")
            .header("X-Preview", "true");

        assert_eq!(builder.request.query, "query { hello }");
        assert_eq!(builder.request.operation_name.as_deref(), Some("HelloQuery"));
        assert_eq!(builder.request.headers["X-Preview"], "true");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_not_cached() {
        let client = Client::with_config(
            ClientConfig::new("http://127.0.0.1:1/graphql")
                .max_retries(0)
                .timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = client
            .execute(Request::new("{ hello }"))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
        assert_eq!(client.cache_len(), 0);
    }
}
