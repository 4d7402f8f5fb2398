//! Endpoint configuration and execution context.
//!
//! The GraphQL endpoint is resolved once, when the host process builds its
//! [`ClientProvisioner`](crate::hydration::ClientProvisioner). A missing
//! endpoint is fatal: there is no default URL.

use crate::error::{SdkError, SdkResult};
use std::fmt;

/// Server-only variable holding the GraphQL endpoint.
pub const ENDPOINT_VAR: &str = "GRAPHQL_ENDPOINT";

/// Publicly exposed variant of [`ENDPOINT_VAR`], safe to ship to browsers.
pub const PUBLIC_ENDPOINT_VAR: &str = "PUBLIC_GRAPHQL_ENDPOINT";

/// Where the code is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// Stateless per-request render pass.
    Server,
    /// Long-lived client session.
    Interactive,
}

impl ExecutionContext {
    /// Returns true for the server render pass.
    pub const fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// Variables consulted in this context, in lookup order.
    pub const fn endpoint_vars(self) -> &'static [&'static str] {
        match self {
            Self::Server => &[ENDPOINT_VAR, PUBLIC_ENDPOINT_VAR],
            Self::Interactive => &[PUBLIC_ENDPOINT_VAR],
        }
    }

    fn missing_endpoint_message(self) -> String {
        match self {
            Self::Server => format!(
                "No GraphQL endpoint configured. Set {ENDPOINT_VAR} in the server environment."
            ),
            Self::Interactive => format!(
                "No GraphQL endpoint configured for the interactive client. \
                 Set {PUBLIC_ENDPOINT_VAR}; it is exposed to end users, so it must not carry secrets."
            ),
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Interactive => f.write_str("interactive"),
        }
    }
}

/// Resolved GraphQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    url: String,
}

impl EndpointConfig {
    /// Wraps an endpoint URL.
    ///
    /// Any non-blank value is kept exactly as given. The transport reports
    /// values it cannot send to as `INVALID_REQUEST` on first use.
    pub fn new(url: impl Into<String>) -> SdkResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(SdkError::invalid_url(format!("{url:?}")));
        }
        Ok(Self { url })
    }

    /// Resolves the endpoint from the process environment.
    pub fn from_env(context: ExecutionContext) -> SdkResult<Self> {
        Self::resolve(context, |key| std::env::var(key).ok())
    }

    /// Resolves the endpoint through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    pub fn resolve<F>(context: ExecutionContext, lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        context
            .endpoint_vars()
            .iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.trim().is_empty())
            .map_or_else(
                || Err(SdkError::missing_endpoint(context.missing_endpoint_message())),
                Self::new,
            )
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_server_prefers_private_variable() {
        let config = EndpointConfig::resolve(
            ExecutionContext::Server,
            lookup(&[
                (ENDPOINT_VAR, "http://cms.internal/graphql"),
                (PUBLIC_ENDPOINT_VAR, "https://cms.example.com/graphql"),
            ]),
        )
        .unwrap();
        assert_eq!(config.url(), "http://cms.internal/graphql");
    }

    #[test]
    fn test_server_falls_back_to_public_variable() {
        let config = EndpointConfig::resolve(
            ExecutionContext::Server,
            lookup(&[(PUBLIC_ENDPOINT_VAR, "https://cms.example.com/graphql")]),
        )
        .unwrap();
        assert_eq!(config.url(), "https://cms.example.com/graphql");
    }

    #[test]
    fn test_interactive_ignores_private_variable() {
        let err = EndpointConfig::resolve(
            ExecutionContext::Interactive,
            lookup(&[(ENDPOINT_VAR, "http://cms.internal/graphql")]),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingEndpoint);
        assert!(err.message.contains(PUBLIC_ENDPOINT_VAR));
    }

    #[test]
    fn test_missing_messages_differ_by_context() {
        let server = EndpointConfig::resolve(ExecutionContext::Server, lookup(&[])).unwrap_err();
        let interactive =
            EndpointConfig::resolve(ExecutionContext::Interactive, lookup(&[])).unwrap_err();

        assert_ne!(server.message, interactive.message);
        assert!(server.message.contains(ENDPOINT_VAR));
        assert!(!server.message.contains(PUBLIC_ENDPOINT_VAR));
        assert!(interactive.message.contains(PUBLIC_ENDPOINT_VAR));
    }

    #[test]
    fn test_blank_value_is_absent() {
        let err = EndpointConfig::resolve(
            ExecutionContext::Server,
            lookup(&[(ENDPOINT_VAR, "   ")]),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingEndpoint);
    }

    #[test]
    fn test_keeps_any_non_empty_value_verbatim() {
        for url in [
            "https://cms.example.com/graphql",
            " https://cms.example.com/graphql ",
            "cms.internal:8080/graphql",
            "ftp://cms.example.com",
            "/graphql",
        ] {
            assert_eq!(EndpointConfig::new(url).unwrap().url(), url);
            let resolved =
                EndpointConfig::resolve(ExecutionContext::Server, lookup(&[(ENDPOINT_VAR, url)]))
                    .unwrap();
            assert_eq!(resolved.url(), url);
        }
    }

    #[test]
    fn test_rejects_blank_value() {
        for url in ["", "  \t"] {
            assert_eq!(
                EndpointConfig::new(url).unwrap_err().code,
                ErrorCode::InvalidUrl
            );
        }
    }
}
