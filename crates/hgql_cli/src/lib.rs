//! Command-line interface for hgql.
//!
//! # Usage
//!
//! ```bash
//! # Run a query against $GRAPHQL_ENDPOINT
//! hgql query '{ posts { nodes { __typename id title } } }'
//!
//! # Same, printing page props with the cache snapshot embedded
//! hgql query @posts.graphql --variables '{"first": 10}' --embed
//!
//! # Fetch page metadata
//! hgql page /about/
//!
//! # Preview what hydration would leave in the client cache
//! hgql merge server-props.json client-cache.json
//!
//! # List cached entities of a snapshot or page props file
//! hgql inspect server-props.json
//! ```

use colored::Colorize;
use clap::{Parser, Subcommand};
use hgql_sdk::{
    embed_snapshot, merge_snapshots, CacheSnapshot, ClientConfig, ClientProvisioner,
    EndpointConfig, ExecutionContext, Page, PageByUriVariables, Request, SdkError,
    APOLLO_STATE_KEY, PAGE_BY_URI_QUERY,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "hgql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// GraphQL endpoint, overriding GRAPHQL_ENDPOINT
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "hgql_sdk=debug,hgql_cli=debug"
        } else if self.quiet {
            "hgql_sdk=warn,hgql_cli=warn"
        } else {
            "hgql_sdk=info,hgql_cli=info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a GraphQL operation
    Query {
        /// Operation source, or @path to read it from a file
        query: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Operation name
        #[arg(long)]
        operation_name: Option<String>,

        /// Print page props with the cache snapshot embedded instead of data
        #[arg(long)]
        embed: bool,
    },

    /// Fetch the metadata of a CMS page
    Page {
        /// Page URI, e.g. /about/
        uri: String,

        /// Print page props with the cache snapshot embedded
        #[arg(long)]
        json: bool,
    },

    /// Merge a snapshot into an existing cache the way hydration does
    Merge {
        /// Incoming snapshot (raw snapshot or page props)
        snapshot: PathBuf,

        /// Existing cache contents
        existing: PathBuf,
    },

    /// List the entities held by a snapshot
    Inspect {
        /// Raw snapshot or page props file
        file: PathBuf,
    },

    /// Show version information
    Version,
}

pub async fn run(cli: Cli) -> CliResult<i32> {
    match cli.command {
        Commands::Query {
            ref query,
            ref variables,
            ref operation_name,
            embed,
        } => {
            let source = load_source(query)?;
            let variables = variables.as_deref().map(parse_variables).transpose()?;
            let mut request = Request::new(source);
            request.variables = variables;
            request.operation_name = operation_name.clone();
            run_query(&cli, request, embed).await
        }
        Commands::Page { ref uri, json } => fetch_page(&cli, uri, json).await,
        Commands::Merge {
            ref snapshot,
            ref existing,
        } => {
            let merged = merge_snapshots(read_snapshot(snapshot)?, read_snapshot(existing)?);
            println!("{}", serde_json::to_string_pretty(&merged)?);
            Ok(0)
        }
        Commands::Inspect { ref file } => inspect(&read_snapshot(file)?, cli.quiet),
        Commands::Version => {
            println!("hgql {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn provisioner(endpoint: Option<&str>) -> Result<ClientProvisioner, SdkError> {
    match endpoint {
        Some(url) => {
            let endpoint = EndpointConfig::new(url)?;
            Ok(ClientProvisioner::new(
                ExecutionContext::Server,
                ClientConfig::from_endpoint(&endpoint),
            ))
        }
        None => ClientProvisioner::from_env(ExecutionContext::Server),
    }
}

async fn run_query(cli: &Cli, request: Request, embed: bool) -> CliResult<i32> {
    let client = provisioner(cli.endpoint.as_deref())?.initialize(None)?;
    let response = client.execute(request).await?;

    let failed = response.errors.as_ref().is_some_and(|errors| !errors.is_empty());
    if failed && !cli.quiet {
        for error in response.errors.iter().flatten() {
            eprintln!("{} {}", "GraphQL error:".yellow().bold(), error.message);
        }
    }

    let output = if embed {
        embed_snapshot(&client, json!({ "props": {} }))
    } else {
        serde_json::to_value(&response)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(i32::from(failed))
}

async fn fetch_page(cli: &Cli, uri: &str, as_json: bool) -> CliResult<i32> {
    let client = provisioner(cli.endpoint.as_deref())?.initialize(None)?;
    let data: Value = client
        .query(PAGE_BY_URI_QUERY)
        .variables(PageByUriVariables::new(uri))
        .operation_name(hgql_sdk::page::PAGE_BY_URI_OPERATION)
        .execute()
        .await?;

    let Some(page) = Page::from_query_data(&data)? else {
        eprintln!("{} no page at {}", "Not found:".red().bold(), uri);
        return Ok(1);
    };
    info!(uri = %page.uri, entries = client.cache_len(), "Fetched page");

    if as_json {
        let props = embed_snapshot(&client, json!({ "props": { "uri": page.uri } }));
        println!("{}", serde_json::to_string_pretty(&props)?);
        return Ok(0);
    }

    let meta = page.head_meta();
    println!("{} {}", "Page".green().bold(), page.uri);
    println!("  {:<12}{}", "title", meta.title);
    println!("  {:<12}{}", "template", page.template_name());
    if let Some(description) = &meta.description {
        println!("  {:<12}{}", "description", description);
    }
    if let Some(canonical) = &meta.canonical {
        println!("  {:<12}{}", "canonical", canonical);
    }
    if let Some(image) = &meta.image {
        println!("  {:<12}{}", "image", image);
    }
    Ok(0)
}

fn inspect(snapshot: &CacheSnapshot, quiet: bool) -> CliResult<i32> {
    for entry in summarize(snapshot) {
        println!(
            "{:<40} {:<16} {} field(s)",
            entry.id.bold(),
            entry.typename.dimmed(),
            entry.fields
        );
    }
    if !quiet {
        println!(
            "{} {} entr{}",
            "Total:".green().bold(),
            snapshot.len(),
            if snapshot.len() == 1 { "y" } else { "ies" }
        );
    }
    Ok(0)
}

/// One line of `inspect` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub id: String,
    pub typename: String,
    pub fields: usize,
}

/// Summarizes every entry of a snapshot, in snapshot order.
pub fn summarize(snapshot: &CacheSnapshot) -> Vec<EntrySummary> {
    snapshot
        .iter()
        .map(|(id, entry)| {
            let typename = entry
                .get("__typename")
                .and_then(Value::as_str)
                .or_else(|| id.split_once(':').map(|(typename, _)| typename))
                .unwrap_or("-")
                .to_string();
            let fields = entry
                .as_object()
                .map_or(0, |fields| {
                    fields.keys().filter(|key| *key != "__typename").count()
                });
            EntrySummary {
                id: id.clone(),
                typename,
                fields,
            }
        })
        .collect()
}

/// Reads an operation from the argument, or from a file for `@path`.
pub fn load_source(arg: &str) -> std::io::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(arg.to_string()),
    }
}

/// Parses `--variables`, which must be a JSON object.
pub fn parse_variables(raw: &str) -> Result<Value, SdkError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| SdkError::serialize(format!("Invalid --variables JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(SdkError::serialize("--variables must be a JSON object"))
    }
}

/// Finds a snapshot in a JSON document.
///
/// Accepts page props (`props.__APOLLO_STATE__`), component props
/// (`__APOLLO_STATE__`) or a bare snapshot object. Page props without an
/// embedded snapshot hold none.
pub fn find_snapshot(document: &Value) -> Option<CacheSnapshot> {
    let state = match document.get("props") {
        Some(props) => props.get(APOLLO_STATE_KEY)?,
        None => document.get(APOLLO_STATE_KEY).unwrap_or(document),
    };
    CacheSnapshot::from_value(state)
}

fn read_snapshot(path: &Path) -> CliResult<CacheSnapshot> {
    let document: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    find_snapshot(&document).ok_or_else(|| {
        format!("{} does not contain a cache snapshot", path.display()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_endpoint_flag() {
        let cli = Cli::parse_from([
            "hgql",
            "page",
            "/about/",
            "--endpoint",
            "http://localhost:8080/graphql",
            "-v",
        ]);
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:8080/graphql"));
        assert_eq!(cli.default_log_filter(), "hgql_sdk=debug,hgql_cli=debug");
        assert!(matches!(cli.command, Commands::Page { ref uri, json: false } if uri == "/about/"));
    }

    #[test]
    fn test_find_snapshot_shapes() {
        let entity = json!({"Post:1": {"title": "A"}});

        let page_props = json!({"props": {APOLLO_STATE_KEY: entity.clone()}});
        let component_props = json!({APOLLO_STATE_KEY: entity.clone(), "uri": "/"});

        for document in [&page_props, &component_props, &entity] {
            let snapshot = find_snapshot(document).unwrap();
            assert_eq!(snapshot.get("Post:1").unwrap()["title"], "A");
        }
        assert!(find_snapshot(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_page_props_without_state_hold_no_snapshot() {
        assert!(find_snapshot(&json!({"props": {"uri": "/"}})).is_none());
        assert!(find_snapshot(&json!({"props": {}, "revalidate": 60})).is_none());

        let path = std::env::temp_dir().join(format!("hgql-cli-no-state-{}.json", std::process::id()));
        std::fs::write(&path, json!({"props": {"uri": "/"}}).to_string()).unwrap();
        let err = read_snapshot(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(err.to_string().contains("does not contain a cache snapshot"));
    }

    #[test]
    fn test_parse_variables() {
        assert_eq!(parse_variables(r#"{"first": 10}"#).unwrap()["first"], 10);
        assert!(parse_variables("[1]").is_err());
        assert!(parse_variables("{").is_err());
    }

    #[test]
    fn test_load_inline_source() {
        assert_eq!(load_source("{ posts { id } }").unwrap(), "{ posts { id } }");
        assert!(load_source("@/definitely/not/here.graphql").is_err());
    }

    #[test]
    fn test_summarize() {
        let snapshot = CacheSnapshot::from_value(&json!({
            "ROOT_QUERY": {"__typename": "Query", "posts": []},
            "Post:1": {"title": "A", "slug": "a"}
        }))
        .unwrap();

        let summary = summarize(&snapshot);
        assert_eq!(
            summary,
            vec![
                EntrySummary {
                    id: "ROOT_QUERY".into(),
                    typename: "Query".into(),
                    fields: 1
                },
                EntrySummary {
                    id: "Post:1".into(),
                    typename: "Post".into(),
                    fields: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_command() {
        let dir = std::env::temp_dir().join(format!("hgql-cli-merge-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let incoming = dir.join("incoming.json");
        let existing = dir.join("existing.json");
        std::fs::write(
            &incoming,
            json!({"props": {APOLLO_STATE_KEY: {"Menu:1": {"items": [9]}}}}).to_string(),
        )
        .unwrap();
        std::fs::write(&existing, json!({"Menu:1": {"items": [1, 2, 3]}}).to_string()).unwrap();

        let cli = Cli::parse_from([
            "hgql",
            "merge",
            incoming.to_str().unwrap(),
            existing.to_str().unwrap(),
        ]);
        assert_eq!(run(cli).await.unwrap(), 0);

        let merged = merge_snapshots(read_snapshot(&incoming).unwrap(), read_snapshot(&existing).unwrap());
        assert_eq!(merged.get("Menu:1").unwrap()["items"], json!([1, 2, 3]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_query_rejects_blank_endpoint() {
        let cli = Cli::parse_from(["hgql", "query", "{ posts { id } }", "--endpoint", " "]);
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("INVALID_URL"));
    }

    #[tokio::test]
    async fn test_query_reports_unsendable_endpoint() {
        let cli = Cli::parse_from(["hgql", "query", "{ posts { id } }", "--endpoint", "cms.local"]);
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("INVALID_REQUEST"));
    }
}
