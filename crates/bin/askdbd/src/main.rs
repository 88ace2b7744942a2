//! Daemon entry point for askdb.
//!
//! Loads configuration from the command line and environment, opens the
//! document store, and serves the query tool (stdio or MCP over HTTP) and the
//! HTTP request facade.

mod config;
mod store;

use std::sync::Arc;

use askdb_agent::{
    AgentBridge,
    BridgeConfig,
    LocalToolChannel,
    OpenAiCompletionClient,
    OpenAiConfig,
    ToolChannel,
};
use askdb_core::seed::seed_sample_customers;
use askdb_core::{ExecutorConfig, QueryExecutor, ToolRegistry};
use askdb_http::{QueryServer, QueryServerConfig};
use askdb_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use askdb_mcp::{ChildProcessConnector, McpToolChannel, ServerLifecycle};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{AskDbConfig, ToolTransport};
use crate::store::connect_store;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AskDbConfig::from_args()?;
    init_tracing(&config.log_level);

    let store = connect_store(&config).await?;
    if config.seed_sample {
        seed_sample_customers(&store).await?;
    }

    let executor = QueryExecutor::with_config(
        Arc::new(store),
        ExecutorConfig::default().with_strict_collections(config.strict_collections),
    );
    let registry = ToolRegistry::new(executor);
    let lifecycle = Arc::new(ServerLifecycle::new());

    // stdout belongs to the MCP channel in stdio mode.
    if config.enable_stdio {
        return serve_stdio(registry, lifecycle).await;
    }

    let mut servers: JoinSet<Result<(), BoxError>> = JoinSet::new();

    if config.mcp_serve {
        let mcp_config = McpHttpServerConfig::new(config.mcp_http_addr);
        servers.spawn(serve_streamable_http(
            registry.clone(),
            lifecycle.clone(),
            mcp_config,
            shutdown_signal(),
        ));
    }

    let mut subprocess: Option<Arc<McpToolChannel>> = None;
    if config.serves_http() {
        let channel: Arc<dyn ToolChannel> = match config.tool_transport {
            ToolTransport::Local => Arc::new(LocalToolChannel::new(registry.clone())),
            ToolTransport::Subprocess => {
                let channel = Arc::new(McpToolChannel::new(child_connector(&config)?));
                subprocess = Some(channel.clone());
                channel
            }
        };
        let bridge = AgentBridge::with_config(
            channel,
            Arc::new(completion_client(&config)?),
            BridgeConfig::default().with_completion_timeout(Some(config.request_timeout)),
        );
        let http_config = QueryServerConfig::new(config.http_addr)
            .with_request_timeout(config.request_timeout)
            .with_max_body_bytes(config.max_body_bytes);
        servers.spawn(QueryServer::new(bridge, http_config).serve(shutdown_signal()));
    }

    if servers.is_empty() {
        warn!("nothing to serve; enable --http-serve, --mcp-serve, or --stdio");
    }

    let mut outcome = Ok(());
    while let Some(joined) = servers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!("server exited with error: {err}");
                outcome = Err(err);
            }
            Err(err) => {
                warn!("server task failed: {err}");
                outcome = Err(err.into());
            }
        }
    }

    if let Some(channel) = subprocess {
        channel.shutdown().await;
    }
    info!("askdbd stopped");
    outcome
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn completion_client(config: &AskDbConfig) -> Result<OpenAiCompletionClient, BoxError> {
    let settings = config
        .completion
        .as_ref()
        .ok_or_else(|| config::ConfigError::MissingSetting("OPENAI_API_KEY"))?;
    let openai = OpenAiConfig::new(settings.api_key.clone())
        .with_base_url(settings.base_url.clone())
        .with_model(settings.model.clone())
        .with_timeout(Some(config.request_timeout));
    Ok(OpenAiCompletionClient::new(openai)?)
}

fn child_connector(config: &AskDbConfig) -> Result<ChildProcessConnector, BoxError> {
    let program = std::env::current_exe()?;
    let mut connector = ChildProcessConnector::new(program).with_args(config.child_stdio_args());
    if let Some(credentials) = config.db_credentials.as_ref() {
        connector = connector
            .with_env("ASKDB_DB_USERNAME", credentials.username.clone())
            .with_env("ASKDB_DB_PASSWORD", credentials.password.clone());
    }
    Ok(connector)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}
