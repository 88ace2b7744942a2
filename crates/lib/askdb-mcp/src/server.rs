//! MCP server runners for askdb.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use askdb_core::ToolRegistry;
use axum::Router;
use axum::routing::get;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::AskDbMcp;
use crate::state::{ServerLifecycle, ServerState};

pub const DEFAULT_MCP_HTTP_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 4020);

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MCP_HTTP_ADDR)
    }
}

/// Serves the query tool over stdio until the client disconnects.
///
/// # Errors
/// Returns any lifecycle, transport, or server error.
pub async fn serve_stdio(registry: ToolRegistry, lifecycle: Arc<ServerLifecycle>) -> ServeResult {
    lifecycle.transition(ServerState::Starting)?;
    lifecycle.transition(ServerState::Listening)?;
    let service = AskDbMcp::new(registry, lifecycle.clone());
    let (stdin, stdout) = stdio();
    let running = match serve_server(service, (stdin, stdout)).await {
        Ok(running) => running,
        Err(err) => {
            stop(&lifecycle)?;
            return Err(err.into());
        }
    };
    info!("mcp stdio server listening");
    let outcome = running.waiting().await;
    stop(&lifecycle)?;
    outcome?;
    Ok(())
}

/// Serves the query tool over streamable HTTP until `shutdown` resolves.
///
/// # Errors
/// Returns any lifecycle, listener, or server error.
pub async fn serve_streamable_http<F>(
    registry: ToolRegistry,
    lifecycle: Arc<ServerLifecycle>,
    config: McpHttpServerConfig,
    shutdown: F,
) -> ServeResult
where
    F: Future<Output = ()> + Send + 'static,
{
    lifecycle.transition(ServerState::Starting)?;
    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            lifecycle.transition(ServerState::Stopped)?;
            return Err(err.into());
        }
    };

    let session_registry = registry.clone();
    let session_lifecycle = lifecycle.clone();
    let service: StreamableHttpService<AskDbMcp, LocalSessionManager> =
        StreamableHttpService::new(
            move || {
                Ok(AskDbMcp::new(
                    session_registry.clone(),
                    session_lifecycle.clone(),
                ))
            },
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", service);

    lifecycle.transition(ServerState::Listening)?;
    info!(addr = %config.addr, "mcp http server listening");
    let outcome = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    stop(&lifecycle)?;
    outcome?;
    Ok(())
}

fn stop(lifecycle: &ServerLifecycle) -> ServeResult {
    lifecycle.transition(ServerState::Stopping)?;
    info!(in_flight = lifecycle.in_flight(), "mcp server stopping");
    lifecycle.transition(ServerState::Stopped)?;
    Ok(())
}
