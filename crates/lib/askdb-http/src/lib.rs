//! HTTP request facade for askdb.
//!
//! Accepts a free-text question, runs it through the agent bridge, and returns
//! either the executed query with its results or the model's direct answer.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use askdb_agent::{AgentBridge, BridgeError, Translation};
use askdb_core::QueryError;
use askdb_store::QueryResult;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const DEFAULT_HTTP_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);

/// Configuration for the query HTTP server.
#[derive(Debug, Clone)]
pub struct QueryServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl QueryServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 64 * 1024,
            request_timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for QueryServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }
}

/// HTTP query server wrapper.
pub struct QueryServer {
    config: QueryServerConfig,
    state: AppState,
}

impl QueryServer {
    #[must_use]
    pub const fn new(bridge: AgentBridge, config: QueryServerConfig) -> Self {
        let state = AppState {
            bridge,
            request_timeout: config.request_timeout,
        };
        Self { config, state }
    }

    /// The router without a bound listener.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Runs the HTTP server until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = self.router();

        info!("askdb http listening on {addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    bridge: AgentBridge,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "query request timed out")
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Query(QueryError::SchemaValidation(message)) => {
                Self::new(StatusCode::BAD_REQUEST, format!("invalid query: {message}"))
            }
            BridgeError::Query(QueryError::CollectionNotFound(name)) => {
                Self::new(StatusCode::NOT_FOUND, format!("collection not found: {name}"))
            }
            BridgeError::Query(QueryError::UnknownTool(name)) => {
                Self::new(StatusCode::BAD_GATEWAY, format!("model proposed unknown tool: {name}"))
            }
            BridgeError::Query(QueryError::StoreUnavailable(message)) => {
                warn!("document store unavailable: {message}");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "document store unavailable")
            }
            BridgeError::Query(QueryError::Store(message)) => {
                warn!("document store error: {message}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "query failed")
            }
            err @ (BridgeError::ToolCallParse(_) | BridgeError::Completion(_)) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            BridgeError::Channel(message) => {
                warn!("tool channel error: {message}");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "query tool unavailable")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryPayload {
    user_query: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum QueryResponse {
    Query {
        mongo_query: Map<String, Value>,
        results: QueryResult,
    },
    Answer {
        answer: String,
    },
}

impl From<Translation> for QueryResponse {
    fn from(translation: Translation) -> Self {
        match translation {
            Translation::Query { query, results } => Self::Query {
                mongo_query: query.to_arguments(),
                results,
            },
            Translation::Answer { answer } => Self::Answer { answer },
        }
    }
}

fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryPayload>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(payload) = payload?;
    let user_query = payload.user_query.trim();
    if user_query.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "user_query is required"));
    }

    // Dropping the translation on timeout cancels any in-flight completion or
    // tool call.
    let translation = tokio::time::timeout(state.request_timeout, state.bridge.translate(user_query))
        .await
        .map_err(|_| ApiError::timeout())??;

    Ok(Json(translation.into()))
}
