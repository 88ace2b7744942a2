//! Tool channel backed by an MCP server in another process.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use askdb_agent::{BridgeError, ToolChannel};
use askdb_core::QueryError;
use askdb_store::{QueryResult, ToolDescriptor};
use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::model::{CallToolResult, Tool};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceError};
use rmcp::transport::TokioChildProcess;
use serde_json::{Map, Value, json};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::helpers;

pub type ClientService = RunningService<RoleClient, ()>;

/// Opens a fresh, initialized MCP client session.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self) -> Result<ClientService, BridgeError>;
}

/// Starts the tool server as a child process speaking MCP over stdio.
#[derive(Clone)]
pub struct ChildProcessConnector {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ChildProcessConnector {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the child. Values are never logged.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl fmt::Debug for ChildProcessConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(key, _)| key.as_str()).collect();
        f.debug_struct("ChildProcessConnector")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .finish()
    }
}

#[async_trait]
impl McpConnector for ChildProcessConnector {
    async fn connect(&self) -> Result<ClientService, BridgeError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        let transport = TokioChildProcess::new(command).map_err(|err| {
            BridgeError::Channel(format!("failed to start tool server: {err}"))
        })?;
        ().serve(transport)
            .await
            .map_err(|err| BridgeError::Channel(format!("tool server handshake failed: {err}")))
    }
}

struct Connection {
    generation: usize,
    service: ClientService,
    tools: Arc<Vec<ToolDescriptor>>,
}

#[derive(Clone)]
struct Session {
    generation: usize,
    peer: Peer<RoleClient>,
    tools: Arc<Vec<ToolDescriptor>>,
}

/// MCP client channel.
///
/// The server is started on first use and reused by every later call. A
/// transport failure drops the session; the next call starts a new one. The
/// lock is held only to read or replace the session, never across a call.
pub struct McpToolChannel {
    connector: Box<dyn McpConnector>,
    connection: Mutex<Option<Connection>>,
    connects: AtomicUsize,
}

impl McpToolChannel {
    pub fn new(connector: impl McpConnector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            connection: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    /// Number of sessions started so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Closes the current session, if any.
    pub async fn shutdown(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            close(connection).await;
        }
    }

    async fn session(&self) -> Result<Session, BridgeError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(Session {
                generation: connection.generation,
                peer: connection.service.peer().clone(),
                tools: connection.tools.clone(),
            });
        }

        let generation = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let service = self.connector.connect().await?;
        let tools = match fetch_tools(service.peer()).await {
            Ok(tools) => Arc::new(tools),
            Err(err) => {
                close(Connection {
                    generation,
                    service,
                    tools: Arc::new(Vec::new()),
                })
                .await;
                return Err(channel_err(&err));
            }
        };
        info!(generation, tools = tools.len(), "tool server session started");

        let session = Session {
            generation,
            peer: service.peer().clone(),
            tools: tools.clone(),
        };
        *guard = Some(Connection {
            generation,
            service,
            tools,
        });
        Ok(session)
    }

    /// Drops the session that failed, unless it was already replaced.
    async fn reset(&self, generation: usize) {
        let stale = {
            let mut guard = self.connection.lock().await;
            match guard.as_ref() {
                Some(connection) if connection.generation == generation => guard.take(),
                _ => None,
            }
        };
        if let Some(connection) = stale {
            warn!(generation, "tool server session failed; restarting on next call");
            close(connection).await;
        }
    }

    async fn classify(&self, generation: usize, err: ServiceError) -> BridgeError {
        match err {
            ServiceError::McpError(data) => BridgeError::Query(helpers::query_error_from(&data)),
            other => {
                self.reset(generation).await;
                channel_err(&other)
            }
        }
    }
}

#[async_trait]
impl ToolChannel for McpToolChannel {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError> {
        let session = self.session().await?;
        match fetch_tools(&session.peer).await {
            Ok(tools) => Ok(tools),
            Err(err) => Err(self.classify(session.generation, err).await),
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<QueryResult, BridgeError> {
        let session = self.session().await?;
        if !session.tools.iter().any(|tool| tool.name == name) {
            return Err(BridgeError::Query(QueryError::UnknownTool(name.to_string())));
        }

        let params = serde_json::from_value(json!({"name": name, "arguments": arguments}))
            .map_err(|err| BridgeError::Channel(format!("invalid tool call: {err}")))?;
        debug!(tool = name, generation = session.generation, "calling remote tool");
        match session.peer.call_tool(params).await {
            Ok(result) => query_result_from(&result),
            Err(err) => Err(self.classify(session.generation, err).await),
        }
    }
}

async fn fetch_tools(peer: &Peer<RoleClient>) -> Result<Vec<ToolDescriptor>, ServiceError> {
    let tools = peer.list_all_tools().await?;
    Ok(tools.iter().filter_map(descriptor_from).collect())
}

fn descriptor_from(tool: &Tool) -> Option<ToolDescriptor> {
    serde_json::to_value(tool)
        .and_then(serde_json::from_value)
        .ok()
}

fn query_result_from(result: &CallToolResult) -> Result<QueryResult, BridgeError> {
    let value = serde_json::to_value(result)
        .map_err(|err| BridgeError::Channel(format!("unreadable tool result: {err}")))?;
    let text = value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.iter().find_map(|item| item.get("text")?.as_str()))
        .unwrap_or_default();

    if value.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(BridgeError::Query(QueryError::Store(text.to_string())));
    }
    if let Some(structured) = value.get("structuredContent").filter(|v| !v.is_null()) {
        return serde_json::from_value(structured.clone())
            .map_err(|err| BridgeError::Channel(format!("unexpected tool result: {err}")));
    }
    serde_json::from_str(text)
        .map_err(|err| BridgeError::Channel(format!("unexpected tool result: {err}")))
}

fn channel_err(err: &ServiceError) -> BridgeError {
    BridgeError::Channel(err.to_string())
}

async fn close(connection: Connection) {
    let generation = connection.generation;
    if let Err(err) = connection.service.cancel().await {
        warn!(generation, "tool server session did not shut down cleanly: {err}");
    }
}
