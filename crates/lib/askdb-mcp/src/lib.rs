//! MCP server and client for askdb.
//!
//! The server exposes the single query tool from [`ToolRegistry`] over stdio
//! or streamable HTTP. The client side, [`McpToolChannel`], lets the agent
//! bridge reach that server in a child process.

mod helpers;
pub mod client;
pub mod server;
pub mod state;

use std::sync::Arc;

use askdb_core::{QueryError, ToolRegistry};
use askdb_store::{QueryArgs, QuerySpec};
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use serde_json::Value;
use tracing::debug;

pub use client::{ChildProcessConnector, McpConnector, McpToolChannel};
pub use state::{CallGuard, LifecycleError, ServerLifecycle, ServerState};

const SERVER_INSTRUCTIONS: &str = r"askdb exposes one read-only query tool, `run_query_tool`.

Arguments:
- `collection` (required): the collection to read, e.g. `customers`.
- `filter`: match conditions such as {'city': 'London'} or {'age': {'$gte': 30}}.
  Operators: $eq $ne $gt $gte $lt $lte $in $nin $exists $not, and top-level $and $or $nor.
- `projection`: {'field': 1} to include or {'field': 0} to exclude fields.
- `sort`: ordered list of {'field': ..., 'direction': 'asc' | 'desc'}.
- `limit`: 1 to 500, default 50.

Unknown arguments are rejected. Results are `{documents, count}`.";

/// MCP server wrapper around the tool registry.
#[derive(Clone)]
pub struct AskDbMcp {
    tool_router: ToolRouter<Self>,
    registry: ToolRegistry,
    lifecycle: Arc<ServerLifecycle>,
}

impl AskDbMcp {
    /// Creates a server whose calls are gated by `lifecycle`.
    #[must_use]
    pub fn new(registry: ToolRegistry, lifecycle: Arc<ServerLifecycle>) -> Self {
        let tool_router = advertise_descriptor(Self::tool_router_query(), &registry);
        Self {
            tool_router,
            registry,
            lifecycle,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Arc<ServerLifecycle> {
        &self.lifecycle
    }
}

#[tool_router(router = tool_router_query, vis = "pub")]
impl AskDbMcp {
    // Description and input schema come from the registry descriptor.
    #[tool]
    async fn run_query_tool(
        &self,
        Parameters(args): Parameters<QueryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let _call = self.lifecycle.begin_call().map_err(helpers::lifecycle_err)?;
        let spec = QuerySpec::try_from(args)
            .map_err(|err| helpers::query_err(&QueryError::from(err)))?;
        debug!(collection = %spec.collection, limit = spec.limit, "mcp tool call");
        let result = self
            .registry
            .run_query(spec)
            .await
            .map_err(|err| helpers::query_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(result)?]))
    }
}

/// Makes the MCP listing match what local callers see from the registry.
fn advertise_descriptor(
    mut router: ToolRouter<AskDbMcp>,
    registry: &ToolRegistry,
) -> ToolRouter<AskDbMcp> {
    let descriptor = registry.descriptor();
    if let Some(route) = router.map.get_mut(descriptor.name.as_str()) {
        route.attr.description = Some(descriptor.description.clone().into());
        if let Value::Object(schema) = &descriptor.input_schema {
            route.attr.input_schema = Arc::new(schema.clone());
        }
    }
    router
}

#[tool_handler]
impl ServerHandler for AskDbMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
