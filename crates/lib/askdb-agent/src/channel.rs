//! Transport-neutral access to the query tool.

use askdb_core::ToolRegistry;
use askdb_store::{QueryResult, ToolDescriptor};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// A connection to a tool server, in-process or remote.
#[async_trait]
pub trait ToolChannel: Send + Sync {
    /// Lists the tools the server advertises.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError>;

    /// Invokes a tool by name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<QueryResult, BridgeError>;
}

/// Dispatches straight into a [`ToolRegistry`] in the same process.
#[derive(Clone)]
pub struct LocalToolChannel {
    registry: ToolRegistry,
}

impl LocalToolChannel {
    #[must_use]
    pub const fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[async_trait]
impl ToolChannel for LocalToolChannel {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError> {
        Ok(self.registry.list_tools())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<QueryResult, BridgeError> {
        Ok(self.registry.call_tool(name, arguments).await?)
    }
}
