use std::sync::Arc;
use std::time::Duration;

use askdb_store::{QueryResult, QuerySpec};
use tracing::{debug, info};

use crate::channel::ToolChannel;
use crate::completion::{Completion, CompletionClient, CompletionRequest};
use crate::error::BridgeError;
use crate::parse::{self, ModelReply};
use crate::prompt;

/// Outcome of translating one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The model proposed a query; it was validated and executed.
    Query { query: QuerySpec, results: QueryResult },
    /// The model answered without calling a tool.
    Answer { answer: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfig {
    /// Upper bound on the completion round trip.
    pub completion_timeout: Option<Duration>,
}

impl BridgeConfig {
    #[must_use]
    pub const fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }
}

/// Turns free-text questions into validated tool calls.
///
/// Each request runs its steps in order: discover tools, prompt the model,
/// parse the reply, validate the proposal, call the tool. Requests share
/// nothing but the channel and the completion client.
#[derive(Clone)]
pub struct AgentBridge {
    channel: Arc<dyn ToolChannel>,
    completion: Arc<dyn CompletionClient>,
    config: BridgeConfig,
}

impl AgentBridge {
    pub fn new(channel: Arc<dyn ToolChannel>, completion: Arc<dyn CompletionClient>) -> Self {
        Self::with_config(channel, completion, BridgeConfig::default())
    }

    pub fn with_config(
        channel: Arc<dyn ToolChannel>,
        completion: Arc<dyn CompletionClient>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            channel,
            completion,
            config,
        }
    }

    /// Translates a question and, when the model proposes a query, runs it.
    ///
    /// The proposal is validated before the tool is called, so a rejected
    /// proposal never reaches the store.
    ///
    /// # Errors
    /// Returns `BridgeError::Channel` when tools cannot be listed or called,
    /// `BridgeError::Completion` when the model cannot be reached or times out,
    /// `BridgeError::ToolCallParse` for unreadable proposals, and
    /// `BridgeError::Query` for schema or execution failures.
    pub async fn translate(&self, user_query: &str) -> Result<Translation, BridgeError> {
        let tools = self.channel.list_tools().await?;
        if tools.is_empty() {
            return Err(BridgeError::Channel("tool server advertises no tools".to_string()));
        }

        let request = prompt::build_request(user_query, &tools);
        let completion = self.complete(&request).await?;

        let proposal = match parse::interpret(completion, &tools)? {
            ModelReply::Answer(answer) => {
                debug!("model answered without a tool call");
                return Ok(Translation::Answer { answer });
            }
            ModelReply::Proposal(proposal) => proposal,
        };

        let spec = QuerySpec::from_arguments(proposal.arguments)?;
        info!(
            tool = %proposal.tool,
            collection = %spec.collection,
            limit = spec.limit,
            "calling tool"
        );
        let results = self
            .channel
            .call_tool(&proposal.tool, spec.to_arguments())
            .await?;
        Ok(Translation::Query {
            query: spec,
            results,
        })
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BridgeError> {
        let call = self.completion.complete(request);
        match self.config.completion_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| BridgeError::Completion("timed out".to_string()))?,
            None => call.await,
        }
    }
}
