//! Agent bridge for askdb.
//!
//! Discovers the query tool, asks a language model to propose arguments for
//! it, validates the proposal, and runs it through a [`ToolChannel`]. The model
//! never reaches the store directly.

mod bridge;
pub mod channel;
pub mod completion;
pub mod error;
pub mod parse;
pub mod prompt;

pub use bridge::{AgentBridge, BridgeConfig, Translation};
pub use channel::{LocalToolChannel, ToolChannel};
pub use completion::{
    Completion,
    CompletionClient,
    CompletionRequest,
    OpenAiCompletionClient,
    OpenAiConfig,
    RawToolCall,
};
pub use error::BridgeError;
