//! Completion service clients.

use std::fmt;
use std::time::Duration;

use askdb_store::ToolDescriptor;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::BridgeError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const ERROR_BODY_LIMIT: usize = 512;

/// One prompt for the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub tools: Vec<ToolDescriptor>,
}

/// A native tool call as returned by the service, arguments still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolCall {
    pub name: String,
    pub arguments: String,
}

/// What the model sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    ToolCalls(Vec<RawToolCall>),
    Text(String),
}

/// A language-model completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BridgeError>;
}

/// Settings for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Chat completions client using function-calling tools.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiCompletionClient {
    /// Builds a client.
    ///
    /// # Errors
    /// Returns `BridgeError::Completion` if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, BridgeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| BridgeError::Completion(err.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BridgeError> {
        let body = request_body(&self.config.model, request);
        debug!(model = %self.config.model, tools = request.tools.len(), "requesting completion");

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| BridgeError::Completion(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(BridgeError::Completion(format!(
                "completion service returned {status}: {text}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| BridgeError::Completion(format!("invalid response body: {err}")))?;
        parse_response(&payload)
    }
}

/// Builds the chat completions request body.
#[must_use]
pub fn request_body(model: &str, request: &CompletionRequest) -> Value {
    let tools: Vec<Value> = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect();

    let mut body = json!({
        "model": model,
        "temperature": 0,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user},
        ],
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

/// Reads the first choice of a chat completions response.
///
/// # Errors
/// Returns `BridgeError::Completion` when the payload has no usable message,
/// and `BridgeError::ToolCallParse` when any listed tool call is unreadable.
pub fn parse_response(payload: &Value) -> Result<Completion, BridgeError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| BridgeError::Completion("response has no message".to_string()))?;

    if let Some(calls) = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .filter(|calls| !calls.is_empty())
    {
        let calls = calls
            .iter()
            .enumerate()
            .map(|(index, call)| raw_tool_call(index, call))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Completion::ToolCalls(calls));
    }

    match message.get("content").and_then(Value::as_str) {
        Some(content) => Ok(Completion::Text(content.to_string())),
        None => Err(BridgeError::Completion(
            "response has neither tool calls nor content".to_string(),
        )),
    }
}

fn raw_tool_call(index: usize, call: &Value) -> Result<RawToolCall, BridgeError> {
    let function = call.get("function");
    let name = function
        .and_then(|function| function.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            BridgeError::ToolCallParse(format!("tool call {index} has no function name"))
        })?;
    // Some compatible servers send arguments as an object instead of a string.
    let arguments = match function.and_then(|function| function.get("arguments")) {
        Some(Value::String(raw)) => raw.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Ok(RawToolCall {
        name: name.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "run_query_tool".to_string(),
            description: "query".to_string(),
            input_schema: json!({"type": "object", "additionalProperties": false}),
        }
    }

    #[test]
    fn body_advertises_tools_as_functions() {
        let request = CompletionRequest {
            system: "system".to_string(),
            user: "list customers in London".to_string(),
            tools: vec![descriptor()],
        };
        let body = request_body("gpt-4o-mini", &request);
        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["temperature"], json!(0));
        assert_eq!(body["tool_choice"], json!("auto"));
        assert_eq!(body["tools"][0]["type"], json!("function"));
        assert_eq!(body["tools"][0]["function"]["name"], json!("run_query_tool"));
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["additionalProperties"],
            json!(false)
        );
        assert_eq!(body["messages"][1]["content"], json!("list customers in London"));
    }

    #[test]
    fn body_without_tools_omits_tool_choice() {
        let request = CompletionRequest {
            system: "system".to_string(),
            user: "hello".to_string(),
            tools: Vec::new(),
        };
        let body = request_body("m", &request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn parses_native_tool_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "run_query_tool",
                            "arguments": "{\"collection\":\"customers\"}"
                        }
                    }]
                }
            }]
        });
        let completion = parse_response(&payload).expect("parses");
        assert_eq!(
            completion,
            Completion::ToolCalls(vec![RawToolCall {
                name: "run_query_tool".to_string(),
                arguments: "{\"collection\":\"customers\"}".to_string(),
            }])
        );
    }

    #[test]
    fn object_arguments_are_serialized() {
        let payload = json!({
            "choices": [{"message": {"tool_calls": [{
                "function": {"name": "run_query_tool", "arguments": {"collection": "customers"}}
            }]}}]
        });
        let Completion::ToolCalls(calls) = parse_response(&payload).expect("parses") else {
            panic!("expected tool calls");
        };
        let arguments: Value = serde_json::from_str(&calls[0].arguments).expect("valid json");
        assert_eq!(arguments, json!({"collection": "customers"}));
    }

    #[test]
    fn parses_plain_text() {
        let payload = json!({"choices": [{"message": {"content": "Hello there."}}]});
        assert_eq!(
            parse_response(&payload).expect("parses"),
            Completion::Text("Hello there.".to_string())
        );
    }

    #[test]
    fn rejects_empty_payloads() {
        for payload in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": null}}]}),
        ] {
            let err = parse_response(&payload).expect_err("no message");
            assert!(matches!(err, BridgeError::Completion(_)));
        }
    }

    #[test]
    fn nameless_tool_call_is_not_an_answer() {
        let payload = json!({
            "choices": [{"message": {
                "content": "",
                "tool_calls": [{"function": {"arguments": "{\"collection\":\"customers\"}"}}]
            }}]
        });
        let err = parse_response(&payload).expect_err("unreadable call");
        assert!(matches!(err, BridgeError::ToolCallParse(_)));
    }

    #[test]
    fn unreadable_call_beside_a_valid_one_is_rejected() {
        let payload = json!({
            "choices": [{"message": {"tool_calls": [
                {"function": {"name": "run_query_tool", "arguments": "{\"collection\":\"customers\"}"}},
                {"function": {"arguments": "{}"}}
            ]}}]
        });
        let err = parse_response(&payload).expect_err("second call has no name");
        assert!(matches!(err, BridgeError::ToolCallParse(message) if message.contains("tool call 1")));

        let payload = json!({
            "choices": [{"message": {"tool_calls": [
                {"function": {"name": "run_query_tool", "arguments": "{}"}},
                {"type": "function"}
            ]}}]
        });
        assert!(matches!(
            parse_response(&payload),
            Err(BridgeError::ToolCallParse(_))
        ));
    }

    #[test]
    fn empty_tool_call_list_falls_back_to_content() {
        let payload = json!({"choices": [{"message": {"content": "Hi.", "tool_calls": []}}]});
        assert_eq!(
            parse_response(&payload).expect("parses"),
            Completion::Text("Hi.".to_string())
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = OpenAiConfig::new("sk-secret").with_model("gpt-4o");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("gpt-4o"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = OpenAiConfig::new("key").with_base_url("http://localhost:11434/v1/");
        assert_eq!(config.endpoint(), "http://localhost:11434/v1/chat/completions");
    }
}
