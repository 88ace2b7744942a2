//! Reading a tool-call proposal out of a model reply.
//!
//! Replies arrive in one of three forms: a native tool call, a text reply that
//! is a `{"tool": ..., "arguments": {...}}` object (optionally in a ```json
//! fence), or free text. A text reply is only read as a tool call when it is an
//! object naming `tool` or `arguments`; once it is, anything that does not
//! parse is an error, never an answer.

use askdb_store::{ToolCallProposal, ToolDescriptor};
use serde_json::{Map, Value};

use crate::completion::{Completion, RawToolCall};
use crate::error::BridgeError;

/// The interpreted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Proposal(ToolCallProposal),
    Answer(String),
}

/// Interprets a completion against the tools that were advertised.
///
/// # Errors
/// Returns `BridgeError::ToolCallParse` for malformed JSON, missing `tool` or
/// `arguments`, non-object arguments, more than one tool call, or a tool name
/// that was not advertised.
pub fn interpret(
    completion: Completion,
    tools: &[ToolDescriptor],
) -> Result<ModelReply, BridgeError> {
    let proposal = match completion {
        Completion::ToolCalls(calls) => from_native(calls)?,
        Completion::Text(text) => match from_text(&text)? {
            Some(proposal) => proposal,
            None => return Ok(ModelReply::Answer(text.trim().to_string())),
        },
    };

    if !tools.iter().any(|tool| tool.name == proposal.tool) {
        return Err(BridgeError::ToolCallParse(format!(
            "model proposed unknown tool: {}",
            proposal.tool
        )));
    }
    Ok(ModelReply::Proposal(proposal))
}

fn from_native(mut calls: Vec<RawToolCall>) -> Result<ToolCallProposal, BridgeError> {
    if calls.len() != 1 {
        return Err(BridgeError::ToolCallParse(format!(
            "expected exactly one tool call, got {}",
            calls.len()
        )));
    }
    let call = calls.remove(0);
    let arguments = match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(_) => return Err(parse_err("tool arguments are not a JSON object")),
        Err(err) => return Err(parse_err(format!("tool arguments are not valid JSON: {err}"))),
    };
    Ok(ToolCallProposal {
        tool: call.name,
        arguments,
    })
}

/// Returns `Ok(None)` when the text is a plain answer.
fn from_text(text: &str) -> Result<Option<ToolCallProposal>, BridgeError> {
    let body = match strip_fence(text.trim()) {
        Some((info, body)) if info.is_empty() || info.eq_ignore_ascii_case("json") => body,
        Some(_) => return Ok(None),
        None => text.trim(),
    };
    if !body.starts_with('{') {
        return Ok(None);
    }

    let mut object = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) if names_tool_call(&object) => object,
        Ok(_) => return Ok(None),
        // Unparseable, so only a reply that mentions the protocol keys is an attempt.
        Err(err) if mentions_tool_call(body) => {
            return Err(parse_err(format!("reply is not valid JSON: {err}")));
        }
        Err(_) => return Ok(None),
    };

    let tool = match object.remove("tool") {
        Some(Value::String(tool)) if !tool.trim().is_empty() => tool,
        Some(_) => return Err(parse_err("`tool` must be a non-empty string")),
        None => return Err(parse_err("reply is missing `tool`")),
    };
    let arguments: Map<String, Value> = match object.remove("arguments") {
        Some(Value::Object(arguments)) => arguments,
        Some(_) => return Err(parse_err("`arguments` must be a JSON object")),
        None => return Err(parse_err("reply is missing `arguments`")),
    };
    Ok(Some(ToolCallProposal { tool, arguments }))
}

fn names_tool_call(object: &Map<String, Value>) -> bool {
    object.contains_key("tool") || object.contains_key("arguments")
}

fn mentions_tool_call(body: &str) -> bool {
    body.contains("\"tool\"") || body.contains("\"arguments\"")
}

/// Splits a reply wrapped in a Markdown code fence into its info string and
/// body. `None` when the reply is not fenced.
fn strip_fence(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("```")?.strip_suffix("```")?;
    let (info, body) = rest.split_once('\n').unwrap_or((rest, ""));
    Some((info.trim(), body.trim()))
}

fn parse_err(message: impl Into<String>) -> BridgeError {
    BridgeError::ToolCallParse(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tools() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "run_query_tool".to_string(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
        }]
    }

    fn native(arguments: &str) -> Completion {
        Completion::ToolCalls(vec![RawToolCall {
            name: "run_query_tool".to_string(),
            arguments: arguments.to_string(),
        }])
    }

    fn expect_parse_error(result: Result<ModelReply, BridgeError>) {
        match result {
            Err(BridgeError::ToolCallParse(_)) => {}
            other => panic!("expected ToolCallParse, got {other:?}"),
        }
    }

    #[test]
    fn native_tool_call_becomes_proposal() {
        let reply = interpret(native(r#"{"collection":"customers","limit":5}"#), &tools())
            .expect("parses");
        let ModelReply::Proposal(proposal) = reply else {
            panic!("expected proposal");
        };
        assert_eq!(proposal.tool, "run_query_tool");
        assert_eq!(proposal.arguments["collection"], json!("customers"));
        assert_eq!(proposal.arguments["limit"], json!(5));
    }

    #[test]
    fn native_arguments_must_be_an_object() {
        expect_parse_error(interpret(native("[1, 2]"), &tools()));
        expect_parse_error(interpret(native("{not json"), &tools()));
        expect_parse_error(interpret(native(""), &tools()));
    }

    #[test]
    fn multiple_native_calls_are_rejected() {
        let call = RawToolCall {
            name: "run_query_tool".to_string(),
            arguments: "{}".to_string(),
        };
        expect_parse_error(interpret(
            Completion::ToolCalls(vec![call.clone(), call]),
            &tools(),
        ));
    }

    #[test]
    fn textual_protocol_is_accepted_with_or_without_fence() {
        let plain = r#"{"tool": "run_query_tool", "arguments": {"collection": "customers"}}"#;
        let fenced = format!("```json\n{plain}\n```");
        for text in [plain.to_string(), fenced] {
            let reply = interpret(Completion::Text(text), &tools()).expect("parses");
            assert!(matches!(reply, ModelReply::Proposal(p) if p.arguments["collection"] == "customers"));
        }
    }

    #[test]
    fn malformed_textual_proposals_are_errors() {
        for text in [
            r#"{"tool": "run_query_tool", "arguments": {"collection": "customers""#,
            r#"{"arguments": {"collection": "customers"}}"#,
            r#"{"tool": "run_query_tool"}"#,
            r#"{"tool": "run_query_tool", "arguments": "collection=customers"}"#,
            "```json\n{\"tool\": \"run_query_tool\", \"arguments\": [1]}\n```",
            "```JSON\n{\"tool\": \"run_query_tool\",\n```",
        ] {
            expect_parse_error(interpret(Completion::Text(text.to_string()), &tools()));
        }
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let text = r#"{"tool": "drop_collection", "arguments": {"collection": "customers"}}"#;
        expect_parse_error(interpret(Completion::Text(text.to_string()), &tools()));

        let call = RawToolCall {
            name: "drop_collection".to_string(),
            arguments: "{}".to_string(),
        };
        expect_parse_error(interpret(Completion::ToolCalls(vec![call]), &tools()));
    }

    #[test]
    fn free_text_passes_through() {
        let reply = interpret(
            Completion::Text("  Paris is the capital of France.\n".to_string()),
            &tools(),
        )
        .expect("parses");
        assert_eq!(
            reply,
            ModelReply::Answer("Paris is the capital of France.".to_string())
        );
    }

    #[test]
    fn fenced_code_and_braces_in_prose_are_answers() {
        for text in [
            "```python\nprint('hi')\n```",
            "```\nSELECT * FROM customers;\n```",
            "{braces} delimit JSON objects",
            r#"{"name": "Alice", "city": "London"}"#,
            "```json\n[\"Alice\", \"Bob\"]\n```",
            "```python\n{\"tool\": \"run_query_tool\"}\n```",
        ] {
            let reply = interpret(Completion::Text(text.to_string()), &tools()).expect("answer");
            assert_eq!(reply, ModelReply::Answer(text.to_string()));
        }
    }

    #[test]
    fn fence_without_info_string_is_stripped() {
        let text = "```\n{\"tool\": \"run_query_tool\", \"arguments\": {}}\n```";
        let reply = interpret(Completion::Text(text.to_string()), &tools()).expect("parses");
        assert!(matches!(reply, ModelReply::Proposal(_)));
    }
}
