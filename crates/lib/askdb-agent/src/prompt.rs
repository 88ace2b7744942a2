//! Prompt construction for the completion service.

use askdb_store::ToolDescriptor;

use crate::completion::CompletionRequest;

const SYSTEM_INSTRUCTIONS: &str = r#"You translate questions about a document database into calls to a query tool.

Rules:
- If the question needs data, call one of the tools below exactly once. Never write raw database queries.
- Only use the argument names the tool's input schema declares.
- If the question does not need data, answer directly in plain text and do not call a tool.

If native tool calling is unavailable, reply with ONLY this JSON object and nothing else:
{"tool": "<tool name>", "arguments": {<tool arguments>}}"#;

/// Builds the completion request for one user question.
#[must_use]
pub fn build_request(user_query: &str, tools: &[ToolDescriptor]) -> CompletionRequest {
    CompletionRequest {
        system: system_prompt(tools),
        user: user_query.trim().to_string(),
        tools: tools.to_vec(),
    }
}

fn system_prompt(tools: &[ToolDescriptor]) -> String {
    let catalog: String = tools
        .iter()
        .map(|tool| {
            format!(
                "- {}: {}\n  input schema: {}\n",
                tool.name, tool.description, tool.input_schema
            )
        })
        .collect();
    format!("{SYSTEM_INSTRUCTIONS}\n\nAvailable tools:\n{catalog}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_lists_tools_and_keeps_user_text_separate() {
        let tools = vec![ToolDescriptor {
            name: "run_query_tool".to_string(),
            description: "Runs a read-only query.".to_string(),
            input_schema: json!({"type": "object", "required": ["collection"]}),
        }];
        let request = build_request("  list customers in London \n", &tools);
        assert_eq!(request.user, "list customers in London");
        assert!(request.system.contains("- run_query_tool: Runs a read-only query."));
        assert!(request.system.contains("\"required\":[\"collection\"]"));
        assert!(!request.system.contains("London"));
        assert_eq!(request.tools, tools);
        assert!(request.system.contains("\n  input schema: {"));
        assert!(request.system.ends_with("}\n"));
    }
}
