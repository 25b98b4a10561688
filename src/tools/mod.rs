mod ssh_tools;

pub use ssh_tools::*;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TEST_CONNECTION_TOOL: &str = "ssh_test_connection";
pub const RUN_TOOL: &str = "ssh_run";

pub fn get_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": TEST_CONNECTION_TOOL,
            "title": "Test SSH Connection",
            "description": "Attempts to connect to the configured SSH host and returns the remote hostname",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        json!({
            "name": RUN_TOOL,
            "title": "Run Remote Command",
            "description": "Runs a non-interactive command remotely over SSH and returns stdout, stderr, and exit code",
            "inputSchema": {
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Command to run remotely"
                    }
                }
            }
        }),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// Result payload of `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content item.
    pub fn first_text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}
