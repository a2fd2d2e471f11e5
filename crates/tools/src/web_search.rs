//! Web search placeholder.
//!
//! No search provider is wired in, so the tool reports itself unavailable:
//! it is left out of the rendered prompt and dispatch fails cleanly.

use async_trait::async_trait;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, URLs and snippets."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required("query", "string", "The search query")]
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, ToolError> {
        Err(ToolError::Unavailable(
            "web_search has no search provider configured".into(),
        ))
    }
}
