//! The capability registry.
//!
//! The agent loop uses it to:
//! 1. Render the capability prompt (available tools plus the call grammar)
//! 2. Look up and execute tools when the model requests them
//!
//! `execute` never fails past its boundary: unknown names, unavailable
//! tools, missing arguments, tool errors and panics all come back as a
//! failed [`ToolResult`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::tool::{TOOL_CALL_CLOSE, TOOL_CALL_OPEN, Tool, ToolCall, ToolResult, ToolSchema};

/// A registry of tools, keyed and ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced registered tool");
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Tools whose `is_available()` is true on this host.
    pub fn list_available(&self) -> Vec<&dyn Tool> {
        self.tools
            .values()
            .filter(|t| t.is_available())
            .map(|t| t.as_ref())
            .collect()
    }

    /// Schemas of the available tools.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.list_available().iter().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Describe the available tools and the literal call grammar.
    pub fn render_prompt(&self) -> String {
        let mut out = String::from("## Available Tools\n\n");
        out.push_str("You can use these tools by outputting a tool call in this format:\n\n");
        let _ = write!(
            out,
            "```\n{TOOL_CALL_OPEN}\nname: tool_name\narguments:\n  param1: value1\n  param2: value2\n{TOOL_CALL_CLOSE}\n```\n\n"
        );
        out.push_str(
            "For a multi-line value, write `|` after the colon and indent the lines below it:\n\n",
        );
        out.push_str("```\n  content: |\n    first line\n    second line\n```\n\n");
        out.push_str(
            "You may make several tool calls in one response; they run in the order written. \
             Results come back in the next message. Answer without a tool call when you are done.\n",
        );

        for schema in self.schemas() {
            let _ = write!(out, "\n### {}\n{}\n", schema.name, schema.description);
            if schema.parameters.is_empty() {
                continue;
            }
            out.push_str("\n**Parameters:**\n");
            for p in &schema.parameters {
                let need = if p.required { "required" } else { "optional" };
                let _ = write!(out, "- `{}` ({}, {}): {}", p.name, p.type_tag, need, p.description);
                if let Some(default) = &p.default {
                    let _ = write!(out, " (default: {default})");
                }
                out.push('\n');
            }
        }
        out
    }

    /// Execute a tool call. Every fault is reported as a failed result.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let result = match self.dispatch(call).await {
            Ok(result) => result,
            Err(e) => {
                debug!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                ToolResult::failure(&e)
            }
        };
        result.with_call_id(&call.id)
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        if !tool.is_available() {
            return Err(ToolError::Unavailable(call.name.clone()));
        }

        if let Some(missing) = tool
            .parameters()
            .into_iter()
            .find(|p| p.required && !call.arguments.contains(&p.name))
        {
            return Err(ToolError::MissingParameter(missing.name));
        }

        match AssertUnwindSafe(tool.execute(&call.arguments))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %call.name, reason = %reason, "Tool panicked");
                Err(ToolError::ExecutionFailed(reason))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
