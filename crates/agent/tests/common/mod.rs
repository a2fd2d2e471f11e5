use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rivet_agent::StopHandle;
use rivet_core::error::ToolError;
use rivet_core::{Backend, BackendError, GenerationRequest, Tool, ToolArgs, ToolParameter, ToolResult};

#[allow(dead_code)]
#[path = "../../src/test_helpers.rs"]
mod helpers;

pub use helpers::ScriptedBackend;

/// Never finishes a generation.
pub struct StalledBackend;

#[async_trait]
impl Backend for StalledBackend {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<String, BackendError> {
        std::future::pending().await
    }
}

/// Triggers the stop handle as its side effect and counts its runs.
pub struct HaltTool {
    handle: StopHandle,
    runs: Arc<AtomicUsize>,
}

impl HaltTool {
    pub fn new(handle: StopHandle, runs: Arc<AtomicUsize>) -> Self {
        Self { handle, runs }
    }
}

#[async_trait]
impl Tool for HaltTool {
    fn name(&self) -> &str {
        "halt"
    }

    fn description(&self) -> &str {
        "Stop the running turn"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        Vec::new()
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, ToolError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.handle.stop();
        Ok(ToolResult::success("halted"))
    }
}

/// Render one call block.
pub fn call(name: &str, args: &[(&str, &str)]) -> String {
    let mut block = format!("<tool_call>\nname: {name}\narguments:\n");
    for (key, value) in args {
        if value.contains('\n') {
            block.push_str(&format!("  {key}: |\n"));
            for line in value.lines() {
                block.push_str(&format!("    {line}\n"));
            }
        } else {
            block.push_str(&format!("  {key}: {value}\n"));
        }
    }
    block.push_str("</tool_call>");
    block
}
