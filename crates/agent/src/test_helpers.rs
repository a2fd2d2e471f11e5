//! Shared test helpers for loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rivet_core::error::{BackendError, ToolError};
use rivet_core::{Backend, GenerationRequest, TokenStream, Tool, ToolArgs, ToolParameter, ToolResult};
use tokio::sync::mpsc;

/// A backend that replays scripted responses in order and records every
/// request. Running out of script is a generation error.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    streaming: bool,
    resets: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            streaming: false,
            resets: AtomicUsize::new(0),
        }
    }

    /// Stream responses one character per token.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Generation("script exhausted".into()))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<TokenStream, BackendError> {
        let text = self.generate(request).await?;
        let tokens: Vec<String> = if self.streaming {
            text.chars().map(String::from).collect()
        } else {
            vec![text]
        };
        let (tx, rx) = mpsc::channel(tokens.len().max(1));
        for token in tokens {
            tx.try_send(Ok(token)).unwrap();
        }
        Ok(rx)
    }

    fn reset_session(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Echoes `text`; fails when `text` is "fail".
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the text back"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required("text", "string", "Text to echo")]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        match args.require("text")? {
            "fail" => Err(ToolError::ExecutionFailed("asked to fail".into())),
            text => Ok(ToolResult::success(text)),
        }
    }
}

/// A call block for [`EchoTool`].
pub fn echo_call(text: &str) -> String {
    format!("<tool_call>\nname: echo\narguments:\n  text: {text}\n</tool_call>")
}
