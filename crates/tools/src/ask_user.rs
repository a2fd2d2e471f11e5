//! Ask the human a question and wait for the answer.
//!
//! The tool holds no UI of its own. The embedding application installs a
//! [`UserPrompt`]: either its own implementation or a [`ChannelPrompt`],
//! whose questions arrive on a channel the application drains.

use std::sync::Arc;

use async_trait::async_trait;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use tokio::sync::{mpsc, oneshot};

/// Source of answers to questions the agent asks.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask `question`; `options` is empty for a free-form answer.
    /// May wait indefinitely.
    async fn ask(&self, question: &str, options: &[String]) -> Result<String, ToolError>;
}

/// A question awaiting an answer on `reply`.
#[derive(Debug)]
pub struct UserQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub reply: oneshot::Sender<String>,
}

/// [`UserPrompt`] that forwards questions over a channel.
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    tx: mpsc::Sender<UserQuestion>,
}

impl ChannelPrompt {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UserQuestion>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl UserPrompt for ChannelPrompt {
    async fn ask(&self, question: &str, options: &[String]) -> Result<String, ToolError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(UserQuestion {
                question: question.to_string(),
                options: options.to_vec(),
                reply,
            })
            .await
            .map_err(|_| ToolError::ExecutionFailed("user prompt receiver closed".into()))?;
        answer
            .await
            .map_err(|_| ToolError::ExecutionFailed("question dropped without an answer".into()))
    }
}

#[derive(Default)]
pub struct AskUserTool {
    prompt: Option<Arc<dyn UserPrompt>>,
}

impl AskUserTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(prompt: Arc<dyn UserPrompt>) -> Self {
        Self {
            prompt: Some(prompt),
        }
    }
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn description(&self) -> &str {
        "Ask the user a question when you need clarification or a decision. Blocks until they answer."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("question", "string", "The question to ask"),
            ToolParameter::optional("options", "string", "Comma-separated choices"),
        ]
    }

    fn interacts_with_user(&self) -> bool {
        true
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let prompt = self
            .prompt
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("no user input callback installed".into()))?;
        let question = args.require("question")?;
        let options: Vec<String> = args
            .get("options")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let answer = prompt.ask(question, &options).await?;
        Ok(ToolResult::success(format!("User answered: {answer}")))
    }
}
