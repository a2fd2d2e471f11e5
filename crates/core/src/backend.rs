//! Backend trait: the abstraction over generation runtimes.
//!
//! A backend turns a prompt view (system text plus message history),
//! optional images and a sampling configuration into text, either at once
//! or as a stream of tokens. Local inference engines and remote endpoints
//! both implement it; the agent loop never knows which one it drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::message::{Message, Role};

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub do_sample: bool,
    /// Generation halts when any of these is produced.
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 2048,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            do_sample: true,
            stop_sequences: vec![
                crate::tool::TOOL_CALL_CLOSE.to_string(),
                "\nUser:".to_string(),
                "\nHuman:".to_string(),
            ],
        }
    }
}

/// The prompt view handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// System prompt followed by the rendered capability prompt
    pub system: String,
    /// Full message history, oldest first
    pub messages: Vec<Message>,
}

impl Prompt {
    /// Flatten into ChatML for backends that take raw text.
    ///
    /// Each image attached to a user turn becomes one vision placeholder.
    /// The result ends with an open assistant turn.
    pub fn to_chatml(&self) -> String {
        let mut out = String::new();
        if !self.system.is_empty() {
            out.push_str("<|im_start|>system\n");
            out.push_str(&self.system);
            out.push_str("<|im_end|>\n");
        }
        for message in &self.messages {
            out.push_str("<|im_start|>");
            out.push_str(message.role.as_str());
            out.push('\n');
            if message.role == Role::User {
                for _ in &message.images {
                    out.push_str("<|vision_start|><|image_pad|><|vision_end|>");
                }
            }
            out.push_str(&message.content);
            out.push_str("<|im_end|>\n");
        }
        out.push_str("<|im_start|>assistant\n");
        out
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    /// Images submitted with the current turn
    pub images: Vec<String>,
    pub config: GenerationConfig,
}

/// Tokens delivered in order; the sender closes the channel when done.
pub type TokenStream = mpsc::Receiver<Result<String, BackendError>>;

/// The core Backend trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name (e.g. "llama-cpp", "openai-compatible").
    fn name(&self) -> &str;

    /// Generate a complete response.
    async fn generate(&self, request: GenerationRequest) -> Result<String, BackendError>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generate a response as a stream of tokens.
    ///
    /// Default implementation calls `generate()` and delivers the result as
    /// a single token.
    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<TokenStream, BackendError> {
        let text = self.generate(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(text)).await;
        Ok(rx)
    }

    /// Drop any incremental decoding cache kept between calls.
    fn reset_session(&self) {}
}
