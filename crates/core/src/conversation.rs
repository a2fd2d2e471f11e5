//! Conversation state: an append-only log of turns with a trim hook.
//!
//! Token counts are estimated with a character heuristic (~4 characters
//! per token, rounded up) plus a fixed per-message overhead for role
//! markers and delimiters.

use std::fmt;
use std::sync::Arc;

use crate::message::{Message, Role};

/// Per-message overhead for role names and delimiters.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Decides which messages to drop once the history grows too large.
///
/// Called after every append. Implementations may only remove messages;
/// they must not reorder or rewrite what remains.
pub trait TrimPolicy: Send + Sync + fmt::Debug {
    fn trim(&self, messages: &mut Vec<Message>);
}

/// Never trims.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl TrimPolicy for KeepAll {
    fn trim(&self, _messages: &mut Vec<Message>) {}
}

/// Drops the oldest non-system messages while over a token budget.
#[derive(Debug, Clone, Copy)]
pub struct DropOldest {
    pub max_tokens: usize,
    /// Never trim below this many messages.
    pub min_messages: usize,
}

impl DropOldest {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            min_messages: 2,
        }
    }
}

impl TrimPolicy for DropOldest {
    fn trim(&self, messages: &mut Vec<Message>) {
        let mut total = estimate_messages_tokens(messages);
        while total > self.max_tokens && messages.len() > self.min_messages {
            let Some(index) = messages.iter().position(|m| m.role != Role::System) else {
                break;
            };
            // the newest message always survives
            if index + 1 == messages.len() {
                break;
            }
            total -= estimate_message_tokens(&messages[index]);
            let dropped = messages.remove(index);
            tracing::debug!(
                role = %dropped.role,
                remaining_tokens = total,
                "Trimmed message from conversation"
            );
        }
    }
}

/// An ordered sequence of role-tagged messages.
#[derive(Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    policy: Arc<dyn TrimPolicy>,
}

impl Conversation {
    /// Create an empty conversation that never trims.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(KeepAll))
    }

    pub fn with_policy(policy: Arc<dyn TrimPolicy>) -> Self {
        Self {
            messages: Vec::new(),
            policy,
        }
    }

    /// Append a message, then let the trim policy run.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.policy.trim(&mut self.messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_messages_tokens(&self.messages)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.messages.len())
            .field("policy", &self.policy)
            .finish()
    }
}
