//! # Rivet Core
//!
//! Domain types and traits for the rivet agent loop. Everything the loop
//! controller, the built-in tools and the embedding application share
//! lives here:
//!
//! - [`Message`] and [`Conversation`], the ordered log of role-tagged turns
//! - [`Tool`], [`ToolSchema`] and [`ToolRegistry`], the capability surface
//! - [`Backend`], the generation contract a model runtime implements
//! - [`AgentState`], the observable lifecycle of a turn
//! - [`Error`] and the bounded-context errors behind it
//!
//! Implementations live in their own crates and depend inward on this one.

pub mod agent;
pub mod backend;
pub mod conversation;
pub mod error;
pub mod message;
pub mod registry;
pub mod tool;

pub use agent::AgentState;
pub use backend::{Backend, GenerationConfig, GenerationRequest, Prompt, TokenStream};
pub use conversation::{Conversation, DropOldest, KeepAll, TrimPolicy};
pub use error::{BackendError, Error, ErrorKind, Result, ToolError};
pub use message::{Message, Role};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolArgs, ToolCall, ToolParameter, ToolResult, ToolSchema};
