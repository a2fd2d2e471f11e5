//! Security policies for rivet tools.
//!
//! Provides:
//! - **Path scoping**: keep file tools inside allowed roots and away from
//!   forbidden prefixes
//! - **Command blocklist**: refuse shell commands containing a blocked
//!   substring before anything is spawned
//!
//! Nothing here sandboxes a process once it runs.

pub mod command;
pub mod path;

pub use command::{CommandPolicy, CommandPolicyError};
pub use path::{PathPolicy, PathValidationError, lexical_normalize, resolve};
