//! Built-in capabilities for rivet.
//!
//! Tools give the agent the ability to act on the host: read, write and
//! edit files, list and search the filesystem, run shell commands through
//! the [`process::ProcessExecutor`], capture the screen, fetch URLs and ask
//! the user a question.

pub mod ask_user;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod glob;
pub mod grep;
pub mod list_dir;
pub mod process;
pub mod screenshot;
pub mod search_files;
pub mod shell;
pub mod web_fetch;
pub mod web_search;

use std::path::{Path, PathBuf};

use rivet_config::AppConfig;
use rivet_core::ToolRegistry;
use rivet_core::error::ToolError;
use rivet_security::PathPolicy;

pub use ask_user::{AskUserTool, ChannelPrompt, UserPrompt, UserQuestion};
pub use process::ProcessExecutor;

/// Create a registry with every built-in tool using default limits.
pub fn default_registry() -> ToolRegistry {
    registry_from_config(&AppConfig::default())
}

/// Create a registry with every built-in tool configured from `config`.
///
/// `ask_user` is registered without a callback; install one by registering
/// [`AskUserTool::with_prompt`] over it.
pub fn registry_from_config(config: &AppConfig) -> ToolRegistry {
    let policy = PathPolicy::from(&config.security);
    let tools = &config.tools;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(
        file_read::FileReadTool::new(&tools.read_file).with_policy(policy.clone()),
    ));
    registry.register(Box::new(
        file_write::FileWriteTool::new(&tools.write_file).with_policy(policy.clone()),
    ));
    registry.register(Box::new(
        file_edit::FileEditTool::new().with_policy(policy.clone()),
    ));
    registry.register(Box::new(
        list_dir::ListDirectoryTool::new(&tools.list_directory).with_policy(policy.clone()),
    ));
    registry.register(Box::new(
        search_files::SearchFilesTool::new(&tools.search_files).with_policy(policy.clone()),
    ));
    registry.register(Box::new(
        grep::GrepTool::new(&tools.grep).with_policy(policy),
    ));
    registry.register(Box::new(shell::ShellTool::new(&tools.shell)));
    registry.register(Box::new(screenshot::ScreenshotTool::new(&tools.screenshot)));
    registry.register(Box::new(web_fetch::WebFetchTool::new(&tools.web_fetch)));
    registry.register(Box::new(web_search::WebSearchTool));
    registry.register(Box::new(AskUserTool::new()));
    registry
}

/// Validate a path argument against the policy and resolve it.
pub(crate) fn checked_path(policy: &PathPolicy, raw: &str) -> Result<PathBuf, ToolError> {
    if raw.trim().is_empty() {
        return Err(ToolError::InvalidArguments("path must not be empty".into()));
    }
    policy
        .check(Path::new(raw))
        .map_err(|e| ToolError::PermissionDenied(e.to_string()))
}

/// Map an I/O error on `raw` to NotFound when the path is missing.
pub(crate) fn io_error(raw: &str, err: std::io::Error) -> ToolError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ToolError::PathNotFound(raw.to_string())
    } else {
        ToolError::ExecutionFailed(format!("{raw}: {err}"))
    }
}

/// Dot-prefixed entries below the walk root.
pub(crate) fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Path of `entry` relative to `root`, '/'-separated.
pub(crate) fn relative_path(root: &Path, entry: &walkdir::DirEntry) -> String {
    entry
        .path()
        .strip_prefix(root)
        .unwrap_or(entry.path())
        .to_string_lossy()
        .replace('\\', "/")
}

/// Display `rel` the way the model referred to its search root.
pub(crate) fn display_path(root_arg: &str, rel: &str) -> String {
    match root_arg.trim_end_matches('/') {
        "" | "." => rel.to_string(),
        root => format!("{root}/{rel}"),
    }
}
