//! Directory listing tool.

use std::path::PathBuf;

use async_trait::async_trait;
use regex_lite::Regex;
use rivet_config::ListDirectoryConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;
use walkdir::WalkDir;

use crate::glob::compile_glob;
use crate::{checked_path, is_hidden, relative_path};

pub struct ListDirectoryTool {
    limits: Limits,
    policy: PathPolicy,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    show_hidden: bool,
    max_depth: usize,
    max_results: usize,
}

impl ListDirectoryTool {
    pub fn new(config: &ListDirectoryConfig) -> Self {
        Self {
            limits: Limits {
                show_hidden: config.show_hidden,
                max_depth: config.max_depth.max(1),
                max_results: config.max_results,
            },
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn walk(limits: Limits, root: PathBuf, recursive: bool, pattern: Option<Regex>) -> String {
    let depth = if recursive { limits.max_depth } else { 1 };
    let show_hidden = limits.show_hidden;

    let mut lines = Vec::new();
    let mut limited = false;
    let entries = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| show_hidden || !is_hidden(e))
        .filter_map(Result::ok);
    for entry in entries {
        let rel = relative_path(&root, &entry);
        if let Some(re) = &pattern
            && !re.is_match(&rel)
        {
            continue;
        }
        if lines.len() >= limits.max_results {
            limited = true;
            break;
        }
        let tag = if entry.file_type().is_dir() { "[DIR]" } else { "[FILE]" };
        lines.push(format!("{tag} {rel}"));
    }

    if lines.is_empty() {
        return "(no entries)".into();
    }
    let mut out = lines.join("\n");
    out.push_str(&format!("\n\nTotal: {} items", lines.len()));
    if limited {
        out.push_str(&format!(" (limited to {})", limits.max_results));
    }
    out
}

impl Default for ListDirectoryTool {
    fn default() -> Self {
        Self::new(&ListDirectoryConfig::default())
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories, optionally recursively and filtered by a glob pattern."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::optional("path", "string", "Directory to list").with_default("."),
            ToolParameter::optional("recursive", "boolean", "Descend into subdirectories")
                .with_default("false"),
            ToolParameter::optional("pattern", "string", "Glob filter such as *.rs"),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let raw = args.get_or("path", ".");
        let recursive = args.flag("recursive", false)?;
        let pattern = args.get("pattern").map(compile_glob).transpose()?;

        let root = checked_path(&self.policy, raw)?;
        if !root.exists() {
            return Err(ToolError::PathNotFound(raw.to_string()));
        }
        if !root.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{raw} is not a directory")));
        }

        let limits = self.limits;
        let listing = tokio::task::spawn_blocking(move || walk(limits, root, recursive, pattern))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("listing task failed: {e}")))?;
        Ok(ToolResult::success(listing))
    }
}
