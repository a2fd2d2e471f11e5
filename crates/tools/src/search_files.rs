//! Find files by glob pattern.

use std::path::Path;

use async_trait::async_trait;
use regex_lite::Regex;
use rivet_config::SearchFilesConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;
use walkdir::WalkDir;

use crate::glob::compile_glob;
use crate::{checked_path, display_path, is_hidden, relative_path};

pub struct SearchFilesTool {
    max_results: usize,
    policy: PathPolicy,
}

impl SearchFilesTool {
    pub fn new(config: &SearchFilesConfig) -> Self {
        Self {
            max_results: config.max_results,
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for SearchFilesTool {
    fn default() -> Self {
        Self::new(&SearchFilesConfig::default())
    }
}

/// Matching files under `root`, in walk order, at most `cap` of them.
/// The flag reports whether more existed.
fn find(root: &Path, re: &Regex, cap: usize) -> (Vec<String>, bool) {
    let mut found = Vec::new();
    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());
    for entry in files {
        let rel = relative_path(root, &entry);
        if !re.is_match(&rel) {
            continue;
        }
        if found.len() >= cap {
            return (found, true);
        }
        found.push(rel);
    }
    (found, false)
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Recursively find files whose path matches a glob pattern (e.g. **/*.rs)."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("pattern", "string", "Glob pattern to match"),
            ToolParameter::optional("path", "string", "Directory to search").with_default("."),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let pattern = args.require("pattern")?.trim().to_string();
        let raw = args.get_or("path", ".").to_string();
        let re = compile_glob(&pattern)?;

        let root = checked_path(&self.policy, &raw)?;
        if !root.is_dir() {
            return Err(ToolError::PathNotFound(raw));
        }

        let cap = self.max_results;
        let (found, limited) = tokio::task::spawn_blocking(move || find(&root, &re, cap))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {e}")))?;

        if found.is_empty() {
            return Ok(ToolResult::success(format!(
                "No files found matching '{pattern}'"
            )));
        }
        let mut out = found
            .iter()
            .map(|rel| display_path(&raw, rel))
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&format!("\n\nFound: {} files", found.len()));
        if limited {
            out.push_str(&format!(" (limited to {cap})"));
        }
        Ok(ToolResult::success(out))
    }
}
