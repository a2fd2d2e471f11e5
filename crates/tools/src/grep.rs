//! Content search: regex over file lines.

use std::path::Path;

use async_trait::async_trait;
use regex_lite::{Regex, RegexBuilder};
use rivet_config::GrepConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;
use walkdir::WalkDir;

use crate::glob::compile_glob;
use crate::{checked_path, display_path, is_hidden, relative_path};

/// Files above this size are not searched.
const MAX_SEARCH_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Matched lines are cut to this many characters.
const MAX_LINE_CHARS: usize = 200;

pub struct GrepTool {
    max_results: usize,
    policy: PathPolicy,
}

impl GrepTool {
    pub fn new(config: &GrepConfig) -> Self {
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

impl Default for GrepTool {
    fn default() -> Self {
        Self::new(&GrepConfig::default())
    }
}

struct Search {
    re: Regex,
    filter: Option<Regex>,
    cap: usize,
    matches: Vec<String>,
    limited: bool,
}

impl Search {
    /// Scan one file; returns false once the cap is hit.
    fn scan_file(&mut self, path: &Path, shown: &str) -> bool {
        let fits = std::fs::metadata(path).is_ok_and(|m| m.len() <= MAX_SEARCH_FILE_SIZE);
        if !fits {
            return true;
        }
        let Ok(bytes) = std::fs::read(path) else {
            return true;
        };
        let Ok(text) = String::from_utf8(bytes) else {
            return true;
        };
        for (idx, line) in text.lines().enumerate() {
            if !self.re.is_match(line) {
                continue;
            }
            if self.matches.len() >= self.cap {
                self.limited = true;
                return false;
            }
            self.matches
                .push(format!("{shown}:{}:{}", idx + 1, clip(line.trim_end())));
        }
        true
    }

    fn scan_dir(&mut self, root: &Path, root_arg: &str) {
        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file());
        for entry in files {
            let rel = relative_path(root, &entry);
            if let Some(filter) = &self.filter
                && !filter.is_match(&rel)
            {
                continue;
            }
            if !self.scan_file(entry.path(), &display_path(root_arg, &rel)) {
                break;
            }
        }
    }
}

fn clip(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a case-insensitive regular expression. Reports path:line:text."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("pattern", "string", "Regular expression to search for"),
            ToolParameter::optional("path", "string", "File or directory to search")
                .with_default("."),
            ToolParameter::optional("glob", "string", "Only search files matching this glob"),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let pattern = args.require("pattern")?.to_string();
        let raw = args.get_or("path", ".").to_string();
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid regex: {e}")))?;
        let filter = args.get("glob").map(compile_glob).transpose()?;

        let root = checked_path(&self.policy, &raw)?;
        if !root.exists() {
            return Err(ToolError::PathNotFound(raw));
        }

        let mut search = Search {
            re,
            filter,
            cap: self.max_results,
            matches: Vec::new(),
            limited: false,
        };
        let root_arg = raw.clone();
        let search = tokio::task::spawn_blocking(move || {
            if root.is_file() {
                search.scan_file(&root, &root_arg);
            } else {
                search.scan_dir(&root, &root_arg);
            }
            search
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("grep task failed: {e}")))?;

        if search.matches.is_empty() {
            return Ok(ToolResult::success(format!(
                "No matches found for '{pattern}'"
            )));
        }
        let mut out = search.matches.join("\n");
        out.push_str(&format!("\n\nMatches: {}", search.matches.len()));
        if search.limited {
            out.push_str(&format!(" (limited to {})", search.cap));
        }
        Ok(ToolResult::success(out))
    }
}
