//! Edit tool: exact-string replacement inside a file.
//!
//! The whole file is read, modified in memory and written back. Nothing is
//! written unless the old text was found.

use async_trait::async_trait;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;

use crate::{checked_path, io_error};

#[derive(Default)]
pub struct FileEditTool {
    policy: PathPolicy,
}

impl FileEditTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. Fails if old_string does not occur verbatim."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", "string", "The file to edit"),
            ToolParameter::required("old_string", "string", "Exact text to replace"),
            ToolParameter::required("new_string", "string", "Replacement text"),
            ToolParameter::optional("replace_all", "boolean", "Replace every occurrence")
                .with_default("false"),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let raw = args.require("path")?;
        let old = args.require("old_string")?;
        let new = args.require("new_string")?;
        let replace_all = args.flag("replace_all", false)?;
        if old.is_empty() {
            return Err(ToolError::InvalidArguments(
                "old_string must not be empty".into(),
            ));
        }

        let path = checked_path(&self.policy, raw)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(raw, e))?;

        let occurrences = content.matches(old).count();
        if occurrences == 0 {
            return Err(ToolError::InvalidArguments(
                "old_string not found in file".into(),
            ));
        }

        let (updated, replaced) = if replace_all {
            (content.replace(old, new), occurrences)
        } else {
            (content.replacen(old, new, 1), 1)
        };
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| io_error(raw, e))?;

        Ok(ToolResult::success(format!(
            "Replaced {replaced} occurrence(s) in {raw}"
        )))
    }
}
