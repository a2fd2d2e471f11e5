//! File write tool: create or overwrite a file.

use std::path::PathBuf;

use async_trait::async_trait;
use rivet_config::WriteFileConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;
use tracing::debug;

use crate::{checked_path, io_error};

pub struct FileWriteTool {
    create_directories: bool,
    backup_existing: bool,
    policy: PathPolicy,
}

impl FileWriteTool {
    pub fn new(config: &WriteFileConfig) -> Self {
        Self {
            create_directories: config.create_directories,
            backup_existing: config.backup_existing,
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new(&WriteFileConfig::default())
    }
}

fn backup_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", "string", "The file path to write"),
            ToolParameter::required("content", "string", "The full content to write"),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let raw = args.require("path")?;
        let content = args.require("content")?;
        let path = checked_path(&self.policy, raw)?;

        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            return Err(ToolError::InvalidArguments(format!("{raw} is a directory")));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            if !self.create_directories {
                return Err(ToolError::PathNotFound(parent.display().to_string()));
            }
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(raw, e))?;
        }

        if self.backup_existing && path.is_file() {
            let backup = backup_path(&path);
            tokio::fs::copy(&path, &backup)
                .await
                .map_err(|e| io_error(raw, e))?;
            debug!(backup = %backup.display(), "Backed up existing file");
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(raw, e))?;
        Ok(ToolResult::success(format!(
            "Wrote {} bytes to {raw}",
            content.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a/b/out.txt");
        let path = file.to_str().unwrap();

        let result = FileWriteTool::default()
            .execute(&args(&[("path", path), ("content", "hello")]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, format!("Wrote 5 bytes to {path}"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
    }

    #[tokio::test]
    async fn missing_parent_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nope/out.txt");
        let tool = FileWriteTool::new(&WriteFileConfig {
            create_directories: false,
            backup_existing: false,
        });
        let err = tool
            .execute(&args(&[("path", file.to_str().unwrap()), ("content", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn overwrite_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "old").unwrap();

        let tool = FileWriteTool::new(&WriteFileConfig {
            create_directories: true,
            backup_existing: true,
        });
        tool.execute(&args(&[("path", file.to_str().unwrap()), ("content", "new")]))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt.bak")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn overwrite_without_backup_leaves_no_bak() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "old").unwrap();

        FileWriteTool::default()
            .execute(&args(&[("path", file.to_str().unwrap()), ("content", "")]))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "");
        assert!(!dir.path().join("notes.txt.bak").exists());
    }

    #[tokio::test]
    async fn scoped_policy_rejects_outside_path() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let tool = FileWriteTool::default().with_policy(PathPolicy::scoped_to(root.path()));
        let target = other.path().join("x.txt");
        let err = tool
            .execute(&args(&[("path", target.to_str().unwrap()), ("content", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
        assert!(!target.exists());
    }
}
