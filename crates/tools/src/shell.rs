//! Shell tool: run a command through the platform shell.
//!
//! Policy and capture live in [`ProcessExecutor`]; this tool adds argument
//! handling and working-directory scoping.

use std::path::PathBuf;

use async_trait::async_trait;
use rivet_config::ShellConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;
use tracing::debug;

use crate::process::{ProcessExecutor, shell_program};

pub struct ShellTool {
    executor: ProcessExecutor,
    default_timeout_ms: u64,
    root: Option<PathBuf>,
}

impl ShellTool {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            executor: ProcessExecutor::from(config),
            default_timeout_ms: config.timeout_ms,
            root: config.working_directory.clone(),
        }
    }

    /// Pick the directory a call runs in.
    ///
    /// With a configured root, relative and absolute requests alike must
    /// land inside it.
    fn working_dir(&self, requested: Option<&str>) -> Result<Option<PathBuf>, ToolError> {
        let requested = requested.map(str::trim).filter(|d| !d.is_empty());
        match (&self.root, requested) {
            (None, None) => Ok(None),
            (None, Some(dir)) => Ok(Some(PathBuf::from(dir))),
            (Some(root), None) => Ok(Some(root.clone())),
            (Some(root), Some(dir)) => PathPolicy::scoped_to(root)
                .check(&root.join(dir))
                .map(Some)
                .map_err(|e| ToolError::PermissionDenied(e.to_string())),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its combined stdout/stderr. Use this for running programs, builds, tests and git."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("command", "string", "The shell command to execute"),
            ToolParameter::optional("working_dir", "string", "Directory to run the command in"),
            ToolParameter::optional("timeout", "integer", "Timeout in milliseconds")
                .with_default(self.default_timeout_ms.to_string()),
        ]
    }

    fn is_available(&self) -> bool {
        which::which(shell_program()).is_ok()
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let command = args.require("command")?;
        let timeout_ms: u64 = args.parse_or("timeout", self.default_timeout_ms)?;
        if timeout_ms == 0 {
            return Err(ToolError::InvalidArguments(
                "timeout must be greater than zero".into(),
            ));
        }
        let dir = self.working_dir(args.get("working_dir"))?;
        if let Some(dir) = &dir
            && !dir.is_dir()
        {
            return Err(ToolError::PathNotFound(dir.display().to_string()));
        }

        debug!(command = %command, dir = ?dir, "Executing shell command");
        Ok(self
            .executor
            .run(command, dir.as_deref(), timeout_ms)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::ErrorKind;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs.iter().copied().collect()
    }

    #[test]
    fn tool_definition() {
        let tool = ShellTool::new(&ShellConfig::default());
        assert_eq!(tool.name(), "shell");
        let params = tool.parameters();
        assert!(params[0].required);
        assert_eq!(params[2].default.as_deref(), Some("60000"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_simple_command() {
        let tool = ShellTool::new(&ShellConfig::default());
        let result = tool.execute(&args(&[("command", "echo hello")])).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.trim(), "hello");
    }

    #[tokio::test]
    async fn blocked_command_is_security_failure() {
        let tool = ShellTool::new(&ShellConfig::default());
        let result = tool
            .execute(&args(&[("command", "sudo rm -rf /")]))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Security));
    }

    #[tokio::test]
    async fn rejects_bad_timeout() {
        let tool = ShellTool::new(&ShellConfig::default());
        let err = tool
            .execute(&args(&[("command", "true"), ("timeout", "soon")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn defaults_to_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let tool = ShellTool::new(&ShellConfig {
            working_directory: Some(dir.path().to_path_buf()),
            ..ShellConfig::default()
        });
        let result = tool.execute(&args(&[("command", "ls")])).await.unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn working_dir_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(&ShellConfig {
            working_directory: Some(dir.path().to_path_buf()),
            ..ShellConfig::default()
        });
        let err = tool
            .execute(&args(&[("command", "ls"), ("working_dir", "../..")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
