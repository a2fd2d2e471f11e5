//! File read tool: line-numbered file contents with path validation.

use async_trait::async_trait;
use rivet_config::ReadFileConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use rivet_security::PathPolicy;

use crate::{checked_path, io_error};

const DEFAULT_LIMIT: usize = 2000;

pub struct FileReadTool {
    max_file_size: u64,
    policy: PathPolicy,
}

impl FileReadTool {
    pub fn new(config: &ReadFileConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new(&ReadFileConfig::default())
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Returns numbered lines; use offset and limit to page through large files."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", "string", "The file path to read"),
            ToolParameter::optional("offset", "integer", "Line number to start from (1-based)")
                .with_default("1"),
            ToolParameter::optional("limit", "integer", "Maximum number of lines to return")
                .with_default(DEFAULT_LIMIT.to_string()),
        ]
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let raw = args.require("path")?;
        let offset: usize = args.parse_or("offset", 1)?;
        let limit: usize = args.parse_or("limit", DEFAULT_LIMIT)?;
        if offset == 0 {
            return Err(ToolError::InvalidArguments(
                "offset is 1-based and must be at least 1".into(),
            ));
        }

        let path = checked_path(&self.policy, raw)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(raw, e))?;
        if meta.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "{raw} is a directory; use list_directory"
            )));
        }
        if meta.len() > self.max_file_size {
            return Err(ToolError::ResourceLimit {
                what: "File".into(),
                size: meta.len(),
                limit: self.max_file_size,
            });
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(raw, e))?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(ToolResult::success(number_lines(&content, offset, limit)))
    }
}

/// Render `limit` lines starting at 1-based `offset`, cat -n style.
fn number_lines(content: &str, offset: usize, limit: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return "(empty file)".into();
    }
    if offset > lines.len() {
        return format!("(offset {offset} is past end of file, {} lines)", lines.len());
    }

    let start = offset - 1;
    let end = start.saturating_add(limit).min(lines.len());
    let mut out = lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{}", start + i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");
    let remaining = lines.len() - end;
    if remaining > 0 {
        out.push_str(&format!("\n... ({remaining} more lines)"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs.iter().copied().collect()
    }

    #[test]
    fn tool_definition() {
        let tool = FileReadTool::default();
        assert_eq!(tool.name(), "read_file");
        let params = tool.parameters();
        assert_eq!(params.len(), 3);
        assert!(params[0].required);
        assert!(!params[1].required);
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "Hello, world!\nsecond\n").unwrap();

        let result = FileReadTool::default()
            .execute(&args(&[("path", file.to_str().unwrap())]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "     1\tHello, world!\n     2\tsecond");
    }

    #[tokio::test]
    async fn offset_and_limit_page_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lines.txt");
        let body: String = (1..=10).map(|i| format!("line{i}\n")).collect();
        std::fs::write(&file, body).unwrap();

        let result = FileReadTool::default()
            .execute(&args(&[
                ("path", file.to_str().unwrap()),
                ("offset", "4"),
                ("limit", "2"),
            ]))
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "     4\tline4\n     5\tline5\n... (5 more lines)"
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = FileReadTool::default()
            .execute(&args(&[("path", "/nonexistent/file/abc.txt")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn oversized_file_is_resource_limit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "x".repeat(64)).unwrap();

        let tool = FileReadTool::new(&ReadFileConfig { max_file_size: 16 });
        let err = tool
            .execute(&args(&[("path", file.to_str().unwrap())]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ResourceLimit { size: 64, limit: 16, .. }));
    }

    #[tokio::test]
    async fn zero_offset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();
        let err = FileReadTool::default()
            .execute(&args(&[("path", file.to_str().unwrap()), ("offset", "0")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn policy_denies_forbidden_path() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret");
        std::fs::create_dir(&secret).unwrap();
        std::fs::write(secret.join("key"), "hunter2").unwrap();

        let policy = PathPolicy::new(&[], &[secret.display().to_string()]);
        let tool = FileReadTool::default().with_policy(policy);
        let err = tool
            .execute(&args(&[("path", secret.join("key").to_str().unwrap())]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
