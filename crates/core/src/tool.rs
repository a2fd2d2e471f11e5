//! Tool trait: the abstraction over agent capabilities.
//!
//! A capability declares a [`ToolSchema`] once and executes against
//! string-typed arguments parsed out of model text.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ToolError};

/// Opening marker of a tool-call block in model text.
pub const TOOL_CALL_OPEN: &str = "<tool_call>";

/// Closing marker of a tool-call block in model text.
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,

    /// Type tag shown to the model ("string", "integer", "boolean", ...)
    #[serde(rename = "type")]
    pub type_tag: String,

    pub description: String,

    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ToolParameter {
    pub fn required(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, type_tag, description)
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Name, description and ordered parameters of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

/// String-typed tool arguments, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArgs(BTreeMap<String, String>);

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get a required argument.
    pub fn require(&self, key: &str) -> Result<&str, ToolError> {
        self.get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse an optional argument, falling back to `default` when absent.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ToolError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                ToolError::InvalidArguments(format!("invalid value for '{key}': {raw}"))
            }),
        }
    }

    /// Parse an optional boolean flag.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ToolError> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ToolError::InvalidArguments(format!(
                    "invalid boolean for '{key}': {v}"
                ))),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A request to execute a tool, extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Locally unique call ID (`call_<n>`)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    pub arguments: ToolArgs,
}

/// The result of a tool execution.
///
/// `success` is false exactly when `error` is present. `output` may be
/// non-empty on failure (partial output captured before a timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    pub success: bool,

    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self::failure_with_output(error, String::new())
    }

    /// A failed result that still carries output (partial capture, error body).
    pub fn failure_with_output(error: &ToolError, output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }
}

/// The core Tool trait.
///
/// Each built-in capability (file access, search, process execution,
/// network fetch, user prompt) implements this trait and is registered in
/// the [`ToolRegistry`](crate::ToolRegistry).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "read_file").
    fn name(&self) -> &str;

    /// What this tool does, as shown to the model.
    fn description(&self) -> &str;

    /// Declared parameters, in display order.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Whether the tool can run on this host. Checked when listing and
    /// again at dispatch.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether executing this tool blocks on a human answer.
    fn interacts_with_user(&self) -> bool {
        false
    }

    /// Execute the tool. Required parameters are already known to be present.
    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ToolArgs {
        pairs.iter().copied().collect()
    }

    #[test]
    fn require_reports_missing_parameter() {
        let a = args(&[("path", "a.txt")]);
        assert_eq!(a.require("path").unwrap(), "a.txt");
        let err = a.require("content").unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: content");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn parse_or_uses_default_and_rejects_garbage() {
        let a = args(&[("offset", " 5 "), ("limit", "lots")]);
        assert_eq!(a.parse_or("offset", 1usize).unwrap(), 5);
        assert_eq!(a.parse_or("missing", 7usize).unwrap(), 7);
        assert!(matches!(
            a.parse_or("limit", 10usize),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn flag_accepts_common_spellings() {
        let a = args(&[("a", "TRUE"), ("b", "no"), ("c", "1"), ("d", "maybe")]);
        assert!(a.flag("a", false).unwrap());
        assert!(!a.flag("b", true).unwrap());
        assert!(a.flag("c", false).unwrap());
        assert!(a.flag("d", false).is_err());
        assert!(a.flag("absent", true).unwrap());
    }

    #[test]
    fn failure_result_keeps_invariant() {
        let err = ToolError::Timeout {
            operation: "Command".into(),
            timeout_ms: 100,
        };
        let result = ToolResult::failure_with_output(&err, "partial").with_call_id("call_3");
        assert!(!result.success);
        assert_eq!(result.call_id, "call_3");
        assert_eq!(result.output, "partial");
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert!(result.error.unwrap().contains("timed out"));

        let ok = ToolResult::success("done");
        assert!(ok.success && ok.error.is_none());
    }

    #[test]
    fn parameter_serializes_type_tag() {
        let p = ToolParameter::optional("limit", "integer", "Max lines").with_default("2000");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["required"], false);
        assert_eq!(json["default"], "2000");
    }
}
