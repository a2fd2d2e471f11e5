//! Configuration loading, validation, and management for rivet.
//!
//! Loads configuration from `~/.rivet/config.toml` (or `$RIVET_CONFIG`)
//! with environment variable overrides. Every field has a default, so an
//! absent file or a partial one is fine.

pub mod logging;

use rivet_core::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use logging::LoggingConfig;

const DEFAULT_SYSTEM_PROMPT: &str = "You are Rivet, an autonomous assistant that completes tasks \
on the user's machine. Work step by step: read before you edit, check the result of every \
tool call, and keep going until the task is done. When you have finished, reply with a short \
summary and no tool call.";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loop controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Generation rounds per submitted message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Failed tool calls in a row before the turn is abandoned
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Estimated-token budget for the conversation history
    #[serde(default = "default_context_max_tokens")]
    pub context_max_tokens: usize,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_max_iterations() -> u32 {
    50
}
fn default_max_consecutive_errors() -> u32 {
    3
}
fn default_context_max_tokens() -> usize {
    16_000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_iterations: default_max_iterations(),
            max_consecutive_errors: default_max_consecutive_errors(),
            context_max_tokens: default_context_max_tokens(),
        }
    }
}

/// Sampling parameters passed to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_true")]
    pub do_sample: bool,
    #[serde(default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,
}

fn default_max_new_tokens() -> usize {
    2048
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> u32 {
    50
}
fn default_true() -> bool {
    true
}
fn default_stop_sequences() -> Vec<String> {
    GenerationConfig::default().stop_sequences
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            do_sample: true,
            stop_sequences: default_stop_sequences(),
        }
    }
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(s: &GenerationSettings) -> Self {
        Self {
            max_new_tokens: s.max_new_tokens,
            temperature: s.temperature,
            top_p: s.top_p,
            top_k: s.top_k,
            do_sample: s.do_sample,
            stop_sequences: s.stop_sequences.clone(),
        }
    }
}

/// Per-capability limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub read_file: ReadFileConfig,
    #[serde(default)]
    pub write_file: WriteFileConfig,
    #[serde(default)]
    pub list_directory: ListDirectoryConfig,
    #[serde(default)]
    pub search_files: SearchFilesConfig,
    #[serde(default)]
    pub grep: GrepConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub web_fetch: WebFetchConfig,
    #[serde(default)]
    pub screenshot: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileConfig {
    /// Files larger than this many bytes are refused
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ReadFileConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFileConfig {
    #[serde(default = "default_true")]
    pub create_directories: bool,
    /// Copy an existing file to `<path>.bak` before overwriting
    #[serde(default)]
    pub backup_existing: bool,
}

impl Default for WriteFileConfig {
    fn default() -> Self {
        Self {
            create_directories: true,
            backup_existing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDirectoryConfig {
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_list_max_results")]
    pub max_results: usize,
}

fn default_max_depth() -> usize {
    3
}
fn default_list_max_results() -> usize {
    500
}

impl Default for ListDirectoryConfig {
    fn default() -> Self {
        Self {
            show_hidden: false,
            max_depth: default_max_depth(),
            max_results: default_list_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilesConfig {
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

fn default_search_max_results() -> usize {
    100
}

impl Default for SearchFilesConfig {
    fn default() -> Self {
        Self {
            max_results: default_search_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepConfig {
    #[serde(default = "default_grep_max_results")]
    pub max_results: usize,
}

fn default_grep_max_results() -> usize {
    50
}

impl Default for GrepConfig {
    fn default() -> Self {
        Self {
            max_results: default_grep_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Commands containing any of these substrings are refused
    #[serde(default = "default_blocked_commands")]
    pub blocked_commands: Vec<String>,

    /// Default per-command deadline
    #[serde(default = "default_shell_timeout_ms")]
    pub timeout_ms: u64,

    /// Captured output ceiling in bytes
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,

    /// Working-directory root; per-call directories must stay inside it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

fn default_blocked_commands() -> Vec<String> {
    [
        "rm -rf /",
        "rm -rf /*",
        "mkfs",
        "dd if=",
        ":(){",
        "fork bomb",
        "> /dev/sda",
        "format c:",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_shell_timeout_ms() -> u64 {
    60_000
}
fn default_max_output_size() -> usize {
    1024 * 1024
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            blocked_commands: default_blocked_commands(),
            timeout_ms: default_shell_timeout_ms(),
            max_output_size: default_max_output_size(),
            working_directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebFetchConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}
fn default_max_response_size() -> usize {
    5 * 1024 * 1024
}
fn default_user_agent() -> String {
    format!("rivet-agent/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout_ms(),
            max_response_size: default_max_response_size(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    #[serde(default = "default_screenshot_dir")]
    pub output_directory: PathBuf,
}

fn default_screenshot_dir() -> PathBuf {
    std::env::temp_dir().join("rivet-screenshots")
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            output_directory: default_screenshot_dir(),
        }
    }
}

/// Filesystem scope for file tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Roots file tools may touch. Empty = anywhere.
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    /// Path prefixes file tools may never touch.
    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,
}

fn default_forbidden_paths() -> Vec<String> {
    ["~/.ssh", "~/.gnupg", "~/.aws", "/etc/shadow", "/etc/sudoers"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            forbidden_paths: default_forbidden_paths(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$RIVET_CONFIG` or `~/.rivet/config.toml`.
    ///
    /// Environment overrides (highest priority):
    /// - `RIVET_MAX_ITERATIONS`
    /// - `RIVET_SYSTEM_PROMPT`
    /// - `RIVET_WORKDIR`
    /// - `RIVET_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("RIVET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("RIVET_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("RIVET_MAX_ITERATIONS is not a number: {raw}"))
            })?;
        }
        if let Some(prompt) = lookup("RIVET_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }
        if let Some(dir) = lookup("RIVET_WORKDIR") {
            self.tools.shell.working_directory = Some(PathBuf::from(dir));
        }
        if let Some(level) = lookup("RIVET_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rivet")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.max_consecutive_errors == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_consecutive_errors must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }
        if self.tools.shell.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tools.shell.timeout_ms must be positive".into(),
            ));
        }
        if self.tools.shell.max_output_size == 0 {
            return Err(ConfigError::ValidationError(
                "tools.shell.max_output_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.max_consecutive_errors, 3);
        assert_eq!(config.tools.shell.timeout_ms, 60_000);
        assert_eq!(config.tools.read_file.max_file_size, 10 * 1024 * 1024);
        assert!(config.tools.shell.blocked_commands.iter().any(|b| b == "rm -rf /"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_iterations, 50);
        assert_eq!(parsed.generation.top_k, 50);
        assert_eq!(parsed.tools.grep.max_results, 50);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
[agent]
max_iterations = 8

[tools.shell]
timeout_ms = 500
blocked_commands = ["shutdown"]
"#,
        )
        .unwrap();
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.agent.max_consecutive_errors, 3);
        assert_eq!(config.tools.shell.timeout_ms, 500);
        assert_eq!(config.tools.shell.blocked_commands, vec!["shutdown".to_string()]);
        assert_eq!(config.tools.shell.max_output_size, 1024 * 1024);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());

        let err = AppConfig::from_toml("[generation]\ntop_p = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/rivet/config.toml")).unwrap();
        assert_eq!(config.agent.max_iterations, 50);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmax_iterations = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        match err {
            ConfigError::ParseError { path: p, .. } => assert_eq!(p, path),
            other => panic!("Expected ParseError, got: {other}"),
        }
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("RIVET_MAX_ITERATIONS", "7"),
            ("RIVET_SYSTEM_PROMPT", "Be terse."),
            ("RIVET_WORKDIR", "/srv/work"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.agent.system_prompt, "Be terse.");
        assert_eq!(
            config.tools.shell.working_directory,
            Some(PathBuf::from("/srv/work"))
        );

        let mut config = AppConfig::default();
        let bad = config.apply_env_overrides(|k| {
            (k == "RIVET_MAX_ITERATIONS").then(|| "lots".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn generation_settings_convert() {
        let settings = GenerationSettings {
            temperature: 0.2,
            ..GenerationSettings::default()
        };
        let config = GenerationConfig::from(&settings);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.stop_sequences, GenerationConfig::default().stop_sequences);
    }
}
