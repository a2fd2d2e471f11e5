//! Command blocklist, evaluated before a process is spawned.

use rivet_config::ShellConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandPolicyError {
    #[error("matched blocked pattern '{pattern}'")]
    Blocked { pattern: String },

    #[error("empty command")]
    Empty,
}

/// Case-insensitive substring blocklist.
///
/// Runs of whitespace are collapsed before matching, so `rm  -rf   /`
/// matches a `rm -rf /` entry.
#[derive(Debug, Clone, Default)]
pub struct CommandPolicy {
    blocked: Vec<String>,
}

impl CommandPolicy {
    pub fn new<I, S>(blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked: blocked
                .into_iter()
                .map(|p| normalize(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.blocked
    }

    pub fn check(&self, command: &str) -> Result<(), CommandPolicyError> {
        let normalized = normalize(command);
        if normalized.is_empty() {
            return Err(CommandPolicyError::Empty);
        }
        match self.blocked.iter().find(|p| normalized.contains(p.as_str())) {
            Some(pattern) => {
                tracing::warn!(command = %command, pattern = %pattern, "Blocked command");
                Err(CommandPolicyError::Blocked {
                    pattern: pattern.clone(),
                })
            }
            None => Ok(()),
        }
    }
}

impl From<&ShellConfig> for CommandPolicy {
    fn from(config: &ShellConfig) -> Self {
        Self::new(&config.blocked_commands)
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CommandPolicy {
        CommandPolicy::from(&ShellConfig::default())
    }

    #[test]
    fn default_blocklist_catches_destructive_commands() {
        let policy = policy();
        for cmd in [
            "rm -rf /",
            "sudo rm -rf /*",
            "mkfs.ext4 /dev/sdb1",
            "dd if=/dev/zero of=/dev/sda",
            ":(){ :|:& };:",
            "cat junk > /dev/sda",
        ] {
            assert!(
                matches!(policy.check(cmd), Err(CommandPolicyError::Blocked { .. })),
                "{cmd} should be blocked"
            );
        }
    }

    #[test]
    fn matching_ignores_case_and_spacing() {
        let policy = policy();
        assert!(policy.check("RM   -RF    /").is_err());
        assert!(policy.check("MKFS /dev/sdb").is_err());
    }

    #[test]
    fn ordinary_commands_pass() {
        let policy = policy();
        assert!(policy.check("ls -la").is_ok());
        assert!(policy.check("cargo test --workspace").is_ok());
        assert!(policy.check("rm -rf ./target").is_ok());
    }

    #[test]
    fn blank_command_rejected() {
        assert_eq!(policy().check("   "), Err(CommandPolicyError::Empty));
    }

    #[test]
    fn empty_policy_allows_everything() {
        let policy = CommandPolicy::new(Vec::<String>::new());
        assert!(policy.check("mkfs /dev/sda").is_ok());
    }
}
