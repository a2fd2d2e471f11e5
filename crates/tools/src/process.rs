//! Process executor behind the `shell` tool.
//!
//! Runs one command through the platform shell with stdout and stderr
//! captured into a single buffer. Two drain tasks read the pipes while the
//! caller waits for exit, so a child that floods its output cannot stall
//! the wait and a child that hangs cannot outlive its deadline.
//!
//! Outcome rules:
//! - exit within the deadline: success iff exit code 0
//! - deadline first: the process (and on Unix its whole process group) is
//!   killed; whatever was captured is returned with a timeout error
//! - capture beyond the byte ceiling is discarded and a marker appended;
//!   the process keeps running until exit or timeout

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rivet_config::ShellConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::ToolResult;
use rivet_security::{CommandPolicy, CommandPolicyError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Appended when captured output hit the ceiling.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// How long drains may keep reading after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    policy: CommandPolicy,
    max_output_bytes: usize,
}

impl ProcessExecutor {
    pub fn new(policy: CommandPolicy, max_output_bytes: usize) -> Self {
        Self {
            policy,
            max_output_bytes,
        }
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    /// Run `command`, never past `timeout_ms`.
    ///
    /// A command matching the blocklist fails with a security error and no
    /// process is spawned.
    pub async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout_ms: u64,
    ) -> ToolResult {
        match self.policy.check(command) {
            Ok(()) => {}
            Err(CommandPolicyError::Blocked { pattern }) => {
                return ToolResult::failure(&ToolError::Blocked(pattern));
            }
            Err(CommandPolicyError::Empty) => {
                return ToolResult::failure(&ToolError::InvalidArguments(
                    "command must not be empty".into(),
                ));
            }
        }

        match self.spawn_and_wait(command, working_dir, timeout_ms).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(&ToolError::ExecutionFailed(format!(
                "failed to start command: {e}"
            ))),
        }
    }

    async fn spawn_and_wait(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout_ms: u64,
    ) -> std::io::Result<ToolResult> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(command = %command, timeout_ms, "Spawning command");
        let mut child = cmd.spawn()?;

        let capture = Arc::new(Mutex::new(Capture::new(self.max_output_bytes)));
        let mut drains: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(tokio::spawn(drain(stdout, Arc::clone(&capture))));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(tokio::spawn(drain(stderr, Arc::clone(&capture))));
        }

        let deadline = Duration::from_millis(timeout_ms);
        let status = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                warn!(command = %command, timeout_ms, "Command timed out, killing");
                terminate(&mut child).await;
                None
            }
        };

        for mut handle in drains {
            if tokio::time::timeout(DRAIN_GRACE, &mut handle).await.is_err() {
                // a grandchild still holds the pipe open
                handle.abort();
            }
        }

        let output = {
            let mut guard = capture.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *guard, Capture::new(0)).into_text()
        };

        let result = match status {
            None => ToolResult::failure_with_output(
                &ToolError::Timeout {
                    operation: "Command".into(),
                    timeout_ms,
                },
                output,
            ),
            Some(status) if status.success() => ToolResult::success(output),
            Some(status) => {
                let code = status.code().unwrap_or(-1);
                debug!(command = %command, exit_code = code, "Command failed");
                ToolResult::failure_with_output(&ToolError::ExitCode(code), output)
            }
        };
        Ok(result)
    }
}

impl From<&ShellConfig> for ProcessExecutor {
    fn from(config: &ShellConfig) -> Self {
        Self::new(CommandPolicy::from(config), config.max_output_size)
    }
}

/// The shell binary commands are run through.
pub fn shell_program() -> &'static str {
    if cfg!(target_os = "windows") { "cmd" } else { "sh" }
}

fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new(shell_program());
    if cfg!(target_os = "windows") {
        cmd.args(["/C", command]);
    } else {
        cmd.args(["-c", command]);
    }
    cmd
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: the child leads its own process group (process_group(0)),
        // so this signals only processes it started.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "kill after timeout failed");
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, capture: Arc<Mutex<Capture>>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut guard = capture.lock().unwrap_or_else(|p| p.into_inner());
                guard.push(&buf[..n]);
            }
        }
    }
}

/// Combined output buffer with a byte ceiling.
#[derive(Debug)]
struct Capture {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    /// Decode lossily, keeping the result within the ceiling.
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if text.len() > self.limit {
            let mut cut = self.limit;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}
