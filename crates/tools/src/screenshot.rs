//! Screen capture through whichever capture utility the host provides.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use rivet_config::ScreenshotConfig;
use rivet_core::error::ToolError;
use rivet_core::tool::{Tool, ToolArgs, ToolParameter, ToolResult};
use tokio::process::Command;
use tracing::debug;

const CAPTURE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capturer {
    Scrot,
    GnomeScreenshot,
    ScreenCapture,
}

impl Capturer {
    /// First supported utility found on PATH.
    pub fn detect() -> Option<Self> {
        [Self::ScreenCapture, Self::Scrot, Self::GnomeScreenshot]
            .into_iter()
            .find(|c| which::which(c.program()).is_ok())
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Scrot => "scrot",
            Self::GnomeScreenshot => "gnome-screenshot",
            Self::ScreenCapture => "screencapture",
        }
    }

    fn args(self, region: Region, output: &str) -> Result<Vec<String>, ToolError> {
        let mut args: Vec<String> = Vec::new();
        match (self, region) {
            (Self::Scrot, Region::Full) => {}
            (Self::Scrot, Region::Active) => args.push("-u".into()),
            (Self::Scrot, Region::Area { x, y, w, h }) => {
                args.push("-a".into());
                args.push(format!("{x},{y},{w},{h}"));
            }
            (Self::GnomeScreenshot, Region::Full) => {}
            (Self::GnomeScreenshot, Region::Active) => args.push("-w".into()),
            (Self::GnomeScreenshot, Region::Area { .. }) => {
                return Err(ToolError::InvalidArguments(
                    "gnome-screenshot cannot capture an explicit region".into(),
                ));
            }
            (Self::ScreenCapture, Region::Full) => args.push("-x".into()),
            (Self::ScreenCapture, Region::Active) => {
                args.push("-x".into());
                args.push("-w".into());
            }
            (Self::ScreenCapture, Region::Area { x, y, w, h }) => {
                args.push("-x".into());
                args.push("-R".into());
                args.push(format!("{x},{y},{w},{h}"));
            }
        }
        if self == Self::GnomeScreenshot {
            args.push("-f".into());
        }
        args.push(output.to_string());
        Ok(args)
    }
}

/// What part of the screen to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Full,
    Active,
    Area { x: i32, y: i32, w: u32, h: u32 },
}

impl FromStr for Region {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Ok(Self::Full),
            "active" | "window" => Ok(Self::Active),
            area => {
                let invalid = || {
                    ToolError::InvalidArguments(format!(
                        "region must be full, active or x,y,width,height (got '{area}')"
                    ))
                };
                let parts: Vec<&str> = area.split(',').map(str::trim).collect();
                let [x, y, w, h] = parts.as_slice() else {
                    return Err(invalid());
                };
                let region = Self::Area {
                    x: x.parse().map_err(|_| invalid())?,
                    y: y.parse().map_err(|_| invalid())?,
                    w: w.parse().map_err(|_| invalid())?,
                    h: h.parse().map_err(|_| invalid())?,
                };
                match region {
                    Self::Area { w: 0, .. } | Self::Area { h: 0, .. } => Err(invalid()),
                    region => Ok(region),
                }
            }
        }
    }
}

pub struct ScreenshotTool {
    capturer: Option<Capturer>,
    output_directory: PathBuf,
}

impl ScreenshotTool {
    pub fn new(config: &ScreenshotConfig) -> Self {
        Self {
            capturer: Capturer::detect(),
            output_directory: config.output_directory.clone(),
        }
    }

    /// Use a specific capturer instead of probing PATH.
    pub fn with_capturer(mut self, capturer: Option<Capturer>) -> Self {
        self.capturer = capturer;
        self
    }

    fn default_output(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.output_directory.join(format!("screenshot_{stamp}.png"))
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn description(&self) -> &str {
        "Capture the screen to a PNG file and return its path."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::optional("output", "string", "Where to save the PNG"),
            ToolParameter::optional("region", "string", "full, active, or x,y,width,height")
                .with_default("full"),
        ]
    }

    fn is_available(&self) -> bool {
        self.capturer.is_some()
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let capturer = self
            .capturer
            .ok_or_else(|| ToolError::Unavailable("no screen capture utility found".into()))?;
        let region: Region = args.get_or("region", "full").parse()?;
        let output = match args.get("output").map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => self.default_output(),
        };
        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output_str = output.display().to_string();
        let cmd_args = capturer.args(region, &output_str)?;
        debug!(program = capturer.program(), args = ?cmd_args, "Capturing screen");

        let run = Command::new(capturer.program())
            .args(&cmd_args)
            .kill_on_drop(true)
            .output();
        let out = tokio::time::timeout(std::time::Duration::from_millis(CAPTURE_TIMEOUT_MS), run)
            .await
            .map_err(|_| ToolError::Timeout {
                operation: "Screenshot".into(),
                timeout_ms: CAPTURE_TIMEOUT_MS,
            })??;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Ok(ToolResult::failure_with_output(
                &ToolError::ExitCode(out.status.code().unwrap_or(-1)),
                stderr,
            ));
        }
        if !output.exists() {
            return Err(ToolError::ExecutionFailed(format!(
                "{} reported success but wrote no file",
                capturer.program()
            )));
        }
        Ok(ToolResult::success(format!("Screenshot saved: {output_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parsing() {
        assert_eq!("full".parse::<Region>().unwrap(), Region::Full);
        assert_eq!("".parse::<Region>().unwrap(), Region::Full);
        assert_eq!("Active".parse::<Region>().unwrap(), Region::Active);
        assert_eq!(
            "10, 20, 300, 200".parse::<Region>().unwrap(),
            Region::Area { x: 10, y: 20, w: 300, h: 200 }
        );
        assert!("10,20,0,5".parse::<Region>().is_err());
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("corner".parse::<Region>().is_err());
    }

    #[test]
    fn capturer_arguments() {
        let area = Region::Area { x: 1, y: 2, w: 3, h: 4 };
        assert_eq!(
            Capturer::Scrot.args(area, "/tmp/a.png").unwrap(),
            ["-a", "1,2,3,4", "/tmp/a.png"]
        );
        assert_eq!(
            Capturer::GnomeScreenshot.args(Region::Active, "/tmp/a.png").unwrap(),
            ["-w", "-f", "/tmp/a.png"]
        );
        assert_eq!(
            Capturer::ScreenCapture.args(area, "/tmp/a.png").unwrap(),
            ["-x", "-R", "1,2,3,4", "/tmp/a.png"]
        );
        assert!(Capturer::GnomeScreenshot.args(area, "/tmp/a.png").is_err());
    }

    #[tokio::test]
    async fn without_capturer_is_unavailable() {
        let tool = ScreenshotTool::new(&ScreenshotConfig::default()).with_capturer(None);
        assert!(!tool.is_available());
        let err = tool.execute(&ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }

    #[test]
    fn default_output_lands_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScreenshotTool::new(&ScreenshotConfig {
            output_directory: dir.path().to_path_buf(),
        });
        let path = tool.default_output();
        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("screenshot_") && name.ends_with(".png"));
    }
}
