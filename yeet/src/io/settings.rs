//! Tool settings stored in `.yeet.toml` (or the file named by `YEET_SETTINGS`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default settings file, relative to the working directory.
pub const SETTINGS_FILE: &str = ".yeet.toml";
/// Environment variable overriding the settings file path.
pub const SETTINGS_ENV: &str = "YEET_SETTINGS";

/// Tool settings (TOML).
///
/// Missing fields default to values that match how the tool behaves without
/// any settings file at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct YeetSettings {
    /// AWS CLI program to invoke.
    pub aws_cli: String,

    /// Wall-clock limit for a single AWS CLI invocation, in seconds.
    pub command_timeout_secs: u64,

    /// Truncate AWS CLI stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Retry attempts handed to the AWS CLI (`AWS_MAX_ATTEMPTS`).
    pub max_attempts: u32,

    /// Capabilities acknowledged when creating or updating a stack.
    pub capabilities: Vec<String>,

    pub deploy: DeploySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploySettings {
    /// Give up waiting for the stack after this many seconds.
    pub timeout_secs: u64,

    /// Pause between polls of the stack, in seconds.
    pub poll_interval_secs: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60 * 60,
            poll_interval_secs: 2,
        }
    }
}

impl DeploySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for YeetSettings {
    fn default() -> Self {
        Self {
            aws_cli: "aws".to_string(),
            command_timeout_secs: 120,
            output_limit_bytes: 1024 * 1024,
            max_attempts: 10,
            capabilities: vec![
                "CAPABILITY_IAM".to_string(),
                "CAPABILITY_NAMED_IAM".to_string(),
                "CAPABILITY_AUTO_EXPAND".to_string(),
            ],
            deploy: DeploySettings::default(),
        }
    }
}

impl YeetSettings {
    pub fn validate(&self) -> Result<()> {
        if self.aws_cli.trim().is_empty() {
            return Err(anyhow!("aws_cli must be a non-empty program name"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.deploy.timeout_secs == 0 {
            return Err(anyhow!("deploy.timeout_secs must be > 0"));
        }
        if self.deploy.poll_interval_secs == 0 {
            return Err(anyhow!("deploy.poll_interval_secs must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Settings path: `YEET_SETTINGS` if set, otherwise `.yeet.toml` under `root`.
pub fn settings_path(root: &Path, env_override: Option<PathBuf>) -> PathBuf {
    env_override.unwrap_or_else(|| root.join(SETTINGS_FILE))
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `YeetSettings::default()`.
pub fn load_settings(path: &Path) -> Result<YeetSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        let settings = YeetSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: YeetSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, YeetSettings::default());
        assert_eq!(settings.deploy.timeout(), Duration::from_secs(3600));
        assert_eq!(settings.deploy.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".yeet.toml");
        fs::write(&path, "aws_cli = \"/opt/aws/bin/aws\"\n\n[deploy]\npoll_interval_secs = 5\n")
            .expect("write");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.aws_cli, "/opt/aws/bin/aws");
        assert_eq!(settings.deploy.poll_interval_secs, 5);
        assert_eq!(settings.deploy.timeout_secs, 3600);
        assert_eq!(settings.max_attempts, 10);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".yeet.toml");
        fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        let err = load_settings(&path).expect_err("should fail");
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".yeet.toml");
        fs::write(&path, "[deploy]\npoll_interval_secs = 0\n").expect("write");
        let err = load_settings(&path).expect_err("should fail");
        assert!(err.to_string().contains("deploy.poll_interval_secs"));
    }

    #[test]
    fn env_override_wins_over_default_path() {
        let root = Path::new("/work");
        assert_eq!(settings_path(root, None), PathBuf::from("/work/.yeet.toml"));
        assert_eq!(
            settings_path(root, Some(PathBuf::from("/etc/yeet.toml"))),
            PathBuf::from("/etc/yeet.toml")
        );
    }
}
