//! AWS CLI adapter.
//!
//! Every remote call goes through the `aws` program with `--output json`, so
//! credentials, retries and backoff are whatever the CLI is configured with.

use std::process::Command;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::io::process::{RunLimits, run_bounded};
use crate::io::settings::YeetSettings;

/// A non-zero exit from the AWS CLI, with its stderr.
#[derive(Debug, Error)]
#[error("aws {command} failed: {stderr}")]
pub struct AwsCallError {
    pub command: String,
    pub stderr: String,
}

impl AwsCallError {
    pub fn mentions(&self, needle: &str) -> bool {
        self.stderr.contains(needle)
    }
}

/// Wrapper for executing AWS CLI commands against one region.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    limits: RunLimits,
    max_attempts: u32,
}

impl AwsCli {
    pub fn new(settings: &YeetSettings, region: impl Into<String>) -> Self {
        Self {
            program: settings.aws_cli.clone(),
            region: region.into(),
            limits: RunLimits {
                timeout: settings.command_timeout(),
                output_limit_bytes: settings.output_limit_bytes,
            },
            max_attempts: settings.max_attempts,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run `aws <service> <operation> <args>` and decode its JSON output.
    ///
    /// Commands that print nothing decode as an empty JSON object.
    #[instrument(skip_all, fields(service = %service, operation = %operation))]
    pub fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<T> {
        let stdout = self.run_checked(service, operation, args)?;
        let payload = if stdout.trim().is_empty() {
            "{}"
        } else {
            stdout.as_str()
        };
        serde_json::from_str(payload)
            .with_context(|| format!("decode aws {service} {operation} output"))
    }

    fn run_checked(&self, service: &str, operation: &str, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(service)
            .arg(operation)
            .args(args)
            .args(["--region", &self.region, "--output", "json"])
            .env("AWS_PAGER", "")
            .env("AWS_RETRY_MODE", "standard")
            .env("AWS_MAX_ATTEMPTS", self.max_attempts.to_string());

        debug!(service, operation, region = %self.region, "calling aws");
        let output = run_bounded(cmd, self.limits)
            .with_context(|| format!("spawn {} {service} {operation}", self.program))?;

        let command = format!("{service} {operation}");
        if output.timed_out {
            warn!(command = %command, "aws call timed out");
            return Err(AwsCallError {
                command,
                stderr: format!("timed out after {:?}", self.limits.timeout),
            }
            .into());
        }
        if !output.status.success() {
            let stderr = output.stderr.text().trim().to_string();
            debug!(command = %command, stderr = %stderr, "aws call failed");
            return Err(AwsCallError { command, stderr }.into());
        }
        if output.stdout.is_truncated() {
            warn!(command = %command, dropped = output.stdout.dropped, "aws output truncated");
        }
        Ok(output.stdout.text())
    }
}
