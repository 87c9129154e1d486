//! Secret parameter store access.
//!
//! The [`SecretStore`] trait decouples config resolution from AWS SSM. Tests
//! use an in-memory map instead of spawning the AWS CLI.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::io::aws::AwsCli;

/// Fetches decrypted parameter values by name.
pub trait SecretStore: Send + Sync {
    fn get_parameter(&self, name: &str) -> Result<String>;
}

/// SSM Parameter Store via `aws ssm get-parameter --with-decryption`.
#[derive(Debug, Clone)]
pub struct SsmParameters {
    aws: AwsCli,
}

impl SsmParameters {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterOutput {
    parameter: Parameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

impl SecretStore for SsmParameters {
    #[instrument(skip(self))]
    fn get_parameter(&self, name: &str) -> Result<String> {
        let output: GetParameterOutput = self
            .aws
            .call("ssm", "get-parameter", &["--name", name, "--with-decryption"])
            .with_context(|| format!("get param {name}"))?;
        debug!(bytes = output.parameter.value.len(), "parameter fetched");
        Ok(output.parameter.value)
    }
}
