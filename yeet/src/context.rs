//! Per-invocation handles shared by the resolver and the deploy loop.
//!
//! Built once at startup from the CLI flags, environment and settings, then
//! passed by reference. Nothing here changes after construction.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::io::aws::AwsCli;
use crate::io::clock::{Clock, SystemClock};
use crate::io::cloudformation::{CloudFormation, StackService};
use crate::io::ecs::{Ecs, WorkloadInspector};
use crate::io::secrets::{SecretStore, SsmParameters};
use crate::io::settings::YeetSettings;

pub const REGION_ENV: &str = "AWS_REGION";
pub const DEFAULT_REGION_ENV: &str = "AWS_DEFAULT_REGION";
pub const BUILDKITE_ENV: &str = "BUILDKITE";

#[derive(Clone)]
pub struct Context {
    /// Region requested for this invocation.
    pub region: String,
    /// Print Buildkite `+++` section headers.
    pub buildkite: bool,
    pub secrets: Arc<dyn SecretStore>,
    pub stacks: Arc<dyn StackService>,
    pub inspector: Arc<dyn WorkloadInspector>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("region", &self.region)
            .field("buildkite", &self.buildkite)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context backed by the AWS CLI and the system clock.
    pub fn aws(settings: &YeetSettings, region: impl Into<String>, buildkite: bool) -> Self {
        let aws = AwsCli::new(settings, region);
        Self {
            region: aws.region().to_string(),
            buildkite,
            secrets: Arc::new(SsmParameters::new(aws.clone())),
            stacks: Arc::new(CloudFormation::new(
                aws.clone(),
                settings.capabilities.clone(),
            )),
            inspector: Arc::new(Ecs::new(aws)),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Region from the flag, then `AWS_REGION`, then `AWS_DEFAULT_REGION`.
/// Empty values are skipped.
pub fn resolve_region(
    flag: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    flag.map(str::to_string)
        .into_iter()
        .chain(env(REGION_ENV))
        .chain(env(DEFAULT_REGION_ENV))
        .find(|region| !region.is_empty())
        .ok_or_else(|| anyhow!("no region set - as flag or env var"))
}

/// CI context is forced by `--bk` or detected from `BUILDKITE=true`.
pub fn buildkite_context(flag: bool, env: impl Fn(&str) -> Option<String>) -> bool {
    flag || env(BUILDKITE_ENV).as_deref() == Some("true")
}
