//! CloudFormation stack operations.
//!
//! [`StackService`] is the boundary the deploy loop talks to: describe a stack,
//! submit a document, and list the events a submission produced. The
//! [`CloudFormation`] implementation drives the AWS CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::status::StackStatus;
use crate::core::tags::Tags;
use crate::io::aws::{AwsCallError, AwsCli};

/// Upper bound on events fetched per poll. The CLI paginates up to this.
const EVENT_PAGE_LIMIT: &str = "200";

/// Point-in-time view of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSnapshot {
    pub name: String,
    /// Native status, e.g. `UPDATE_IN_PROGRESS`.
    pub status: String,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
    /// Creation timestamp as reported by the service.
    pub created: Option<String>,
}

impl StackSnapshot {
    pub fn classify(&self) -> StackStatus {
        StackStatus::classify(&self.status)
    }

    /// Native status plus the reason, when there is one.
    pub fn status_detail(&self) -> String {
        match self.status_reason.as_deref() {
            Some(reason) if !reason.is_empty() => format!("{} ({reason})", self.status),
            _ => self.status.clone(),
        }
    }
}

/// One entry from the stack's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
    pub id: String,
    pub timestamp: String,
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    pub reason: Option<String>,
}

impl StackEvent {
    /// Single line suitable for streaming to a terminal or CI log.
    pub fn pretty(&self) -> String {
        let mut line = format!(
            "{} {:<30} {:<40} {}",
            self.timestamp, self.status, self.resource_type, self.logical_id
        );
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.is_empty()) {
            line.push_str(" - ");
            line.push_str(reason);
        }
        line.push('\n');
        line
    }
}

/// Identifies the events that belong to one submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentToken(String);

impl DeploymentToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random token, valid as a CloudFormation client request token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(format!("yeet-{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rendered document plus the tags to attach.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub stack_name: &'a str,
    pub document: &'a str,
    pub tags: &'a Tags,
}

pub trait StackService: Send + Sync {
    /// Current snapshot, or `None` when the stack does not exist.
    fn describe(&self, name: &str) -> Result<Option<StackSnapshot>>;

    /// Create or update the stack. Returns the token its events will carry.
    fn submit(&self, submission: &Submission<'_>) -> Result<DeploymentToken>;

    /// Events newer than `cursor` that carry `token`, oldest first.
    fn events_since(
        &self,
        name: &str,
        cursor: Option<&str>,
        token: &DeploymentToken,
    ) -> Result<Vec<StackEvent>>;
}

/// CloudFormation via the AWS CLI.
#[derive(Debug, Clone)]
pub struct CloudFormation {
    aws: AwsCli,
    capabilities: Vec<String>,
}

impl CloudFormation {
    pub fn new(aws: AwsCli, capabilities: Vec<String>) -> Self {
        Self { aws, capabilities }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksOutput {
    #[serde(default)]
    stacks: Vec<RawStack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStack {
    stack_name: String,
    stack_status: String,
    stack_status_reason: Option<String>,
    creation_time: Option<String>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawOutput {
    output_key: String,
    #[serde(default)]
    output_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeEventsOutput {
    #[serde(default)]
    stack_events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    event_id: String,
    timestamp: String,
    #[serde(default)]
    logical_resource_id: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    resource_status: String,
    resource_status_reason: Option<String>,
    client_request_token: Option<String>,
}

impl From<RawStack> for StackSnapshot {
    fn from(raw: RawStack) -> Self {
        Self {
            name: raw.stack_name,
            status: raw.stack_status,
            status_reason: raw.stack_status_reason,
            outputs: raw
                .outputs
                .into_iter()
                .map(|o| (o.output_key, o.output_value))
                .collect(),
            created: raw.creation_time,
        }
    }
}

impl From<RawEvent> for StackEvent {
    fn from(raw: RawEvent) -> Self {
        Self {
            id: raw.event_id,
            timestamp: raw.timestamp,
            logical_id: raw.logical_resource_id,
            resource_type: raw.resource_type,
            status: raw.resource_status,
            reason: raw.resource_status_reason,
        }
    }
}

fn is_aws_error(err: &anyhow::Error, needle: &str) -> bool {
    err.downcast_ref::<AwsCallError>()
        .is_some_and(|call| call.mentions(needle))
}

fn tags_json(tags: &Tags) -> Result<String> {
    let list: Vec<_> = tags
        .iter()
        .map(|(key, value)| serde_json::json!({ "Key": key, "Value": value }))
        .collect();
    serde_json::to_string(&list).context("serialize tags")
}

impl StackService for CloudFormation {
    #[instrument(skip(self))]
    fn describe(&self, name: &str) -> Result<Option<StackSnapshot>> {
        let result = self.aws.call::<DescribeStacksOutput>(
            "cloudformation",
            "describe-stacks",
            &["--stack-name", name],
        );
        let output = match result {
            Ok(output) => output,
            Err(err) if is_aws_error(&err, "does not exist") => {
                debug!("stack does not exist");
                return Ok(None);
            }
            Err(err) => return Err(err).with_context(|| format!("describe stack {name}")),
        };
        Ok(output.stacks.into_iter().next().map(StackSnapshot::from))
    }

    #[instrument(skip_all, fields(stack = submission.stack_name))]
    fn submit(&self, submission: &Submission<'_>) -> Result<DeploymentToken> {
        let exists = self.describe(submission.stack_name)?.is_some();
        let operation = if exists { "update-stack" } else { "create-stack" };
        let token = DeploymentToken::generate();

        let mut body = tempfile::Builder::new()
            .prefix("yeet-template-")
            .suffix(".yml")
            .tempfile()
            .context("create template file")?;
        body.write_all(submission.document.as_bytes())
            .context("write template file")?;
        body.flush().context("flush template file")?;
        let body_arg = format!("file://{}", body.path().display());

        let mut args: Vec<String> = vec![
            "--stack-name".to_string(),
            submission.stack_name.to_string(),
            "--template-body".to_string(),
            body_arg,
            "--client-request-token".to_string(),
            token.as_str().to_string(),
        ];
        if !self.capabilities.is_empty() {
            args.push("--capabilities".to_string());
            args.extend(self.capabilities.iter().cloned());
        }
        if !submission.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(tags_json(submission.tags)?);
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match self
            .aws
            .call::<serde_json::Value>("cloudformation", operation, &args)
        {
            Ok(_) => {
                info!(operation, token = %token, "stack submitted");
                Ok(token)
            }
            Err(err) if exists && is_aws_error(&err, "No updates are to be performed") => {
                info!("no updates are to be performed");
                Ok(token)
            }
            Err(err) => Err(err).with_context(|| format!("{operation} {}", submission.stack_name)),
        }
    }

    #[instrument(skip(self, token))]
    fn events_since(
        &self,
        name: &str,
        cursor: Option<&str>,
        token: &DeploymentToken,
    ) -> Result<Vec<StackEvent>> {
        let output: DescribeEventsOutput = self
            .aws
            .call(
                "cloudformation",
                "describe-stack-events",
                &["--stack-name", name, "--max-items", EVENT_PAGE_LIMIT],
            )
            .with_context(|| format!("describe events for {name}"))?;
        Ok(newer_events(output.stack_events, cursor, token))
    }
}

/// The service lists events newest first. Keep everything above the cursor
/// that belongs to this submission, then flip to arrival order.
fn newer_events(
    newest_first: Vec<RawEvent>,
    cursor: Option<&str>,
    token: &DeploymentToken,
) -> Vec<StackEvent> {
    let mut events: Vec<StackEvent> = newest_first
        .into_iter()
        .take_while(|event| Some(event.event_id.as_str()) != cursor)
        .filter(|event| event.client_request_token.as_deref() == Some(token.as_str()))
        .map(StackEvent::from)
        .collect();
    events.reverse();
    events
}
