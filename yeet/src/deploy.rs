//! Submit a stack and poll it to a terminal state.
//!
//! ```text
//! Idle -> Submitted -> Polling -> { Succeeded | Failed | TimedOut }
//! ```
//!
//! Each poll fetches the stack snapshot and the events newer than the last
//! one printed, filtered to this submission's token. Events are printed to
//! `out` in arrival order, each exactly once. The deadline is only checked
//! between polls.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::context::Context;
use crate::core::status::StackStatus;
use crate::core::tags::Tags;
use crate::error::YeetError;
use crate::io::cloudformation::{StackEvent, Submission};
use crate::io::settings::DeploySettings;
use crate::io::sources::load_tags;
use crate::render::DocumentRenderer;
use crate::report::write_report;
use crate::resolve::resolve_files;

const HEADER_BEFORE: &str = "+++ Describe running ECS Tasks before deployment";
const HEADER_DEPLOY: &str = "+++ Deploying Yeet Stack";
const HEADER_SUCCEEDED: &str = "+++ Describe running ECS Tasks after deployment";
const HEADER_FAILED: &str = "+++ Describe running ECS Tasks after failed deployment";
const HEADER_TIMED_OUT: &str = "+++ Describe running ECS Tasks after timedout deployment";

/// Everything needed to submit one stack.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    pub stack_name: &'a str,
    pub document: &'a str,
    pub tags: &'a Tags,
}

/// Terminal state of the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployState {
    Succeeded,
    /// The stack settled in a failure state; `status` includes the reason.
    Failed { status: String },
    /// Still in progress when the deadline passed.
    TimedOut { waited: Duration },
}

/// Summary of a deploy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub stack_name: String,
    pub state: DeployState,
    pub events_reported: usize,
    /// Best-effort workload inspections that failed. Never affect `state`.
    pub inspection_failures: Vec<String>,
}

impl DeployOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == DeployState::Succeeded
    }

    /// The failure to report, if the deploy did not succeed.
    pub fn failure(&self) -> Option<anyhow::Error> {
        match &self.state {
            DeployState::Succeeded => None,
            DeployState::Failed { status } => Some(anyhow!("stack in err state: {status}")),
            DeployState::TimedOut { waited } => Some(
                YeetError::Timeout {
                    stack: self.stack_name.clone(),
                    waited: *waited,
                }
                .into(),
            ),
        }
    }
}

/// Resolve `files`, render the document and deploy it.
pub fn deploy_files<W: Write>(
    ctx: &Context,
    settings: &DeploySettings,
    files: &[impl AsRef<Path>],
    tags_file: Option<&Path>,
    out: &mut W,
) -> Result<DeployOutcome> {
    let config = resolve_files(ctx, files).context("failed to read values")?;
    let document = DocumentRenderer::new()?
        .render(&config)
        .context("failed generate template")?;
    let stack_name = config.stack_name()?;
    let tags = load_tags(tags_file).context("cant load tags")?;
    deploy(
        ctx,
        &DeployRequest {
            stack_name,
            document: &document,
            tags: &tags,
        },
        settings,
        out,
    )
}

/// Submit the document and poll the stack until it settles or times out.
#[instrument(skip_all, fields(stack = request.stack_name))]
pub fn deploy<W: Write>(
    ctx: &Context,
    request: &DeployRequest<'_>,
    settings: &DeploySettings,
    out: &mut W,
) -> Result<DeployOutcome> {
    let name = request.stack_name;
    let mut outcome = DeployOutcome {
        stack_name: name.to_string(),
        state: DeployState::Succeeded,
        events_reported: 0,
        inspection_failures: Vec::new(),
    };

    let existing = ctx
        .stacks
        .describe(name)
        .map_err(|err| YeetError::submission(name, err))?;
    if let Some(snapshot) = existing {
        header(ctx, out, HEADER_BEFORE)?;
        inspect(ctx, &snapshot.outputs, "pre-update", &mut outcome, out)?;
    }
    writeln!(out)?;
    header(ctx, out, HEADER_DEPLOY)?;

    let token = ctx
        .stacks
        .submit(&Submission {
            stack_name: name,
            document: request.document,
            tags: request.tags,
        })
        .map_err(|err| YeetError::submission(name, err))?;
    info!(token = %token, "polling stack");

    let timeout = settings.timeout();
    let start = ctx.clock.now();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();

    while ctx.clock.now().duration_since(start) < timeout {
        let snapshot = ctx
            .stacks
            .describe(name)
            .and_then(|snapshot| snapshot.ok_or_else(|| anyhow!("stack does not exist")))
            .map_err(|err| YeetError::poll(name, err))?;
        let events = ctx
            .stacks
            .events_since(name, cursor.as_deref(), &token)
            .map_err(|err| YeetError::poll(name, err))?;

        for event in unseen(events, &mut seen) {
            write!(out, "{}", event.pretty())?;
            outcome.events_reported += 1;
            cursor = Some(event.id);
        }
        out.flush()?;

        let status = snapshot.classify();
        debug!(native = %snapshot.status, %status, cursor = ?cursor, "polled");
        match status {
            StackStatus::Ok => {
                header(ctx, out, HEADER_SUCCEEDED)?;
                inspect(ctx, &snapshot.outputs, "post-update", &mut outcome, out)?;
                outcome.state = DeployState::Succeeded;
                return Ok(outcome);
            }
            StackStatus::Err => {
                warn!(status = %snapshot.status_detail(), "stack in err state");
                outcome.state = DeployState::Failed {
                    status: snapshot.status_detail(),
                };
                header(ctx, out, HEADER_FAILED)?;
                inspect(ctx, &snapshot.outputs, "post-update", &mut outcome, out)?;
                return Ok(outcome);
            }
            StackStatus::InProgress => ctx.clock.sleep(settings.poll_interval()),
        }
    }

    warn!(timeout_secs = timeout.as_secs(), "stack operation wait timed out");
    outcome.state = DeployState::TimedOut { waited: timeout };
    header(ctx, out, HEADER_TIMED_OUT)?;
    match ctx.stacks.describe(name) {
        Ok(Some(snapshot)) => inspect(ctx, &snapshot.outputs, "post-update", &mut outcome, out)?,
        Ok(None) => outcome
            .inspection_failures
            .push("cant get stack: stack does not exist".to_string()),
        Err(err) => outcome
            .inspection_failures
            .push(format!("cant get stack: {err:#}")),
    }
    Ok(outcome)
}

/// Drop events already printed, keeping arrival order.
fn unseen(events: Vec<StackEvent>, seen: &mut HashSet<String>) -> Vec<StackEvent> {
    events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect()
}

fn header<W: Write>(ctx: &Context, out: &mut W, text: &str) -> Result<()> {
    if ctx.buildkite {
        writeln!(out, "{text}")?;
    }
    Ok(())
}

/// Print the workload report. Failures are recorded, not returned.
fn inspect<W: Write>(
    ctx: &Context,
    outputs: &BTreeMap<String, String>,
    phase: &str,
    outcome: &mut DeployOutcome,
    out: &mut W,
) -> Result<()> {
    match ctx.inspector.inspect(outputs) {
        Ok(report) => write_report(&report, out)?,
        Err(err) => {
            warn!(phase, err = %format!("{err:#}"), "workload inspection failed");
            outcome
                .inspection_failures
                .push(format!("cant describe service {phase}: {err:#}"));
        }
    }
    Ok(())
}
