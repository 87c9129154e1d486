//! Scripted collaborators for tests.
//!
//! Every fake is cheap to clone and shares its state, so a test can hand one
//! copy to a [`Context`] and keep another to assert on what happened.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::context::Context;
use crate::core::tags::Tags;
use crate::io::clock::Clock;
use crate::io::cloudformation::{
    DeploymentToken, StackEvent, StackService, StackSnapshot, Submission,
};
use crate::io::ecs::{CLUSTER_OUTPUT, SERVICE_OUTPUT, WorkloadInspector, WorkloadReport};
use crate::io::secrets::SecretStore;

pub const TEST_REGION: &str = "ap-southeast-2";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory parameter store that counts fetches.
#[derive(Debug, Default)]
pub struct MapSecretStore {
    values: HashMap<String, String>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MapSecretStore {
    pub fn new<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetches(&self, name: &str) -> usize {
        lock(&self.fetches).get(name).copied().unwrap_or(0)
    }
}

impl SecretStore for MapSecretStore {
    fn get_parameter(&self, name: &str) -> Result<String> {
        *lock(&self.fetches).entry(name.to_string()).or_default() += 1;
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("ParameterNotFound: {name}"))
    }
}

/// Clock whose `sleep` advances time instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }
}

impl ManualClock {
    pub fn elapsed(&self) -> Duration {
        *lock(&self.elapsed)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        *lock(&self.elapsed) += duration;
    }
}

/// A stack event whose logical id is `<id>-resource`.
pub fn event(id: &str) -> StackEvent {
    StackEvent {
        id: id.to_string(),
        timestamp: "2024-05-01T10:00:00Z".to_string(),
        logical_id: format!("{id}-resource"),
        resource_type: "AWS::ECS::Service".to_string(),
        status: "UPDATE_IN_PROGRESS".to_string(),
        reason: None,
    }
}

/// Snapshot of stack `app` with ECS outputs.
pub fn snapshot(status: &str) -> StackSnapshot {
    StackSnapshot {
        name: "app".to_string(),
        status: status.to_string(),
        status_reason: None,
        outputs: BTreeMap::from([
            (SERVICE_OUTPUT.to_string(), "arn:aws:ecs:r:1:service/c/app".to_string()),
            (CLUSTER_OUTPUT.to_string(), "c".to_string()),
        ]),
        created: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

/// What the stack looks like on one poll.
#[derive(Debug, Clone)]
pub struct Tick {
    pub status: String,
    pub reason: Option<String>,
    pub events: Vec<StackEvent>,
}

impl Tick {
    pub fn new(status: &str, events: Vec<StackEvent>) -> Self {
        Self {
            status: status.to_string(),
            reason: None,
            events,
        }
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct StackScript {
    existing: Option<StackSnapshot>,
    ticks: Vec<Tick>,
    position: Option<usize>,
    reject: Option<String>,
    events_fail_after: Option<usize>,
    describes: usize,
    event_calls: usize,
    cursors: Vec<Option<String>>,
    submissions: Vec<(String, String, Tags)>,
}

impl StackScript {
    fn current(&self) -> Option<&Tick> {
        let index = self.position?;
        self.ticks.get(index).or_else(|| self.ticks.last())
    }
}

/// Stack service that replays one [`Tick`] per poll. After the script runs
/// out, the last tick repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStackService {
    script: Arc<Mutex<StackScript>>,
}

impl ScriptedStackService {
    /// `existing` is what `describe` returns before submission.
    pub fn new(existing: Option<StackSnapshot>) -> Self {
        Self {
            script: Arc::new(Mutex::new(StackScript {
                existing,
                ..StackScript::default()
            })),
        }
    }

    pub fn with_ticks(self, ticks: Vec<Tick>) -> Self {
        lock(&self.script).ticks = ticks;
        self
    }

    pub fn rejecting(self, message: &str) -> Self {
        lock(&self.script).reject = Some(message.to_string());
        self
    }

    /// Event listing fails on every call after the first `calls`.
    pub fn failing_events_after(self, calls: usize) -> Self {
        lock(&self.script).events_fail_after = Some(calls);
        self
    }

    /// Number of `describe` calls after submission.
    pub fn polls(&self) -> usize {
        lock(&self.script).describes
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        lock(&self.script).cursors.clone()
    }

    pub fn submissions(&self) -> Vec<(String, String, Tags)> {
        lock(&self.script).submissions.clone()
    }
}

impl StackService for ScriptedStackService {
    fn describe(&self, name: &str) -> Result<Option<StackSnapshot>> {
        let mut script = lock(&self.script);
        let Some(position) = script.position else {
            return Ok(script.existing.clone());
        };
        if script.describes > 0 {
            script.position = Some(position + 1);
        }
        script.describes += 1;
        Ok(script.current().map(|tick| StackSnapshot {
            name: name.to_string(),
            status_reason: tick.reason.clone(),
            ..snapshot(&tick.status)
        }))
    }

    fn submit(&self, submission: &Submission<'_>) -> Result<DeploymentToken> {
        let mut script = lock(&self.script);
        if let Some(message) = &script.reject {
            return Err(anyhow!("{message}"));
        }
        script.submissions.push((
            submission.stack_name.to_string(),
            submission.document.to_string(),
            submission.tags.clone(),
        ));
        script.position = Some(0);
        Ok(DeploymentToken::new("yeet-test"))
    }

    fn events_since(
        &self,
        _name: &str,
        cursor: Option<&str>,
        _token: &DeploymentToken,
    ) -> Result<Vec<StackEvent>> {
        let mut script = lock(&self.script);
        script.event_calls += 1;
        script.cursors.push(cursor.map(str::to_string));
        if script
            .events_fail_after
            .is_some_and(|limit| script.event_calls > limit)
        {
            return Err(anyhow!("Rate exceeded"));
        }
        Ok(script.current().map(|tick| tick.events.clone()).unwrap_or_default())
    }
}

#[derive(Debug)]
struct InspectorScript {
    result: std::result::Result<WorkloadReport, String>,
    calls: usize,
}

/// Workload inspector with a fixed answer that counts calls.
#[derive(Debug, Clone)]
pub struct ScriptedInspector {
    script: Arc<Mutex<InspectorScript>>,
}

impl ScriptedInspector {
    pub fn ok(report: WorkloadReport) -> Self {
        Self::with_result(Ok(report))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_result(Err(message.to_string()))
    }

    fn with_result(result: std::result::Result<WorkloadReport, String>) -> Self {
        Self {
            script: Arc::new(Mutex::new(InspectorScript { result, calls: 0 })),
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.script).calls
    }
}

impl WorkloadInspector for ScriptedInspector {
    fn inspect(&self, _outputs: &BTreeMap<String, String>) -> Result<WorkloadReport> {
        let mut script = lock(&self.script);
        script.calls += 1;
        script.result.clone().map_err(|message| anyhow!("{message}"))
    }
}

/// Context for resolver tests: real secrets fake, idle stack collaborators.
pub fn fake_context(secrets: MapSecretStore) -> Context {
    Context {
        region: TEST_REGION.to_string(),
        buildkite: false,
        secrets: Arc::new(secrets),
        stacks: Arc::new(ScriptedStackService::default()),
        inspector: Arc::new(ScriptedInspector::ok(WorkloadReport::default())),
        clock: Arc::new(ManualClock::default()),
    }
}

/// Context for deploy tests with a manual clock.
pub fn scripted_context(
    stacks: ScriptedStackService,
    inspector: ScriptedInspector,
    buildkite: bool,
) -> Context {
    Context {
        region: TEST_REGION.to_string(),
        buildkite,
        secrets: Arc::new(MapSecretStore::default()),
        stacks: Arc::new(stacks),
        inspector: Arc::new(inspector),
        clock: Arc::new(ManualClock::default()),
    }
}

/// A stand-in `aws` executable written as a shell script.
#[cfg(unix)]
pub struct FakeAwsCli {
    dir: tempfile::TempDir,
    program: std::path::PathBuf,
}

#[cfg(unix)]
impl FakeAwsCli {
    /// Script body runs with the CLI arguments as `$@`.
    pub fn script(body: &str) -> Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let program = dir.path().join("aws");
        std::fs::write(&program, format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir, program })
    }

    /// Prints `{"args": [...]}` with the arguments it received.
    pub fn echo_args() -> Result<Self> {
        Self::script(
            r#"printf '{"args":['
sep=''
for a in "$@"; do printf '%s"%s"' "$sep" "$a"; sep=','; done
printf ']}'"#,
        )
    }

    /// Exits non-zero with `stderr`.
    pub fn failing(stderr: &str) -> Result<Self> {
        Self::script(&format!("echo '{stderr}' >&2\nexit 254"))
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn client(&self, region: &str) -> crate::io::aws::AwsCli {
        let settings = crate::io::settings::YeetSettings {
            aws_cli: self.program.display().to_string(),
            command_timeout_secs: 10,
            ..Default::default()
        };
        crate::io::aws::AwsCli::new(&settings, region)
    }
}
