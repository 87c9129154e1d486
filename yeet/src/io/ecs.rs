//! Running-workload inspection for ECS service stacks.
//!
//! The stack's `Service` and `Cluster` outputs locate the service. We collect
//! its tasks and the task definitions they run into a [`WorkloadReport`];
//! rendering lives in [`crate::report`].

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::io::aws::AwsCli;

pub const SERVICE_OUTPUT: &str = "Service";
pub const CLUSTER_OUTPUT: &str = "Cluster";

/// Status of a task whose container instance is not placed yet.
pub const PROVISIONING: &str = "PROVISIONING";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadReport {
    pub tasks: Vec<TaskSummary>,
    pub definitions: Vec<TaskDefinitionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub task_id: String,
    /// `family:revision` of the task definition.
    pub version: String,
    /// `None` while the task is provisioning.
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionSummary {
    pub version: String,
    pub cpu: String,
    pub memory: String,
    pub registered_at: Option<String>,
    pub containers: Vec<ContainerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
}

/// Reads what a stack is currently running. Never mutates anything.
pub trait WorkloadInspector: Send + Sync {
    fn inspect(&self, outputs: &BTreeMap<String, String>) -> Result<WorkloadReport>;
}

/// ECS via the AWS CLI.
#[derive(Debug, Clone)]
pub struct Ecs {
    aws: AwsCli,
}

impl Ecs {
    pub fn new(aws: AwsCli) -> Self {
        Self { aws }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeServicesOutput {
    #[serde(default)]
    services: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawService {
    service_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksOutput {
    #[serde(default)]
    task_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTasksOutput {
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    task_arn: String,
    task_definition_arn: String,
    #[serde(default)]
    last_status: String,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTaskDefinitionOutput {
    task_definition: RawTaskDefinition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskDefinition {
    #[serde(default)]
    cpu: String,
    #[serde(default)]
    memory: String,
    registered_at: Option<String>,
    #[serde(default)]
    container_definitions: Vec<RawContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContainer {
    name: String,
    #[serde(default)]
    image: String,
}

/// Text after the last `/` of an ARN.
fn arn_tail(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

fn required_output<'a>(outputs: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    outputs
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("no {} in stack outputs", key.to_lowercase()))
}

impl WorkloadInspector for Ecs {
    #[instrument(skip_all)]
    fn inspect(&self, outputs: &BTreeMap<String, String>) -> Result<WorkloadReport> {
        let service_arn = required_output(outputs, SERVICE_OUTPUT)?;
        let cluster_arn = required_output(outputs, CLUSTER_OUTPUT)?;

        let services: DescribeServicesOutput = self
            .aws
            .call(
                "ecs",
                "describe-services",
                &["--cluster", cluster_arn, "--services", service_arn],
            )
            .context("failed to get service")?;
        if services.services.len() != 1 {
            bail!(
                "only a single ECS Service should be returned, {} found",
                services.services.len()
            );
        }
        let service_name = &services.services[0].service_name;

        let listed: ListTasksOutput = self
            .aws
            .call(
                "ecs",
                "list-tasks",
                &["--cluster", cluster_arn, "--service-name", service_name],
            )
            .context("failed to get task ARNs")?;
        debug!(service = %service_name, tasks = listed.task_arns.len(), "tasks listed");
        if listed.task_arns.is_empty() {
            return Ok(WorkloadReport::default());
        }

        let mut args = vec!["--cluster", cluster_arn, "--tasks"];
        args.extend(listed.task_arns.iter().map(String::as_str));
        let described: DescribeTasksOutput = self
            .aws
            .call("ecs", "describe-tasks", &args)
            .context("failed to describe tasks")?;

        let mut report = WorkloadReport::default();
        let mut definitions = BTreeMap::new();
        for task in described.tasks {
            let version = arn_tail(&task.task_definition_arn).to_string();
            definitions.insert(task.task_definition_arn.clone(), version.clone());
            report.tasks.push(TaskSummary {
                task_id: arn_tail(&task.task_arn).to_string(),
                version,
                created_at: if task.last_status == PROVISIONING {
                    None
                } else {
                    task.created_at
                },
            });
        }

        for (arn, version) in definitions {
            let output: DescribeTaskDefinitionOutput = self
                .aws
                .call(
                    "ecs",
                    "describe-task-definition",
                    &["--task-definition", &arn],
                )
                .with_context(|| format!("failed to describe task definition ({arn})"))?;
            let def = output.task_definition;
            report.definitions.push(TaskDefinitionSummary {
                version,
                cpu: def.cpu,
                memory: def.memory,
                registered_at: def.registered_at,
                containers: def
                    .container_definitions
                    .into_iter()
                    .map(|c| ContainerSummary {
                        name: c.name,
                        image: c.image,
                    })
                    .collect(),
            });
        }
        Ok(report)
    }
}
