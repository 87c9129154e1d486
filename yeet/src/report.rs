//! Operator-facing tables for a [`WorkloadReport`].

use std::io::{self, Write};

use chrono::{DateTime, Local};

use crate::io::ecs::{PROVISIONING, WorkloadReport};

pub const NO_TASKS: &str = "No tasks were found running, was this intentional?";

/// Print running tasks followed by each active task definition.
pub fn write_report<W: Write>(report: &WorkloadReport, out: &mut W) -> io::Result<()> {
    if report.tasks.is_empty() {
        writeln!(out, "{NO_TASKS}")?;
        return Ok(());
    }

    writeln!(out, "Running Tasks:")?;
    writeln!(
        out,
        " #   | Task ID                          | Task Version                        | Created at"
    )?;
    writeln!(
        out,
        "-----+----------------------------------+-------------------------------------+-----------------------------------"
    )?;
    for (index, task) in report.tasks.iter().enumerate() {
        let created = task
            .created_at
            .as_deref()
            .map_or_else(|| PROVISIONING.to_string(), local_time);
        let position = (index + 1).to_string();
        writeln!(
            out,
            " {:>3.3} | {} | {:<35} | {}",
            position, task.task_id, task.version, created
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Active Task Definitions:")?;
    for def in &report.definitions {
        writeln!(out, " Task Version                       | CPU  | Mem  | Date")?;
        writeln!(
            out,
            "------------------------------------+------+------+-----------------------------------"
        )?;
        let registered = def.registered_at.as_deref().map(local_time).unwrap_or_default();
        writeln!(
            out,
            " {:<35}| {:>4} | {:>4} | {}",
            def.version, def.cpu, def.memory, registered
        )?;
        writeln!(out)?;
        writeln!(out, "Containers for {}", def.version)?;
        writeln!(out, " Name                                | Image")?;
        writeln!(
            out,
            "-------------------------------------+-------------------------------------"
        )?;
        for container in &def.containers {
            writeln!(out, " {:<35} | {}", container.name, container.image)?;
        }
    }
    Ok(())
}

/// RFC 3339 timestamp in the local zone. Unparseable input is shown as-is.
fn local_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.f %z")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}
