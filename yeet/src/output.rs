//! `yeet output` views of a stack configuration.

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result, bail};
use clap::ValueEnum;

use crate::context::Context;
use crate::render::DocumentRenderer;
use crate::report::write_report;
use crate::resolve::resolve_files;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    /// The rendered CloudFormation document.
    Template,
    /// The resolved configuration as YAML.
    Inputs,
    /// Tasks currently running for the deployed stack.
    Running,
}

pub fn run_output<W: Write>(
    ctx: &Context,
    kind: OutputKind,
    files: &[impl AsRef<Path>],
    out: &mut W,
) -> Result<()> {
    let config = resolve_files(ctx, files).context("failed to read values")?;
    match kind {
        OutputKind::Template => {
            let document = DocumentRenderer::new()?
                .render(&config)
                .context("failed generate template")?;
            writeln!(out, "{document}")?;
        }
        OutputKind::Inputs => {
            let yaml = config.to_yaml().context("failed to marshal inputs")?;
            writeln!(out, "{yaml}")?;
        }
        OutputKind::Running => {
            let name = config.stack_name()?;
            let Some(snapshot) = ctx.stacks.describe(name)? else {
                bail!("stack doesn't exist");
            };
            let report = ctx
                .inspector
                .inspect(&snapshot.outputs)
                .context("cant describe service")?;
            write_report(&report, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ecs::{TaskSummary, WorkloadReport};
    use crate::test_support::{ScriptedInspector, ScriptedStackService, scripted_context, snapshot};
    use std::fs;

    fn config_file(dir: &Path, yaml: &str) -> std::path::PathBuf {
        let path = dir.join("app.yml");
        fs::write(&path, yaml).expect("write");
        path
    }

    fn output(ctx: &Context, kind: OutputKind, file: &Path) -> Result<String> {
        let mut out = Vec::new();
        run_output(ctx, kind, &[file], &mut out)?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn inputs_print_resolved_yaml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = config_file(temp.path(), "name: billing\n");
        let ctx = scripted_context(
            ScriptedStackService::default(),
            ScriptedInspector::ok(WorkloadReport::default()),
            false,
        );
        let text = output(&ctx, OutputKind::Inputs, &file).expect("output");
        assert!(text.contains("name: billing\n"));
        assert!(text.contains("launch_type: FARGATE\n"));
        assert!(!text.contains("_defaults"));
    }

    #[test]
    fn template_prints_rendered_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = config_file(temp.path(), "name: billing\n");
        let ctx = scripted_context(
            ScriptedStackService::default(),
            ScriptedInspector::ok(WorkloadReport::default()),
            false,
        );
        let text = output(&ctx, OutputKind::Template, &file).expect("output");
        assert!(text.starts_with("AWSTemplateFormatVersion"));
        assert!(text.contains("LogGroupName: \"/yeet/billing\""));
    }

    #[test]
    fn running_requires_existing_stack() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = config_file(temp.path(), "name: billing\n");
        let ctx = scripted_context(
            ScriptedStackService::new(None),
            ScriptedInspector::ok(WorkloadReport::default()),
            false,
        );
        let err = output(&ctx, OutputKind::Running, &file).expect_err("should fail");
        assert_eq!(err.to_string(), "stack doesn't exist");
    }

    #[test]
    fn running_reports_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = config_file(temp.path(), "name: billing\n");
        let report = WorkloadReport {
            tasks: vec![TaskSummary {
                task_id: "t1".to_string(),
                version: "billing:3".to_string(),
                created_at: None,
            }],
            definitions: Vec::new(),
        };
        let ctx = scripted_context(
            ScriptedStackService::new(Some(snapshot("UPDATE_COMPLETE"))),
            ScriptedInspector::ok(report),
            false,
        );
        let text = output(&ctx, OutputKind::Running, &file).expect("output");
        assert!(text.contains("| t1 |"));
    }

    #[test]
    fn running_without_name_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = config_file(temp.path(), "cpu: '512'\n");
        let ctx = scripted_context(
            ScriptedStackService::new(Some(snapshot("UPDATE_COMPLETE"))),
            ScriptedInspector::ok(WorkloadReport::default()),
            false,
        );
        let err = output(&ctx, OutputKind::Running, &file).expect_err("should fail");
        assert_eq!(err.to_string(), "no stack name found");
    }
}
