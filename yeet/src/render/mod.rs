//! Deployment document rendering.
//!
//! The document template uses the standard `{{ }}` syntax and the helpers in
//! [`functions`]. Unknown keys render as empty rather than failing, so
//! optional sections can be tested with a plain `{% if %}`.

mod functions;

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, Value};
use regex::Regex;
use tracing::{debug, instrument};

use crate::resolve::ResolvedConfig;

/// ECS service stack template compiled into the binary.
pub const DOCUMENT_TEMPLATE: &str = include_str!("../../templates/ecs.yml.j2");

const TEMPLATE_NAME: &str = "ecs";

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid blank line regex"));

/// Template engine wrapper around minijinja.
pub struct DocumentRenderer {
    env: Environment<'static>,
}

impl DocumentRenderer {
    pub fn new() -> Result<Self> {
        Self::with_template(DOCUMENT_TEMPLATE)
    }

    pub fn with_template(source: &'static str) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        functions::register(&mut env);
        env.add_template(TEMPLATE_NAME, source)
            .context("error parsing template")?;
        Ok(Self { env })
    }

    #[instrument(skip_all)]
    pub fn render(&self, config: &ResolvedConfig) -> Result<String> {
        let template = self.env.get_template(TEMPLATE_NAME)?;
        let rendered = template
            .render(Value::from_serialize(config.tree()))
            .context("failed to execute template")?;
        let document = collapse_blank_lines(&rendered);
        debug!(bytes = document.len(), "document rendered");
        Ok(document)
    }
}

/// Replace every run of blank or whitespace-only lines with a single newline.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n").into_owned()
}
