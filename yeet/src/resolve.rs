//! Configuration resolution pipeline.
//!
//! Order matters and is fixed:
//!
//! 1. parse the embedded defaults
//! 2. merge the caller's files, earliest file wins
//! 3. expand `_include`
//! 4. fill `aws.region` from the invocation region when an `aws` section omits it
//! 5. merge the embedded defaults at lowest precedence
//! 6. self-template to a fixed point
//! 7. propagate `_defaults`
//! 8. prune nulls
//!
//! `_defaults` runs after templating so that per-branch defaults can hold
//! template references resolved in the context of the whole tree.

use std::path::Path;

use anyhow::{Context as _, Result, anyhow};
use tracing::{info, instrument};

use crate::context::Context;
use crate::core::defaults::apply_defaults;
use crate::core::fixed_point::IterationPolicy;
use crate::core::merge::merge_into;
use crate::core::value::{
    ConfigTree, ConfigValue, INCLUDE_KEY, parse_tree, prune_nulls, to_yaml,
};
use crate::error::YeetError;
use crate::include::resolve_includes;
use crate::io::sources::load_yaml_file;
use crate::template::{config_environment, template_config};

/// Baseline values compiled into the binary.
pub const DEFAULTS: &str = include_str!("../templates/defaults.yml");

const AWS_KEY: &str = "aws";
const REGION_KEY: &str = "region";
const NAME_KEY: &str = "name";

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig(ConfigTree);

impl ResolvedConfig {
    pub fn tree(&self) -> &ConfigTree {
        &self.0
    }

    /// The top-level `name`, which doubles as the stack name.
    pub fn stack_name(&self) -> Result<&str> {
        self.0
            .get(NAME_KEY)
            .and_then(ConfigValue::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("no stack name found"))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(to_yaml(&self.0)?)
    }
}

/// Resolve the given config files with the embedded defaults.
pub fn resolve_files(ctx: &Context, files: &[impl AsRef<Path>]) -> Result<ResolvedConfig> {
    let mut trees = Vec::with_capacity(files.len());
    for file in files {
        trees.push(load_yaml_file(file.as_ref())?);
    }
    resolve(ctx, DEFAULTS, trees)
}

/// Run the pipeline over already-parsed inputs.
#[instrument(skip_all, fields(inputs = inputs.len(), region = %ctx.region))]
pub fn resolve(ctx: &Context, defaults: &str, inputs: Vec<ConfigTree>) -> Result<ResolvedConfig> {
    let policy = IterationPolicy::default();
    let defaults = parse_tree(defaults, "embedded defaults")?;

    let mut tree = ConfigTree::new();
    for input in inputs {
        merge_into(&mut tree, input).context("unable to merge config files")?;
    }

    let mut tree = resolve_includes(tree, ctx.secrets.as_ref(), policy)
        .context("unable to load _includes")?;
    if let Some(includes) = tree.get_mut(INCLUDE_KEY) {
        *includes = ConfigValue::Null;
    }

    inject_region(&mut tree, &ctx.region)?;

    merge_into(&mut tree, defaults).context("unable to merge yeet defaults")?;

    let env = config_environment(ctx.secrets.clone())?;
    let mut tree = template_config(tree, &env, policy).context("unable to template config")?;

    apply_defaults(&mut tree).context("unable to load default keys")?;
    prune_nulls(&mut tree);

    info!(keys = tree.len(), "config resolved");
    Ok(ResolvedConfig(tree))
}

/// An `aws` section without `region` gets the invocation region.
fn inject_region(tree: &mut ConfigTree, region: &str) -> Result<(), YeetError> {
    let Some(aws) = tree.get(AWS_KEY) else {
        return Ok(());
    };
    let Some(section) = aws.as_map() else {
        return Err(YeetError::merge(
            AWS_KEY,
            format!("Yeet's `.aws` config key seems malformed, found a {}", aws.kind()),
        ));
    };
    if section.contains_key(REGION_KEY) {
        return Ok(());
    }
    let region_tree = ConfigTree::from([(
        AWS_KEY.to_string(),
        ConfigValue::Map(ConfigTree::from([(
            REGION_KEY.to_string(),
            ConfigValue::String(region.to_string()),
        )])),
    )]);
    merge_into(tree, region_tree)
}
