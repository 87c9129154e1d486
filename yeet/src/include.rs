//! `_include` expansion.
//!
//! Each entry of the top-level `_include` list names a fragment: a YAML file
//! path, or `ssm://NAME` for a parameter holding YAML. Fragments merge in at
//! lower precedence than whatever the tree already holds, and may declare
//! further includes. Every locator loads at most once per resolution, which
//! is also what makes cyclic includes terminate. `_include` is only honoured
//! at the top level; anywhere deeper it is rejected.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context as _;
use tracing::{debug, info, instrument, warn};

use crate::core::fixed_point::{IterationPolicy, Step, iterate};
use crate::core::merge::{key_path, merge_into};
use crate::core::value::{ConfigTree, ConfigValue, INCLUDE_KEY, parse_tree};
use crate::error::YeetError;
use crate::io::secrets::SecretStore;
use crate::io::sources::load_yaml_file;

pub const SECRET_PREFIX: &str = "ssm://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Path to a YAML file, relative to the working directory.
    File(PathBuf),
    /// Parameter store name whose value is YAML.
    Secret(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(SECRET_PREFIX) {
            Some(name) => Self::Secret(name.to_string()),
            None => Self::File(PathBuf::from(raw)),
        }
    }

    fn load(&self, secrets: &dyn SecretStore) -> anyhow::Result<ConfigTree> {
        match self {
            Self::File(path) => load_yaml_file(path),
            Self::Secret(name) => {
                let text = secrets.get_parameter(name)?;
                parse_tree(&text, &format!("{SECRET_PREFIX}{name}"))
                    .with_context(|| format!("failed to unmarshal ssm param {name} yaml"))
            }
        }
    }
}

/// Load every fragment reachable from the tree's `_include` list.
///
/// The `_include` key is left in place; the resolver clears it once it has
/// served its purpose.
#[instrument(skip_all)]
pub fn resolve_includes(
    tree: ConfigTree,
    secrets: &dyn SecretStore,
    policy: IterationPolicy,
) -> Result<ConfigTree, YeetError> {
    if tree.get(INCLUDE_KEY).is_none_or(ConfigValue::is_null) {
        reject_nested_includes(&tree)?;
        return Ok(tree);
    }

    let outcome = iterate(policy, (tree, BTreeSet::new()), |(mut tree, mut loaded)| {
        let declared = include_list(&tree)?;
        let mut changed = false;
        for raw in declared {
            if loaded.contains(&raw) {
                continue;
            }
            changed = true;
            let fragment = Locator::parse(&raw)
                .load(secrets)
                .map_err(|err| YeetError::include(&raw, err))?;
            debug!(locator = %raw, keys = fragment.len(), "include loaded");
            merge_into(&mut tree, fragment)?;
            loaded.insert(raw);
        }
        Ok::<_, YeetError>(if changed {
            Step::Changed((tree, loaded))
        } else {
            Step::Settled((tree, loaded))
        })
    })?;

    let (tree, loaded) = outcome.value;
    if outcome.converged {
        info!(count = loaded.len(), iterations = outcome.iterations, "includes resolved");
    } else {
        warn!(
            count = loaded.len(),
            max_iterations = policy.max_iterations,
            "include expansion stopped at iteration cap"
        );
    }
    reject_nested_includes(&tree)?;
    Ok(tree)
}

fn reject_nested_includes(tree: &ConfigTree) -> Result<(), YeetError> {
    for (key, value) in tree {
        reject_includes_below(value, key)?;
    }
    Ok(())
}

fn reject_includes_below(value: &ConfigValue, path: &str) -> Result<(), YeetError> {
    match value {
        ConfigValue::Map(map) => {
            if map.get(INCLUDE_KEY).is_some_and(|v| !v.is_null()) {
                return Err(YeetError::merge(
                    key_path(path, INCLUDE_KEY),
                    "_include is only supported at the top level",
                ));
            }
            for (key, child) in map {
                reject_includes_below(child, &key_path(path, key))?;
            }
        }
        ConfigValue::Seq(items) => {
            for (index, item) in items.iter().enumerate() {
                reject_includes_below(item, &format!("{path}[{index}]"))?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn include_list(tree: &ConfigTree) -> Result<Vec<String>, YeetError> {
    tree.get(INCLUDE_KEY)
        .map_or(Ok(Vec::new()), ConfigValue::to_string_list)
        .map_err(|msg| YeetError::merge(INCLUDE_KEY, msg))
}
