//! `_defaults` propagation.
//!
//! A `_defaults` mapping at any level is merged, at lowest precedence, into
//! every sibling mapping at that level. The `_defaults` key itself is cleared
//! to null and disappears when nulls are pruned. Mappings inside sequences
//! are walked too.

use crate::core::merge::{key_path, merge_into};
use crate::core::value::{ConfigTree, ConfigValue, DEFAULTS_KEY};
use crate::error::YeetError;

pub fn apply_defaults(tree: &mut ConfigTree) -> Result<(), YeetError> {
    apply_at(tree, "")
}

fn apply_at(tree: &mut ConfigTree, prefix: &str) -> Result<(), YeetError> {
    let defaults = match tree.get(DEFAULTS_KEY) {
        None | Some(ConfigValue::Null) => None,
        Some(ConfigValue::Map(defaults)) => Some(defaults.clone()),
        Some(other) => {
            return Err(YeetError::merge(
                key_path(prefix, DEFAULTS_KEY),
                format!("value in _defaults must be a mapping, found a {}", other.kind()),
            ));
        }
    };

    if let Some(defaults) = defaults {
        for (key, value) in tree.iter_mut() {
            if key == DEFAULTS_KEY {
                continue;
            }
            if let Some(sibling) = value.as_map_mut() {
                merge_into(sibling, defaults.clone())?;
            }
        }
        tree.insert(DEFAULTS_KEY.to_string(), ConfigValue::Null);
    }

    for (key, value) in tree.iter_mut() {
        descend(value, &key_path(prefix, key))?;
    }
    Ok(())
}

/// Mappings nested anywhere below, including inside sequences, get their own
/// `_defaults` applied.
fn descend(value: &mut ConfigValue, path: &str) -> Result<(), YeetError> {
    match value {
        ConfigValue::Map(child) => apply_at(child, path),
        ConfigValue::Seq(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                descend(item, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
