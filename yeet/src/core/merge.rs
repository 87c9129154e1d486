//! Non-destructive deep merge of configuration trees.
//!
//! `right` is merged into `left` and `left` always wins: a key already present
//! on the left keeps its value unless both sides are mappings, in which case
//! the merge recurses. A mapping on one side and a scalar on the other keeps
//! the left value and silently drops the right one. The only exception is the
//! include list, which is concatenated and deduplicated so that no fragment
//! is ever lost.

use std::collections::btree_map::Entry;
use std::collections::HashSet;

use crate::core::value::{ConfigTree, ConfigValue, INCLUDE_KEY};
use crate::error::YeetError;

/// Merge `right` into `left`, never replacing a value `left` already holds.
pub fn merge_into(left: &mut ConfigTree, right: ConfigTree) -> Result<(), YeetError> {
    merge_at(left, right, "")
}

/// Owned variant of [`merge_into`].
pub fn merge(mut left: ConfigTree, right: ConfigTree) -> Result<ConfigTree, YeetError> {
    merge_into(&mut left, right)?;
    Ok(left)
}

fn merge_at(left: &mut ConfigTree, right: ConfigTree, prefix: &str) -> Result<(), YeetError> {
    for (key, right_value) in right {
        match left.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(right_value);
            }
            Entry::Occupied(mut slot) => {
                let path = key_path(prefix, slot.key());
                if slot.key() == INCLUDE_KEY {
                    let merged = concat_unique(slot.get(), &right_value)
                        .map_err(|msg| YeetError::merge(&path, msg))?;
                    slot.insert(ConfigValue::Seq(
                        merged.into_iter().map(ConfigValue::String).collect(),
                    ));
                    continue;
                }
                if let (ConfigValue::Map(left_map), ConfigValue::Map(right_map)) =
                    (slot.get_mut(), right_value)
                {
                    merge_at(left_map, right_map, &path)?;
                }
            }
        }
    }
    Ok(())
}

/// Concatenate two string lists, keeping the first occurrence of each entry.
fn concat_unique(left: &ConfigValue, right: &ConfigValue) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for entry in left.to_string_list()?.into_iter().chain(right.to_string_list()?) {
        if seen.insert(entry.clone()) {
            merged.push(entry);
        }
    }
    Ok(merged)
}

pub(crate) fn key_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
