//! Stack tag normalization.
//!
//! Tag files are flat YAML mappings. Every value ends up as a string:
//! booleans become `True`/`False` and lists are joined with commas.

use std::collections::BTreeMap;

use crate::core::value::{ConfigTree, ConfigValue, yaml11_bool};
use crate::error::YeetError;

pub type Tags = BTreeMap<String, String>;

/// Normalize a parsed tag file into string tags.
pub fn normalize_tags(tree: ConfigTree, origin: &str) -> Result<Tags, YeetError> {
    let mut tags = Tags::new();
    for (key, value) in tree {
        let text = match &value {
            ConfigValue::Seq(items) => items
                .iter()
                .map(|item| {
                    tag_scalar(item).ok_or_else(|| bad_value(origin, &key, item))
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(","),
            other => tag_scalar(other).ok_or_else(|| bad_value(origin, &key, other))?,
        };
        tags.insert(key, text);
    }
    Ok(tags)
}

fn tag_scalar(value: &ConfigValue) -> Option<String> {
    match value {
        ConfigValue::Bool(b) => Some(bool_text(*b).to_string()),
        ConfigValue::String(s) => Some(match yaml11_bool(s) {
            Some(b) => bool_text(b).to_string(),
            None => s.clone(),
        }),
        other => other.scalar_text(),
    }
}

fn bool_text(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

fn bad_value(origin: &str, key: &str, value: &ConfigValue) -> YeetError {
    YeetError::parse(
        origin,
        format!("tag `{key}` has an unsupported {} value", value.kind()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::parse_tree;

    fn tags(yaml: &str) -> Result<Tags, YeetError> {
        normalize_tags(parse_tree(yaml, "tags.yml").expect("parse"), "tags.yml")
    }

    #[test]
    fn yes_becomes_true() {
        let out = tags("env: yes\n").expect("tags");
        assert_eq!(out, Tags::from([("env".to_string(), "True".to_string())]));
    }

    #[test]
    fn booleans_are_title_cased() {
        let out = tags("a: true\nb: false\nc: off\n").expect("tags");
        assert_eq!(out["a"], "True");
        assert_eq!(out["b"], "False");
        assert_eq!(out["c"], "False");
    }

    #[test]
    fn lists_join_with_commas() {
        let out = tags("owners:\n  - team-a\n  - team-b\n").expect("tags");
        assert_eq!(out["owners"], "team-a,team-b");
    }

    #[test]
    fn plain_strings_and_numbers_pass_through() {
        let out = tags("service: billing\ncost_centre: 4200\n").expect("tags");
        assert_eq!(out["service"], "billing");
        assert_eq!(out["cost_centre"], "4200");
    }

    #[test]
    fn nested_mapping_is_rejected_with_key() {
        let err = tags("bad:\n  nested: 1\n").expect_err("should fail");
        assert!(err.to_string().contains("tag `bad`"));
    }
}
