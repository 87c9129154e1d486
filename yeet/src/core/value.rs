//! Decoded configuration values.
//!
//! YAML is parsed into [`serde_yaml::Value`] and converted into [`ConfigValue`],
//! a closed sum type. Keys are always strings; non-string YAML keys are
//! stringified on the way in. Plain scalars spelled as YAML 1.1 booleans
//! (`yes`, `off`, ...) decode as booleans, which is how existing config files
//! are written. Maps are `BTreeMap`s so serialization is stable, which the
//! self-templating pass relies on to detect a fixed point.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_yaml::Value as Yaml;

use crate::error::YeetError;

/// Key holding the list of fragments to include.
pub const INCLUDE_KEY: &str = "_include";
/// Key holding a mapping merged into every sibling mapping.
pub const DEFAULTS_KEY: &str = "_defaults";

pub type ConfigTree = BTreeMap<String, ConfigValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<ConfigValue>),
    Map(ConfigTree),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_map(&self) -> Option<&ConfigTree> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ConfigTree> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "mapping",
        }
    }

    /// Render a scalar the way it reads in YAML. Returns `None` for
    /// null, sequences and mappings.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Null | Self::Seq(_) | Self::Map(_) => None,
        }
    }

    /// Coerce into a list of strings. Scalars inside the sequence are
    /// stringified; null counts as an empty list.
    pub fn to_string_list(&self) -> Result<Vec<String>, String> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::Seq(items) => items
                .iter()
                .map(|item| {
                    item.scalar_text().ok_or_else(|| {
                        format!("expected a list of strings, found a {} item", item.kind())
                    })
                })
                .collect(),
            other => Err(format!(
                "expected a list of strings, found a {}",
                other.kind()
            )),
        }
    }
}

impl TryFrom<Yaml> for ConfigValue {
    type Error = String;

    fn try_from(value: Yaml) -> Result<Self, Self::Error> {
        Ok(match value {
            Yaml::Null => Self::Null,
            Yaml::Bool(b) => Self::Bool(b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().ok_or_else(|| format!("unsupported number {n}"))?),
            },
            Yaml::String(s) => match yaml11_bool(&s) {
                Some(b) => Self::Bool(b),
                None => Self::String(s),
            },
            Yaml::Sequence(items) => Self::Seq(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Yaml::Mapping(mapping) => {
                let mut tree = ConfigTree::new();
                for (key, value) in mapping {
                    tree.insert(key_text(key)?, Self::try_from(value)?);
                }
                Self::Map(tree)
            }
            Yaml::Tagged(tagged) => Self::try_from(tagged.value)?,
        })
    }
}

/// YAML 1.1 boolean spellings. The YAML 1.2 parser reads these as strings.
pub(crate) fn yaml11_bool(s: &str) -> Option<bool> {
    match s {
        "y" | "Y" | "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            Some(true)
        }
        "n" | "N" | "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off"
        | "OFF" => Some(false),
        _ => None,
    }
}

fn key_text(key: Yaml) -> Result<String, String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => key_text(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => {
            Err("mapping keys must be scalars".to_string())
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(tree) => {
                let mut map = serializer.serialize_map(Some(tree.len()))?;
                for (key, value) in tree {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Parse YAML text into a tree. An empty document yields an empty tree;
/// any other non-mapping document is rejected.
pub fn parse_tree(text: &str, origin: &str) -> Result<ConfigTree, YeetError> {
    let yaml: Yaml = serde_yaml::from_str(text).map_err(|err| YeetError::parse(origin, err))?;
    match ConfigValue::try_from(yaml).map_err(|msg| YeetError::parse(origin, msg))? {
        ConfigValue::Null => Ok(ConfigTree::new()),
        ConfigValue::Map(tree) => Ok(tree),
        other => Err(YeetError::parse(
            origin,
            format!("expected a mapping at the top level, found a {}", other.kind()),
        )),
    }
}

pub fn to_yaml(tree: &ConfigTree) -> Result<String, YeetError> {
    serde_yaml::to_string(tree).map_err(|err| YeetError::parse("config tree", err))
}

/// Remove every key whose value is null, recursing into nested mappings and
/// into mappings held in sequences. Null sequence items are kept.
pub fn prune_nulls(tree: &mut ConfigTree) {
    tree.retain(|_, value| !value.is_null());
    for value in tree.values_mut() {
        prune_below(value);
    }
}

fn prune_below(value: &mut ConfigValue) {
    match value {
        ConfigValue::Map(child) => prune_nulls(child),
        ConfigValue::Seq(items) => items.iter_mut().for_each(prune_below),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_mapping() {
        let tree = parse_tree("a:\n  b: 1\n  c: [x, 2]\n", "test").expect("parse");
        let a = tree["a"].as_map().expect("map");
        assert_eq!(a["b"], ConfigValue::Int(1));
        assert_eq!(
            a["c"],
            ConfigValue::Seq(vec![
                ConfigValue::String("x".to_string()),
                ConfigValue::Int(2)
            ])
        );
    }

    #[test]
    fn empty_document_is_empty_tree() {
        assert!(parse_tree("", "test").expect("parse").is_empty());
        assert!(parse_tree("# only a comment\n", "test").expect("parse").is_empty());
    }

    #[test]
    fn non_mapping_document_is_parse_error() {
        let err = parse_tree("- a\n- b\n", "list.yml").expect_err("should fail");
        assert!(matches!(err, YeetError::Parse { .. }));
        assert!(err.to_string().contains("list.yml"));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_tree("a: [unclosed\n", "bad.yml").expect_err("should fail");
        assert!(matches!(err, YeetError::Parse { .. }));
    }

    #[test]
    fn numeric_keys_are_stringified() {
        let tree = parse_tree("80: http\ntrue: yes\n", "test").expect("parse");
        assert_eq!(tree["80"], ConfigValue::String("http".to_string()));
        assert!(tree.contains_key("true"));
    }

    #[test]
    fn yaml11_boolean_words_decode_as_booleans() {
        let tree = parse_tree(
            "force: no\nbreaker: On\nflags: [yes, off]\nname: nobody\n",
            "test",
        )
        .expect("parse");
        assert_eq!(tree["force"], ConfigValue::Bool(false));
        assert_eq!(tree["breaker"], ConfigValue::Bool(true));
        assert_eq!(
            tree["flags"],
            ConfigValue::Seq(vec![ConfigValue::Bool(true), ConfigValue::Bool(false)])
        );
        assert_eq!(tree["name"], ConfigValue::String("nobody".to_string()));
    }

    #[test]
    fn string_list_coercion() {
        let list = ConfigValue::Seq(vec![
            ConfigValue::String("a.yml".to_string()),
            ConfigValue::Int(3),
        ]);
        assert_eq!(list.to_string_list().expect("list"), vec!["a.yml", "3"]);
        assert!(ConfigValue::Null.to_string_list().expect("null").is_empty());
        assert!(
            ConfigValue::String("a.yml".to_string())
                .to_string_list()
                .is_err()
        );
        assert!(
            ConfigValue::Seq(vec![ConfigValue::Map(ConfigTree::new())])
                .to_string_list()
                .is_err()
        );
    }

    #[test]
    fn prune_removes_nested_nulls() {
        let mut tree = parse_tree("a: ~\nb:\n  c: null\n  d: 1\n", "test").expect("parse");
        prune_nulls(&mut tree);
        assert!(!tree.contains_key("a"));
        let b = tree["b"].as_map().expect("map");
        assert!(!b.contains_key("c"));
        assert_eq!(b["d"], ConfigValue::Int(1));
    }

    #[test]
    fn prune_reaches_mappings_in_sequences() {
        let mut tree = parse_tree("items:\n  - a: ~\n    b: 1\n  - ~\n", "test").expect("parse");
        prune_nulls(&mut tree);
        assert_eq!(tree, parse_tree("items:\n  - b: 1\n  - ~\n", "test").expect("parse"));
    }

    #[test]
    fn serialization_is_key_sorted() {
        let tree = parse_tree("z: 1\na: 2\n", "test").expect("parse");
        assert_eq!(to_yaml(&tree).expect("yaml"), "a: 2\nz: 1\n");
    }
}
