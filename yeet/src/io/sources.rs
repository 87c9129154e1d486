//! Reading configuration and tag files from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::tags::{Tags, normalize_tags};
use crate::core::value::{ConfigTree, parse_tree};

/// Read and parse a YAML configuration file.
pub fn load_yaml_file(path: &Path) -> Result<ConfigTree> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let tree = parse_tree(&contents, &path.display().to_string())?;
    debug!(path = %path.display(), keys = tree.len(), "config file loaded");
    Ok(tree)
}

/// Read a tag file. No file means no tags.
pub fn load_tags(path: Option<&Path>) -> Result<Tags> {
    let Some(path) = path else {
        return Ok(Tags::new());
    };
    let tree = load_yaml_file(path)?;
    let tags = normalize_tags(tree, &path.display().to_string())?;
    debug!(path = %path.display(), count = tags.len(), "tags loaded");
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::YeetError;

    #[test]
    fn missing_tag_file_path_means_no_tags() {
        assert!(load_tags(None).expect("tags").is_empty());
    }

    #[test]
    fn tag_file_is_normalized() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tags.yml");
        fs::write(&path, "env: yes\nteam: payments\n").expect("write");
        let tags = load_tags(Some(&path)).expect("tags");
        assert_eq!(tags["env"], "True");
        assert_eq!(tags["team"], "payments");
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.yml");
        let err = load_yaml_file(&path).expect_err("should fail");
        assert!(err.to_string().contains("absent.yml"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.yml");
        fs::write(&path, "name: [unclosed\n").expect("write");
        let err = load_yaml_file(&path).expect_err("should fail");
        assert!(matches!(
            err.downcast_ref::<YeetError>(),
            Some(YeetError::Parse { .. })
        ));
    }
}
