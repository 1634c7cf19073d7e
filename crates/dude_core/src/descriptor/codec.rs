//! YAML reader/writer for descriptor files.

use super::{DescriptorError, DescriptorResult};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Plain key/value form of a descriptor file.
///
/// Values are kept as raw YAML so that any scalar is accepted; interpreting
/// them is the job of [`super::sync`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<BTreeMap<String, Value>>,
}

/// Reads and parses the descriptor at `path`.
///
/// An empty document parses as an empty tree.
pub fn read_tree(path: &Path) -> DescriptorResult<DescriptorTree> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => DescriptorError::NotFound(path.to_path_buf()),
        _ => DescriptorError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_tree(&raw).map_err(|source| DescriptorError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses descriptor text. The document must be a mapping or empty.
pub fn parse_tree(raw: &str) -> Result<DescriptorTree, serde_yaml::Error> {
    let document: Value = serde_yaml::from_str(raw)?;
    match document {
        Value::Null => Ok(DescriptorTree::default()),
        Value::Mapping(_) => serde_yaml::from_value(document),
        _ => Err(serde::de::Error::custom(
            "descriptor root must be a key/value mapping",
        )),
    }
}

/// Writes `tree` to `path` through a sibling temp file and an atomic rename.
///
/// A crash mid-write leaves the previous descriptor intact.
pub fn write_tree(path: &Path, tree: &DescriptorTree) -> DescriptorResult<()> {
    let rendered = serde_yaml::to_string(tree).map_err(|source| DescriptorError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    let write_error = |source: std::io::Error| DescriptorError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(rendered.as_bytes()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}
