//! Project descriptor (`dude.yml`) handling.
//!
//! # Responsibility
//! - `codec`: read/write the YAML file as a plain tree, nothing more.
//! - `sync`: convert between that tree and [`crate::model::project::Project`].
//!
//! # Invariants
//! - Descriptor writes replace the file atomically (temp file + rename).
//! - Unrecognized top-level and workflow keys are dropped on read and never
//!   written back.

use std::path::PathBuf;

pub mod codec;
pub mod sync;

pub type DescriptorResult<T> = Result<T, DescriptorError>;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed descriptor {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("descriptor {} has a non-scalar value for `{key}`", .path.display())]
    InvalidValue { path: PathBuf, key: String },
    #[error("failed to read descriptor {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write descriptor {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render descriptor {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
