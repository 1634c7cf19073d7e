//! Project domain model.
//!
//! # Responsibility
//! - Represent one project with its variables, git hooks and workflow.
//! - Keep the on-disk descriptor in step with in-memory mutations.
//!
//! # Invariants
//! - `path` is the identity key and never changes after construction.
//! - `id` moves from `None` to a value at most once.
//! - `initialized` becomes `true` only after a descriptor was applied.
//! - Mutations through `add_variable`/`remove_variable` rewrite the
//!   descriptor before returning.

use crate::descriptor::codec::{read_tree, write_tree, DescriptorTree};
use crate::descriptor::sync::{apply_tree, to_tree};
use crate::descriptor::{DescriptorError, DescriptorResult};
use crate::model::workflow::Workflow;
use crate::repo::persistence::Persistence;
use crate::repo::project_repo::ProjectRepository;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// File name of the descriptor expected under every project directory.
pub const DESCRIPTOR_FILE_NAME: &str = "dude.yml";

/// Surrogate key of a persisted project row.
pub type ProjectId = i64;

/// Value slot of one project variable.
///
/// `Tombstone` marks a variable removed from the model whose persisted row
/// has not been deleted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    Present(String),
    Tombstone,
}

impl VariableValue {
    /// Returns the value unless the slot is a tombstone.
    pub fn as_present(&self) -> Option<&str> {
        match self {
            Self::Present(value) => Some(value),
            Self::Tombstone => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

/// In-memory state of one project.
///
/// Equality is identity: two instances with the same `path` are the same
/// project regardless of name or contents.
#[derive(Debug, Clone)]
pub struct Project {
    pub(crate) name: String,
    path: PathBuf,
    pub(crate) variables: BTreeMap<String, VariableValue>,
    pub(crate) workflow: Workflow,
    pub(crate) git_hooks: Vec<String>,
    id: Option<ProjectId>,
    pub(crate) initialized: bool,
}

impl Project {
    /// Creates a bare project. No filesystem or database access happens.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            variables: BTreeMap::new(),
            workflow: Workflow::default(),
            git_hooks: Vec::new(),
            id: None,
            initialized: false,
        }
    }

    /// Creates a bare project named after the last segment of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = default_name(&path);
        Self::new(name, path)
    }

    /// Creates a project and discovers its descriptor when one exists.
    ///
    /// A missing or unreadable descriptor leaves the project un-initialized;
    /// the failure is logged, not returned.
    pub fn load(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mut project = Self::new(name, path);
        project.discover_if_present();
        project
    }

    /// Like [`Project::load`], but first resolves the persisted id by path.
    ///
    /// The handle is only borrowed for the lookup and is not retained.
    pub fn load_with_db<P>(name: impl Into<String>, path: impl Into<PathBuf>, db: &P) -> Self
    where
        P: Persistence + ?Sized,
    {
        let mut project = Self::new(name, path);
        match ProjectRepository::new(db).find_id_by_path(&project.path) {
            Ok(id) => project.id = id,
            Err(err) => warn!(
                "event=project_lookup module=model status=error path={} error={err}",
                project.path.display()
            ),
        }
        project.discover_if_present();
        project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> Option<ProjectId> {
        self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn variables(&self) -> &BTreeMap<String, VariableValue> {
        &self.variables
    }

    /// Returns the live value of `name`, or `None` when absent or tombstoned.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(VariableValue::as_present)
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn git_hooks(&self) -> &[String] {
        &self.git_hooks
    }

    /// Location of the descriptor file for this project.
    pub fn descriptor_path(&self) -> PathBuf {
        self.path.join(DESCRIPTOR_FILE_NAME)
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor_path().is_file()
    }

    /// Reads the descriptor and applies it to this model.
    ///
    /// # Errors
    /// - `DescriptorError::NotFound` when the descriptor file is absent.
    /// - `DescriptorError::Parse` / `InvalidValue` for malformed content.
    pub fn discover(&mut self) -> DescriptorResult<()> {
        let descriptor = self.descriptor_path();
        let tree = read_tree(&descriptor)?;
        apply_tree(self, tree, &descriptor)?;
        info!(
            "event=project_discover module=model status=ok path={} variables={}",
            self.path.display(),
            self.variables.len()
        );
        Ok(())
    }

    /// Sets a variable and writes the descriptor back.
    ///
    /// Persisted rows are not touched; reconciliation handles that.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> DescriptorResult<()> {
        self.variables
            .insert(name.into(), VariableValue::Present(value.into()));
        self.write_descriptor()
    }

    /// Tombstones a variable and writes the descriptor back.
    ///
    /// The key stays in the map until reconciliation deletes its row.
    pub fn remove_variable(&mut self, name: impl Into<String>) -> DescriptorResult<()> {
        self.variables.insert(name.into(), VariableValue::Tombstone);
        self.write_descriptor()
    }

    /// Serializable descriptor form of this project.
    pub fn to_descriptor_tree(&self) -> DescriptorTree {
        to_tree(self)
    }

    /// Atomically replaces the descriptor file with the current model.
    pub fn write_descriptor(&self) -> DescriptorResult<()> {
        write_tree(&self.descriptor_path(), &self.to_descriptor_tree())
    }

    /// Records the persisted id. Later calls never overwrite it.
    pub(crate) fn assign_id(&mut self, id: ProjectId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    fn discover_if_present(&mut self) {
        if !self.has_descriptor() {
            return;
        }
        if let Err(err) = self.discover() {
            let code = match &err {
                DescriptorError::NotFound(_) => "descriptor_missing",
                DescriptorError::Parse { .. } | DescriptorError::InvalidValue { .. } => {
                    "descriptor_malformed"
                }
                _ => "descriptor_unreadable",
            };
            warn!(
                "event=project_discover module=model status=error path={} error_code={code} error={err}",
                self.path.display()
            );
        }
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Project {}

impl Display for Project {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "path: {}", self.path.display())?;
        if !self.git_hooks.is_empty() {
            writeln!(f, "git hooks:")?;
            for hook in &self.git_hooks {
                writeln!(f, "\t{hook}")?;
            }
        }
        if !self.variables.is_empty() {
            writeln!(f, "variables:")?;
            for (name, value) in &self.variables {
                match value {
                    VariableValue::Present(value) => writeln!(f, "\t{name}: {value}")?,
                    VariableValue::Tombstone => writeln!(f, "\t{name}: <removed>")?,
                }
            }
        }
        if !self.workflow.is_empty() {
            writeln!(f, "workflow:")?;
            for (stage, command) in self.workflow.iter() {
                writeln!(f, "\t{stage}: {command}")?;
            }
        }
        Ok(())
    }
}

fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|segment| segment.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
