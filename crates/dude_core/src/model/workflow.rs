//! Workflow lifecycle commands.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Lifecycle point at which a workflow command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkflowStage {
    Init,
    Open,
    Close,
    Clean,
}

impl WorkflowStage {
    /// Every recognized stage, in descriptor order.
    pub const ALL: [WorkflowStage; 4] = [Self::Init, Self::Open, Self::Close, Self::Clean];

    /// Descriptor key for this stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Open => "open",
            Self::Close => "close",
            Self::Clean => "clean",
        }
    }

    /// Parses a descriptor key. Unrecognized keys return `None`.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == key)
    }
}

impl Display for WorkflowStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands bound to workflow stages. At most one command per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workflow {
    commands: BTreeMap<WorkflowStage, String>,
}

impl Workflow {
    pub fn get(&self, stage: WorkflowStage) -> Option<&str> {
        self.commands.get(&stage).map(String::as_str)
    }

    /// Binds `command` to `stage`, replacing any previous command.
    pub fn set(&mut self, stage: WorkflowStage, command: impl Into<String>) {
        self.commands.insert(stage, command.into());
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Iterates bound commands in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (WorkflowStage, &str)> {
        self.commands
            .iter()
            .map(|(stage, command)| (*stage, command.as_str()))
    }
}
