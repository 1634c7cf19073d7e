//! Core logic for dude project tracking.
//!
//! A project directory carries a `dude.yml` descriptor. This crate keeps that
//! descriptor, the in-memory [`Project`] and the SQLite record of the project
//! in sync.

pub mod db;
pub mod descriptor;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use descriptor::codec::DescriptorTree;
pub use descriptor::{DescriptorError, DescriptorResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::project::{Project, ProjectId, VariableValue, DESCRIPTOR_FILE_NAME};
pub use model::workflow::{Workflow, WorkflowStage};
pub use repo::persistence::{
    Persistence, Record, RepoError, RepoResult, Row, RowId, SqlitePersistence, Statement, Table,
};
pub use repo::project_repo::{ProjectRecord, ProjectRepository, VariableRecord};
pub use service::project_service::{
    ArtifactRegenerator, ProjectError, ProjectResult, ProjectService, SaveOutcome, StatusReport,
};
pub use service::reconcile::{
    plan_variable_sync, reconcile_variables, ReconcileReport, VariableAction,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
