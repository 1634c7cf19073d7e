//! Project persistence use-cases.
//!
//! # Responsibility
//! - Route `save` to first-time creation or to reconciliation.
//! - Report when generated artifacts need regeneration.
//!
//! # Invariants
//! - Both `save` and reconciliation require a discovered (initialized) model.
//! - Creation writes the project row and its variable rows in one
//!   transaction; `project.id` is set only after commit.
//! - Repeated `save` calls never create a second row for the same path.
//! - A model that already holds an id is never re-created under a new one.

use super::reconcile::{reconcile_variables, ReconcileReport};
use crate::descriptor::DescriptorError;
use crate::model::project::{Project, ProjectId};
use crate::repo::persistence::{Persistence, RepoError};
use crate::repo::project_repo::{ProjectRecord, ProjectRepository};
use log::{info, warn};
use std::path::PathBuf;

pub type ProjectResult<T> = Result<T, ProjectError>;

/// Service error for project use-cases.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Descriptor discovery has not completed for this model.
    #[error("project at {} is not initialized", .path.display())]
    NotInitialized { path: PathBuf },
    /// The project has no stored identity yet.
    #[error("project at {} has not been persisted", .path.display())]
    NotPersisted { path: PathBuf },
    /// The stored row for this path has a different id than the model.
    #[error(
        "project at {} has id {model_id} but the stored row has id {stored_id}",
        .path.display()
    )]
    IdentityConflict {
        path: PathBuf,
        model_id: ProjectId,
        stored_id: ProjectId,
    },
    /// The model carries an id but no row is stored for its path.
    #[error(
        "project at {} has id {model_id} but no stored row exists for its path",
        .path.display()
    )]
    MissingStoredRow { path: PathBuf, model_id: ProjectId },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of one `save` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First persistence: a project row and `variables` variable rows.
    Created { id: ProjectId, variables: usize },
    /// The project already existed and was reconciled.
    Reconciled(ReconcileReport),
}

/// Receives regeneration requests for artifacts derived from variables,
/// e.g. generated shell scripts.
pub trait ArtifactRegenerator {
    fn regenerate(&mut self, project: &Project, report: &ReconcileReport);
}

/// Result of a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub reconcile: ReconcileReport,
    pub regeneration_requested: bool,
}

/// Project service over a borrowed persistence handle.
pub struct ProjectService<'db, P: Persistence> {
    db: &'db P,
}

impl<'db, P: Persistence> ProjectService<'db, P> {
    pub fn new(db: &'db P) -> Self {
        Self { db }
    }

    /// Persists `project`: creates it on first save, reconciles afterwards.
    ///
    /// # Errors
    /// - `ProjectError::NotInitialized` without touching the store.
    /// - `ProjectError::IdentityConflict` when the model id disagrees with
    ///   the row stored for its path.
    /// - `ProjectError::MissingStoredRow` when the model has an id but its
    ///   row is gone; nothing is written.
    /// - `ProjectError::Repo` on storage failure; no partial rows remain.
    pub fn save(&self, project: &mut Project) -> ProjectResult<SaveOutcome> {
        ensure_initialized(project)?;

        let repo = ProjectRepository::new(self.db);
        match repo.find_id_by_path(project.path())? {
            None => match project.id() {
                Some(model_id) => {
                    warn!(
                        "event=project_save module=service status=error path={} error_code=stored_row_missing model_id={model_id}",
                        project.path().display()
                    );
                    Err(ProjectError::MissingStoredRow {
                        path: project.path().to_path_buf(),
                        model_id,
                    })
                }
                None => self.create(project),
            },
            Some(stored_id) => {
                match project.id() {
                    Some(model_id) if model_id != stored_id => {
                        return Err(ProjectError::IdentityConflict {
                            path: project.path().to_path_buf(),
                            model_id,
                            stored_id,
                        });
                    }
                    Some(_) => {}
                    None => project.assign_id(stored_id),
                }
                let report = reconcile_variables(project, self.db)?;
                Ok(SaveOutcome::Reconciled(report))
            }
        }
    }

    /// Reconciles stored variables of an already persisted project.
    pub fn reconcile_variables(&self, project: &Project) -> ProjectResult<ReconcileReport> {
        reconcile_variables(project, self.db)
    }

    /// Reconciles and asks `regenerator` to rebuild artifacts on change.
    pub fn check_status<R>(
        &self,
        project: &Project,
        regenerator: &mut R,
    ) -> ProjectResult<StatusReport>
    where
        R: ArtifactRegenerator + ?Sized,
    {
        let reconcile = reconcile_variables(project, self.db)?;
        let regeneration_requested = reconcile.changed();
        if regeneration_requested {
            info!(
                "event=project_status module=service status=stale path={}",
                project.path().display()
            );
            regenerator.regenerate(project, &reconcile);
        }
        Ok(StatusReport {
            reconcile,
            regeneration_requested,
        })
    }

    /// Reads the stored row for `project` by path.
    pub fn stored_record(&self, project: &Project) -> ProjectResult<Option<ProjectRecord>> {
        ensure_initialized(project)?;
        Ok(ProjectRepository::new(self.db).get_by_path(project.path())?)
    }

    fn create(&self, project: &mut Project) -> ProjectResult<SaveOutcome> {
        let (id, variables) = self
            .db
            .transaction(|db| {
                let repo = ProjectRepository::new(db);
                let id = repo.insert_project(project.name(), project.path())?;
                let mut inserted = 0;
                for (title, value) in project.variables() {
                    if let Some(value) = value.as_present() {
                        repo.insert_variable(id, title, value)?;
                        inserted += 1;
                    }
                }
                Ok((id, inserted))
            })
            .map_err(|err| {
                warn!(
                    "event=project_create module=service status=error path={} error={err}",
                    project.path().display()
                );
                err
            })?;

        project.assign_id(id);
        info!(
            "event=project_create module=service status=ok project_id={id} variables={variables}"
        );
        Ok(SaveOutcome::Created { id, variables })
    }
}

fn ensure_initialized(project: &Project) -> ProjectResult<()> {
    if project.is_initialized() {
        Ok(())
    } else {
        Err(ProjectError::NotInitialized {
            path: project.path().to_path_buf(),
        })
    }
}
