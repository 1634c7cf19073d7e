//! Variable reconciliation between the model and persisted rows.
//!
//! # Responsibility
//! - Diff model variables against stored rows of the same project.
//! - Apply the minimal set of updates/deletes in one transaction.
//!
//! # Invariants
//! - The model decides values; the store decides which rows exist.
//! - Rows are only updated or deleted here, never inserted.
//! - A converged project issues no write statements.

use super::project_service::{ProjectError, ProjectResult};
use crate::model::project::{Project, ProjectId, VariableValue};
use crate::repo::persistence::Persistence;
use crate::repo::project_repo::{ProjectRepository, VariableRecord};
use log::info;
use std::collections::BTreeMap;

/// Corrective write for one stored variable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableAction {
    Update { title: String, value: String },
    Delete { title: String },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Titles whose stored value was rewritten.
    pub updated: Vec<String>,
    /// Titles whose stored row was deleted.
    pub deleted: Vec<String>,
}

impl ReconcileReport {
    /// `true` when a stored value changed, so generated artifacts are stale.
    ///
    /// Deletions alone do not count.
    pub fn changed(&self) -> bool {
        !self.updated.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Computes corrective actions for `persisted` rows given model `variables`.
///
/// Model-only variables produce no action.
pub fn plan_variable_sync(
    variables: &BTreeMap<String, VariableValue>,
    persisted: &[VariableRecord],
) -> Vec<VariableAction> {
    persisted
        .iter()
        .filter_map(|row| match variables.get(&row.title) {
            None | Some(VariableValue::Tombstone) => Some(VariableAction::Delete {
                title: row.title.clone(),
            }),
            Some(VariableValue::Present(value)) if *value != row.value => {
                Some(VariableAction::Update {
                    title: row.title.clone(),
                    value: value.clone(),
                })
            }
            Some(VariableValue::Present(_)) => None,
        })
        .collect()
}

/// Brings stored variable rows of `project` in line with the model.
///
/// # Errors
/// - `ProjectError::NotInitialized` before descriptor discovery.
/// - `ProjectError::NotPersisted` when the project has no stored id.
/// - `ProjectError::Repo` when any write fails; nothing is committed then.
pub fn reconcile_variables<P: Persistence>(
    project: &Project,
    db: &P,
) -> ProjectResult<ReconcileReport> {
    let project_id = require_persisted(project)?;
    let persisted = ProjectRepository::new(db).list_variables(project_id)?;
    let actions = plan_variable_sync(project.variables(), &persisted);
    if actions.is_empty() {
        return Ok(ReconcileReport::default());
    }

    let report = db.transaction(|db| {
        let repo = ProjectRepository::new(db);
        let mut report = ReconcileReport::default();
        for action in actions {
            match action {
                VariableAction::Update { title, value } => {
                    repo.update_variable(project_id, &title, &value)?;
                    report.updated.push(title);
                }
                VariableAction::Delete { title } => {
                    repo.delete_variable(project_id, &title)?;
                    report.deleted.push(title);
                }
            }
        }
        Ok(report)
    })?;

    info!(
        "event=variables_reconcile module=service status=ok project_id={project_id} updated={} deleted={}",
        report.updated.len(),
        report.deleted.len()
    );
    Ok(report)
}

fn require_persisted(project: &Project) -> ProjectResult<ProjectId> {
    if !project.is_initialized() {
        return Err(ProjectError::NotInitialized {
            path: project.path().to_path_buf(),
        });
    }
    project.id().ok_or_else(|| ProjectError::NotPersisted {
        path: project.path().to_path_buf(),
    })
}
