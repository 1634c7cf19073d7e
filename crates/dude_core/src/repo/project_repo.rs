//! Typed project/variable queries over a [`Persistence`] adapter.
//!
//! # Invariants
//! - Projects are looked up by path; `id` is only used for variable rows.
//! - Every statement binds caller values as parameters.

use super::persistence::{
    Persistence, Record, RepoError, RepoResult, Row, RowId, Statement, Table,
};
use crate::model::project::ProjectId;
use rusqlite::types::Value;
use std::path::Path;

/// Stored project row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub path: String,
}

/// Stored variable row for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub title: String,
    pub value: String,
}

/// Project queries bound to one persistence handle.
pub struct ProjectRepository<'db, P: ?Sized> {
    db: &'db P,
}

impl<'db, P: Persistence + ?Sized> ProjectRepository<'db, P> {
    pub fn new(db: &'db P) -> Self {
        Self { db }
    }

    /// Resolves the persisted id for `path`.
    pub fn find_id_by_path(&self, path: &Path) -> RepoResult<Option<ProjectId>> {
        let rows = self.db.fetch(
            &Statement::new("SELECT id FROM projects WHERE path = ?1;").bind(path_value(path)),
        )?;
        rows.first()
            .map(|row| integer_at(row, 0, "projects.id"))
            .transpose()
    }

    /// Reads the full stored project row for `path`.
    pub fn get_by_path(&self, path: &Path) -> RepoResult<Option<ProjectRecord>> {
        let rows = self.db.fetch(
            &Statement::new("SELECT id, name, path FROM projects WHERE path = ?1;")
                .bind(path_value(path)),
        )?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(ProjectRecord {
            id: integer_at(row, 0, "projects.id")?,
            name: text_at(row, 1, "projects.name")?,
            path: text_at(row, 2, "projects.path")?,
        }))
    }

    pub fn insert_project(&self, name: &str, path: &Path) -> RepoResult<ProjectId> {
        self.db.insert(
            Table::Projects,
            &Record::new()
                .with("name", Value::Text(name.to_string()))
                .with("path", path_value(path)),
        )
    }

    pub fn insert_variable(
        &self,
        project: ProjectId,
        title: &str,
        value: &str,
    ) -> RepoResult<RowId> {
        self.db.insert(
            Table::Variables,
            &Record::new()
                .with("title", Value::Text(title.to_string()))
                .with("value", Value::Text(value.to_string()))
                .with("project", Value::Integer(project)),
        )
    }

    /// Lists stored variables of `project`, ordered by title.
    pub fn list_variables(&self, project: ProjectId) -> RepoResult<Vec<VariableRecord>> {
        let rows = self.db.fetch(
            &Statement::new(
                "SELECT title, value FROM variables WHERE project = ?1 ORDER BY title ASC;",
            )
            .bind(Value::Integer(project)),
        )?;
        rows.iter()
            .map(|row| {
                Ok(VariableRecord {
                    title: text_at(row, 0, "variables.title")?,
                    value: text_at(row, 1, "variables.value")?,
                })
            })
            .collect()
    }

    pub fn update_variable(
        &self,
        project: ProjectId,
        title: &str,
        value: &str,
    ) -> RepoResult<usize> {
        self.db.execute(
            &Statement::new("UPDATE variables SET value = ?1 WHERE project = ?2 AND title = ?3;")
                .bind(Value::Text(value.to_string()))
                .bind(Value::Integer(project))
                .bind(Value::Text(title.to_string())),
        )
    }

    pub fn delete_variable(&self, project: ProjectId, title: &str) -> RepoResult<usize> {
        self.db.execute(
            &Statement::new("DELETE FROM variables WHERE project = ?1 AND title = ?2;")
                .bind(Value::Integer(project))
                .bind(Value::Text(title.to_string())),
        )
    }
}

fn path_value(path: &Path) -> Value {
    Value::Text(path.to_string_lossy().into_owned())
}

fn integer_at(row: &Row, index: usize, column: &str) -> RepoResult<i64> {
    match row.get(index) {
        Some(Value::Integer(value)) => Ok(*value),
        other => Err(RepoError::InvalidData(format!(
            "expected integer in {column}, got {other:?}"
        ))),
    }
}

fn text_at(row: &Row, index: usize, column: &str) -> RepoResult<String> {
    match row.get(index) {
        Some(Value::Text(value)) => Ok(value.clone()),
        other => Err(RepoError::InvalidData(format!(
            "expected text in {column}, got {other:?}"
        ))),
    }
}
