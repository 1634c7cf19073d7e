use dude_core::db::open_db_in_memory;
use dude_core::{
    ArtifactRegenerator, Persistence, Project, ProjectError, ProjectRepository, ProjectService,
    ReconcileReport, Record, RepoError, RepoResult, Row, RowId, SaveOutcome, SqlitePersistence,
    Statement, Table, VariableRecord, DESCRIPTOR_FILE_NAME,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Delegating adapter that counts issued operations.
struct CountingPersistence<'conn> {
    inner: SqlitePersistence<'conn>,
    fetches: Cell<usize>,
    project_inserts: Cell<usize>,
    variable_inserts: Cell<usize>,
    executes: Cell<usize>,
    fail_variable_inserts: bool,
    /// 1-based `execute` call number that fails instead of running.
    fail_execute_at: Cell<Option<usize>>,
}

impl<'conn> CountingPersistence<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqlitePersistence::new(conn),
            fetches: Cell::new(0),
            project_inserts: Cell::new(0),
            variable_inserts: Cell::new(0),
            executes: Cell::new(0),
            fail_variable_inserts: false,
            fail_execute_at: Cell::new(None),
        }
    }

    fn writes(&self) -> usize {
        self.project_inserts.get() + self.variable_inserts.get() + self.executes.get()
    }
}

impl Persistence for CountingPersistence<'_> {
    fn fetch(&self, query: &Statement) -> RepoResult<Vec<Row>> {
        self.fetches.set(self.fetches.get() + 1);
        self.inner.fetch(query)
    }

    fn insert(&self, table: Table, record: &Record) -> RepoResult<RowId> {
        let counter = match table {
            Table::Projects => &self.project_inserts,
            Table::Variables => {
                if self.fail_variable_inserts {
                    return Err(RepoError::InvalidData("injected failure".to_string()));
                }
                &self.variable_inserts
            }
        };
        counter.set(counter.get() + 1);
        self.inner.insert(table, record)
    }

    fn execute(&self, statement: &Statement) -> RepoResult<usize> {
        self.executes.set(self.executes.get() + 1);
        if self.fail_execute_at.get() == Some(self.executes.get()) {
            return Err(RepoError::InvalidData("injected failure".to_string()));
        }
        self.inner.execute(statement)
    }

    fn transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
    {
        self.inner.transaction(|_| work(self))
    }
}

#[derive(Default)]
struct RecordingRegenerator {
    calls: Vec<ReconcileReport>,
}

impl ArtifactRegenerator for RecordingRegenerator {
    fn regenerate(&mut self, _project: &Project, report: &ReconcileReport) {
        self.calls.push(report.clone());
    }
}

fn project_dir(descriptor: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(DESCRIPTOR_FILE_NAME), descriptor).unwrap();
    dir
}

fn stored_variables(db: &impl Persistence, path: &Path) -> Vec<VariableRecord> {
    let repo = ProjectRepository::new(db);
    let id = repo.find_id_by_path(path).unwrap().unwrap();
    repo.list_variables(id).unwrap()
}

fn variable(title: &str, value: &str) -> VariableRecord {
    VariableRecord {
        title: title.to_string(),
        value: value.to_string(),
    }
}

#[test]
fn save_creates_project_and_variable_rows() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("name: demo\nvariables:\n  env: prod\n");
    let mut project = Project::load("p", dir.path());

    assert_eq!(project.name(), "demo");
    assert!(project.is_initialized());

    let outcome = ProjectService::new(&db).save(&mut project).unwrap();

    let id = project.id().unwrap();
    assert_eq!(outcome, SaveOutcome::Created { id, variables: 1 });
    assert_eq!(db.project_inserts.get(), 1);
    assert_eq!(db.variable_inserts.get(), 1);
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("env", "prod")]);

    let record = ProjectService::new(&db)
        .stored_record(&project)
        .unwrap()
        .unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.name, "demo");
}

#[test]
fn save_skips_tombstoned_variables_on_create() {
    let conn = open_db_in_memory().unwrap();
    let db = SqlitePersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n  old: null\n");
    let mut project = Project::load("demo", dir.path());

    let outcome = ProjectService::new(&db).save(&mut project).unwrap();

    assert!(matches!(outcome, SaveOutcome::Created { variables: 1, .. }));
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("env", "prod")]);
}

#[test]
fn save_twice_inserts_project_row_once() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);

    service.save(&mut project).unwrap();
    let first_id = project.id();
    let second = service.save(&mut project).unwrap();

    assert_eq!(second, SaveOutcome::Reconciled(ReconcileReport::default()));
    assert_eq!(project.id(), first_id);
    assert_eq!(db.project_inserts.get(), 1);
    assert_eq!(db.variable_inserts.get(), 1);
    assert_eq!(db.executes.get(), 0);
}

#[test]
fn save_from_fresh_model_reuses_stored_identity() {
    let conn = open_db_in_memory().unwrap();
    let db = SqlitePersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n");
    let service = ProjectService::new(&db);

    let mut first = Project::load("demo", dir.path());
    service.save(&mut first).unwrap();

    let mut second = Project::load("demo", dir.path());
    assert_eq!(second.id(), None);
    service.save(&mut second).unwrap();

    assert_eq!(second.id(), first.id());
}

#[test]
fn load_with_db_resolves_identity_by_path() {
    let conn = open_db_in_memory().unwrap();
    let db = SqlitePersistence::new(&conn);
    let dir = project_dir("name: demo\n");
    let mut project = Project::load("demo", dir.path());
    ProjectService::new(&db).save(&mut project).unwrap();

    let reopened = Project::load_with_db("renamed", dir.path(), &db);

    assert_eq!(reopened.id(), project.id());
    assert_eq!(reopened.name(), "demo");
    assert!(reopened.is_initialized());
}

#[test]
fn drifted_value_is_updated_and_reported_as_changed() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  foo: bar\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();

    project.add_variable("foo", "baz").unwrap();
    let report = service.reconcile_variables(&project).unwrap();

    assert!(report.changed());
    assert_eq!(report.updated, vec!["foo".to_string()]);
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("foo", "baz")]);
}

#[test]
fn reconciliation_converges() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  a: 1\n  b: 2\n  c: 3\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();

    project.add_variable("a", "10").unwrap();
    project.remove_variable("b").unwrap();
    let first = service.reconcile_variables(&project).unwrap();
    assert!(first.changed());

    let writes_before = db.writes();
    let second = service.reconcile_variables(&project).unwrap();

    assert!(!second.changed());
    assert!(second.is_noop());
    assert_eq!(db.writes(), writes_before);
}

#[test]
fn tombstoned_variable_row_is_deleted_and_not_recreated() {
    let conn = open_db_in_memory().unwrap();
    let db = SqlitePersistence::new(&conn);
    let dir = project_dir("variables:\n  foo: bar\n  keep: me\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();

    project.remove_variable("foo").unwrap();
    let report = service.reconcile_variables(&project).unwrap();

    assert_eq!(report.deleted, vec!["foo".to_string()]);
    assert!(!report.changed());
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("keep", "me")]);

    service.save(&mut project).unwrap();
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("keep", "me")]);
}

#[test]
fn reconciliation_does_not_insert_model_only_variables() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();

    project.add_variable("extra", "value").unwrap();
    let report = service.reconcile_variables(&project).unwrap();

    assert!(report.is_noop());
    assert_eq!(db.variable_inserts.get(), 1);
    assert_eq!(stored_variables(&db, dir.path()), vec![variable("env", "prod")]);
}

#[test]
fn save_on_uninitialized_project_fails_without_touching_store() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::load("bare", dir.path());

    let err = ProjectService::new(&db).save(&mut project).unwrap_err();

    assert!(matches!(err, ProjectError::NotInitialized { .. }));
    assert_eq!(db.fetches.get(), 0);
    assert_eq!(db.writes(), 0);
    assert_eq!(project.id(), None);
}

#[test]
fn reconcile_requires_initialized_and_persisted_project() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let service = ProjectService::new(&db);

    let bare = Project::new("bare", "/nowhere");
    assert!(matches!(
        service.reconcile_variables(&bare).unwrap_err(),
        ProjectError::NotInitialized { .. }
    ));

    let dir = project_dir("variables:\n  env: prod\n");
    let unsaved = Project::load("demo", dir.path());
    assert!(matches!(
        service.reconcile_variables(&unsaved).unwrap_err(),
        ProjectError::NotPersisted { .. }
    ));
    assert_eq!(db.fetches.get(), 0);
}

#[test]
fn failed_create_leaves_no_partial_project() {
    let conn = open_db_in_memory().unwrap();
    let mut db = CountingPersistence::new(&conn);
    db.fail_variable_inserts = true;
    let dir = project_dir("variables:\n  env: prod\n");
    let mut project = Project::load("demo", dir.path());

    let err = ProjectService::new(&db).save(&mut project).unwrap_err();

    assert!(matches!(err, ProjectError::Repo(_)));
    assert_eq!(project.id(), None);
    let repo = ProjectRepository::new(&db.inner);
    assert_eq!(repo.find_id_by_path(dir.path()).unwrap(), None);
}

#[test]
fn failed_reconcile_rolls_back_the_whole_batch() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  a: 1\n  b: 2\n  c: 3\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();

    project.add_variable("a", "10").unwrap();
    project.remove_variable("b").unwrap();
    project.add_variable("c", "30").unwrap();
    db.fail_execute_at.set(Some(db.executes.get() + 2));

    let err = service.reconcile_variables(&project).unwrap_err();

    assert!(matches!(err, ProjectError::Repo(_)));
    assert_eq!(
        stored_variables(&db.inner, dir.path()),
        vec![variable("a", "1"), variable("b", "2"), variable("c", "3")]
    );

    db.fail_execute_at.set(None);
    let report = service.reconcile_variables(&project).unwrap();
    assert_eq!(report.updated, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(report.deleted, vec!["b".to_string()]);
}

#[test]
fn save_refuses_to_recreate_a_project_whose_row_vanished() {
    let conn = open_db_in_memory().unwrap();
    let db = CountingPersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();
    let first_id = project.id();
    assert!(first_id.is_some());

    conn.execute("DELETE FROM projects;", []).unwrap();
    let writes_before = db.writes();

    for _ in 0..2 {
        let err = service.save(&mut project).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::MissingStoredRow { model_id, .. } if Some(model_id) == first_id
        ));
    }

    assert_eq!(db.writes(), writes_before);
    assert_eq!(project.id(), first_id);
    let repo = ProjectRepository::new(&db.inner);
    assert_eq!(repo.find_id_by_path(dir.path()).unwrap(), None);
}

#[test]
fn save_rejects_identity_conflict() {
    let first_conn = open_db_in_memory().unwrap();
    let second_conn = open_db_in_memory().unwrap();
    let first_db = SqlitePersistence::new(&first_conn);
    let second_db = SqlitePersistence::new(&second_conn);
    let dir = project_dir("name: demo\n");

    let mut seeded = Project::load("demo", dir.path());
    ProjectService::new(&first_db).save(&mut seeded).unwrap();

    let second_repo = ProjectRepository::new(&second_db);
    second_repo
        .insert_project("filler", Path::new("/filler"))
        .unwrap();
    second_repo.insert_project("demo", dir.path()).unwrap();

    let mut project = Project::load_with_db("demo", dir.path(), &first_db);
    let err = ProjectService::new(&second_db)
        .save(&mut project)
        .unwrap_err();

    assert!(matches!(err, ProjectError::IdentityConflict { .. }));
}

#[test]
fn check_status_requests_regeneration_only_on_value_change() {
    let conn = open_db_in_memory().unwrap();
    let db = SqlitePersistence::new(&conn);
    let dir = project_dir("variables:\n  env: prod\n  old: x\n");
    let mut project = Project::load("demo", dir.path());
    let service = ProjectService::new(&db);
    service.save(&mut project).unwrap();
    let mut regenerator = RecordingRegenerator::default();

    project.remove_variable("old").unwrap();
    let status = service.check_status(&project, &mut regenerator).unwrap();
    assert!(!status.regeneration_requested);
    assert!(regenerator.calls.is_empty());

    project.add_variable("env", "staging").unwrap();
    let status = service.check_status(&project, &mut regenerator).unwrap();
    assert!(status.regeneration_requested);
    assert_eq!(regenerator.calls.len(), 1);
    assert_eq!(regenerator.calls[0].updated, vec!["env".to_string()]);
}
