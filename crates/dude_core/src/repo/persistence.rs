//! Persistence adapter contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose row query, row insert and statement execution over a store.
//! - Run grouped writes atomically.
//!
//! # Invariants
//! - Statement text is `'static`; caller data only travels as bound params.
//! - Table and column names come from closed sets, never from input.
//! - A failed transaction body rolls back every write it issued.

use crate::db::DbError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

pub type RepoResult<T> = Result<T, RepoError>;

/// One fetched row, columns in select order.
pub type Row = Vec<Value>;

/// Store-generated row identifier.
pub type RowId = i64;

/// Persistence-level failure.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid persisted project data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Tables the core is allowed to insert into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Projects,
    Variables,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Variables => "variables",
        }
    }
}

/// Parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: &'static str,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: &'static str) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Appends the next positional parameter.
    pub fn bind(mut self, value: Value) -> Self {
        self.params.push(value);
        self
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Column/value pairs for one inserted row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: Value) -> Self {
        self.columns.push((column, value));
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(column, _)| *column)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Storage capabilities consumed by the project core.
pub trait Persistence {
    /// Runs a query and returns every row.
    fn fetch(&self, query: &Statement) -> RepoResult<Vec<Row>>;
    /// Inserts one row and returns its generated id.
    fn insert(&self, table: Table, record: &Record) -> RepoResult<RowId>;
    /// Runs a write statement and returns the affected row count.
    fn execute(&self, statement: &Statement) -> RepoResult<usize>;
    /// Runs `work` in one transaction: commit on `Ok`, roll back on `Err`.
    fn transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
        Self: Sized;
}

/// SQLite-backed persistence over a borrowed, migrated connection.
///
/// The connection stays owned by the caller and is never closed here.
pub struct SqlitePersistence<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersistence<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl Persistence for SqlitePersistence<'_> {
    fn fetch(&self, query: &Statement) -> RepoResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(query.sql())?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(query.params()))?;

        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(row.get::<_, Value>(index)?);
            }
            fetched.push(values);
        }
        Ok(fetched)
    }

    fn insert(&self, table: Table, record: &Record) -> RepoResult<RowId> {
        if record.is_empty() {
            return Err(RepoError::InvalidData(format!(
                "refusing to insert an empty record into {}",
                table.name()
            )));
        }

        let columns = record.columns().collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            table.name(),
            columns.join(", "),
            placeholders.join(", ")
        );

        self.conn.execute(&sql, params_from_iter(record.values()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn execute(&self, statement: &Statement) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute(statement.sql(), params_from_iter(statement.params()))?;
        Ok(changed)
    }

    fn transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
    {
        // Dropping an uncommitted transaction rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        let value = work(self)?;
        tx.commit()?;
        Ok(value)
    }
}
