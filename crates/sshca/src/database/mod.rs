/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database access supporting both PostgreSQL and SQLite.
//!
//! The backend is detected at runtime from the connection URL. Unlike a
//! pooled setup, every call to [`Database::interact`] establishes its own
//! connection on a blocking thread and drops it before returning, on success
//! and on error alike.
//!
//! # Example
//!
//! ```rust,ignore
//! use sshca::database::Database;
//!
//! let db = Database::new("sqlite:///var/lib/sshca/sshca.db")?;
//! db.run_migrations().await?;
//! ```

pub mod schema;

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::{PgConnection, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;
use tracing::{debug, info};

pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Errors raised by the datastore layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unable to connect to the database: {0}")]
    Connection(String),

    #[error("Need to create database table {0}")]
    MissingTable(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("database task failed: {0}")]
    Interact(String),
}

/// Database backend type, detected at runtime from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// PostgreSQL backend
    Postgres,
    /// SQLite backend
    Sqlite,
}

impl BackendType {
    /// Detect the backend type from a connection URL.
    ///
    /// Returns `None` if the URL matches neither backend.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Some(BackendType::Postgres);
        }

        // SQLite URLs can be:
        // - sqlite:// prefix
        // - file: URI format (e.g., file:test?mode=memory&cache=shared)
        // - file paths (relative or absolute)
        // - :memory: for in-memory databases
        if url.starts_with("sqlite://")
            || url.starts_with("file:")
            || url.starts_with('/')
            || url.starts_with("./")
            || url.starts_with("../")
            || url == ":memory:"
            || url.ends_with(".db")
            || url.ends_with(".sqlite")
            || url.ends_with(".sqlite3")
        {
            return Some(BackendType::Sqlite);
        }

        None
    }
}

/// Multi-connection enum wrapping both PostgreSQL and SQLite connections.
///
/// Queries in [`crate::dal`] are written once against this type.
#[derive(diesel::MultiConnection)]
pub enum AnyConnection {
    /// PostgreSQL connection variant
    Postgres(PgConnection),
    /// SQLite connection variant
    Sqlite(SqliteConnection),
}

/// Connection settings for the key store.
///
/// Cheap to clone; holds no open connection.
#[derive(Clone, Debug)]
pub struct Database {
    url: String,
    backend: BackendType,
}

impl Database {
    /// Creates a handle for the given URL, detecting the backend.
    pub fn new(connection_string: &str) -> Result<Self, StoreError> {
        let backend = BackendType::from_url(connection_string).ok_or_else(|| {
            StoreError::Connection(format!(
                "Unable to detect database backend from URL '{}'. \
                 Expected postgres://, postgresql://, sqlite://, or a file path.",
                connection_string
            ))
        })?;

        let url = match backend {
            BackendType::Postgres => connection_string.to_string(),
            BackendType::Sqlite => Self::build_sqlite_url(connection_string),
        };

        Ok(Self { url, backend })
    }

    /// Returns the detected backend type.
    pub fn backend(&self) -> BackendType {
        self.backend
    }

    /// Builds a SQLite connection URL.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    fn establish(backend: BackendType, url: &str) -> Result<AnyConnection, StoreError> {
        match backend {
            BackendType::Postgres => PgConnection::establish(url)
                .map(AnyConnection::Postgres)
                .map_err(|e| StoreError::Connection(e.to_string())),
            BackendType::Sqlite => {
                let mut conn = SqliteConnection::establish(url)
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                // busy_timeout makes SQLite wait instead of failing on concurrent writers
                diesel::sql_query("PRAGMA busy_timeout=30000;")
                    .execute(&mut conn)
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                Ok(AnyConnection::Sqlite(conn))
            }
        }
    }

    /// Fails with [`StoreError::MissingTable`] if the schema has not been created.
    fn check_schema(conn: &mut AnyConnection) -> Result<(), StoreError> {
        use schema::users;

        users::table
            .select(users::name)
            .limit(1)
            .load::<String>(conn)
            .map_err(|e| {
                debug!(error = %e, "users table check failed");
                if is_missing_table(&e) {
                    StoreError::MissingTable("users".to_string())
                } else {
                    StoreError::Query(e.to_string())
                }
            })?;
        Ok(())
    }

    /// Runs `f` against a freshly established connection.
    ///
    /// The connection lives only for the duration of `f` and is dropped on
    /// every exit path.
    pub async fn interact<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut AnyConnection) -> Result<R, diesel::result::Error> + Send + 'static,
        R: Send + 'static,
    {
        let url = self.url.clone();
        let backend = self.backend;

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::establish(backend, &url)?;
            Self::check_schema(&mut conn)?;
            f(&mut conn).map_err(|e| StoreError::Query(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Interact(e.to_string()))?
    }

    /// Runs pending migrations for the detected backend.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let url = self.url.clone();
        let backend = self.backend;

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::establish(backend, &url)?;
            let applied = match &mut conn {
                AnyConnection::Postgres(conn) => conn
                    .run_pending_migrations(POSTGRES_MIGRATIONS)
                    .map(|v| v.len()),
                AnyConnection::Sqlite(conn) => conn
                    .run_pending_migrations(SQLITE_MIGRATIONS)
                    .map(|v| v.len()),
            }
            .map_err(|e| StoreError::Query(format!("Failed to run migrations: {}", e)))?;
            info!(applied, backend = ?backend, "Database migrations complete");
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Interact(e.to_string()))?
    }
}

/// True when `err` reports an absent relation rather than a failed query.
fn is_missing_table(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(_, info) => {
            let message = info.message();
            // SQLite: "no such table: users", PostgreSQL: relation "users" does not exist
            message.contains("no such table")
                || (message.contains("relation") && message.contains("does not exist"))
        }
        _ => false,
    }
}

/// Runs `f` inside a transaction that holds the write lock from its first
/// statement.
///
/// SQLite transactions start with `BEGIN IMMEDIATE`, so a concurrent writer
/// waits on `busy_timeout` instead of failing when a read lock would have to
/// be upgraded. PostgreSQL uses an ordinary transaction. Nested
/// `conn.transaction` calls inside `f` become savepoints.
pub fn write_transaction<T, F>(conn: &mut AnyConnection, f: F) -> QueryResult<T>
where
    F: FnOnce(&mut AnyConnection) -> QueryResult<T>,
{
    if let AnyConnection::Sqlite(sqlite) = &mut *conn {
        AnsiTransactionManager::begin_transaction_sql(sqlite, "BEGIN IMMEDIATE")?;
    } else {
        return conn.transaction(f);
    }

    let result = f(conn);
    match &result {
        Ok(_) => <AnyConnection as TransactionManager<AnyConnection>>::commit_transaction(conn)?,
        Err(e) => {
            if let Err(rollback) =
                <AnyConnection as TransactionManager<AnyConnection>>::rollback_transaction(conn)
            {
                debug!(error = %e, rollback = %rollback, "rollback after failed write failed");
            }
        }
    }
    result
}
