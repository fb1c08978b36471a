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

//! Database connection management for the SQLite backend.
//!
//! Provides an async connection pool via `deadpool-diesel`. SQLite has limited
//! concurrent write support even with WAL mode, so the pool holds a single
//! connection; write transactions that select-then-update run as `IMMEDIATE`
//! transactions to serialize concurrent claimers (see the dispatch DAL).

use diesel::prelude::*;
use thiserror::Error;
use tracing::info;

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};

use crate::database::MIGRATIONS;

/// Errors raised while creating the pool or running migrations.
#[derive(Debug, Error)]
pub enum DatabaseSetupError {
    #[error("Failed to build connection pool: {0}")]
    Pool(String),

    #[error("Failed to run migrations: {0}")]
    Migration(String),
}

/// A pool of SQLite connections.
///
/// `Database` is `Clone`; each clone references the same underlying pool, so
/// it can be shared freely between services and spawned tasks.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(sqlite)")
    }
}

impl Database {
    /// Creates a new connection pool for the given SQLite location.
    ///
    /// Accepts a file path, `:memory:`, or a `sqlite://` / `file:` URL.
    ///
    /// # Panics
    ///
    /// Panics if the pool cannot be created.
    pub fn new(connection_string: &str) -> Self {
        let url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(url, Runtime::Tokio1);
        // A single connection avoids "database is locked" errors; SQLite
        // serializes writes anyway.
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: 1)");

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Gets a connection from the pool.
    pub async fn get_connection(
        &self,
    ) -> Result<deadpool::managed::Object<Manager>, deadpool::managed::PoolError<deadpool_diesel::Error>>
    {
        self.pool.get().await
    }

    /// Strips the `sqlite://` prefix if present.
    fn build_sqlite_url(connection_string: &str) -> String {
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending migrations and sets the concurrency pragmas.
    pub async fn run_migrations(&self) -> Result<(), DatabaseSetupError> {
        use diesel_migrations::MigrationHarness;

        let conn = self
            .get_connection()
            .await
            .map_err(|e| DatabaseSetupError::Pool(e.to_string()))?;

        conn.interact(|conn| {
            // WAL mode allows concurrent reads during writes; busy_timeout
            // makes SQLite wait instead of immediately failing on locks.
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| DatabaseSetupError::Migration(e.to_string()))?;
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| DatabaseSetupError::Migration(e.to_string()))?;
            diesel::sql_query("PRAGMA foreign_keys=ON;")
                .execute(conn)
                .map_err(|e| DatabaseSetupError::Migration(e.to_string()))?;

            conn.run_pending_migrations(MIGRATIONS)
                .map(|_| ())
                .map_err(|e| DatabaseSetupError::Migration(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseSetupError::Migration(e.to_string()))??;

        info!("Database migrations complete");
        Ok(())
    }
}
