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

//! Data Access Layer.
//!
//! Each entity gets its own DAL struct borrowing the shared [`DAL`]. Compound
//! operations (domain write + activity record + audit-outbox row) run inside
//! a single transaction; if any write fails, the whole operation rolls back.
//! Write transactions that select-then-update use SQLite `IMMEDIATE`
//! transactions so concurrent callers serialize instead of racing.

use diesel::SqliteConnection;

use crate::database::Database;
use crate::error::{DomainViolation, EngineError};

pub mod activity;
pub mod audit_outbox;
pub mod bid;
pub mod book;
pub mod dispatch;
pub mod job_request;
pub mod models;
pub mod registration;
pub mod restriction;

pub use activity::ActivityDAL;
pub use audit_outbox::AuditOutboxDAL;
pub use bid::BidDAL;
pub use book::BookDAL;
pub use dispatch::DispatchDAL;
pub use job_request::JobRequestDAL;
pub use registration::RegistrationDAL;
pub use restriction::RestrictionDAL;

/// Error type used inside DAL transaction closures.
///
/// Diesel transactions require the closure error to be `From<diesel::result::
/// Error>`; the extra variants let domain checks and data-conversion failures
/// abort (and roll back) a transaction with their own context.
#[derive(Debug)]
pub(crate) enum TxnError {
    Db(diesel::result::Error),
    Violation(DomainViolation),
    Conversion(String),
}

impl From<diesel::result::Error> for TxnError {
    fn from(e: diesel::result::Error) -> Self {
        TxnError::Db(e)
    }
}

impl From<DomainViolation> for TxnError {
    fn from(v: DomainViolation) -> Self {
        TxnError::Violation(v)
    }
}

impl From<TxnError> for EngineError {
    fn from(e: TxnError) -> Self {
        match e {
            TxnError::Db(e) => EngineError::Database(e),
            TxnError::Violation(v) => EngineError::Violation(v),
            TxnError::Conversion(msg) => EngineError::Conversion(msg),
        }
    }
}

/// Converts a row struct into its domain counterpart inside a transaction.
pub(crate) fn to_domain<T, R>(row: R) -> Result<T, TxnError>
where
    R: TryInto<T, Error = String>,
{
    row.try_into().map_err(TxnError::Conversion)
}

/// Serializes a domain value for an audit-outbox state snapshot.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, TxnError> {
    serde_json::to_value(value).map_err(|e| TxnError::Conversion(e.to_string()))
}

/// The shared Data Access Layer handle.
///
/// `DAL` is `Clone`; each clone references the same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a book DAL for book operations.
    pub fn book(&self) -> BookDAL {
        BookDAL::new(self)
    }

    /// Returns a registration DAL for ledger operations.
    pub fn registration(&self) -> RegistrationDAL {
        RegistrationDAL::new(self)
    }

    /// Returns a job request DAL.
    pub fn job_request(&self) -> JobRequestDAL {
        JobRequestDAL::new(self)
    }

    /// Returns a bid DAL.
    pub fn bid(&self) -> BidDAL {
        BidDAL::new(self)
    }

    /// Returns a dispatch DAL.
    pub fn dispatch(&self) -> DispatchDAL {
        DispatchDAL::new(self)
    }

    /// Returns an activity DAL for trail queries.
    pub fn activity(&self) -> ActivityDAL {
        ActivityDAL::new(self)
    }

    /// Returns a restriction DAL for blackouts and suspensions.
    pub fn restriction(&self) -> RestrictionDAL {
        RestrictionDAL::new(self)
    }

    /// Returns an audit outbox DAL for the compliance relay.
    pub fn audit_outbox(&self) -> AuditOutboxDAL {
        AuditOutboxDAL::new(self)
    }

    /// Runs `f` inside an `IMMEDIATE` transaction.
    ///
    /// The write lock is acquired up front, so select-then-update sequences
    /// inside the closure cannot interleave with another writer.
    pub(crate) async fn immediate<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, TxnError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .database
            .get_connection()
            .await
            .map_err(|e| EngineError::ConnectionPool(e.to_string()))?;

        let result = conn
            .interact(move |conn| conn.immediate_transaction::<T, TxnError, _>(f))
            .await
            .map_err(|e| EngineError::ConnectionPool(e.to_string()))?;

        result.map_err(EngineError::from)
    }

    /// Runs `f` on a pooled connection without opening a write transaction.
    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, TxnError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .database
            .get_connection()
            .await
            .map_err(|e| EngineError::ConnectionPool(e.to_string()))?;

        let result = conn
            .interact(move |conn| f(conn))
            .await
            .map_err(|e| EngineError::ConnectionPool(e.to_string()))?;

        result.map_err(EngineError::from)
    }
}
