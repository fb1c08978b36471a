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

//! Error types for the referral engine.
//!
//! Two classes of failure exist and must not be conflated:
//!
//! - [`DomainViolation`]: an operation was attempted against an entity in the
//!   wrong state or would break a business rule. Expected, recoverable, and
//!   carries enough context to explain why.
//! - [`EngineError`]: wraps violations plus persistence/integrity failures
//!   (pool exhaustion, transaction conflicts, data conversion). A persistence
//!   failure aborts the whole operation; no state transition is committed
//!   unless the domain write, its activity record, and the audit-outbox row
//!   all succeeded in one transaction.

use thiserror::Error;

use crate::database::{UniversalTimestamp, UniversalUuid};

/// Expected, recoverable business-rule violations.
#[derive(Debug, Error)]
pub enum DomainViolation {
    #[error("Book {0} not found")]
    BookNotFound(UniversalUuid),

    #[error("Book '{0}' is inactive and cannot accept registrations")]
    BookInactive(String),

    #[error("Worker {0} not found in the worker directory")]
    WorkerNotFound(UniversalUuid),

    #[error("Employer {0} not found in the employer directory")]
    EmployerNotFound(UniversalUuid),

    #[error("Registration {0} not found")]
    RegistrationNotFound(UniversalUuid),

    #[error("Worker {worker_id} already holds an open registration on book '{book}'")]
    DuplicateRegistration {
        worker_id: UniversalUuid,
        book: String,
    },

    #[error("Registration is {status}, but this operation requires {required}")]
    WrongRegistrationStatus {
        required: &'static str,
        status: String,
    },

    #[error("Registration is already terminal ({status}); nothing to roll off")]
    AlreadyTerminal { status: String },

    #[error("Renewal is outside the allowed window: {days_since_renewal} days since last renewal, limit is {window_days} + {grace_days} grace")]
    RenewalOutsideWindow {
        days_since_renewal: i64,
        window_days: i32,
        grace_days: i32,
    },

    #[error("Job request {0} not found")]
    RequestNotFound(UniversalUuid),

    #[error("Job request is {status}; operation requires an open or partially-filled request")]
    RequestNotOpen { status: String },

    #[error("Job request has no remaining capacity ({requested} requested, {filled} filled)")]
    RequestFilled { requested: i32, filled: i32 },

    #[error("Bid {0} not found")]
    BidNotFound(UniversalUuid),

    #[error("Bidding window is not open for this request")]
    BiddingClosed,

    #[error("Online bidding is not enabled for book '{0}'")]
    BiddingNotEnabled(String),

    #[error("Worker already has a pending bid on this request")]
    DuplicateBid,

    #[error("Bid is {status}, but this operation requires {required}")]
    WrongBidStatus {
        required: &'static str,
        status: String,
    },

    #[error("Worker {worker_id} is suspended from bidding until {until}")]
    BiddingSuspended {
        worker_id: UniversalUuid,
        until: UniversalTimestamp,
    },

    #[error("Worker {worker_id} has an active blackout against employer {employer_id} until {until}")]
    BlackoutActive {
        worker_id: UniversalUuid,
        employer_id: UniversalUuid,
        until: UniversalTimestamp,
    },

    #[error("Worker {worker_id} holds no active registration on this book")]
    NotRegisteredOnBook { worker_id: UniversalUuid },

    #[error("Dispatch {0} not found")]
    DispatchNotFound(UniversalUuid),

    #[error("Dispatch is {status}, but this operation requires {required}")]
    WrongDispatchStatus {
        required: &'static str,
        status: String,
    },

    #[error("Check-in deadline {deadline} has passed")]
    CheckInDeadlinePassed { deadline: UniversalTimestamp },

    #[error("Dispatch is not flagged as a short-duration job")]
    NotShortDuration,

    #[error("Short-duration restoration limit reached ({limit} per registration cycle)")]
    RestorationLimitReached { limit: i32 },

    #[error("Enforcement run already in progress")]
    EnforcementAlreadyRunning,
}

/// Top-level engine error: domain violations plus persistence failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Violation(#[from] DomainViolation),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Stored data could not be converted to a domain value: {0}")]
    Conversion(String),
}

impl EngineError {
    /// True when the error is an expected business-rule violation rather than
    /// a systemic failure.
    pub fn is_violation(&self) -> bool {
        matches!(self, EngineError::Violation(_))
    }
}
