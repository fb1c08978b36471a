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

//! # Hallbook
//!
//! A referral queue and dispatch engine for hiring-hall books.
//!
//! Workers register on books and wait their turn; employers submit job
//! requests; the engine dispatches in fair order, derived at read time from
//! each registration's immutable ordering key. Every state transition is
//! committed atomically with its activity-trail record and an audit-outbox
//! row, so the history of a registration can always be reconstructed and
//! compliance delivery is at-least-once.
//!
//! ## Services
//!
//! - [`ledger::RegistrationLedger`] — registration lifecycle: register,
//!   renew, resign, attendance penalties, exemptions
//! - [`queue::QueueService`] — read-only views: book snapshots with derived
//!   positions, depth, wait estimates
//! - [`market::RequestMarket`] — employer job requests and worker bids
//! - [`engine::DispatchEngine`] — dispatch by queue order, by name, or from
//!   an accepted bid; terminations and their cascades
//! - [`enforcement::EnforcementScheduler`] — the daily batch: missed
//!   renewals, expired requests, lapsed exemptions, no-shows, expired
//!   restrictions
//! - [`audit::AuditRelay`] — drains the audit outbox to a
//!   [`audit::ComplianceSink`]
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hallbook::config::EngineConfig;
//! use hallbook::dal::DAL;
//! use hallbook::database::Database;
//! use hallbook::directory::{InMemoryWorkerDirectory, WorkerProfile};
//! use hallbook::events::NullEventSink;
//! use hallbook::ledger::RegistrationLedger;
//! use hallbook::models::NewBook;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let database = Database::new("hallbook.db");
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//! let config = EngineConfig::default();
//!
//! let workers = Arc::new(InMemoryWorkerDirectory::new());
//! let worker = WorkerProfile {
//!     id: hallbook::database::UniversalUuid::new_v4(),
//!     name: "J. Doe".to_string(),
//!     tier: 1,
//! };
//! workers.insert(worker.clone());
//!
//! let book = dal
//!     .book()
//!     .create(
//!         NewBook {
//!             name: "Book 1".to_string(),
//!             classification: "inside-wire".to_string(),
//!             region: "local".to_string(),
//!             priority_tier: 1,
//!             max_days_before_expiry: None,
//!             renewal_window_days: 30,
//!             grace_period_days: 14,
//!             online_bidding: true,
//!         },
//!         "admin".to_string(),
//!     )
//!     .await?;
//!
//! let ledger = RegistrationLedger::new(
//!     dal.clone(),
//!     config,
//!     workers,
//!     Arc::new(NullEventSink),
//! );
//! let registration = ledger.register(worker.id, book.id, "admin").await?;
//! println!("registered with key {}", registration.ordering_key);
//! # Ok(())
//! # }
//! ```
//!
//! ## Consistency model
//!
//! All writes go through IMMEDIATE SQLite transactions in the DAL; a business
//! rule failing mid-transaction rolls the whole thing back. Queue position is
//! never stored — it is the 1-based rank among a book's registrations ordered
//! by (tier rank, ordering key), recomputed on every read. Events from
//! [`events::EventSink`] fire after commit and carry no delivery guarantee;
//! the audit outbox is the at-least-once channel.

pub mod audit;
pub mod config;
pub mod dal;
pub mod database;
pub mod directory;
pub mod enforcement;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod market;
pub mod models;
pub mod queue;

pub use audit::{AuditEvent, AuditRelay, ComplianceSink};
pub use config::{EngineConfig, OrderingKeyPolicy};
pub use dal::DAL;
pub use database::{Database, OrderingKey, UniversalTimestamp, UniversalUuid};
pub use enforcement::{EnforcementReport, EnforcementScheduler};
pub use engine::{DispatchEngine, TerminationOutcome};
pub use error::{DomainViolation, EngineError};
pub use events::{EngineEvent, EventSink};
pub use ledger::RegistrationLedger;
pub use market::RequestMarket;
pub use queue::{BookDepth, BookEntry, QueueService, WaitEstimate};
