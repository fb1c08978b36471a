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

//! Queue views: derived positions, depth, and wait estimates.
//!
//! Nothing here writes. Position is always the 1-based rank among a book's
//! registrations ordered by (tier rank, ordering key) at read time; storing
//! it would let it drift from the keys, so it is recomputed on every call.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{Registration, RegistrationStatus};

/// One row of a book snapshot.
#[derive(Debug, Clone)]
pub struct BookEntry {
    /// 1-based rank in dispatch order
    pub position: i32,
    pub registration: Registration,
    pub days_on_book: i64,
    pub penalty_count: i32,
    /// When the renewal window (including grace) runs out
    pub renewal_due: UniversalTimestamp,
}

/// Book composition by status and tier.
#[derive(Debug, Clone, Default)]
pub struct BookDepth {
    pub active: i64,
    pub dispatched: i64,
    pub exempt: i64,
    pub active_by_tier: BTreeMap<i32, i64>,
}

/// Sample-size qualifier on a wait estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Too few observed dispatches to trust the estimate
    Low,
    Normal,
}

/// Estimated wait until dispatch, derived from the trailing dispatch rate.
#[derive(Debug, Clone)]
pub struct WaitEstimate {
    pub position: i32,
    /// None when no dispatches were observed in the window
    pub estimated_days: Option<f64>,
    pub observed_dispatches: i64,
    pub confidence: Confidence,
}

/// Read-only queue service.
pub struct QueueService {
    dal: DAL,
    config: EngineConfig,
}

impl QueueService {
    pub fn new(dal: DAL, config: EngineConfig) -> Self {
        Self { dal, config }
    }

    /// Ordered view of a book. With `include_exempt`, Exempt registrations
    /// appear in their key slots; positions count all returned rows.
    pub async fn snapshot(
        &self,
        book_id: UniversalUuid,
        include_exempt: bool,
    ) -> Result<Vec<BookEntry>, EngineError> {
        let book = self.dal.book().get_by_id(book_id).await?;
        let registrations = self
            .dal
            .registration()
            .list_book_entries(book_id, include_exempt, self.config.invert_tier_priority())
            .await?;

        let now = UniversalTimestamp::now();
        let deadline_days =
            chrono::Duration::days((book.renewal_window_days + book.grace_period_days) as i64);
        let entries = registrations
            .into_iter()
            .enumerate()
            .map(|(i, registration)| BookEntry {
                position: (i + 1) as i32,
                days_on_book: (*now.as_datetime() - *registration.registered_at.as_datetime())
                    .num_days(),
                penalty_count: registration.penalty_count,
                renewal_due: UniversalTimestamp::from(
                    *registration.last_renewal_at.as_datetime() + deadline_days,
                ),
                registration,
            })
            .collect();
        Ok(entries)
    }

    /// Preview of the next registration a queue-order dispatch would select.
    ///
    /// Skips excluded tiers and workers blacked out against the employer;
    /// remote paths additionally skip workers under a bidding suspension.
    /// This is a preview only; the dispatch engine re-verifies inside its
    /// own transaction.
    pub async fn next_eligible(
        &self,
        book_id: UniversalUuid,
        employer_id: UniversalUuid,
        exclude_tiers: &[i32],
        remote: bool,
    ) -> Result<Option<BookEntry>, EngineError> {
        let entries = self.snapshot(book_id, false).await?;
        for entry in entries {
            if exclude_tiers.contains(&entry.registration.tier) {
                continue;
            }
            let worker_id = entry.registration.worker_id;
            if self
                .dal
                .restriction()
                .active_blackout_for(worker_id, employer_id)
                .await?
                .is_some()
            {
                debug!(worker_id = %worker_id, "Skipping blacked-out worker in preview");
                continue;
            }
            if remote
                && self
                    .dal
                    .restriction()
                    .active_suspension_for(worker_id)
                    .await?
                    .is_some()
            {
                debug!(worker_id = %worker_id, "Skipping suspended worker in remote preview");
                continue;
            }
            return Ok(Some(entry));
        }
        Ok(None)
    }

    /// Counts a book's non-terminal registrations by status, and its Active
    /// ones by tier.
    pub async fn depth(&self, book_id: UniversalUuid) -> Result<BookDepth, EngineError> {
        // Validates the book exists before counting.
        self.dal.book().get_by_id(book_id).await?;
        let registrations = self.dal.registration().list_open_for_book(book_id).await?;

        let mut depth = BookDepth::default();
        for registration in registrations {
            match registration.status {
                RegistrationStatus::Active => {
                    depth.active += 1;
                    *depth.active_by_tier.entry(registration.tier).or_insert(0) += 1;
                }
                RegistrationStatus::Dispatched => depth.dispatched += 1,
                RegistrationStatus::Exempt => depth.exempt += 1,
                RegistrationStatus::Resigned | RegistrationStatus::RolledOff => {}
            }
        }
        Ok(depth)
    }

    /// Estimates the wait until dispatch for an Active registration.
    ///
    /// position / (dispatches observed over the trailing window, per day).
    /// Below the configured sample floor the estimate carries `Low`
    /// confidence rather than false precision.
    pub async fn estimate_wait(
        &self,
        registration_id: UniversalUuid,
    ) -> Result<WaitEstimate, EngineError> {
        let registration = self.dal.registration().get_by_id(registration_id).await?;
        if registration.status != RegistrationStatus::Active {
            return Err(DomainViolation::WrongRegistrationStatus {
                required: "Active",
                status: registration.status.to_string(),
            }
            .into());
        }

        let entries = self.snapshot(registration.book_id, false).await?;
        let position = entries
            .iter()
            .find(|e| e.registration.id == registration_id)
            .map(|e| e.position)
            .ok_or(DomainViolation::NotRegisteredOnBook {
                worker_id: registration.worker_id,
            })?;

        let window_days = self.config.wait_estimate_window_days();
        let since = UniversalTimestamp::from(
            *UniversalTimestamp::now().as_datetime() - chrono::Duration::days(window_days),
        );
        let observed = self
            .dal
            .activity()
            .count_book_dispatches_since(registration.book_id, since)
            .await?;

        let rate_per_day = observed as f64 / window_days as f64;
        let estimated_days = if rate_per_day > 0.0 {
            Some(position as f64 / rate_per_day)
        } else {
            None
        };
        let confidence = if (observed as usize) < self.config.wait_estimate_min_samples() {
            Confidence::Low
        } else {
            Confidence::Normal
        };

        Ok(WaitEstimate {
            position,
            estimated_days,
            observed_dispatches: observed,
            confidence,
        })
    }
}
