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

//! Request and bid market.
//!
//! Employer demand comes in as job requests; workers claim open requests by
//! bidding. Requests submitted after the daily cutoff miss the next dispatch
//! cycle: their effective target date is floored to the cycle after it, and
//! the stored `target_date` reflects that.

use std::sync::Arc;

use chrono::Timelike;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::directory::EmployerDirectory;
use crate::error::{DomainViolation, EngineError};
use crate::events::{EngineEvent, EventSink};
use crate::models::{penalty_eligibility, Bid, BidMethod, JobRequest, NewJobRequest, Suspension};

/// Start of the earliest dispatch cycle a request submitted at `now` can
/// target: midnight tomorrow before the cutoff hour, midnight the day after
/// once the cutoff has passed.
fn earliest_cycle(now: &UniversalTimestamp, cutoff_hour: u32) -> UniversalTimestamp {
    let now_dt = *now.as_datetime();
    let days_ahead = if now_dt.hour() < cutoff_hour { 1 } else { 2 };
    let date = now_dt.date_naive() + chrono::Days::new(days_ahead);
    UniversalTimestamp::from(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Request and bid market service.
pub struct RequestMarket {
    dal: DAL,
    config: EngineConfig,
    employers: Arc<dyn EmployerDirectory>,
    events: Arc<dyn EventSink>,
}

impl RequestMarket {
    pub fn new(
        dal: DAL,
        config: EngineConfig,
        employers: Arc<dyn EmployerDirectory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            dal,
            config,
            employers,
            events,
        }
    }

    /// Creates a job request.
    ///
    /// `penalty_eligible` is computed here, exactly once, from the metadata
    /// flags; it is stored and never re-derived. Post-cutoff submissions are
    /// deferred by flooring the target date to the next open cycle.
    pub async fn create_request(
        &self,
        mut new_request: NewJobRequest,
        actor: &str,
    ) -> Result<JobRequest, EngineError> {
        self.employers
            .lookup(new_request.employer_id)
            .await
            .ok_or(DomainViolation::EmployerNotFound(new_request.employer_id))?;
        // Fails early on an unknown book.
        self.dal.book().get_by_id(new_request.book_id).await?;

        let now = UniversalTimestamp::now();
        let floor = earliest_cycle(&now, self.config.daily_cutoff_hour());
        if new_request.target_date < floor {
            info!(
                requested = %new_request.target_date,
                effective = %floor,
                "Request submitted past the daily cutoff; deferred to the next cycle"
            );
            new_request.target_date = floor;
        }

        let eligible = penalty_eligibility(&new_request.metadata);
        let request = self
            .dal
            .job_request()
            .create(new_request, eligible, actor.to_string())
            .await?;
        info!(
            request_id = %request.id,
            workers_requested = request.workers_requested,
            penalty_eligible = request.penalty_eligible,
            "Job request created"
        );
        Ok(request)
    }

    /// Cancels an open or partially-filled request.
    pub async fn cancel_request(
        &self,
        request_id: UniversalUuid,
        actor: &str,
    ) -> Result<JobRequest, EngineError> {
        let request = self
            .dal
            .job_request()
            .cancel(request_id, actor.to_string())
            .await?;
        info!(request_id = %request_id, "Job request cancelled");
        Ok(request)
    }

    /// Expires a request whose target date has passed. Called by
    /// enforcement.
    pub async fn expire_request(
        &self,
        request_id: UniversalUuid,
        actor: &str,
    ) -> Result<JobRequest, EngineError> {
        let request = self
            .dal
            .job_request()
            .expire(request_id, actor.to_string())
            .await?;
        self.events.emit(EngineEvent::RequestExpired {
            job_request_id: request_id,
        });
        Ok(request)
    }

    /// Fetches a request.
    pub async fn get_request(&self, request_id: UniversalUuid) -> Result<JobRequest, EngineError> {
        self.dal.job_request().get_by_id(request_id).await
    }

    /// Places a bid for a worker on an open request.
    ///
    /// The worker's registration on the request's book is resolved here; the
    /// window, duplicate, suspension, and online-bidding checks run inside
    /// the bid transaction.
    pub async fn place_bid(
        &self,
        worker_id: UniversalUuid,
        request_id: UniversalUuid,
        method: BidMethod,
        actor: &str,
    ) -> Result<Bid, EngineError> {
        let request = self.dal.job_request().get_by_id(request_id).await?;
        let registration = self
            .dal
            .registration()
            .get_open_for_worker_on_book(worker_id, request.book_id)
            .await?
            .ok_or(DomainViolation::NotRegisteredOnBook { worker_id })?;

        let bid = self
            .dal
            .bid()
            .place(
                worker_id,
                request_id,
                registration.id,
                method,
                actor.to_string(),
            )
            .await?;
        info!(bid_id = %bid.id, worker_id = %worker_id, request_id = %request_id, "Bid placed");
        Ok(bid)
    }

    /// Processes a request's pending bids in book order, accepting up to the
    /// remaining capacity. Returns (accepted, not_selected).
    pub async fn process_bids(
        &self,
        request_id: UniversalUuid,
        actor: &str,
    ) -> Result<(Vec<Bid>, Vec<Bid>), EngineError> {
        let (accepted, not_selected) = self
            .dal
            .bid()
            .process(
                request_id,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(
            request_id = %request_id,
            accepted = accepted.len(),
            not_selected = not_selected.len(),
            "Processed pending bids"
        );
        Ok((accepted, not_selected))
    }

    /// Worker backs out of an accepted bid.
    ///
    /// Treated as a voluntary quit: rejections accumulate over a rolling
    /// window and the limit imposes a bidding suspension. Returns the
    /// suspension when this rejection triggered one.
    pub async fn reject_accepted_bid(
        &self,
        bid_id: UniversalUuid,
        reason: Option<String>,
        actor: &str,
    ) -> Result<(Bid, Option<Suspension>), EngineError> {
        let (bid, suspension) = self
            .dal
            .bid()
            .reject_accepted(
                bid_id,
                self.config.bid_rejection_limit(),
                self.config.bid_rejection_window_months(),
                self.config.suspension_months(),
                reason,
                actor.to_string(),
            )
            .await?;

        if let Some(ref suspension) = suspension {
            warn!(
                worker_id = %bid.worker_id,
                until = %suspension.expires_at,
                "Bid rejection limit reached; bidding suspension imposed"
            );
            self.events.emit(EngineEvent::SuspensionImposed {
                worker_id: bid.worker_id,
                expires_at: suspension.expires_at,
            });
        }
        Ok((bid, suspension))
    }

    /// Withdraws a pending bid.
    pub async fn withdraw_bid(
        &self,
        bid_id: UniversalUuid,
        actor: &str,
    ) -> Result<Bid, EngineError> {
        self.dal.bid().withdraw(bid_id, actor.to_string()).await
    }
}
