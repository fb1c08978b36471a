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

//! DAL for bids.
//!
//! Bid selection respects book order: pending bids are processed in (tier,
//! ordering key) order of the bidding registrations, never submission order.
//! Rejecting an accepted bid is the penalty path that feeds the rolling
//! suspension rule.

use diesel::prelude::*;

use super::activity::{record_activity, ActivityEntry};
use super::audit_outbox::queue_audit_event;
use super::book::load_book;
use super::job_request::load_request;
use super::models::{NewSqliteBid, SqliteBid};
use super::registration::load_registration;
use super::restriction::{active_suspension, impose_suspension};
use super::{to_domain, to_json, TxnError, DAL};
use crate::database::schema::bids;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{
    ActivityAction, Bid, BidMethod, BidStatus, JobRequest, Registration, RegistrationStatus,
    Suspension,
};

/// Loads a bid row or aborts with `BidNotFound`.
pub(crate) fn load_bid(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<SqliteBid, TxnError> {
    bids::table
        .filter(bids::id.eq(id.to_vec()))
        .select(SqliteBid::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainViolation::BidNotFound(*id).into())
}

fn set_bid_status(
    conn: &mut SqliteConnection,
    bid: &Bid,
    to_status: BidStatus,
    book_id: UniversalUuid,
    reason: Option<String>,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Bid, TxnError> {
    diesel::update(bids::table.filter(bids::id.eq(bid.id.to_vec())))
        .set((
            bids::status.eq(to_status.as_str()),
            bids::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let after: Bid = to_domain(load_bid(conn, &bid.id)?)?;

    let action = match to_status {
        BidStatus::Accepted => ActivityAction::BidAccepted,
        BidStatus::NotSelected => ActivityAction::BidNotSelected,
        BidStatus::Withdrawn => ActivityAction::BidWithdrawn,
        BidStatus::Rejected => ActivityAction::BidRejected,
        BidStatus::Pending => ActivityAction::BidPlaced,
    };
    record_activity(
        conn,
        ActivityEntry {
            registration_id: Some(bid.registration_id),
            dispatch_id: None,
            worker_id: bid.worker_id,
            book_id: Some(book_id),
            action,
            prior_status: Some(bid.status.to_string()),
            new_status: Some(after.status.to_string()),
            prior_position: None,
            new_position: None,
            actor: actor.to_string(),
            reason: reason.clone(),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "bids",
        &bid.id,
        &to_status.as_str().to_lowercase(),
        Some(to_json(bid)?),
        Some(to_json(&after)?),
        actor,
        now,
    )?;

    Ok(after)
}

/// DAL for bid operations.
pub struct BidDAL<'a> {
    dal: &'a DAL,
}

impl<'a> BidDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Places a bid on a request.
    ///
    /// Checks, all inside one transaction: the request is open with its
    /// bidding window open; the registration is the worker's and Active on
    /// the request's book; no duplicate pending bid; for remote bids, the
    /// book allows online bidding and the worker holds no active suspension.
    pub async fn place(
        &self,
        worker_id: UniversalUuid,
        request_id: UniversalUuid,
        registration_id: UniversalUuid,
        method: BidMethod,
        actor: String,
    ) -> Result<Bid, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let request: JobRequest = to_domain(load_request(conn, &request_id)?)?;
                if !request.is_open() {
                    return Err(DomainViolation::RequestNotOpen {
                        status: request.status.to_string(),
                    }
                    .into());
                }
                if !request.bidding_window_open(now) {
                    return Err(DomainViolation::BiddingClosed.into());
                }

                let registration: Registration =
                    to_domain(load_registration(conn, &registration_id)?)?;
                if registration.worker_id != worker_id
                    || registration.book_id != request.book_id
                    || registration.status != RegistrationStatus::Active
                {
                    return Err(DomainViolation::NotRegisteredOnBook { worker_id }.into());
                }

                if method == BidMethod::Remote {
                    let book = load_book(conn, &request.book_id)?;
                    if !book.online_bidding {
                        return Err(DomainViolation::BiddingNotEnabled(book.name).into());
                    }
                    if let Some(suspension) = active_suspension(conn, &worker_id, &now)? {
                        return Err(DomainViolation::BiddingSuspended {
                            worker_id,
                            until: suspension.expires_at,
                        }
                        .into());
                    }
                }

                let pending: i64 = bids::table
                    .filter(bids::worker_id.eq(worker_id.to_vec()))
                    .filter(bids::job_request_id.eq(request_id.to_vec()))
                    .filter(bids::status.eq(BidStatus::Pending.as_str()))
                    .count()
                    .get_result(conn)?;
                if pending > 0 {
                    return Err(DomainViolation::DuplicateBid.into());
                }

                let id = UniversalUuid::new_v4();
                let row = NewSqliteBid {
                    id: id.to_vec(),
                    worker_id: worker_id.to_vec(),
                    job_request_id: request_id.to_vec(),
                    registration_id: registration_id.to_vec(),
                    method: method.as_str().to_string(),
                    status: BidStatus::Pending.as_str().to_string(),
                    submitted_at: now.to_rfc3339(),
                    created_at: now.to_rfc3339(),
                    updated_at: now.to_rfc3339(),
                };
                diesel::insert_into(bids::table).values(&row).execute(conn)?;

                let bid: Bid = to_domain(load_bid(conn, &id)?)?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id,
                        book_id: Some(request.book_id),
                        action: ActivityAction::BidPlaced,
                        prior_status: None,
                        new_status: Some(bid.status.to_string()),
                        prior_position: None,
                        new_position: None,
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "bids",
                    &id,
                    "place",
                    None,
                    Some(to_json(&bid)?),
                    &actor,
                    &now,
                )?;

                Ok(bid)
            })
            .await
    }

    /// Processes a request's pending bids.
    ///
    /// Bids are ranked by their registration's (tier, ordering key); the top
    /// bids up to the request's remaining capacity are Accepted and the rest
    /// NotSelected. Bids whose registration is no longer Active are never
    /// selected. Returns (accepted, not_selected).
    pub async fn process(
        &self,
        request_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<(Vec<Bid>, Vec<Bid>), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let request: JobRequest = to_domain(load_request(conn, &request_id)?)?;
                if !request.is_open() {
                    return Err(DomainViolation::RequestNotOpen {
                        status: request.status.to_string(),
                    }
                    .into());
                }

                let rows: Vec<SqliteBid> = bids::table
                    .filter(bids::job_request_id.eq(request_id.to_vec()))
                    .filter(bids::status.eq(BidStatus::Pending.as_str()))
                    .select(SqliteBid::as_select())
                    .load(conn)?;

                let mut candidates: Vec<(Bid, Registration)> = Vec::with_capacity(rows.len());
                for row in rows {
                    let bid: Bid = to_domain(row)?;
                    let registration: Registration =
                        to_domain(load_registration(conn, &bid.registration_id)?)?;
                    candidates.push((bid, registration));
                }
                candidates.sort_by(|(_, a), (_, b)| {
                    let tier_order = if invert {
                        b.tier.cmp(&a.tier)
                    } else {
                        a.tier.cmp(&b.tier)
                    };
                    tier_order.then_with(|| a.ordering_key.cmp(&b.ordering_key))
                });

                let mut remaining = request.remaining();
                let mut accepted = Vec::new();
                let mut not_selected = Vec::new();
                for (bid, registration) in candidates {
                    let selectable =
                        registration.status == RegistrationStatus::Active && remaining > 0;
                    if selectable {
                        accepted.push(set_bid_status(
                            conn,
                            &bid,
                            BidStatus::Accepted,
                            registration.book_id,
                            None,
                            &actor,
                            &now,
                        )?);
                        remaining -= 1;
                    } else {
                        not_selected.push(set_bid_status(
                            conn,
                            &bid,
                            BidStatus::NotSelected,
                            registration.book_id,
                            None,
                            &actor,
                            &now,
                        )?);
                    }
                }

                Ok((accepted, not_selected))
            })
            .await
    }

    /// Worker rejects a bid that was already accepted.
    ///
    /// Counts as a voluntary quit for penalty purposes. Rejections are
    /// counted over a rolling window; reaching `rejection_limit` inside the
    /// window imposes a bidding suspension in the same transaction. A
    /// rejection attempted while already suspended is refused outright.
    pub async fn reject_accepted(
        &self,
        bid_id: UniversalUuid,
        rejection_limit: i64,
        window_months: u32,
        suspension_months: u32,
        reason: Option<String>,
        actor: String,
    ) -> Result<(Bid, Option<Suspension>), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let bid: Bid = to_domain(load_bid(conn, &bid_id)?)?;
                if bid.status != BidStatus::Accepted {
                    return Err(DomainViolation::WrongBidStatus {
                        required: "Accepted",
                        status: bid.status.to_string(),
                    }
                    .into());
                }

                if let Some(suspension) = active_suspension(conn, &bid.worker_id, &now)? {
                    return Err(DomainViolation::BiddingSuspended {
                        worker_id: bid.worker_id,
                        until: suspension.expires_at,
                    }
                    .into());
                }

                let registration: Registration =
                    to_domain(load_registration(conn, &bid.registration_id)?)?;
                let rejected = set_bid_status(
                    conn,
                    &bid,
                    BidStatus::Rejected,
                    registration.book_id,
                    reason,
                    &actor,
                    &now,
                )?;

                let window_start = now
                    .as_datetime()
                    .checked_sub_months(chrono::Months::new(window_months))
                    .ok_or_else(|| TxnError::Conversion("rejection window out of range".into()))?;
                let in_window: i64 = bids::table
                    .filter(bids::worker_id.eq(bid.worker_id.to_vec()))
                    .filter(bids::status.eq(BidStatus::Rejected.as_str()))
                    .filter(bids::updated_at.ge(UniversalTimestamp::from(window_start).to_rfc3339()))
                    .count()
                    .get_result(conn)?;

                let suspension = if in_window >= rejection_limit {
                    let expires = now
                        .as_datetime()
                        .checked_add_months(chrono::Months::new(suspension_months))
                        .ok_or_else(|| {
                            TxnError::Conversion("suspension expiry out of range".into())
                        })?;
                    Some(impose_suspension(
                        conn,
                        &bid.worker_id,
                        &format!("{} bid rejections within {} months", in_window, window_months),
                        &UniversalTimestamp::from(expires),
                        &actor,
                        &now,
                    )?)
                } else {
                    None
                };

                Ok((rejected, suspension))
            })
            .await
    }

    /// Withdraws a pending bid.
    pub async fn withdraw(
        &self,
        bid_id: UniversalUuid,
        actor: String,
    ) -> Result<Bid, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let bid: Bid = to_domain(load_bid(conn, &bid_id)?)?;
                if bid.status != BidStatus::Pending {
                    return Err(DomainViolation::WrongBidStatus {
                        required: "Pending",
                        status: bid.status.to_string(),
                    }
                    .into());
                }
                let registration: Registration =
                    to_domain(load_registration(conn, &bid.registration_id)?)?;
                set_bid_status(
                    conn,
                    &bid,
                    BidStatus::Withdrawn,
                    registration.book_id,
                    None,
                    &actor,
                    &now,
                )
            })
            .await
    }

    /// Fetches a bid by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Bid, EngineError> {
        self.dal
            .read(move |conn| to_domain(load_bid(conn, &id)?))
            .await
    }

    /// All bids on a request, oldest first.
    pub async fn list_for_request(
        &self,
        request_id: UniversalUuid,
    ) -> Result<Vec<Bid>, EngineError> {
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteBid> = bids::table
                    .filter(bids::job_request_id.eq(request_id.to_vec()))
                    .order(bids::submitted_at.asc())
                    .select(SqliteBid::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }
}
