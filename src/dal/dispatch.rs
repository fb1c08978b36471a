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

//! DAL for dispatches.
//!
//! Dispatch creation is a claim: candidate scan, registration transition,
//! dispatch insert, and fill-counter bump all run inside one `IMMEDIATE`
//! transaction, so two concurrent dispatches can never select the same
//! registration. Termination fans out: quit/discharge cascades across every
//! book the worker is on, short-call end restores the original registration.

use diesel::prelude::*;

use super::activity::{record_activity, ActivityEntry};
use super::audit_outbox::queue_audit_event;
use super::bid::load_bid;
use super::job_request::load_request;
use super::models::{NewSqliteDispatch, SqliteDispatch, SqliteRegistration};
use super::registration::{derived_position, load_registration, roll_off_in_txn};
use super::restriction::{active_blackout, impose_blackout};
use super::{to_domain, to_json, TxnError, DAL};
use crate::database::schema::{dispatches, job_requests, registrations};
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{
    ActivityAction, Bid, BidStatus, Blackout, Dispatch, DispatchMethod, DispatchStatus,
    JobRequest, Registration, RegistrationStatus, RemovalReason, RequestStatus, TerminationReason,
};

/// Loads a dispatch row or aborts with `DispatchNotFound`.
pub(crate) fn load_dispatch(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<SqliteDispatch, TxnError> {
    dispatches::table
        .filter(dispatches::id.eq(id.to_vec()))
        .select(SqliteDispatch::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainViolation::DispatchNotFound(*id).into())
}

fn require_open_with_capacity(request: &JobRequest) -> Result<(), TxnError> {
    if !request.is_open() {
        return Err(DomainViolation::RequestNotOpen {
            status: request.status.to_string(),
        }
        .into());
    }
    if request.remaining() <= 0 {
        return Err(DomainViolation::RequestFilled {
            requested: request.workers_requested,
            filled: request.workers_filled,
        }
        .into());
    }
    Ok(())
}

/// Creates the dispatch, flips the registration to Dispatched, and bumps the
/// request's fill counter, all on the caller's transaction.
fn create_dispatch_in_txn(
    conn: &mut SqliteConnection,
    registration: &Registration,
    request: &JobRequest,
    bid_id: Option<UniversalUuid>,
    method: DispatchMethod,
    check_in_deadline: Option<UniversalTimestamp>,
    invert: bool,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Dispatch, TxnError> {
    let prior_position = derived_position(
        conn,
        registration.book_id.as_bytes(),
        registration.tier,
        &registration.ordering_key.to_sortable_string(),
        invert,
    )?;

    let id = UniversalUuid::new_v4();
    let row = NewSqliteDispatch {
        id: id.to_vec(),
        registration_id: registration.id.to_vec(),
        job_request_id: request.id.to_vec(),
        bid_id: bid_id.map(|b| b.to_vec()),
        employer_id: request.employer_id.to_vec(),
        worker_id: registration.worker_id.to_vec(),
        book_id: registration.book_id.to_vec(),
        method: method.as_str().to_string(),
        short_duration: request.metadata.short_duration,
        starts_at: request.target_date.to_rfc3339(),
        check_in_deadline: check_in_deadline.map(|t| t.to_rfc3339()),
        status: DispatchStatus::Pending.as_str().to_string(),
        created_at: now.to_rfc3339(),
        updated_at: now.to_rfc3339(),
    };
    diesel::insert_into(dispatches::table).values(&row).execute(conn)?;

    diesel::update(registrations::table.filter(registrations::id.eq(registration.id.to_vec())))
        .set((
            registrations::status.eq(RegistrationStatus::Dispatched.as_str()),
            registrations::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let new_filled = request.workers_filled + 1;
    let new_status = if new_filled >= request.workers_requested {
        RequestStatus::Filled
    } else {
        RequestStatus::PartiallyFilled
    };
    diesel::update(job_requests::table.filter(job_requests::id.eq(request.id.to_vec())))
        .set((
            job_requests::workers_filled.eq(new_filled),
            job_requests::status.eq(new_status.as_str()),
            job_requests::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let dispatch: Dispatch = to_domain(load_dispatch(conn, &id)?)?;
    let reg_after: Registration = to_domain(load_registration(conn, &registration.id)?)?;
    let request_after: JobRequest = to_domain(load_request(conn, &request.id)?)?;

    record_activity(
        conn,
        ActivityEntry {
            registration_id: Some(registration.id),
            dispatch_id: Some(id),
            worker_id: registration.worker_id,
            book_id: Some(registration.book_id),
            action: ActivityAction::Dispatched,
            prior_status: Some(registration.status.to_string()),
            new_status: Some(reg_after.status.to_string()),
            prior_position: Some(prior_position),
            new_position: None,
            actor: actor.to_string(),
            reason: Some(method.as_str().to_string()),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "dispatches",
        &id,
        "create",
        None,
        Some(to_json(&dispatch)?),
        actor,
        now,
    )?;
    queue_audit_event(
        conn,
        "registrations",
        &registration.id,
        "dispatch",
        Some(to_json(registration)?),
        Some(to_json(&reg_after)?),
        actor,
        now,
    )?;
    queue_audit_event(
        conn,
        "job_requests",
        &request.id,
        "fill",
        Some(to_json(request)?),
        Some(to_json(&request_after)?),
        actor,
        now,
    )?;

    Ok(dispatch)
}

fn set_dispatch_terminated(
    conn: &mut SqliteConnection,
    before: &Dispatch,
    reason: TerminationReason,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Dispatch, TxnError> {
    diesel::update(dispatches::table.filter(dispatches::id.eq(before.id.to_vec())))
        .set((
            dispatches::status.eq(DispatchStatus::Terminated.as_str()),
            dispatches::terminated_at.eq(now.to_rfc3339()),
            dispatches::termination_reason.eq(reason.as_str()),
            dispatches::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let after: Dispatch = to_domain(load_dispatch(conn, &before.id)?)?;
    record_activity(
        conn,
        ActivityEntry {
            registration_id: Some(before.registration_id),
            dispatch_id: Some(before.id),
            worker_id: before.worker_id,
            book_id: Some(before.book_id),
            action: ActivityAction::Terminated,
            prior_status: Some(before.status.to_string()),
            new_status: Some(after.status.to_string()),
            prior_position: None,
            new_position: None,
            actor: actor.to_string(),
            reason: Some(reason.to_string()),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "dispatches",
        &before.id,
        "terminate",
        Some(to_json(before)?),
        Some(to_json(&after)?),
        actor,
        now,
    )?;
    Ok(after)
}

/// Returns a Dispatched registration to Active with its original key.
///
/// `restoration_increment` is 1 when the restoration counts against the
/// short-call cap, otherwise 0.
fn return_registration_to_book(
    conn: &mut SqliteConnection,
    registration_id: &UniversalUuid,
    action: ActivityAction,
    restoration_increment: i32,
    invert: bool,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Registration, TxnError> {
    let before: Registration = to_domain(load_registration(conn, registration_id)?)?;
    if before.status != RegistrationStatus::Dispatched {
        return Err(DomainViolation::WrongRegistrationStatus {
            required: "Dispatched",
            status: before.status.to_string(),
        }
        .into());
    }

    diesel::update(registrations::table.filter(registrations::id.eq(registration_id.to_vec())))
        .set((
            registrations::status.eq(RegistrationStatus::Active.as_str()),
            registrations::restoration_count
                .eq(before.restoration_count + restoration_increment),
            registrations::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let after: Registration = to_domain(load_registration(conn, registration_id)?)?;
    let position = derived_position(
        conn,
        after.book_id.as_bytes(),
        after.tier,
        &after.ordering_key.to_sortable_string(),
        invert,
    )?;

    record_activity(
        conn,
        ActivityEntry {
            registration_id: Some(*registration_id),
            dispatch_id: None,
            worker_id: after.worker_id,
            book_id: Some(after.book_id),
            action,
            prior_status: Some(before.status.to_string()),
            new_status: Some(after.status.to_string()),
            prior_position: None,
            new_position: Some(position),
            actor: actor.to_string(),
            reason: None,
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "registrations",
        registration_id,
        "return_to_book",
        Some(to_json(&before)?),
        Some(to_json(&after)?),
        actor,
        now,
    )?;

    Ok(after)
}

/// DAL for dispatch operations.
pub struct DispatchDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DispatchDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Dispatches the next eligible registration in book order.
    ///
    /// Skips registrations whose worker has an active blackout against the
    /// request's employer. Returns `Ok(None)` when the book has no eligible
    /// registration; an exhausted book is not an error.
    pub async fn dispatch_from_queue(
        &self,
        request_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<Option<Dispatch>, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let request: JobRequest = to_domain(load_request(conn, &request_id)?)?;
                require_open_with_capacity(&request)?;

                let base = registrations::table
                    .filter(registrations::book_id.eq(request.book_id.to_vec()))
                    .filter(registrations::status.eq(RegistrationStatus::Active.as_str()))
                    .select(SqliteRegistration::as_select());
                let rows: Vec<SqliteRegistration> = if invert {
                    base.order((
                        registrations::tier.desc(),
                        registrations::ordering_key.asc(),
                    ))
                    .load(conn)?
                } else {
                    base.order((
                        registrations::tier.asc(),
                        registrations::ordering_key.asc(),
                    ))
                    .load(conn)?
                };

                let mut candidate = None;
                for row in rows {
                    let registration: Registration = to_domain(row)?;
                    let barred = active_blackout(
                        conn,
                        &registration.worker_id,
                        &request.employer_id,
                        &now,
                    )?
                    .is_some();
                    if !barred {
                        candidate = Some(registration);
                        break;
                    }
                }
                let registration = match candidate {
                    Some(r) => r,
                    None => return Ok(None),
                };

                create_dispatch_in_txn(
                    conn,
                    &registration,
                    &request,
                    None,
                    DispatchMethod::QueueOrder,
                    None,
                    invert,
                    &actor,
                    &now,
                )
                .map(Some)
            })
            .await
    }

    /// Dispatches an employer-named worker, bypassing book order.
    ///
    /// Refused when the (worker, employer) pair is under an active blackout
    /// or the worker holds no Active registration on the request's book.
    pub async fn dispatch_by_name(
        &self,
        request_id: UniversalUuid,
        worker_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<Dispatch, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let request: JobRequest = to_domain(load_request(conn, &request_id)?)?;
                require_open_with_capacity(&request)?;

                if let Some(blackout) =
                    active_blackout(conn, &worker_id, &request.employer_id, &now)?
                {
                    return Err(DomainViolation::BlackoutActive {
                        worker_id,
                        employer_id: request.employer_id,
                        until: blackout.expires_at,
                    }
                    .into());
                }

                let row: Option<SqliteRegistration> = registrations::table
                    .filter(registrations::worker_id.eq(worker_id.to_vec()))
                    .filter(registrations::book_id.eq(request.book_id.to_vec()))
                    .filter(registrations::status.eq(RegistrationStatus::Active.as_str()))
                    .select(SqliteRegistration::as_select())
                    .first(conn)
                    .optional()?;
                let registration: Registration = match row {
                    Some(r) => to_domain(r)?,
                    None => return Err(DomainViolation::NotRegisteredOnBook { worker_id }.into()),
                };

                create_dispatch_in_txn(
                    conn,
                    &registration,
                    &request,
                    None,
                    DispatchMethod::NamedRequest,
                    None,
                    invert,
                    &actor,
                    &now,
                )
            })
            .await
    }

    /// Turns an Accepted bid into a dispatch with a check-in deadline.
    pub async fn dispatch_from_bid(
        &self,
        bid_id: UniversalUuid,
        check_in_deadline_hours: i64,
        invert: bool,
        actor: String,
    ) -> Result<Dispatch, EngineError> {
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

                let request: JobRequest = to_domain(load_request(conn, &bid.job_request_id)?)?;
                require_open_with_capacity(&request)?;

                let registration: Registration =
                    to_domain(load_registration(conn, &bid.registration_id)?)?;
                if registration.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active",
                        status: registration.status.to_string(),
                    }
                    .into());
                }

                let deadline = UniversalTimestamp::from(
                    *now.as_datetime() + chrono::Duration::hours(check_in_deadline_hours),
                );
                create_dispatch_in_txn(
                    conn,
                    &registration,
                    &request,
                    Some(bid_id),
                    DispatchMethod::FromBid,
                    Some(deadline),
                    invert,
                    &actor,
                    &now,
                )
            })
            .await
    }

    /// Employer confirms the worker: Pending -> CheckedIn. Refused once the
    /// check-in deadline has lapsed.
    pub async fn record_check_in(
        &self,
        dispatch_id: UniversalUuid,
        actor: String,
    ) -> Result<Dispatch, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status != DispatchStatus::Pending {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "Pending",
                        status: before.status.to_string(),
                    }
                    .into());
                }
                if let Some(deadline) = before.check_in_deadline {
                    if now > deadline {
                        return Err(DomainViolation::CheckInDeadlinePassed { deadline }.into());
                    }
                }

                diesel::update(dispatches::table.filter(dispatches::id.eq(dispatch_id.to_vec())))
                    .set((
                        dispatches::status.eq(DispatchStatus::CheckedIn.as_str()),
                        dispatches::checked_in_at.eq(now.to_rfc3339()),
                        dispatches::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                let after: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(before.registration_id),
                        dispatch_id: Some(dispatch_id),
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::CheckedIn,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: None,
                        new_position: None,
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "dispatches",
                    &dispatch_id,
                    "check_in",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;
                Ok(after)
            })
            .await
    }

    /// Work starts: CheckedIn -> Active.
    pub async fn begin_work(
        &self,
        dispatch_id: UniversalUuid,
        actor: String,
    ) -> Result<Dispatch, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status != DispatchStatus::CheckedIn {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "CheckedIn",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                diesel::update(dispatches::table.filter(dispatches::id.eq(dispatch_id.to_vec())))
                    .set((
                        dispatches::status.eq(DispatchStatus::Active.as_str()),
                        dispatches::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                let after: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(before.registration_id),
                        dispatch_id: Some(dispatch_id),
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::WorkBegan,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: None,
                        new_position: None,
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "dispatches",
                    &dispatch_id,
                    "begin_work",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;
                Ok(after)
            })
            .await
    }

    /// Natural end of the job: dispatch Completed, registration back to
    /// Active with its original ordering key.
    pub async fn complete(
        &self,
        dispatch_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<(Dispatch, Registration), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if !matches!(
                    before.status,
                    DispatchStatus::CheckedIn | DispatchStatus::Active
                ) {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "CheckedIn or Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                diesel::update(dispatches::table.filter(dispatches::id.eq(dispatch_id.to_vec())))
                    .set((
                        dispatches::status.eq(DispatchStatus::Completed.as_str()),
                        dispatches::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                let after: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(before.registration_id),
                        dispatch_id: Some(dispatch_id),
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::Completed,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: None,
                        new_position: None,
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "dispatches",
                    &dispatch_id,
                    "complete",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                let registration = return_registration_to_book(
                    conn,
                    &before.registration_id,
                    ActivityAction::ReturnedToBook,
                    0,
                    invert,
                    &actor,
                    &now,
                )?;

                Ok((after, registration))
            })
            .await
    }

    /// Quit or discharge: terminates the dispatch, rolls the worker off
    /// every book where they hold a non-terminal registration, and imposes
    /// one (worker, employer) blackout. All in a single transaction.
    pub async fn terminate_quit_or_discharge(
        &self,
        dispatch_id: UniversalUuid,
        reason: TerminationReason,
        blackout_days: i64,
        invert: bool,
        actor: String,
    ) -> Result<(Dispatch, Vec<Registration>, Blackout), EngineError> {
        self.dal
            .immediate(move |conn| {
                let removal = match reason {
                    TerminationReason::Quit => RemovalReason::Quit,
                    TerminationReason::Discharged => RemovalReason::Discharged,
                    other => {
                        return Err(TxnError::Conversion(format!(
                            "terminate_quit_or_discharge called with reason {}",
                            other
                        )))
                    }
                };

                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status.is_terminal() {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "Pending, CheckedIn or Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let dispatch = set_dispatch_terminated(conn, &before, reason, &actor, &now)?;

                // Roll off every non-terminal registration the worker holds,
                // across all books.
                let rows: Vec<SqliteRegistration> = registrations::table
                    .filter(registrations::worker_id.eq(before.worker_id.to_vec()))
                    .filter(registrations::status.ne_all(vec![
                        RegistrationStatus::Resigned.as_str(),
                        RegistrationStatus::RolledOff.as_str(),
                    ]))
                    .select(SqliteRegistration::as_select())
                    .load(conn)?;
                let mut rolled_off = Vec::with_capacity(rows.len());
                for row in rows {
                    rolled_off.push(roll_off_in_txn(conn, row, removal, &actor, &now, invert)?);
                }

                let expires = UniversalTimestamp::from(
                    *now.as_datetime() + chrono::Duration::days(blackout_days),
                );
                let blackout = impose_blackout(
                    conn,
                    &before.worker_id,
                    &before.employer_id,
                    reason.as_str(),
                    &expires,
                    &actor,
                    &now,
                )?;

                Ok((dispatch, rolled_off, blackout))
            })
            .await
    }

    /// Employer reduction in force: plain termination, no penalty, no
    /// blackout. The dispatched registration rolls off this book only.
    pub async fn terminate_reduction_in_force(
        &self,
        dispatch_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<(Dispatch, Registration), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status.is_terminal() {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "Pending, CheckedIn or Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let dispatch = set_dispatch_terminated(
                    conn,
                    &before,
                    TerminationReason::ReductionInForce,
                    &actor,
                    &now,
                )?;
                let row = load_registration(conn, &before.registration_id)?;
                let registration = roll_off_in_txn(
                    conn,
                    row,
                    RemovalReason::ReductionInForce,
                    &actor,
                    &now,
                    invert,
                )?;
                Ok((dispatch, registration))
            })
            .await
    }

    /// Short-call end: restores the registration to Active with its
    /// original key.
    ///
    /// Jobs at or below `free_days` never count against the restoration cap;
    /// longer short jobs increment it, and once the counter is at
    /// `max_restorations` the next counted restoration is refused.
    pub async fn terminate_short_call(
        &self,
        dispatch_id: UniversalUuid,
        free_days: i64,
        max_restorations: i32,
        invert: bool,
        actor: String,
    ) -> Result<(Dispatch, Registration), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status.is_terminal() {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "Pending, CheckedIn or Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }
                if !before.short_duration {
                    return Err(DomainViolation::NotShortDuration.into());
                }

                let duration_days =
                    (*now.as_datetime() - *before.starts_at.as_datetime()).num_days();
                let counted = duration_days > free_days;
                if counted {
                    let registration: Registration =
                        to_domain(load_registration(conn, &before.registration_id)?)?;
                    if registration.restoration_count >= max_restorations {
                        return Err(DomainViolation::RestorationLimitReached {
                            limit: max_restorations,
                        }
                        .into());
                    }
                }

                let dispatch = set_dispatch_terminated(
                    conn,
                    &before,
                    TerminationReason::ShortCallEnd,
                    &actor,
                    &now,
                )?;
                let registration = return_registration_to_book(
                    conn,
                    &before.registration_id,
                    ActivityAction::Restored,
                    if counted { 1 } else { 0 },
                    invert,
                    &actor,
                    &now,
                )?;
                Ok((dispatch, registration))
            })
            .await
    }

    /// No-show: the check-in deadline lapsed. Dispatch terminated, the
    /// registration rolls off. Applied by enforcement.
    pub async fn terminate_no_show(
        &self,
        dispatch_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<(Dispatch, Registration), EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Dispatch = to_domain(load_dispatch(conn, &dispatch_id)?)?;
                if before.status != DispatchStatus::Pending {
                    return Err(DomainViolation::WrongDispatchStatus {
                        required: "Pending",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let dispatch = set_dispatch_terminated(
                    conn,
                    &before,
                    TerminationReason::NoShow,
                    &actor,
                    &now,
                )?;
                let row = load_registration(conn, &before.registration_id)?;
                let registration =
                    roll_off_in_txn(conn, row, RemovalReason::NoShow, &actor, &now, invert)?;
                Ok((dispatch, registration))
            })
            .await
    }

    /// Fetches a dispatch by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Dispatch, EngineError> {
        self.dal
            .read(move |conn| to_domain(load_dispatch(conn, &id)?))
            .await
    }

    /// Pending dispatches whose check-in deadline precedes `now`.
    pub async fn list_pending_past_deadline(
        &self,
        now: UniversalTimestamp,
    ) -> Result<Vec<Dispatch>, EngineError> {
        let cutoff = now.to_rfc3339();
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteDispatch> = dispatches::table
                    .filter(dispatches::status.eq(DispatchStatus::Pending.as_str()))
                    .filter(dispatches::check_in_deadline.is_not_null())
                    .filter(dispatches::check_in_deadline.lt(cutoff))
                    .select(SqliteDispatch::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }
}
