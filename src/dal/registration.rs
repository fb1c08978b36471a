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

//! DAL for registrations (the book ledger).
//!
//! Ordering keys are assigned here, once, inside the registration
//! transaction: the new key is strictly greater than the book's current
//! maximum, so book order is append-only and a registration's relative rank
//! never improves by mutation. Queue position is derived from the key on
//! every read; it is never stored.

use chrono::Datelike;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::activity::{record_activity, ActivityEntry};
use super::audit_outbox::queue_audit_event;
use super::book::load_book;
use super::models::{NewSqliteRegistration, SqliteRegistration};
use super::{to_domain, to_json, TxnError, DAL};
use crate::config::OrderingKeyPolicy;
use crate::database::schema::registrations;
use crate::database::{OrderingKey, UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{
    ActivityAction, AttendanceMissOutcome, ExemptReason, Registration, RegistrationStatus,
    RemovalReason,
};

/// Loads a registration row or aborts with `RegistrationNotFound`.
pub(crate) fn load_registration(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<SqliteRegistration, TxnError> {
    registrations::table
        .filter(registrations::id.eq(id.to_vec()))
        .select(SqliteRegistration::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainViolation::RegistrationNotFound(*id).into())
}

/// 1-based rank a registration with (`tier`, `ordering_key`) holds among the
/// book's Active registrations.
///
/// Tier ranks before key order; `invert` flips the tier convention so higher
/// tier numbers rank first. Keys compare as text because the sortable
/// encoding is fixed-width.
pub(crate) fn derived_position(
    conn: &mut SqliteConnection,
    book_id: &[u8],
    tier: i32,
    ordering_key: &str,
    invert: bool,
) -> Result<i32, TxnError> {
    let base = registrations::table
        .filter(registrations::book_id.eq(book_id.to_vec()))
        .filter(registrations::status.eq(RegistrationStatus::Active.as_str()));
    let key = ordering_key.to_string();

    let ahead: i64 = if invert {
        base.filter(
            registrations::tier.gt(tier).or(registrations::tier
                .eq(tier)
                .and(registrations::ordering_key.lt(key))),
        )
        .count()
        .get_result(conn)?
    } else {
        base.filter(
            registrations::tier.lt(tier).or(registrations::tier
                .eq(tier)
                .and(registrations::ordering_key.lt(key))),
        )
        .count()
        .get_result(conn)?
    };

    Ok((ahead + 1) as i32)
}

/// YYYYMMDD integer base for ordering keys assigned at `ts`.
pub(crate) fn date_base(ts: &UniversalTimestamp) -> Decimal {
    let date = ts.as_datetime().date_naive();
    Decimal::from(date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64)
}

/// Derives the next ordering key for a book.
///
/// The policy shapes the candidate's fractional part; either way the result
/// is bumped past the book's current maximum, so keys on a book are strictly
/// increasing regardless of policy.
pub(crate) fn next_ordering_key(
    current_max: Option<OrderingKey>,
    today_base: Decimal,
    policy: OrderingKeyPolicy,
    prior_registrations: i64,
) -> OrderingKey {
    let candidate = match policy {
        OrderingKeyPolicy::DateSequence => today_base + OrderingKey::step(),
        OrderingKeyPolicy::RegistrationSuffix => {
            // .0100 per prior registration on this book, capped below 1.0
            today_base + Decimal::new(prior_registrations.min(99), 2)
        }
    };

    match current_max {
        Some(max) if candidate <= max.as_decimal() => {
            OrderingKey::new(max.as_decimal() + OrderingKey::step())
        }
        _ => OrderingKey::new(candidate),
    }
}

/// Rolls one registration off its book inside the caller's transaction.
///
/// Shared by the ledger path, the attendance-limit path, the quit/discharge
/// cascade, and enforcement. The caller is responsible for status
/// preconditions; this helper records the transition as-is.
pub(crate) fn roll_off_in_txn(
    conn: &mut SqliteConnection,
    row: SqliteRegistration,
    reason: RemovalReason,
    actor: &str,
    now: &UniversalTimestamp,
    invert: bool,
) -> Result<Registration, TxnError> {
    let before: Registration = to_domain(row)?;
    let prior_position = if before.status == RegistrationStatus::Active {
        Some(derived_position(
            conn,
            before.book_id.as_bytes(),
            before.tier,
            &before.ordering_key.to_sortable_string(),
            invert,
        )?)
    } else {
        None
    };

    diesel::update(registrations::table.filter(registrations::id.eq(before.id.to_vec())))
        .set((
            registrations::status.eq(RegistrationStatus::RolledOff.as_str()),
            registrations::removal_reason.eq(reason.as_str()),
            registrations::removed_at.eq(now.to_rfc3339()),
            registrations::updated_at.eq(now.to_rfc3339()),
        ))
        .execute(conn)?;

    let after: Registration = to_domain(load_registration(conn, &before.id)?)?;

    record_activity(
        conn,
        ActivityEntry {
            registration_id: Some(before.id),
            dispatch_id: None,
            worker_id: before.worker_id,
            book_id: Some(before.book_id),
            action: ActivityAction::RolledOff,
            prior_status: Some(before.status.to_string()),
            new_status: Some(after.status.to_string()),
            prior_position,
            new_position: None,
            actor: actor.to_string(),
            reason: Some(reason.to_string()),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "registrations",
        &before.id,
        "roll_off",
        Some(to_json(&before)?),
        Some(to_json(&after)?),
        actor,
        now,
    )?;

    Ok(after)
}

/// DAL for ledger operations on registrations.
pub struct RegistrationDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RegistrationDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Registers a worker on a book.
    ///
    /// Fails on an inactive book or an existing non-terminal registration for
    /// the same (worker, book). The new ordering key is computed and written
    /// in the same transaction that checks the current maximum, so two
    /// concurrent registrations cannot receive the same key.
    pub async fn register(
        &self,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
        tier: i32,
        policy: OrderingKeyPolicy,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let book = load_book(conn, &book_id)?;
                if !book.active {
                    return Err(DomainViolation::BookInactive(book.name).into());
                }

                let open: i64 = registrations::table
                    .filter(registrations::worker_id.eq(worker_id.to_vec()))
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .filter(registrations::status.ne_all(vec![
                        RegistrationStatus::Resigned.as_str(),
                        RegistrationStatus::RolledOff.as_str(),
                    ]))
                    .count()
                    .get_result(conn)?;
                if open > 0 {
                    return Err(DomainViolation::DuplicateRegistration {
                        worker_id,
                        book: book.name,
                    }
                    .into());
                }

                let max_key: Option<String> = registrations::table
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .select(diesel::dsl::max(registrations::ordering_key))
                    .first(conn)?;
                let current_max = max_key
                    .as_deref()
                    .map(OrderingKey::from_sortable_string)
                    .transpose()
                    .map_err(|e| TxnError::Conversion(format!("stored ordering key: {}", e)))?;

                let prior: i64 = registrations::table
                    .filter(registrations::worker_id.eq(worker_id.to_vec()))
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .count()
                    .get_result(conn)?;

                let key = next_ordering_key(current_max, date_base(&now), policy, prior);

                let id = UniversalUuid::new_v4();
                let row = NewSqliteRegistration {
                    id: id.to_vec(),
                    worker_id: worker_id.to_vec(),
                    book_id: book_id.to_vec(),
                    ordering_key: key.to_sortable_string(),
                    tier,
                    status: RegistrationStatus::Active.as_str().to_string(),
                    penalty_count: 0,
                    registered_at: now.to_rfc3339(),
                    last_renewal_at: now.to_rfc3339(),
                    restoration_count: 0,
                    created_at: now.to_rfc3339(),
                    updated_at: now.to_rfc3339(),
                };
                diesel::insert_into(registrations::table)
                    .values(&row)
                    .execute(conn)?;

                let reg: Registration = to_domain(load_registration(conn, &id)?)?;
                let position = derived_position(
                    conn,
                    book_id.as_bytes(),
                    tier,
                    &key.to_sortable_string(),
                    invert,
                )?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(id),
                        dispatch_id: None,
                        worker_id,
                        book_id: Some(book_id),
                        action: ActivityAction::Registered,
                        prior_status: None,
                        new_status: Some(reg.status.to_string()),
                        prior_position: None,
                        new_position: Some(position),
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &id,
                    "register",
                    None,
                    Some(to_json(&reg)?),
                    &actor,
                    &now,
                )?;

                Ok(reg)
            })
            .await
    }

    /// Renews an Active registration, resetting its renewal clock.
    ///
    /// The ordering key is untouched: renewal preserves queue position.
    pub async fn renew(
        &self,
        registration_id: UniversalUuid,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let book = load_book(conn, &before.book_id)?;
                let days_since = (*now.as_datetime() - *before.last_renewal_at.as_datetime())
                    .num_days();
                let deadline = (book.renewal_window_days + book.grace_period_days) as i64;
                if days_since > deadline {
                    return Err(DomainViolation::RenewalOutsideWindow {
                        days_since_renewal: days_since,
                        window_days: book.renewal_window_days,
                        grace_days: book.grace_period_days,
                    }
                    .into());
                }

                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::last_renewal_at.eq(now.to_rfc3339()),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;
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
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: after.worker_id,
                        book_id: Some(after.book_id),
                        action: ActivityAction::Renewed,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: Some(position),
                        new_position: Some(position),
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &registration_id,
                    "renew",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                Ok(after)
            })
            .await
    }

    /// Voluntary exit from a book. Active registrations only.
    pub async fn resign(
        &self,
        registration_id: UniversalUuid,
        reason: Option<String>,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let prior_position = derived_position(
                    conn,
                    before.book_id.as_bytes(),
                    before.tier,
                    &before.ordering_key.to_sortable_string(),
                    invert,
                )?;

                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::status.eq(RegistrationStatus::Resigned.as_str()),
                    registrations::removed_at.eq(now.to_rfc3339()),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::Resigned,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: Some(prior_position),
                        new_position: None,
                        actor: actor.clone(),
                        reason,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &registration_id,
                    "resign",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                Ok(after)
            })
            .await
    }

    /// Involuntary removal. Active or Exempt registrations only; a terminal
    /// registration returns `AlreadyTerminal` so callers can tell a repeat
    /// call from a state change.
    pub async fn roll_off(
        &self,
        registration_id: UniversalUuid,
        reason: RemovalReason,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let row = load_registration(conn, &registration_id)?;
                let status = RegistrationStatus::from_str(&row.status)
                    .ok_or_else(|| TxnError::Conversion(format!("status {:?}", row.status)))?;
                if status.is_terminal() {
                    return Err(DomainViolation::AlreadyTerminal {
                        status: status.to_string(),
                    }
                    .into());
                }
                if !matches!(
                    status,
                    RegistrationStatus::Active | RegistrationStatus::Exempt
                ) {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active or Exempt",
                        status: status.to_string(),
                    }
                    .into());
                }

                roll_off_in_txn(conn, row, reason, &actor, &now, invert)
            })
            .await
    }

    /// Records a successful attendance check: penalty counter back to zero.
    pub async fn record_attendance_success(
        &self,
        registration_id: UniversalUuid,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::penalty_count.eq(0),
                    registrations::last_attendance_check_at.eq(now.to_rfc3339()),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::AttendanceCleared,
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
                    "registrations",
                    &registration_id,
                    "attendance_success",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                Ok(after)
            })
            .await
    }

    /// Records an attendance miss.
    ///
    /// Exempt registrations are untouched (outcome `Exempt`, no writes).
    /// Otherwise the counter increments, and on reaching `penalty_limit` the
    /// same transaction rolls the registration off with reason PenaltyLimit.
    pub async fn record_attendance_miss(
        &self,
        registration_id: UniversalUuid,
        penalty_limit: i32,
        invert: bool,
        actor: String,
    ) -> Result<AttendanceMissOutcome, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status == RegistrationStatus::Exempt {
                    return Ok(AttendanceMissOutcome::Exempt);
                }
                if before.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active or Exempt",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let new_count = before.penalty_count + 1;
                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::penalty_count.eq(new_count),
                    registrations::last_attendance_check_at.eq(now.to_rfc3339()),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::AttendanceMissed,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: None,
                        new_position: None,
                        actor: actor.clone(),
                        reason: Some(format!("penalty {}/{}", new_count, penalty_limit)),
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &registration_id,
                    "attendance_miss",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                if new_count >= penalty_limit {
                    let row = load_registration(conn, &registration_id)?;
                    roll_off_in_txn(conn, row, RemovalReason::PenaltyLimit, &actor, &now, invert)?;
                    return Ok(AttendanceMissOutcome::RolledOff);
                }

                Ok(AttendanceMissOutcome::Counted(new_count))
            })
            .await
    }

    /// Grants an exemption: Active -> Exempt, renewal and penalty clocks
    /// paused.
    pub async fn grant_exemption(
        &self,
        registration_id: UniversalUuid,
        reason: ExemptReason,
        until: Option<UniversalTimestamp>,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status != RegistrationStatus::Active {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Active",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let prior_position = derived_position(
                    conn,
                    before.book_id.as_bytes(),
                    before.tier,
                    &before.ordering_key.to_sortable_string(),
                    invert,
                )?;

                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::status.eq(RegistrationStatus::Exempt.as_str()),
                    registrations::exempt_reason.eq(reason.as_str()),
                    registrations::exempt_from.eq(now.to_rfc3339()),
                    registrations::exempt_until.eq(until.map(|t| t.to_rfc3339())),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;

                record_activity(
                    conn,
                    ActivityEntry {
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::ExemptionGranted,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: Some(prior_position),
                        new_position: None,
                        actor: actor.clone(),
                        reason: Some(reason.to_string()),
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &registration_id,
                    "grant_exemption",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                Ok(after)
            })
            .await
    }

    /// Revokes an exemption: Exempt -> Active.
    ///
    /// The renewal clock advances by the exempt interval plus `grace_days`,
    /// so time spent exempt never counts against the worker's renewal
    /// deadline.
    pub async fn revoke_exemption(
        &self,
        registration_id: UniversalUuid,
        grace_days: i64,
        invert: bool,
        actor: String,
    ) -> Result<Registration, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Registration = to_domain(load_registration(conn, &registration_id)?)?;
                if before.status != RegistrationStatus::Exempt {
                    return Err(DomainViolation::WrongRegistrationStatus {
                        required: "Exempt",
                        status: before.status.to_string(),
                    }
                    .into());
                }

                let exempt_interval = before
                    .exempt_from
                    .map(|from| *now.as_datetime() - *from.as_datetime())
                    .unwrap_or_else(chrono::Duration::zero);
                let new_renewal = UniversalTimestamp::from(
                    *before.last_renewal_at.as_datetime()
                        + exempt_interval
                        + chrono::Duration::days(grace_days),
                );

                diesel::update(
                    registrations::table.filter(registrations::id.eq(registration_id.to_vec())),
                )
                .set((
                    registrations::status.eq(RegistrationStatus::Active.as_str()),
                    registrations::exempt_reason.eq(None::<String>),
                    registrations::exempt_from.eq(None::<String>),
                    registrations::exempt_until.eq(None::<String>),
                    registrations::last_renewal_at.eq(new_renewal.to_rfc3339()),
                    registrations::updated_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

                let after: Registration = to_domain(load_registration(conn, &registration_id)?)?;
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
                        registration_id: Some(registration_id),
                        dispatch_id: None,
                        worker_id: before.worker_id,
                        book_id: Some(before.book_id),
                        action: ActivityAction::ExemptionRevoked,
                        prior_status: Some(before.status.to_string()),
                        new_status: Some(after.status.to_string()),
                        prior_position: None,
                        new_position: Some(position),
                        actor: actor.clone(),
                        reason: None,
                    },
                    &now,
                )?;
                queue_audit_event(
                    conn,
                    "registrations",
                    &registration_id,
                    "revoke_exemption",
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;

                Ok(after)
            })
            .await
    }

    /// Fetches a registration by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Registration, EngineError> {
        self.dal
            .read(move |conn| to_domain(load_registration(conn, &id)?))
            .await
    }

    /// The worker's non-terminal registration on a book, if any.
    pub async fn get_open_for_worker_on_book(
        &self,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
    ) -> Result<Option<Registration>, EngineError> {
        self.dal
            .read(move |conn| {
                let row: Option<SqliteRegistration> = registrations::table
                    .filter(registrations::worker_id.eq(worker_id.to_vec()))
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .filter(registrations::status.ne_all(vec![
                        RegistrationStatus::Resigned.as_str(),
                        RegistrationStatus::RolledOff.as_str(),
                    ]))
                    .select(SqliteRegistration::as_select())
                    .first(conn)
                    .optional()?;
                row.map(to_domain).transpose()
            })
            .await
    }

    /// All non-terminal registrations a worker holds, across books.
    pub async fn list_open_for_worker(
        &self,
        worker_id: UniversalUuid,
    ) -> Result<Vec<Registration>, EngineError> {
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteRegistration> = registrations::table
                    .filter(registrations::worker_id.eq(worker_id.to_vec()))
                    .filter(registrations::status.ne_all(vec![
                        RegistrationStatus::Resigned.as_str(),
                        RegistrationStatus::RolledOff.as_str(),
                    ]))
                    .select(SqliteRegistration::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }

    /// All non-terminal registrations on a book, any status.
    pub async fn list_open_for_book(
        &self,
        book_id: UniversalUuid,
    ) -> Result<Vec<Registration>, EngineError> {
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteRegistration> = registrations::table
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .filter(registrations::status.ne_all(vec![
                        RegistrationStatus::Resigned.as_str(),
                        RegistrationStatus::RolledOff.as_str(),
                    ]))
                    .select(SqliteRegistration::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }

    /// All registrations in one status, across books. Enforcement passes use
    /// this with Active and Exempt.
    pub async fn list_by_status(
        &self,
        status: RegistrationStatus,
    ) -> Result<Vec<Registration>, EngineError> {
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteRegistration> = registrations::table
                    .filter(registrations::status.eq(status.as_str()))
                    .select(SqliteRegistration::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }

    /// A book's registrations in dispatch order: tier rank first, ordering
    /// key second. `include_exempt` adds Exempt rows in their key slots.
    pub async fn list_book_entries(
        &self,
        book_id: UniversalUuid,
        include_exempt: bool,
        invert: bool,
    ) -> Result<Vec<Registration>, EngineError> {
        self.dal
            .read(move |conn| {
                let mut statuses = vec![RegistrationStatus::Active.as_str()];
                if include_exempt {
                    statuses.push(RegistrationStatus::Exempt.as_str());
                }
                let base = registrations::table
                    .filter(registrations::book_id.eq(book_id.to_vec()))
                    .filter(registrations::status.eq_any(statuses))
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
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }
}
