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

//! DAL for blackouts and bidding suspensions.
//!
//! Restrictions are imposed inside other operations' transactions (the
//! quit/discharge cascade, the bid-rejection rule), so the insert helpers
//! here take a connection. Clearing is enforcement's job; cleared rows are
//! kept for the trail.

use diesel::prelude::*;

use super::activity::{record_activity, ActivityEntry};
use super::audit_outbox::queue_audit_event;
use super::models::{
    NewSqliteBlackout, NewSqliteSuspension, SqliteBlackout, SqliteSuspension,
};
use super::{to_domain, to_json, TxnError, DAL};
use crate::database::schema::{blackouts, suspensions};
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::EngineError;
use crate::models::{ActivityAction, Blackout, Suspension};

/// The worker's uncleared, unexpired blackout against an employer, if any.
pub(crate) fn active_blackout(
    conn: &mut SqliteConnection,
    worker_id: &UniversalUuid,
    employer_id: &UniversalUuid,
    now: &UniversalTimestamp,
) -> Result<Option<Blackout>, TxnError> {
    let row: Option<SqliteBlackout> = blackouts::table
        .filter(blackouts::worker_id.eq(worker_id.to_vec()))
        .filter(blackouts::employer_id.eq(employer_id.to_vec()))
        .filter(blackouts::cleared_at.is_null())
        .filter(blackouts::expires_at.gt(now.to_rfc3339()))
        .select(SqliteBlackout::as_select())
        .first(conn)
        .optional()?;
    row.map(to_domain).transpose()
}

/// The worker's uncleared, unexpired bidding suspension, if any.
pub(crate) fn active_suspension(
    conn: &mut SqliteConnection,
    worker_id: &UniversalUuid,
    now: &UniversalTimestamp,
) -> Result<Option<Suspension>, TxnError> {
    let row: Option<SqliteSuspension> = suspensions::table
        .filter(suspensions::worker_id.eq(worker_id.to_vec()))
        .filter(suspensions::cleared_at.is_null())
        .filter(suspensions::expires_at.gt(now.to_rfc3339()))
        .select(SqliteSuspension::as_select())
        .first(conn)
        .optional()?;
    row.map(to_domain).transpose()
}

/// Inserts a blackout with its activity and audit rows, on the caller's
/// transaction.
pub(crate) fn impose_blackout(
    conn: &mut SqliteConnection,
    worker_id: &UniversalUuid,
    employer_id: &UniversalUuid,
    reason: &str,
    expires_at: &UniversalTimestamp,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Blackout, TxnError> {
    let id = UniversalUuid::new_v4();
    let row = NewSqliteBlackout {
        id: id.to_vec(),
        worker_id: worker_id.to_vec(),
        employer_id: employer_id.to_vec(),
        reason: reason.to_string(),
        expires_at: expires_at.to_rfc3339(),
        created_at: now.to_rfc3339(),
        updated_at: now.to_rfc3339(),
    };
    diesel::insert_into(blackouts::table).values(&row).execute(conn)?;

    let blackout: Blackout = to_domain(
        blackouts::table
            .filter(blackouts::id.eq(id.to_vec()))
            .select(SqliteBlackout::as_select())
            .first::<SqliteBlackout>(conn)?,
    )?;

    record_activity(
        conn,
        ActivityEntry {
            registration_id: None,
            dispatch_id: None,
            worker_id: *worker_id,
            book_id: None,
            action: ActivityAction::BlackoutImposed,
            prior_status: None,
            new_status: None,
            prior_position: None,
            new_position: None,
            actor: actor.to_string(),
            reason: Some(reason.to_string()),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "blackouts",
        &id,
        "impose",
        None,
        Some(to_json(&blackout)?),
        actor,
        now,
    )?;

    Ok(blackout)
}

/// Inserts a suspension with its activity and audit rows, on the caller's
/// transaction.
pub(crate) fn impose_suspension(
    conn: &mut SqliteConnection,
    worker_id: &UniversalUuid,
    reason: &str,
    expires_at: &UniversalTimestamp,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<Suspension, TxnError> {
    let id = UniversalUuid::new_v4();
    let row = NewSqliteSuspension {
        id: id.to_vec(),
        worker_id: worker_id.to_vec(),
        reason: reason.to_string(),
        expires_at: expires_at.to_rfc3339(),
        created_at: now.to_rfc3339(),
        updated_at: now.to_rfc3339(),
    };
    diesel::insert_into(suspensions::table).values(&row).execute(conn)?;

    let suspension: Suspension = to_domain(
        suspensions::table
            .filter(suspensions::id.eq(id.to_vec()))
            .select(SqliteSuspension::as_select())
            .first::<SqliteSuspension>(conn)?,
    )?;

    record_activity(
        conn,
        ActivityEntry {
            registration_id: None,
            dispatch_id: None,
            worker_id: *worker_id,
            book_id: None,
            action: ActivityAction::SuspensionImposed,
            prior_status: None,
            new_status: None,
            prior_position: None,
            new_position: None,
            actor: actor.to_string(),
            reason: Some(reason.to_string()),
        },
        now,
    )?;
    queue_audit_event(
        conn,
        "suspensions",
        &id,
        "impose",
        None,
        Some(to_json(&suspension)?),
        actor,
        now,
    )?;

    Ok(suspension)
}

/// DAL for restriction lookups and clearing.
pub struct RestrictionDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RestrictionDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// The worker's active blackout against an employer, if any.
    pub async fn active_blackout_for(
        &self,
        worker_id: UniversalUuid,
        employer_id: UniversalUuid,
    ) -> Result<Option<Blackout>, EngineError> {
        self.dal
            .read(move |conn| {
                active_blackout(conn, &worker_id, &employer_id, &UniversalTimestamp::now())
            })
            .await
    }

    /// The worker's active bidding suspension, if any.
    pub async fn active_suspension_for(
        &self,
        worker_id: UniversalUuid,
    ) -> Result<Option<Suspension>, EngineError> {
        self.dal
            .read(move |conn| active_suspension(conn, &worker_id, &UniversalTimestamp::now()))
            .await
    }

    /// Expired blackouts not yet stamped. Read-only; enforcement's dry run
    /// reports these without clearing them.
    pub async fn expired_uncleared_blackouts(&self) -> Result<Vec<Blackout>, EngineError> {
        self.dal
            .read(|conn| {
                let now = UniversalTimestamp::now();
                let rows: Vec<SqliteBlackout> = blackouts::table
                    .filter(blackouts::cleared_at.is_null())
                    .filter(blackouts::expires_at.le(now.to_rfc3339()))
                    .select(SqliteBlackout::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }

    /// Expired suspensions not yet stamped. Read-only counterpart of
    /// [`clear_expired_suspensions`](Self::clear_expired_suspensions).
    pub async fn expired_uncleared_suspensions(&self) -> Result<Vec<Suspension>, EngineError> {
        self.dal
            .read(|conn| {
                let now = UniversalTimestamp::now();
                let rows: Vec<SqliteSuspension> = suspensions::table
                    .filter(suspensions::cleared_at.is_null())
                    .filter(suspensions::expires_at.le(now.to_rfc3339()))
                    .select(SqliteSuspension::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }

    /// Stamps `cleared_at` on every blackout whose expiry has passed.
    /// Returns the cleared rows. Already-cleared rows are untouched, so the
    /// call is idempotent.
    pub async fn clear_expired_blackouts(
        &self,
        actor: String,
    ) -> Result<Vec<Blackout>, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let expired: Vec<SqliteBlackout> = blackouts::table
                    .filter(blackouts::cleared_at.is_null())
                    .filter(blackouts::expires_at.le(now.to_rfc3339()))
                    .select(SqliteBlackout::as_select())
                    .load(conn)?;

                let mut cleared = Vec::with_capacity(expired.len());
                for row in expired {
                    let before: Blackout = to_domain(row)?;
                    diesel::update(
                        blackouts::table.filter(blackouts::id.eq(before.id.to_vec())),
                    )
                    .set((
                        blackouts::cleared_at.eq(now.to_rfc3339()),
                        blackouts::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                    let after: Blackout = to_domain(
                        blackouts::table
                            .filter(blackouts::id.eq(before.id.to_vec()))
                            .select(SqliteBlackout::as_select())
                            .first::<SqliteBlackout>(conn)?,
                    )?;

                    record_activity(
                        conn,
                        ActivityEntry {
                            registration_id: None,
                            dispatch_id: None,
                            worker_id: before.worker_id,
                            book_id: None,
                            action: ActivityAction::BlackoutCleared,
                            prior_status: None,
                            new_status: None,
                            prior_position: None,
                            new_position: None,
                            actor: actor.clone(),
                            reason: None,
                        },
                        &now,
                    )?;
                    queue_audit_event(
                        conn,
                        "blackouts",
                        &before.id,
                        "clear",
                        Some(to_json(&before)?),
                        Some(to_json(&after)?),
                        &actor,
                        &now,
                    )?;
                    cleared.push(after);
                }
                Ok(cleared)
            })
            .await
    }

    /// Stamps `cleared_at` on every suspension whose expiry has passed.
    pub async fn clear_expired_suspensions(
        &self,
        actor: String,
    ) -> Result<Vec<Suspension>, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let expired: Vec<SqliteSuspension> = suspensions::table
                    .filter(suspensions::cleared_at.is_null())
                    .filter(suspensions::expires_at.le(now.to_rfc3339()))
                    .select(SqliteSuspension::as_select())
                    .load(conn)?;

                let mut cleared = Vec::with_capacity(expired.len());
                for row in expired {
                    let before: Suspension = to_domain(row)?;
                    diesel::update(
                        suspensions::table.filter(suspensions::id.eq(before.id.to_vec())),
                    )
                    .set((
                        suspensions::cleared_at.eq(now.to_rfc3339()),
                        suspensions::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                    let after: Suspension = to_domain(
                        suspensions::table
                            .filter(suspensions::id.eq(before.id.to_vec()))
                            .select(SqliteSuspension::as_select())
                            .first::<SqliteSuspension>(conn)?,
                    )?;

                    record_activity(
                        conn,
                        ActivityEntry {
                            registration_id: None,
                            dispatch_id: None,
                            worker_id: before.worker_id,
                            book_id: None,
                            action: ActivityAction::SuspensionCleared,
                            prior_status: None,
                            new_status: None,
                            prior_position: None,
                            new_position: None,
                            actor: actor.clone(),
                            reason: None,
                        },
                        &now,
                    )?;
                    queue_audit_event(
                        conn,
                        "suspensions",
                        &before.id,
                        "clear",
                        Some(to_json(&before)?),
                        Some(to_json(&after)?),
                        &actor,
                        &now,
                    )?;
                    cleared.push(after);
                }
                Ok(cleared)
            })
            .await
    }
}
