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

//! SQLite row models.
//!
//! These structs mirror the storage encoding (BLOB ids, TEXT timestamps,
//! TEXT enums) and convert to the domain models at the DAL boundary. A
//! conversion failure means the row was corrupted outside the engine; it
//! surfaces as `EngineError::Conversion`, never a panic.

use diesel::prelude::*;

use crate::database::schema::*;
use crate::database::{OrderingKey, UniversalTimestamp, UniversalUuid};
use crate::models::*;

pub(crate) fn uuid_from_blob(bytes: &[u8]) -> Result<UniversalUuid, String> {
    UniversalUuid::from_bytes(bytes).map_err(|e| format!("invalid uuid blob: {}", e))
}

pub(crate) fn opt_uuid_from_blob(bytes: &Option<Vec<u8>>) -> Result<Option<UniversalUuid>, String> {
    bytes.as_deref().map(uuid_from_blob).transpose()
}

pub(crate) fn ts_from_text(s: &str) -> Result<UniversalTimestamp, String> {
    UniversalTimestamp::from_rfc3339(s).map_err(|e| format!("invalid timestamp {:?}: {}", s, e))
}

pub(crate) fn opt_ts_from_text(s: &Option<String>) -> Result<Option<UniversalTimestamp>, String> {
    s.as_deref().map(ts_from_text).transpose()
}

// ---------------------------------------------------------------------------
// books
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = books)]
pub struct SqliteBook {
    pub id: Vec<u8>,
    pub name: String,
    pub classification: String,
    pub region: String,
    pub priority_tier: i32,
    pub max_days_before_expiry: Option<i32>,
    pub renewal_window_days: i32,
    pub grace_period_days: i32,
    pub online_bidding: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = books)]
pub struct NewSqliteBook {
    pub id: Vec<u8>,
    pub name: String,
    pub classification: String,
    pub region: String,
    pub priority_tier: i32,
    pub max_days_before_expiry: Option<i32>,
    pub renewal_window_days: i32,
    pub grace_period_days: i32,
    pub online_bidding: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteBook> for Book {
    type Error = String;

    fn try_from(row: SqliteBook) -> Result<Self, Self::Error> {
        Ok(Book {
            id: uuid_from_blob(&row.id)?,
            name: row.name,
            classification: row.classification,
            region: row.region,
            priority_tier: row.priority_tier,
            max_days_before_expiry: row.max_days_before_expiry,
            renewal_window_days: row.renewal_window_days,
            grace_period_days: row.grace_period_days,
            online_bidding: row.online_bidding,
            active: row.active,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// registrations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = registrations)]
pub struct SqliteRegistration {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub ordering_key: String,
    pub tier: i32,
    pub status: String,
    pub penalty_count: i32,
    pub last_attendance_check_at: Option<String>,
    pub registered_at: String,
    pub last_renewal_at: String,
    pub exempt_reason: Option<String>,
    pub exempt_from: Option<String>,
    pub exempt_until: Option<String>,
    pub removal_reason: Option<String>,
    pub removed_at: Option<String>,
    pub restoration_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = registrations)]
pub struct NewSqliteRegistration {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub ordering_key: String,
    pub tier: i32,
    pub status: String,
    pub penalty_count: i32,
    pub registered_at: String,
    pub last_renewal_at: String,
    pub restoration_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteRegistration> for Registration {
    type Error = String;

    fn try_from(row: SqliteRegistration) -> Result<Self, Self::Error> {
        let status = RegistrationStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown registration status {:?}", row.status))?;
        let exempt_reason = row
            .exempt_reason
            .as_deref()
            .map(|s| {
                ExemptReason::from_str(s).ok_or_else(|| format!("unknown exempt reason {:?}", s))
            })
            .transpose()?;
        let removal_reason = row
            .removal_reason
            .as_deref()
            .map(|s| {
                RemovalReason::from_str(s).ok_or_else(|| format!("unknown removal reason {:?}", s))
            })
            .transpose()?;
        Ok(Registration {
            id: uuid_from_blob(&row.id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            book_id: uuid_from_blob(&row.book_id)?,
            ordering_key: OrderingKey::from_sortable_string(&row.ordering_key)
                .map_err(|e| format!("invalid ordering key {:?}: {}", row.ordering_key, e))?,
            tier: row.tier,
            status,
            penalty_count: row.penalty_count,
            last_attendance_check_at: opt_ts_from_text(&row.last_attendance_check_at)?,
            registered_at: ts_from_text(&row.registered_at)?,
            last_renewal_at: ts_from_text(&row.last_renewal_at)?,
            exempt_reason,
            exempt_from: opt_ts_from_text(&row.exempt_from)?,
            exempt_until: opt_ts_from_text(&row.exempt_until)?,
            removal_reason,
            removed_at: opt_ts_from_text(&row.removed_at)?,
            restoration_count: row.restoration_count,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// job_requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = job_requests)]
pub struct SqliteJobRequest {
    pub id: Vec<u8>,
    pub employer_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub workers_requested: i32,
    pub workers_filled: i32,
    pub target_date: String,
    pub bidding_opens_at: Option<String>,
    pub bidding_closes_at: Option<String>,
    pub specialty_skill: bool,
    pub irregular_site: bool,
    pub early_start: bool,
    pub below_standard_rate: bool,
    pub short_duration: bool,
    pub employer_initiated_rejection: bool,
    pub penalty_eligible: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_requests)]
pub struct NewSqliteJobRequest {
    pub id: Vec<u8>,
    pub employer_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub workers_requested: i32,
    pub workers_filled: i32,
    pub target_date: String,
    pub bidding_opens_at: Option<String>,
    pub bidding_closes_at: Option<String>,
    pub specialty_skill: bool,
    pub irregular_site: bool,
    pub early_start: bool,
    pub below_standard_rate: bool,
    pub short_duration: bool,
    pub employer_initiated_rejection: bool,
    pub penalty_eligible: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteJobRequest> for JobRequest {
    type Error = String;

    fn try_from(row: SqliteJobRequest) -> Result<Self, Self::Error> {
        let status = RequestStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown request status {:?}", row.status))?;
        Ok(JobRequest {
            id: uuid_from_blob(&row.id)?,
            employer_id: uuid_from_blob(&row.employer_id)?,
            book_id: uuid_from_blob(&row.book_id)?,
            workers_requested: row.workers_requested,
            workers_filled: row.workers_filled,
            target_date: ts_from_text(&row.target_date)?,
            bidding_opens_at: opt_ts_from_text(&row.bidding_opens_at)?,
            bidding_closes_at: opt_ts_from_text(&row.bidding_closes_at)?,
            metadata: RequestMetadata {
                specialty_skill: row.specialty_skill,
                irregular_site: row.irregular_site,
                early_start: row.early_start,
                below_standard_rate: row.below_standard_rate,
                short_duration: row.short_duration,
                employer_initiated_rejection: row.employer_initiated_rejection,
            },
            penalty_eligible: row.penalty_eligible,
            status,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// bids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bids)]
pub struct SqliteBid {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub job_request_id: Vec<u8>,
    pub registration_id: Vec<u8>,
    pub method: String,
    pub status: String,
    pub submitted_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bids)]
pub struct NewSqliteBid {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub job_request_id: Vec<u8>,
    pub registration_id: Vec<u8>,
    pub method: String,
    pub status: String,
    pub submitted_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteBid> for Bid {
    type Error = String;

    fn try_from(row: SqliteBid) -> Result<Self, Self::Error> {
        let method = BidMethod::from_str(&row.method)
            .ok_or_else(|| format!("unknown bid method {:?}", row.method))?;
        let status = BidStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown bid status {:?}", row.status))?;
        Ok(Bid {
            id: uuid_from_blob(&row.id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            job_request_id: uuid_from_blob(&row.job_request_id)?,
            registration_id: uuid_from_blob(&row.registration_id)?,
            method,
            status,
            submitted_at: ts_from_text(&row.submitted_at)?,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// dispatches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = dispatches)]
pub struct SqliteDispatch {
    pub id: Vec<u8>,
    pub registration_id: Vec<u8>,
    pub job_request_id: Vec<u8>,
    pub bid_id: Option<Vec<u8>>,
    pub employer_id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub method: String,
    pub short_duration: bool,
    pub starts_at: String,
    pub check_in_deadline: Option<String>,
    pub checked_in_at: Option<String>,
    pub status: String,
    pub terminated_at: Option<String>,
    pub termination_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dispatches)]
pub struct NewSqliteDispatch {
    pub id: Vec<u8>,
    pub registration_id: Vec<u8>,
    pub job_request_id: Vec<u8>,
    pub bid_id: Option<Vec<u8>>,
    pub employer_id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub book_id: Vec<u8>,
    pub method: String,
    pub short_duration: bool,
    pub starts_at: String,
    pub check_in_deadline: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteDispatch> for Dispatch {
    type Error = String;

    fn try_from(row: SqliteDispatch) -> Result<Self, Self::Error> {
        let method = DispatchMethod::from_str(&row.method)
            .ok_or_else(|| format!("unknown dispatch method {:?}", row.method))?;
        let status = DispatchStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown dispatch status {:?}", row.status))?;
        let termination_reason = row
            .termination_reason
            .as_deref()
            .map(|s| {
                TerminationReason::from_str(s)
                    .ok_or_else(|| format!("unknown termination reason {:?}", s))
            })
            .transpose()?;
        Ok(Dispatch {
            id: uuid_from_blob(&row.id)?,
            registration_id: uuid_from_blob(&row.registration_id)?,
            job_request_id: uuid_from_blob(&row.job_request_id)?,
            bid_id: opt_uuid_from_blob(&row.bid_id)?,
            employer_id: uuid_from_blob(&row.employer_id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            book_id: uuid_from_blob(&row.book_id)?,
            method,
            short_duration: row.short_duration,
            starts_at: ts_from_text(&row.starts_at)?,
            check_in_deadline: opt_ts_from_text(&row.check_in_deadline)?,
            checked_in_at: opt_ts_from_text(&row.checked_in_at)?,
            status,
            terminated_at: opt_ts_from_text(&row.terminated_at)?,
            termination_reason,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// activity_records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = activity_records)]
pub struct SqliteActivityRecord {
    pub id: Vec<u8>,
    pub registration_id: Option<Vec<u8>>,
    pub dispatch_id: Option<Vec<u8>>,
    pub worker_id: Vec<u8>,
    pub book_id: Option<Vec<u8>>,
    pub action: String,
    pub prior_status: Option<String>,
    pub new_status: Option<String>,
    pub prior_position: Option<i32>,
    pub new_position: Option<i32>,
    pub actor: String,
    pub reason: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_records)]
pub struct NewSqliteActivityRecord {
    pub id: Vec<u8>,
    pub registration_id: Option<Vec<u8>>,
    pub dispatch_id: Option<Vec<u8>>,
    pub worker_id: Vec<u8>,
    pub book_id: Option<Vec<u8>>,
    pub action: String,
    pub prior_status: Option<String>,
    pub new_status: Option<String>,
    pub prior_position: Option<i32>,
    pub new_position: Option<i32>,
    pub actor: String,
    pub reason: Option<String>,
    pub created_at: String,
}

impl TryFrom<SqliteActivityRecord> for ActivityRecord {
    type Error = String;

    fn try_from(row: SqliteActivityRecord) -> Result<Self, Self::Error> {
        let action = ActivityAction::from_str(&row.action)
            .ok_or_else(|| format!("unknown activity action {:?}", row.action))?;
        Ok(ActivityRecord {
            id: uuid_from_blob(&row.id)?,
            registration_id: opt_uuid_from_blob(&row.registration_id)?,
            dispatch_id: opt_uuid_from_blob(&row.dispatch_id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            book_id: opt_uuid_from_blob(&row.book_id)?,
            action,
            prior_status: row.prior_status,
            new_status: row.new_status,
            prior_position: row.prior_position,
            new_position: row.new_position,
            actor: row.actor,
            reason: row.reason,
            created_at: ts_from_text(&row.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// audit_outbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_outbox)]
pub struct SqliteAuditEvent {
    pub id: Vec<u8>,
    pub table_name: String,
    pub record_id: Vec<u8>,
    pub action: String,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub actor: String,
    pub created_at: String,
    pub forwarded_at: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_outbox)]
pub struct NewSqliteAuditEvent {
    pub id: Vec<u8>,
    pub table_name: String,
    pub record_id: Vec<u8>,
    pub action: String,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub actor: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// blackouts / suspensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = blackouts)]
pub struct SqliteBlackout {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub employer_id: Vec<u8>,
    pub reason: String,
    pub expires_at: String,
    pub cleared_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = blackouts)]
pub struct NewSqliteBlackout {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub employer_id: Vec<u8>,
    pub reason: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteBlackout> for Blackout {
    type Error = String;

    fn try_from(row: SqliteBlackout) -> Result<Self, Self::Error> {
        Ok(Blackout {
            id: uuid_from_blob(&row.id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            employer_id: uuid_from_blob(&row.employer_id)?,
            reason: row.reason,
            expires_at: ts_from_text(&row.expires_at)?,
            cleared_at: opt_ts_from_text(&row.cleared_at)?,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = suspensions)]
pub struct SqliteSuspension {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub reason: String,
    pub expires_at: String,
    pub cleared_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = suspensions)]
pub struct NewSqliteSuspension {
    pub id: Vec<u8>,
    pub worker_id: Vec<u8>,
    pub reason: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteSuspension> for Suspension {
    type Error = String;

    fn try_from(row: SqliteSuspension) -> Result<Self, Self::Error> {
        Ok(Suspension {
            id: uuid_from_blob(&row.id)?,
            worker_id: uuid_from_blob(&row.worker_id)?,
            reason: row.reason,
            expires_at: ts_from_text(&row.expires_at)?,
            cleared_at: opt_ts_from_text(&row.cleared_at)?,
            created_at: ts_from_text(&row.created_at)?,
            updated_at: ts_from_text(&row.updated_at)?,
        })
    }
}
