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

//! DAL for employer job requests.
//!
//! `penalty_eligible` is computed by the market service once, at creation,
//! and stored; it is never re-derived from the metadata flags afterwards.
//! Requests carry no worker, so they get audit-outbox rows but no activity
//! records (the trail is worker-centric).

use diesel::prelude::*;

use super::audit_outbox::queue_audit_event;
use super::models::{NewSqliteJobRequest, SqliteJobRequest};
use super::{to_domain, to_json, TxnError, DAL};
use crate::database::schema::job_requests;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{JobRequest, NewJobRequest, RequestStatus};

/// Loads a request row or aborts with `RequestNotFound`.
pub(crate) fn load_request(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<SqliteJobRequest, TxnError> {
    job_requests::table
        .filter(job_requests::id.eq(id.to_vec()))
        .select(SqliteJobRequest::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainViolation::RequestNotFound(*id).into())
}

/// DAL for job-request operations.
pub struct JobRequestDAL<'a> {
    dal: &'a DAL,
}

impl<'a> JobRequestDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a request. `new_request.target_date` is the effective date,
    /// already adjusted for the daily cutoff by the market service.
    pub async fn create(
        &self,
        new_request: NewJobRequest,
        penalty_eligible: bool,
        actor: String,
    ) -> Result<JobRequest, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let id = UniversalUuid::new_v4();
                let row = NewSqliteJobRequest {
                    id: id.to_vec(),
                    employer_id: new_request.employer_id.to_vec(),
                    book_id: new_request.book_id.to_vec(),
                    workers_requested: new_request.workers_requested,
                    workers_filled: 0,
                    target_date: new_request.target_date.to_rfc3339(),
                    bidding_opens_at: new_request.bidding_opens_at.map(|t| t.to_rfc3339()),
                    bidding_closes_at: new_request.bidding_closes_at.map(|t| t.to_rfc3339()),
                    specialty_skill: new_request.metadata.specialty_skill,
                    irregular_site: new_request.metadata.irregular_site,
                    early_start: new_request.metadata.early_start,
                    below_standard_rate: new_request.metadata.below_standard_rate,
                    short_duration: new_request.metadata.short_duration,
                    employer_initiated_rejection: new_request.metadata.employer_initiated_rejection,
                    penalty_eligible,
                    status: RequestStatus::Open.as_str().to_string(),
                    created_at: now.to_rfc3339(),
                    updated_at: now.to_rfc3339(),
                };
                diesel::insert_into(job_requests::table)
                    .values(&row)
                    .execute(conn)?;

                let request: JobRequest = to_domain(load_request(conn, &id)?)?;
                queue_audit_event(
                    conn,
                    "job_requests",
                    &id,
                    "create",
                    None,
                    Some(to_json(&request)?),
                    &actor,
                    &now,
                )?;
                Ok(request)
            })
            .await
    }

    /// Fetches a request by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<JobRequest, EngineError> {
        self.dal
            .read(move |conn| to_domain(load_request(conn, &id)?))
            .await
    }

    /// Cancels an open or partially-filled request.
    pub async fn cancel(
        &self,
        id: UniversalUuid,
        actor: String,
    ) -> Result<JobRequest, EngineError> {
        self.close(id, RequestStatus::Cancelled, "cancel", actor).await
    }

    /// Expires an open or partially-filled request. Used by enforcement when
    /// the target date has passed.
    pub async fn expire(
        &self,
        id: UniversalUuid,
        actor: String,
    ) -> Result<JobRequest, EngineError> {
        self.close(id, RequestStatus::Expired, "expire", actor).await
    }

    async fn close(
        &self,
        id: UniversalUuid,
        to_status: RequestStatus,
        audit_action: &'static str,
        actor: String,
    ) -> Result<JobRequest, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: JobRequest = to_domain(load_request(conn, &id)?)?;
                if !before.is_open() {
                    return Err(DomainViolation::RequestNotOpen {
                        status: before.status.to_string(),
                    }
                    .into());
                }

                diesel::update(job_requests::table.filter(job_requests::id.eq(id.to_vec())))
                    .set((
                        job_requests::status.eq(to_status.as_str()),
                        job_requests::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                let after: JobRequest = to_domain(load_request(conn, &id)?)?;
                queue_audit_event(
                    conn,
                    "job_requests",
                    &id,
                    audit_action,
                    Some(to_json(&before)?),
                    Some(to_json(&after)?),
                    &actor,
                    &now,
                )?;
                Ok(after)
            })
            .await
    }

    /// Open/partially-filled requests whose target date precedes `now`.
    pub async fn list_open_past_target(
        &self,
        now: UniversalTimestamp,
    ) -> Result<Vec<JobRequest>, EngineError> {
        let cutoff = now.to_rfc3339();
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteJobRequest> = job_requests::table
                    .filter(job_requests::status.eq_any(vec![
                        RequestStatus::Open.as_str(),
                        RequestStatus::PartiallyFilled.as_str(),
                    ]))
                    .filter(job_requests::target_date.lt(cutoff))
                    .select(SqliteJobRequest::as_select())
                    .load(conn)?;
                rows.into_iter().map(to_domain).collect()
            })
            .await
    }
}
