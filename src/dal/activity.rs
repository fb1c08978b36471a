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

//! DAL for the append-only activity trail.
//!
//! Every mutating DAL method calls [`record_activity`] inside its own
//! transaction, so the trail can never drift from the domain tables. Rows are
//! never updated or deleted.

use diesel::prelude::*;

use super::models::{NewSqliteActivityRecord, SqliteActivityRecord};
use super::{TxnError, DAL};
use crate::database::schema::activity_records;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::EngineError;
use crate::models::{ActivityAction, ActivityRecord};

/// Values for one activity row, written inside a mutation's transaction.
#[derive(Debug)]
pub(crate) struct ActivityEntry {
    pub registration_id: Option<UniversalUuid>,
    pub dispatch_id: Option<UniversalUuid>,
    pub worker_id: UniversalUuid,
    pub book_id: Option<UniversalUuid>,
    pub action: ActivityAction,
    pub prior_status: Option<String>,
    pub new_status: Option<String>,
    pub prior_position: Option<i32>,
    pub new_position: Option<i32>,
    pub actor: String,
    pub reason: Option<String>,
}

/// Inserts one activity row on the caller's connection (and transaction).
pub(crate) fn record_activity(
    conn: &mut SqliteConnection,
    entry: ActivityEntry,
    now: &UniversalTimestamp,
) -> Result<(), TxnError> {
    let row = NewSqliteActivityRecord {
        id: UniversalUuid::new_v4().to_vec(),
        registration_id: entry.registration_id.map(|u| u.to_vec()),
        dispatch_id: entry.dispatch_id.map(|u| u.to_vec()),
        worker_id: entry.worker_id.to_vec(),
        book_id: entry.book_id.map(|u| u.to_vec()),
        action: entry.action.as_str().to_string(),
        prior_status: entry.prior_status,
        new_status: entry.new_status,
        prior_position: entry.prior_position,
        new_position: entry.new_position,
        actor: entry.actor,
        reason: entry.reason,
        created_at: now.to_rfc3339(),
    };

    diesel::insert_into(activity_records::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

/// DAL for activity-trail queries.
pub struct ActivityDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ActivityDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Most recent activity for a worker, newest first.
    pub async fn list_for_worker(
        &self,
        worker_id: UniversalUuid,
        limit: i64,
    ) -> Result<Vec<ActivityRecord>, EngineError> {
        let worker_blob = worker_id.to_vec();
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteActivityRecord> = activity_records::table
                    .filter(activity_records::worker_id.eq(worker_blob))
                    .order(activity_records::created_at.desc())
                    .limit(limit)
                    .select(SqliteActivityRecord::as_select())
                    .load(conn)?;
                rows.into_iter()
                    .map(|r| r.try_into().map_err(TxnError::Conversion))
                    .collect()
            })
            .await
    }

    /// Full trail for one registration, oldest first.
    pub async fn list_for_registration(
        &self,
        registration_id: UniversalUuid,
    ) -> Result<Vec<ActivityRecord>, EngineError> {
        let reg_blob = registration_id.to_vec();
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteActivityRecord> = activity_records::table
                    .filter(activity_records::registration_id.eq(reg_blob))
                    .order(activity_records::created_at.asc())
                    .select(SqliteActivityRecord::as_select())
                    .load(conn)?;
                rows.into_iter()
                    .map(|r| r.try_into().map_err(TxnError::Conversion))
                    .collect()
            })
            .await
    }

    /// Number of dispatch events recorded for a book since `since`.
    ///
    /// Feeds the queue service's wait estimate. RFC3339 UTC strings compare
    /// lexically in timestamp order, so the filter runs in SQL.
    pub async fn count_book_dispatches_since(
        &self,
        book_id: UniversalUuid,
        since: UniversalTimestamp,
    ) -> Result<i64, EngineError> {
        let book_blob = book_id.to_vec();
        let since_text = since.to_rfc3339();
        self.dal
            .read(move |conn| {
                let count: i64 = activity_records::table
                    .filter(activity_records::book_id.eq(book_blob))
                    .filter(activity_records::action.eq(ActivityAction::Dispatched.as_str()))
                    .filter(activity_records::created_at.ge(since_text))
                    .count()
                    .get_result(conn)?;
                Ok(count)
            })
            .await
    }
}
