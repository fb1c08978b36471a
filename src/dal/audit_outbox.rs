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

//! DAL for the transactional audit outbox.
//!
//! Mutations queue their outbox row with [`queue_audit_event`] inside the
//! same transaction as the domain write; the relay in `audit.rs` drains
//! unforwarded rows and stamps `forwarded_at` only after the external sink
//! acknowledged them. Delivery is therefore at-least-once.

use diesel::prelude::*;

use super::models::{uuid_from_blob, NewSqliteAuditEvent, SqliteAuditEvent};
use super::{TxnError, DAL};
use crate::audit::AuditEvent;
use crate::database::schema::audit_outbox;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::EngineError;

/// Inserts one outbox row on the caller's connection (and transaction).
pub(crate) fn queue_audit_event(
    conn: &mut SqliteConnection,
    table: &str,
    record_id: &UniversalUuid,
    action: &str,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
    actor: &str,
    now: &UniversalTimestamp,
) -> Result<(), TxnError> {
    let row = NewSqliteAuditEvent {
        id: UniversalUuid::new_v4().to_vec(),
        table_name: table.to_string(),
        record_id: record_id.to_vec(),
        action: action.to_string(),
        before_state: before.map(|v| v.to_string()),
        after_state: after.map(|v| v.to_string()),
        actor: actor.to_string(),
        created_at: now.to_rfc3339(),
    };

    diesel::insert_into(audit_outbox::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

fn to_domain(row: SqliteAuditEvent) -> Result<AuditEvent, String> {
    let parse_state = |s: &str| {
        serde_json::from_str(s).map_err(|e| format!("invalid audit state JSON: {}", e))
    };
    Ok(AuditEvent {
        id: uuid_from_blob(&row.id)?,
        table_name: row.table_name,
        record_id: uuid_from_blob(&row.record_id)?,
        action: row.action,
        before_state: row.before_state.as_deref().map(parse_state).transpose()?,
        after_state: row.after_state.as_deref().map(parse_state).transpose()?,
        actor: row.actor,
        created_at: UniversalTimestamp::from_rfc3339(&row.created_at)
            .map_err(|e| format!("invalid timestamp: {}", e))?,
        forwarded_at: row
            .forwarded_at
            .as_deref()
            .map(UniversalTimestamp::from_rfc3339)
            .transpose()
            .map_err(|e| format!("invalid timestamp: {}", e))?,
    })
}

/// DAL for outbox draining.
pub struct AuditOutboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> AuditOutboxDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Oldest unforwarded events, up to `limit`.
    pub async fn pending(&self, limit: i64) -> Result<Vec<AuditEvent>, EngineError> {
        self.dal
            .read(move |conn| {
                let rows: Vec<SqliteAuditEvent> = audit_outbox::table
                    .filter(audit_outbox::forwarded_at.is_null())
                    .order(audit_outbox::created_at.asc())
                    .limit(limit)
                    .select(SqliteAuditEvent::as_select())
                    .load(conn)?;
                rows.into_iter()
                    .map(|r| to_domain(r).map_err(TxnError::Conversion))
                    .collect()
            })
            .await
    }

    /// Stamps `forwarded_at` on delivered events.
    pub async fn mark_forwarded(&self, ids: Vec<UniversalUuid>) -> Result<usize, EngineError> {
        let blobs: Vec<Vec<u8>> = ids.iter().map(|u| u.to_vec()).collect();
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now().to_rfc3339();
                let updated = diesel::update(
                    audit_outbox::table.filter(audit_outbox::id.eq_any(blobs)),
                )
                .set(audit_outbox::forwarded_at.eq(now))
                .execute(conn)?;
                Ok(updated)
            })
            .await
    }

    /// Unforwarded backlog size.
    pub async fn backlog(&self) -> Result<i64, EngineError> {
        self.dal
            .read(|conn| {
                let count: i64 = audit_outbox::table
                    .filter(audit_outbox::forwarded_at.is_null())
                    .count()
                    .get_result(conn)?;
                Ok(count)
            })
            .await
    }
}
