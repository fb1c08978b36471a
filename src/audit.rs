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

//! Compliance audit: outbox events and the relay that delivers them.
//!
//! Mutations never call the external sink directly. They queue an outbox row
//! inside their own transaction (mandatory; a failed queue insert aborts the
//! operation), and [`AuditRelay`] forwards unforwarded rows afterwards.
//! `forwarded_at` is stamped only after the sink acknowledges, so delivery is
//! at-least-once: a crash between sink write and stamp re-delivers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dal::DAL;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::EngineError;

/// One audit-outbox event, ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: UniversalUuid,
    /// Domain table the mutation touched
    pub table_name: String,
    pub record_id: UniversalUuid,
    pub action: String,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub actor: String,
    pub created_at: UniversalTimestamp,
    pub forwarded_at: Option<UniversalTimestamp>,
}

/// Failure reported by a compliance sink.
#[derive(Debug, Error)]
#[error("compliance sink failure: {0}")]
pub struct SinkError(pub String);

/// External append-only compliance store.
///
/// Implementations must tolerate duplicate delivery of the same event id.
#[async_trait]
pub trait ComplianceSink: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> Result<(), SinkError>;
}

/// Drains the audit outbox into a [`ComplianceSink`].
pub struct AuditRelay {
    dal: DAL,
    sink: Arc<dyn ComplianceSink>,
}

impl AuditRelay {
    pub fn new(dal: DAL, sink: Arc<dyn ComplianceSink>) -> Self {
        Self { dal, sink }
    }

    /// Forwards up to `batch` pending events, oldest first.
    ///
    /// Events delivered before a sink failure are still stamped, so a flaky
    /// sink only delays the remainder. Returns the number forwarded.
    pub async fn run_once(&self, batch: i64) -> Result<usize, EngineError> {
        let pending = self.dal.audit_outbox().pending(batch).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut delivered = Vec::with_capacity(pending.len());
        for event in &pending {
            match self.sink.write(event).await {
                Ok(()) => delivered.push(event.id),
                Err(e) => {
                    // Retried on the next pass; events already delivered are
                    // still stamped below.
                    warn!(event_id = %event.id, error = %e, "Compliance sink rejected event; will retry");
                    break;
                }
            }
        }

        let forwarded = delivered.len();
        if !delivered.is_empty() {
            self.dal.audit_outbox().mark_forwarded(delivered).await?;
        }
        debug!(forwarded, pending = pending.len(), "Audit relay pass finished");
        Ok(forwarded)
    }

    /// Forwards until the outbox is empty or the sink fails.
    pub async fn drain(&self, batch: i64) -> Result<usize, EngineError> {
        let mut total = 0;
        loop {
            let forwarded = self.run_once(batch).await?;
            total += forwarded;
            if forwarded < batch as usize {
                return Ok(total);
            }
        }
    }
}
