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

//! Engine event notifications.
//!
//! Events are emitted after commit, fire-and-forget: a sink failure can log
//! but never roll back the committed transition. For guaranteed delivery use
//! the audit outbox instead.

use serde::Serialize;

use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::models::{RemovalReason, TerminationReason};

/// Structured notifications emitted by the engine after commit.
#[derive(Debug, Clone, Serialize)]
pub enum EngineEvent {
    Registered {
        registration_id: UniversalUuid,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
    },
    RolledOff {
        registration_id: UniversalUuid,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
        reason: RemovalReason,
    },
    RenewalDueSoon {
        registration_id: UniversalUuid,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
        due_at: UniversalTimestamp,
    },
    Dispatched {
        dispatch_id: UniversalUuid,
        worker_id: UniversalUuid,
        job_request_id: UniversalUuid,
    },
    DispatchTerminated {
        dispatch_id: UniversalUuid,
        worker_id: UniversalUuid,
        reason: TerminationReason,
    },
    RequestExpired {
        job_request_id: UniversalUuid,
    },
    ExemptionRevoked {
        registration_id: UniversalUuid,
        worker_id: UniversalUuid,
    },
    SuspensionImposed {
        worker_id: UniversalUuid,
        expires_at: UniversalTimestamp,
    },
    BlackoutImposed {
        worker_id: UniversalUuid,
        employer_id: UniversalUuid,
        expires_at: UniversalTimestamp,
    },
    RestrictionCleared {
        worker_id: UniversalUuid,
    },
}

/// Downstream consumer of engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards every event. The default when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Collects events in memory. Test helper.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
