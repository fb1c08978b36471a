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

//! Registration ledger: the authoritative lifecycle of worker registrations.
//!
//! The ledger resolves workers through the external directory, delegates the
//! transactional work to the DAL, and emits post-commit events. All rule
//! thresholds come from [`EngineConfig`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::directory::WorkerDirectory;
use crate::error::{DomainViolation, EngineError};
use crate::events::{EngineEvent, EventSink};
use crate::models::{
    ActivityRecord, AttendanceMissOutcome, ExemptReason, Registration, RemovalReason,
};

/// Registration ledger service.
pub struct RegistrationLedger {
    dal: DAL,
    config: EngineConfig,
    workers: Arc<dyn WorkerDirectory>,
    events: Arc<dyn EventSink>,
}

impl RegistrationLedger {
    pub fn new(
        dal: DAL,
        config: EngineConfig,
        workers: Arc<dyn WorkerDirectory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            dal,
            config,
            workers,
            events,
        }
    }

    /// Registers a worker on a book.
    ///
    /// The worker's tier comes from their directory profile; the ordering
    /// key is assigned inside the transaction and never changes afterwards.
    pub async fn register(
        &self,
        worker_id: UniversalUuid,
        book_id: UniversalUuid,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let profile = self
            .workers
            .lookup(worker_id)
            .await
            .ok_or(DomainViolation::WorkerNotFound(worker_id))?;

        let registration = self
            .dal
            .registration()
            .register(
                worker_id,
                book_id,
                profile.tier,
                self.config.ordering_key_policy(),
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;

        info!(
            registration_id = %registration.id,
            worker_id = %worker_id,
            book_id = %book_id,
            ordering_key = %registration.ordering_key,
            "Registered worker on book"
        );
        self.events.emit(EngineEvent::Registered {
            registration_id: registration.id,
            worker_id,
            book_id,
        });
        Ok(registration)
    }

    /// Renews an Active registration within its renewal window.
    pub async fn renew(
        &self,
        registration_id: UniversalUuid,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let registration = self
            .dal
            .registration()
            .renew(
                registration_id,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(registration_id = %registration_id, "Registration renewed");
        Ok(registration)
    }

    /// Voluntary resignation from a book.
    pub async fn resign(
        &self,
        registration_id: UniversalUuid,
        reason: Option<String>,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let registration = self
            .dal
            .registration()
            .resign(
                registration_id,
                reason,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(registration_id = %registration_id, "Registration resigned");
        Ok(registration)
    }

    /// Involuntary removal from a book.
    pub async fn roll_off(
        &self,
        registration_id: UniversalUuid,
        reason: RemovalReason,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let registration = self
            .dal
            .registration()
            .roll_off(
                registration_id,
                reason,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        warn!(registration_id = %registration_id, reason = %reason, "Registration rolled off");
        self.events.emit(EngineEvent::RolledOff {
            registration_id,
            worker_id: registration.worker_id,
            book_id: registration.book_id,
            reason,
        });
        Ok(registration)
    }

    /// Successful attendance check: penalty counter resets to zero.
    pub async fn record_attendance_success(
        &self,
        registration_id: UniversalUuid,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        self.dal
            .registration()
            .record_attendance_success(registration_id, actor.to_string())
            .await
    }

    /// Attendance miss. Exempt registrations report `Exempt` untouched;
    /// hitting the penalty limit rolls the registration off in the same
    /// transaction.
    pub async fn record_attendance_miss(
        &self,
        registration_id: UniversalUuid,
        actor: &str,
    ) -> Result<AttendanceMissOutcome, EngineError> {
        let outcome = self
            .dal
            .registration()
            .record_attendance_miss(
                registration_id,
                self.config.penalty_limit(),
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;

        if outcome == AttendanceMissOutcome::RolledOff {
            let registration = self.dal.registration().get_by_id(registration_id).await?;
            warn!(
                registration_id = %registration_id,
                limit = self.config.penalty_limit(),
                "Attendance penalty limit reached; registration rolled off"
            );
            self.events.emit(EngineEvent::RolledOff {
                registration_id,
                worker_id: registration.worker_id,
                book_id: registration.book_id,
                reason: RemovalReason::PenaltyLimit,
            });
        }
        Ok(outcome)
    }

    /// Grants an exemption, pausing the renewal and penalty clocks.
    pub async fn grant_exemption(
        &self,
        registration_id: UniversalUuid,
        reason: ExemptReason,
        until: Option<UniversalTimestamp>,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let registration = self
            .dal
            .registration()
            .grant_exemption(
                registration_id,
                reason,
                until,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(registration_id = %registration_id, reason = %reason, "Exemption granted");
        Ok(registration)
    }

    /// Revokes an exemption; the exempt interval plus a configured grace is
    /// credited back to the renewal clock.
    pub async fn revoke_exemption(
        &self,
        registration_id: UniversalUuid,
        actor: &str,
    ) -> Result<Registration, EngineError> {
        let registration = self
            .dal
            .registration()
            .revoke_exemption(
                registration_id,
                self.config.exemption_revocation_grace_days(),
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(registration_id = %registration_id, "Exemption revoked");
        self.events.emit(EngineEvent::ExemptionRevoked {
            registration_id,
            worker_id: registration.worker_id,
        });
        Ok(registration)
    }

    /// Fetches one registration.
    pub async fn get(&self, registration_id: UniversalUuid) -> Result<Registration, EngineError> {
        self.dal.registration().get_by_id(registration_id).await
    }

    /// Full activity trail for a registration, oldest first.
    pub async fn history(
        &self,
        registration_id: UniversalUuid,
    ) -> Result<Vec<ActivityRecord>, EngineError> {
        self.dal
            .activity()
            .list_for_registration(registration_id)
            .await
    }
}
