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

//! Daily enforcement scheduler.
//!
//! Six independent passes, each idempotent on its own: a second live run
//! over unchanged data reports zero actions. One item's failure is logged
//! and counted, never aborting the batch. A dry run walks identical
//! read/decision paths and returns the same report shape with zero writes.
//!
//! An `AtomicBool` guard refuses overlapping runs; enforcement running
//! concurrently with dispatch is fine because every write it makes goes
//! through the same transactional DAL operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::events::{EngineEvent, EventSink};
use crate::models::{Book, RegistrationStatus, RemovalReason, TerminationReason};

/// What a daily run did (or, for a dry run, would do).
#[derive(Debug, Clone, Default)]
pub struct EnforcementReport {
    pub dry_run: bool,
    /// Registrations rolled off for a missed renewal
    pub renewals_rolled_off: Vec<UniversalUuid>,
    /// Registrations whose renewal deadline falls within the reminder lead
    pub renewal_reminders: Vec<UniversalUuid>,
    /// Requests expired for a passed target date
    pub requests_expired: Vec<UniversalUuid>,
    /// Exemptions revoked past their end date
    pub exemptions_revoked: Vec<UniversalUuid>,
    /// Dispatches terminated as no-shows
    pub no_shows_terminated: Vec<UniversalUuid>,
    pub blackouts_cleared: usize,
    pub suspensions_cleared: usize,
    /// Items that failed; each was logged and skipped
    pub failures: usize,
}

impl EnforcementReport {
    /// Total state-changing actions the run performed (or would perform).
    pub fn total_actions(&self) -> usize {
        self.renewals_rolled_off.len()
            + self.requests_expired.len()
            + self.exemptions_revoked.len()
            + self.no_shows_terminated.len()
            + self.blackouts_cleared
            + self.suspensions_cleared
    }
}

/// Daily enforcement scheduler.
pub struct EnforcementScheduler {
    dal: DAL,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
    running: AtomicBool,
}

impl EnforcementScheduler {
    pub fn new(dal: DAL, config: EngineConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            dal,
            config,
            events,
            running: AtomicBool::new(false),
        }
    }

    /// Runs all six passes. Refuses to overlap with another run on this
    /// scheduler.
    pub async fn run_daily(
        &self,
        dry_run: bool,
        actor: &str,
    ) -> Result<EnforcementReport, EngineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DomainViolation::EnforcementAlreadyRunning.into());
        }

        let result = self.run_passes(dry_run, actor).await;
        self.running.store(false, Ordering::Release);

        if let Ok(ref report) = result {
            info!(
                dry_run,
                actions = report.total_actions(),
                failures = report.failures,
                "Enforcement run finished"
            );
        }
        result
    }

    async fn run_passes(
        &self,
        dry_run: bool,
        actor: &str,
    ) -> Result<EnforcementReport, EngineError> {
        let mut report = EnforcementReport {
            dry_run,
            ..Default::default()
        };
        let now = UniversalTimestamp::now();

        let books: HashMap<UniversalUuid, Book> = self
            .dal
            .book()
            .list_all()
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        self.pass_missed_renewals(dry_run, actor, &now, &books, &mut report)
            .await?;
        self.pass_renewal_reminders(dry_run, &now, &books, &mut report)
            .await?;
        self.pass_expired_requests(dry_run, actor, &now, &mut report)
            .await?;
        self.pass_lapsed_exemptions(dry_run, actor, &now, &mut report)
            .await?;
        self.pass_no_shows(dry_run, actor, &now, &mut report).await?;
        self.pass_expired_restrictions(dry_run, actor, &mut report)
            .await?;

        Ok(report)
    }

    /// Pass 1: roll off Active registrations past renewal window + grace.
    async fn pass_missed_renewals(
        &self,
        dry_run: bool,
        actor: &str,
        now: &UniversalTimestamp,
        books: &HashMap<UniversalUuid, Book>,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        let active = self
            .dal
            .registration()
            .list_by_status(RegistrationStatus::Active)
            .await?;

        for registration in active {
            let book = match books.get(&registration.book_id) {
                Some(b) => b,
                None => {
                    warn!(registration_id = %registration.id, "Registration references unknown book");
                    report.failures += 1;
                    continue;
                }
            };
            let deadline = (book.renewal_window_days + book.grace_period_days) as i64;
            let days_since = (*now.as_datetime() - *registration.last_renewal_at.as_datetime())
                .num_days();
            if days_since <= deadline {
                continue;
            }

            if !dry_run {
                let rolled = self
                    .dal
                    .registration()
                    .roll_off(
                        registration.id,
                        RemovalReason::MissedRenewal,
                        self.config.invert_tier_priority(),
                        actor.to_string(),
                    )
                    .await;
                match rolled {
                    Ok(_) => {
                        self.events.emit(EngineEvent::RolledOff {
                            registration_id: registration.id,
                            worker_id: registration.worker_id,
                            book_id: registration.book_id,
                            reason: RemovalReason::MissedRenewal,
                        });
                    }
                    Err(e) => {
                        warn!(registration_id = %registration.id, error = %e, "Missed-renewal roll-off failed");
                        report.failures += 1;
                        continue;
                    }
                }
            }
            report.renewals_rolled_off.push(registration.id);
        }
        Ok(())
    }

    /// Pass 2: read-only reminder list for renewals coming due.
    async fn pass_renewal_reminders(
        &self,
        dry_run: bool,
        now: &UniversalTimestamp,
        books: &HashMap<UniversalUuid, Book>,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        let active = self
            .dal
            .registration()
            .list_by_status(RegistrationStatus::Active)
            .await?;
        let lead = self.config.renewal_reminder_lead_days();

        for registration in active {
            let book = match books.get(&registration.book_id) {
                Some(b) => b,
                None => continue,
            };
            let deadline_days =
                (book.renewal_window_days + book.grace_period_days) as i64;
            let due_at = *registration.last_renewal_at.as_datetime()
                + chrono::Duration::days(deadline_days);
            let days_left = (due_at - *now.as_datetime()).num_days();
            if days_left < 0 || days_left > lead {
                continue;
            }

            if !dry_run {
                self.events.emit(EngineEvent::RenewalDueSoon {
                    registration_id: registration.id,
                    worker_id: registration.worker_id,
                    book_id: registration.book_id,
                    due_at: UniversalTimestamp::from(due_at),
                });
            }
            report.renewal_reminders.push(registration.id);
        }
        Ok(())
    }

    /// Pass 3: expire open requests whose target date has passed.
    async fn pass_expired_requests(
        &self,
        dry_run: bool,
        actor: &str,
        now: &UniversalTimestamp,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        let stale = self.dal.job_request().list_open_past_target(*now).await?;
        for request in stale {
            if !dry_run {
                if let Err(e) = self
                    .dal
                    .job_request()
                    .expire(request.id, actor.to_string())
                    .await
                {
                    warn!(request_id = %request.id, error = %e, "Request expiry failed");
                    report.failures += 1;
                    continue;
                }
                self.events.emit(EngineEvent::RequestExpired {
                    job_request_id: request.id,
                });
            }
            report.requests_expired.push(request.id);
        }
        Ok(())
    }

    /// Pass 4: revoke exemptions past their end date, re-arming the renewal
    /// clock with the configured grace.
    async fn pass_lapsed_exemptions(
        &self,
        dry_run: bool,
        actor: &str,
        now: &UniversalTimestamp,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        let exempt = self
            .dal
            .registration()
            .list_by_status(RegistrationStatus::Exempt)
            .await?;
        for registration in exempt {
            let lapsed = matches!(registration.exempt_until, Some(until) if until < *now);
            if !lapsed {
                continue;
            }

            if !dry_run {
                let revoked = self
                    .dal
                    .registration()
                    .revoke_exemption(
                        registration.id,
                        self.config.exemption_revocation_grace_days(),
                        self.config.invert_tier_priority(),
                        actor.to_string(),
                    )
                    .await;
                if let Err(e) = revoked {
                    warn!(registration_id = %registration.id, error = %e, "Exemption revocation failed");
                    report.failures += 1;
                    continue;
                }
                self.events.emit(EngineEvent::ExemptionRevoked {
                    registration_id: registration.id,
                    worker_id: registration.worker_id,
                });
            }
            report.exemptions_revoked.push(registration.id);
        }
        Ok(())
    }

    /// Pass 5: terminate dispatches whose check-in deadline lapsed.
    async fn pass_no_shows(
        &self,
        dry_run: bool,
        actor: &str,
        now: &UniversalTimestamp,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        let lapsed = self.dal.dispatch().list_pending_past_deadline(*now).await?;
        for dispatch in lapsed {
            if !dry_run {
                let terminated = self
                    .dal
                    .dispatch()
                    .terminate_no_show(
                        dispatch.id,
                        self.config.invert_tier_priority(),
                        actor.to_string(),
                    )
                    .await;
                if let Err(e) = terminated {
                    warn!(dispatch_id = %dispatch.id, error = %e, "No-show termination failed");
                    report.failures += 1;
                    continue;
                }
                self.events.emit(EngineEvent::DispatchTerminated {
                    dispatch_id: dispatch.id,
                    worker_id: dispatch.worker_id,
                    reason: TerminationReason::NoShow,
                });
            }
            report.no_shows_terminated.push(dispatch.id);
        }
        Ok(())
    }

    /// Pass 6: stamp `cleared_at` on expired blackouts and suspensions.
    async fn pass_expired_restrictions(
        &self,
        dry_run: bool,
        actor: &str,
        report: &mut EnforcementReport,
    ) -> Result<(), EngineError> {
        if dry_run {
            report.blackouts_cleared = self
                .dal
                .restriction()
                .expired_uncleared_blackouts()
                .await?
                .len();
            report.suspensions_cleared = self
                .dal
                .restriction()
                .expired_uncleared_suspensions()
                .await?
                .len();
            return Ok(());
        }

        let blackouts = self
            .dal
            .restriction()
            .clear_expired_blackouts(actor.to_string())
            .await?;
        for blackout in &blackouts {
            self.events.emit(EngineEvent::RestrictionCleared {
                worker_id: blackout.worker_id,
            });
        }
        report.blackouts_cleared = blackouts.len();

        let suspensions = self
            .dal
            .restriction()
            .clear_expired_suspensions(actor.to_string())
            .await?;
        for suspension in &suspensions {
            self.events.emit(EngineEvent::RestrictionCleared {
                worker_id: suspension.worker_id,
            });
        }
        report.suspensions_cleared = suspensions.len();
        Ok(())
    }
}
