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

//! Dispatch engine: matching registrations to job requests.
//!
//! Selection and the resulting state transitions are claimed atomically in
//! the DAL; this service chooses the path (queue order, named request, bid),
//! supplies the configured thresholds, and emits post-commit events.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dal::DAL;
use crate::database::UniversalUuid;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::models::{Dispatch, Registration, TerminationReason};

/// What a termination did, by reason.
#[derive(Debug)]
pub enum TerminationOutcome {
    /// Quit/discharge: every one of the worker's registrations rolled off,
    /// plus a (worker, employer) blackout
    Cascade {
        dispatch: Dispatch,
        rolled_off: Vec<Registration>,
    },
    /// The dispatched registration rolled off this book only
    RolledOff {
        dispatch: Dispatch,
        registration: Registration,
    },
    /// Short-call end: the registration is back on its book with its
    /// original key
    Restored {
        dispatch: Dispatch,
        registration: Registration,
    },
}

/// Dispatch engine service.
pub struct DispatchEngine {
    dal: DAL,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl DispatchEngine {
    pub fn new(dal: DAL, config: EngineConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            dal,
            config,
            events,
        }
    }

    /// Dispatches the next eligible registration in book order.
    ///
    /// Returns `Ok(None)` when no registration on the book is eligible; an
    /// empty book is an answer, not an error.
    pub async fn dispatch_from_queue(
        &self,
        request_id: UniversalUuid,
        actor: &str,
    ) -> Result<Option<Dispatch>, EngineError> {
        let dispatch = self
            .dal
            .dispatch()
            .dispatch_from_queue(
                request_id,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;

        match dispatch {
            Some(dispatch) => {
                info!(
                    dispatch_id = %dispatch.id,
                    worker_id = %dispatch.worker_id,
                    request_id = %request_id,
                    "Dispatched next worker in book order"
                );
                self.events.emit(EngineEvent::Dispatched {
                    dispatch_id: dispatch.id,
                    worker_id: dispatch.worker_id,
                    job_request_id: request_id,
                });
                Ok(Some(dispatch))
            }
            None => {
                info!(request_id = %request_id, "No eligible registration on the book");
                Ok(None)
            }
        }
    }

    /// Dispatches an employer-named worker, bypassing book order.
    pub async fn dispatch_by_name(
        &self,
        request_id: UniversalUuid,
        worker_id: UniversalUuid,
        actor: &str,
    ) -> Result<Dispatch, EngineError> {
        let dispatch = self
            .dal
            .dispatch()
            .dispatch_by_name(
                request_id,
                worker_id,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(
            dispatch_id = %dispatch.id,
            worker_id = %worker_id,
            "Dispatched by employer name request"
        );
        self.events.emit(EngineEvent::Dispatched {
            dispatch_id: dispatch.id,
            worker_id,
            job_request_id: request_id,
        });
        Ok(dispatch)
    }

    /// Turns an accepted bid into a dispatch. The remote/off-hours path:
    /// the dispatch carries a check-in deadline, and enforcement terminates
    /// it as a no-show if the deadline lapses.
    pub async fn dispatch_from_bid(
        &self,
        bid_id: UniversalUuid,
        actor: &str,
    ) -> Result<Dispatch, EngineError> {
        let dispatch = self
            .dal
            .dispatch()
            .dispatch_from_bid(
                bid_id,
                self.config.check_in_deadline_hours(),
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(
            dispatch_id = %dispatch.id,
            bid_id = %bid_id,
            deadline = ?dispatch.check_in_deadline,
            "Dispatched from accepted bid"
        );
        self.events.emit(EngineEvent::Dispatched {
            dispatch_id: dispatch.id,
            worker_id: dispatch.worker_id,
            job_request_id: dispatch.job_request_id,
        });
        Ok(dispatch)
    }

    /// Employer confirms the worker arrived.
    pub async fn record_check_in(
        &self,
        dispatch_id: UniversalUuid,
        actor: &str,
    ) -> Result<Dispatch, EngineError> {
        self.dal
            .dispatch()
            .record_check_in(dispatch_id, actor.to_string())
            .await
    }

    /// Work starts.
    pub async fn begin_work(
        &self,
        dispatch_id: UniversalUuid,
        actor: &str,
    ) -> Result<Dispatch, EngineError> {
        self.dal
            .dispatch()
            .begin_work(dispatch_id, actor.to_string())
            .await
    }

    /// Natural end of the job: the registration returns to its book with
    /// its original ordering key.
    pub async fn complete(
        &self,
        dispatch_id: UniversalUuid,
        actor: &str,
    ) -> Result<(Dispatch, Registration), EngineError> {
        let (dispatch, registration) = self
            .dal
            .dispatch()
            .complete(
                dispatch_id,
                self.config.invert_tier_priority(),
                actor.to_string(),
            )
            .await?;
        info!(
            dispatch_id = %dispatch_id,
            registration_id = %registration.id,
            "Dispatch completed; registration back on book"
        );
        Ok((dispatch, registration))
    }

    /// Ends a dispatch early. Consequences depend on the reason:
    ///
    /// - `Quit`/`Discharged`: one transaction rolls the worker off every
    ///   book they are on and imposes a blackout against the employer
    /// - `ReductionInForce`: plain termination, no penalty, no blackout
    /// - `ShortCallEnd`: restores the registration, subject to the
    ///   restoration cap
    /// - `NoShow`: check-in deadline lapsed (normally via enforcement)
    pub async fn terminate(
        &self,
        dispatch_id: UniversalUuid,
        reason: TerminationReason,
        actor: &str,
    ) -> Result<TerminationOutcome, EngineError> {
        let invert = self.config.invert_tier_priority();
        let outcome = match reason {
            TerminationReason::Quit | TerminationReason::Discharged => {
                let (dispatch, rolled_off, blackout) = self
                    .dal
                    .dispatch()
                    .terminate_quit_or_discharge(
                        dispatch_id,
                        reason,
                        self.config.blackout_days(),
                        invert,
                        actor.to_string(),
                    )
                    .await?;
                warn!(
                    dispatch_id = %dispatch_id,
                    worker_id = %dispatch.worker_id,
                    books = rolled_off.len(),
                    reason = %reason,
                    "Dispatch ended by quit/discharge; worker rolled off all books"
                );
                self.events.emit(EngineEvent::BlackoutImposed {
                    worker_id: blackout.worker_id,
                    employer_id: blackout.employer_id,
                    expires_at: blackout.expires_at,
                });
                for registration in &rolled_off {
                    if let Some(removal) = registration.removal_reason {
                        self.events.emit(EngineEvent::RolledOff {
                            registration_id: registration.id,
                            worker_id: registration.worker_id,
                            book_id: registration.book_id,
                            reason: removal,
                        });
                    }
                }
                TerminationOutcome::Cascade {
                    dispatch,
                    rolled_off,
                }
            }
            TerminationReason::ReductionInForce => {
                let (dispatch, registration) = self
                    .dal
                    .dispatch()
                    .terminate_reduction_in_force(dispatch_id, invert, actor.to_string())
                    .await?;
                info!(dispatch_id = %dispatch_id, "Dispatch ended by reduction in force");
                TerminationOutcome::RolledOff {
                    dispatch,
                    registration,
                }
            }
            TerminationReason::ShortCallEnd => {
                let (dispatch, registration) = self
                    .dal
                    .dispatch()
                    .terminate_short_call(
                        dispatch_id,
                        self.config.short_call_free_days(),
                        self.config.short_call_max_restorations(),
                        invert,
                        actor.to_string(),
                    )
                    .await?;
                info!(
                    dispatch_id = %dispatch_id,
                    registration_id = %registration.id,
                    restoration_count = registration.restoration_count,
                    "Short call ended; registration restored"
                );
                TerminationOutcome::Restored {
                    dispatch,
                    registration,
                }
            }
            TerminationReason::NoShow => {
                let (dispatch, registration) = self
                    .dal
                    .dispatch()
                    .terminate_no_show(dispatch_id, invert, actor.to_string())
                    .await?;
                warn!(dispatch_id = %dispatch_id, "Dispatch terminated as no-show");
                TerminationOutcome::RolledOff {
                    dispatch,
                    registration,
                }
            }
        };

        let (dispatch_ref, worker_id) = match &outcome {
            TerminationOutcome::Cascade { dispatch, .. }
            | TerminationOutcome::RolledOff { dispatch, .. }
            | TerminationOutcome::Restored { dispatch, .. } => (dispatch.id, dispatch.worker_id),
        };
        self.events.emit(EngineEvent::DispatchTerminated {
            dispatch_id: dispatch_ref,
            worker_id,
            reason,
        });

        Ok(outcome)
    }

    /// Fetches a dispatch.
    pub async fn get(&self, dispatch_id: UniversalUuid) -> Result<Dispatch, EngineError> {
        self.dal.dispatch().get_by_id(dispatch_id).await
    }
}
