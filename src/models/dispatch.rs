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

//! Dispatch (assignment) model: links one registration to one job request.
//!
//! Lifecycle: pending -> checked-in -> active -> completed | terminated.

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// A dispatch record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: UniversalUuid,
    /// Back-link used for short-duration restoration
    pub registration_id: UniversalUuid,
    pub job_request_id: UniversalUuid,
    /// The bid that produced this dispatch, if any
    pub bid_id: Option<UniversalUuid>,
    pub employer_id: UniversalUuid,
    pub worker_id: UniversalUuid,
    pub book_id: UniversalUuid,
    pub method: DispatchMethod,
    /// Short-duration jobs restore the original registration on termination
    pub short_duration: bool,
    pub starts_at: UniversalTimestamp,
    /// Remote/off-hours dispatches become invalid without check-in by this
    /// deadline; enforcement terminates them as no-shows
    pub check_in_deadline: Option<UniversalTimestamp>,
    pub checked_in_at: Option<UniversalTimestamp>,
    pub status: DispatchStatus,
    pub terminated_at: Option<UniversalTimestamp>,
    pub termination_reason: Option<TerminationReason>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// How the worker was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchMethod {
    /// Next eligible worker in book order
    QueueOrder,
    /// Employer-requested individual, bypassing order
    NamedRequest,
    /// Accepted online bid
    FromBid,
}

impl DispatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMethod::QueueOrder => "queue_order",
            DispatchMethod::NamedRequest => "named_request",
            DispatchMethod::FromBid => "from_bid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queue_order" => Some(DispatchMethod::QueueOrder),
            "named_request" => Some(DispatchMethod::NamedRequest),
            "from_bid" => Some(DispatchMethod::FromBid),
            _ => None,
        }
    }
}

/// Dispatch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchStatus {
    /// Created; awaiting employer check-in
    Pending,
    /// Employer confirmed the worker
    CheckedIn,
    /// Work underway
    Active,
    /// Job ran to its natural end (terminal)
    Completed,
    /// Ended early (terminal); see the termination reason
    Terminated,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pending => "Pending",
            DispatchStatus::CheckedIn => "CheckedIn",
            DispatchStatus::Active => "Active",
            DispatchStatus::Completed => "Completed",
            DispatchStatus::Terminated => "Terminated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(DispatchStatus::Pending),
            "CheckedIn" => Some(DispatchStatus::CheckedIn),
            "Active" => Some(DispatchStatus::Active),
            "Completed" => Some(DispatchStatus::Completed),
            "Terminated" => Some(DispatchStatus::Terminated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStatus::Completed | DispatchStatus::Terminated)
    }
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a dispatch ended early. Closed set; each variant carries different
/// consequences in the dispatch engine:
///
/// - `Quit` / `Discharged`: roll the worker off every book + blackout
/// - `ReductionInForce`: plain termination, no penalty, no blackout
/// - `ShortCallEnd`: restore the original registration (capped)
/// - `NoShow`: applied by enforcement when a check-in deadline lapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    Quit,
    Discharged,
    ReductionInForce,
    ShortCallEnd,
    NoShow,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Quit => "quit",
            TerminationReason::Discharged => "discharged",
            TerminationReason::ReductionInForce => "reduction_in_force",
            TerminationReason::ShortCallEnd => "short_call_end",
            TerminationReason::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quit" => Some(TerminationReason::Quit),
            "discharged" => Some(TerminationReason::Discharged),
            "reduction_in_force" => Some(TerminationReason::ReductionInForce),
            "short_call_end" => Some(TerminationReason::ShortCallEnd),
            "no_show" => Some(TerminationReason::NoShow),
            _ => None,
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
