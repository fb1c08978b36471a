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

//! Registration model: one worker's membership on one book.
//!
//! State machine:
//!
//! ```text
//! Active -> { Dispatched, Resigned, RolledOff }
//! Dispatched -> Active          (completion or short-call restoration)
//! Active <-> Exempt             (exemption toggle)
//! any -> RolledOff              (terminal for this book only)
//! ```
//!
//! Registrations are never physically deleted; terminal statuses preserve the
//! compliance trail. The ordering key is assigned once at registration and
//! never changes for the life of the registration.

use serde::{Deserialize, Serialize};

use crate::database::{OrderingKey, UniversalTimestamp, UniversalUuid};

/// A registration record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: UniversalUuid,
    pub worker_id: UniversalUuid,
    pub book_id: UniversalUuid,
    /// Immutable FIFO ordering key; position is always derived from it
    pub ordering_key: OrderingKey,
    /// Priority tier; lower tiers dispatch first under the default convention
    pub tier: i32,
    pub status: RegistrationStatus,
    /// Attendance-penalty strikes; reset by a successful check
    pub penalty_count: i32,
    pub last_attendance_check_at: Option<UniversalTimestamp>,
    pub registered_at: UniversalTimestamp,
    /// Renewal clock; advanced by renewals and exemption revocation
    pub last_renewal_at: UniversalTimestamp,
    pub exempt_reason: Option<ExemptReason>,
    pub exempt_from: Option<UniversalTimestamp>,
    pub exempt_until: Option<UniversalTimestamp>,
    pub removal_reason: Option<RemovalReason>,
    pub removed_at: Option<UniversalTimestamp>,
    /// Counted short-call restorations in the current registration cycle
    pub restoration_count: i32,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl Registration {
    /// True when the registration no longer occupies a slot on the book.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Registration lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// On the book and dispatchable
    Active,
    /// Currently out on a dispatch
    Dispatched,
    /// Renewal and penalty clocks paused
    Exempt,
    /// Voluntary exit (terminal)
    Resigned,
    /// Involuntary exit (terminal)
    RolledOff,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Active => "Active",
            RegistrationStatus::Dispatched => "Dispatched",
            RegistrationStatus::Exempt => "Exempt",
            RegistrationStatus::Resigned => "Resigned",
            RegistrationStatus::RolledOff => "RolledOff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(RegistrationStatus::Active),
            "Dispatched" => Some(RegistrationStatus::Dispatched),
            "Exempt" => Some(RegistrationStatus::Exempt),
            "Resigned" => Some(RegistrationStatus::Resigned),
            "RolledOff" => Some(RegistrationStatus::RolledOff),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Resigned | RegistrationStatus::RolledOff
        )
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reason codes for involuntary removal. Closed set: new rule categories are
/// compiler-enforced additions, not free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Attendance-penalty counter reached the limit
    PenaltyLimit,
    /// Renewal deadline (window + grace) passed
    MissedRenewal,
    /// Worker quit a dispatch
    Quit,
    /// Worker was discharged from a dispatch
    Discharged,
    /// Employer reduction in force
    ReductionInForce,
    /// Failed to check in by the dispatch deadline
    NoShow,
    /// Staff-initiated removal
    Administrative,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::PenaltyLimit => "penalty_limit",
            RemovalReason::MissedRenewal => "missed_renewal",
            RemovalReason::Quit => "quit",
            RemovalReason::Discharged => "discharged",
            RemovalReason::ReductionInForce => "reduction_in_force",
            RemovalReason::NoShow => "no_show",
            RemovalReason::Administrative => "administrative",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "penalty_limit" => Some(RemovalReason::PenaltyLimit),
            "missed_renewal" => Some(RemovalReason::MissedRenewal),
            "quit" => Some(RemovalReason::Quit),
            "discharged" => Some(RemovalReason::Discharged),
            "reduction_in_force" => Some(RemovalReason::ReductionInForce),
            "no_show" => Some(RemovalReason::NoShow),
            "administrative" => Some(RemovalReason::Administrative),
            _ => None,
        }
    }
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reason codes for exemptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExemptReason {
    Medical,
    FamilyLeave,
    Military,
    Training,
    UnionBusiness,
}

impl ExemptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExemptReason::Medical => "medical",
            ExemptReason::FamilyLeave => "family_leave",
            ExemptReason::Military => "military",
            ExemptReason::Training => "training",
            ExemptReason::UnionBusiness => "union_business",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "medical" => Some(ExemptReason::Medical),
            "family_leave" => Some(ExemptReason::FamilyLeave),
            "military" => Some(ExemptReason::Military),
            "training" => Some(ExemptReason::Training),
            "union_business" => Some(ExemptReason::UnionBusiness),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExemptReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of recording an attendance miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceMissOutcome {
    /// Registration is exempt; nothing was counted
    Exempt,
    /// Counter incremented to the given value
    Counted(i32),
    /// Counter reached the limit; the registration was rolled off in the
    /// same transaction
    RolledOff,
}
