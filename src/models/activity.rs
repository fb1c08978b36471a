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

//! Activity record model.
//!
//! One immutable row per state-changing event on a registration or dispatch.
//! Rows are written inside the same transaction as the mutation and are never
//! updated or deleted; they serve both as a fast domain-query index and as
//! the local half of the compliance trail (the external sink receives a copy
//! through the audit outbox).

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// An activity record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: UniversalUuid,
    pub registration_id: Option<UniversalUuid>,
    pub dispatch_id: Option<UniversalUuid>,
    pub worker_id: UniversalUuid,
    pub book_id: Option<UniversalUuid>,
    pub action: ActivityAction,
    pub prior_status: Option<String>,
    pub new_status: Option<String>,
    /// Derived 1-based queue position before the mutation, if any
    pub prior_position: Option<i32>,
    /// Derived 1-based queue position after the mutation, if any
    pub new_position: Option<i32>,
    pub actor: String,
    pub reason: Option<String>,
    pub created_at: UniversalTimestamp,
}

/// Action tags for activity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityAction {
    // Registration lifecycle
    Registered,
    Renewed,
    Resigned,
    RolledOff,
    AttendanceMissed,
    AttendanceCleared,
    ExemptionGranted,
    ExemptionRevoked,
    ReturnedToBook,
    Restored,

    // Dispatch lifecycle
    Dispatched,
    CheckedIn,
    WorkBegan,
    Completed,
    Terminated,

    // Bidding
    BidPlaced,
    BidAccepted,
    BidNotSelected,
    BidWithdrawn,
    BidRejected,

    // Restrictions
    SuspensionImposed,
    SuspensionCleared,
    BlackoutImposed,
    BlackoutCleared,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Registered => "registered",
            ActivityAction::Renewed => "renewed",
            ActivityAction::Resigned => "resigned",
            ActivityAction::RolledOff => "rolled_off",
            ActivityAction::AttendanceMissed => "attendance_missed",
            ActivityAction::AttendanceCleared => "attendance_cleared",
            ActivityAction::ExemptionGranted => "exemption_granted",
            ActivityAction::ExemptionRevoked => "exemption_revoked",
            ActivityAction::ReturnedToBook => "returned_to_book",
            ActivityAction::Restored => "restored",
            ActivityAction::Dispatched => "dispatched",
            ActivityAction::CheckedIn => "checked_in",
            ActivityAction::WorkBegan => "work_began",
            ActivityAction::Completed => "completed",
            ActivityAction::Terminated => "terminated",
            ActivityAction::BidPlaced => "bid_placed",
            ActivityAction::BidAccepted => "bid_accepted",
            ActivityAction::BidNotSelected => "bid_not_selected",
            ActivityAction::BidWithdrawn => "bid_withdrawn",
            ActivityAction::BidRejected => "bid_rejected",
            ActivityAction::SuspensionImposed => "suspension_imposed",
            ActivityAction::SuspensionCleared => "suspension_cleared",
            ActivityAction::BlackoutImposed => "blackout_imposed",
            ActivityAction::BlackoutCleared => "blackout_cleared",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(ActivityAction::Registered),
            "renewed" => Some(ActivityAction::Renewed),
            "resigned" => Some(ActivityAction::Resigned),
            "rolled_off" => Some(ActivityAction::RolledOff),
            "attendance_missed" => Some(ActivityAction::AttendanceMissed),
            "attendance_cleared" => Some(ActivityAction::AttendanceCleared),
            "exemption_granted" => Some(ActivityAction::ExemptionGranted),
            "exemption_revoked" => Some(ActivityAction::ExemptionRevoked),
            "returned_to_book" => Some(ActivityAction::ReturnedToBook),
            "restored" => Some(ActivityAction::Restored),
            "dispatched" => Some(ActivityAction::Dispatched),
            "checked_in" => Some(ActivityAction::CheckedIn),
            "work_began" => Some(ActivityAction::WorkBegan),
            "completed" => Some(ActivityAction::Completed),
            "terminated" => Some(ActivityAction::Terminated),
            "bid_placed" => Some(ActivityAction::BidPlaced),
            "bid_accepted" => Some(ActivityAction::BidAccepted),
            "bid_not_selected" => Some(ActivityAction::BidNotSelected),
            "bid_withdrawn" => Some(ActivityAction::BidWithdrawn),
            "bid_rejected" => Some(ActivityAction::BidRejected),
            "suspension_imposed" => Some(ActivityAction::SuspensionImposed),
            "suspension_cleared" => Some(ActivityAction::SuspensionCleared),
            "blackout_imposed" => Some(ActivityAction::BlackoutImposed),
            "blackout_cleared" => Some(ActivityAction::BlackoutCleared),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
