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

//! Bid model: a worker's claim against an open job request during its
//! bidding window.

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// A bid (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: UniversalUuid,
    pub worker_id: UniversalUuid,
    pub job_request_id: UniversalUuid,
    pub registration_id: UniversalUuid,
    pub method: BidMethod,
    pub status: BidStatus,
    pub submitted_at: UniversalTimestamp,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// How the bid was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidMethod {
    /// Placed in person or by phone with a dispatcher
    Interactive,
    /// Placed through the online/off-hours system
    Remote,
}

impl BidMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidMethod::Interactive => "interactive",
            BidMethod::Remote => "remote",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "interactive" => Some(BidMethod::Interactive),
            "remote" => Some(BidMethod::Remote),
            _ => None,
        }
    }
}

/// Bid lifecycle status.
///
/// Rejecting an *accepted* bid is a penalty event: it counts as a voluntary
/// quit and feeds the rolling-window suspension rule (see the market
/// service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidStatus {
    Pending,
    Accepted,
    NotSelected,
    Withdrawn,
    /// Worker backed out after acceptance
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "Pending",
            BidStatus::Accepted => "Accepted",
            BidStatus::NotSelected => "NotSelected",
            BidStatus::Withdrawn => "Withdrawn",
            BidStatus::Rejected => "Rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(BidStatus::Pending),
            "Accepted" => Some(BidStatus::Accepted),
            "NotSelected" => Some(BidStatus::NotSelected),
            "Withdrawn" => Some(BidStatus::Withdrawn),
            "Rejected" => Some(BidStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
