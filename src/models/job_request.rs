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

//! Job request model: employer demand for N workers on a book.

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// A job request (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: UniversalUuid,
    pub employer_id: UniversalUuid,
    pub book_id: UniversalUuid,
    pub workers_requested: i32,
    pub workers_filled: i32,
    /// Date the work starts; requests past this date expire
    pub target_date: UniversalTimestamp,
    /// Optional online bidding window
    pub bidding_opens_at: Option<UniversalTimestamp>,
    pub bidding_closes_at: Option<UniversalTimestamp>,
    /// Classification metadata evaluated once at creation
    pub metadata: RequestMetadata,
    /// Whether declining/fulfilling this request can generate an attendance
    /// penalty. Computed once at creation; never re-evaluated, so downstream
    /// penalty logic stays deterministic even if metadata is edited.
    pub penalty_eligible: bool,
    pub status: RequestStatus,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl JobRequest {
    /// Unfilled worker slots remaining.
    pub fn remaining(&self) -> i32 {
        self.workers_requested - self.workers_filled
    }

    /// True while the request can still accept matches or be cancelled.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Open | RequestStatus::PartiallyFilled
        )
    }

    /// True if `at` falls inside the configured bidding window.
    pub fn bidding_window_open(&self, at: UniversalTimestamp) -> bool {
        match (self.bidding_opens_at, self.bidding_closes_at) {
            (Some(opens), Some(closes)) => at >= opens && at < closes,
            _ => false,
        }
    }
}

/// Classification metadata carried by a request.
///
/// These flags drive [`penalty_eligibility`], which is evaluated exactly once
/// at request creation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub specialty_skill: bool,
    pub irregular_site: bool,
    pub early_start: bool,
    pub below_standard_rate: bool,
    pub short_duration: bool,
    pub employer_initiated_rejection: bool,
}

/// Pure function: does fulfilling/declining a request with this metadata
/// generate an attendance-penalty opportunity?
///
/// A request is penalty-eligible only when it is ordinary work: none of the
/// exception flags (specialty skill, irregular site, very-early start,
/// below-standard rate, short duration, employer-initiated rejection) apply.
pub fn penalty_eligibility(meta: &RequestMetadata) -> bool {
    !(meta.specialty_skill
        || meta.irregular_site
        || meta.early_start
        || meta.below_standard_rate
        || meta.short_duration
        || meta.employer_initiated_rejection)
}

/// Structure for creating a new job request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobRequest {
    pub employer_id: UniversalUuid,
    pub book_id: UniversalUuid,
    pub workers_requested: i32,
    pub target_date: UniversalTimestamp,
    pub bidding_opens_at: Option<UniversalTimestamp>,
    pub bidding_closes_at: Option<UniversalTimestamp>,
    pub metadata: RequestMetadata,
}

/// Request lifecycle: open -> partially-filled -> filled | cancelled |
/// expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "Open",
            RequestStatus::PartiallyFilled => "PartiallyFilled",
            RequestStatus::Filled => "Filled",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Expired => "Expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Open" => Some(RequestStatus::Open),
            "PartiallyFilled" => Some(RequestStatus::PartiallyFilled),
            "Filled" => Some(RequestStatus::Filled),
            "Cancelled" => Some(RequestStatus::Cancelled),
            "Expired" => Some(RequestStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
