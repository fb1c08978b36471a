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

//! Time-bounded restriction models: blackouts and suspensions.
//!
//! Both carry an explicit expiry rather than a boolean flag — booleans can't
//! self-expire. The enforcement scheduler stamps `cleared_at` once the expiry
//! passes; rows are kept for the trail.

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// A worker-employer pair barred from named-request dispatch after a
/// quit/discharge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackout {
    pub id: UniversalUuid,
    pub worker_id: UniversalUuid,
    pub employer_id: UniversalUuid,
    pub reason: String,
    pub expires_at: UniversalTimestamp,
    pub cleared_at: Option<UniversalTimestamp>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl Blackout {
    pub fn is_active(&self, at: UniversalTimestamp) -> bool {
        self.cleared_at.is_none() && self.expires_at > at
    }
}

/// A worker barred from online bidding after repeated rejection of accepted
/// bids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suspension {
    pub id: UniversalUuid,
    pub worker_id: UniversalUuid,
    pub reason: String,
    pub expires_at: UniversalTimestamp,
    pub cleared_at: Option<UniversalTimestamp>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl Suspension {
    pub fn is_active(&self, at: UniversalTimestamp) -> bool {
        self.cleared_at.is_none() && self.expires_at > at
    }
}
