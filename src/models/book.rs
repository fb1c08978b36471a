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

//! Book ("out-of-work list") model.
//!
//! A book identifies one classification+region combination workers can
//! register against. Books are never physically deleted while registrations
//! reference them; they are deactivated instead.

use serde::{Deserialize, Serialize};

use crate::database::{UniversalTimestamp, UniversalUuid};

/// A referral book (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier for this book
    pub id: UniversalUuid,
    /// Display name, unique across books
    pub name: String,
    /// Classification tag (trade/skill grouping)
    pub classification: String,
    /// Region tag
    pub region: String,
    /// Default priority tier for registrations on this book
    pub priority_tier: i32,
    /// Days before a registration expires outright (None = never)
    pub max_days_before_expiry: Option<i32>,
    /// Length of the periodic renewal window, in days
    pub renewal_window_days: i32,
    /// Grace period past the renewal window, in days
    pub grace_period_days: i32,
    /// Whether online/off-hours bidding is enabled for this book
    pub online_bidding: bool,
    /// Inactive books accept no new registrations
    pub active: bool,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for creating a new book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub name: String,
    pub classification: String,
    pub region: String,
    pub priority_tier: i32,
    pub max_days_before_expiry: Option<i32>,
    pub renewal_window_days: i32,
    pub grace_period_days: i32,
    pub online_bidding: bool,
}
