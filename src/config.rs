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

//! Engine configuration.
//!
//! All rule thresholds live here so the business rules stay data-driven and
//! testable. Use [`EngineConfig::builder()`] to override defaults:
//!
//! ```rust
//! use hallbook::config::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .blackout_days(14)
//!     .short_call_max_restorations(2)
//!     .build();
//! assert_eq!(config.penalty_limit(), 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interpretation of the ordering key's fractional component.
///
/// The integer part of a key is always the registration date (YYYYMMDD). The
/// source rules are ambiguous about the fraction, so both readings are
/// supported and tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingKeyPolicy {
    /// Fraction is a same-day tie-break sequence (.0001, .0002, ...).
    DateSequence,
    /// Fraction encodes the worker's re-registration count on the book
    /// (.0100 per prior registration), still bumped past the book maximum.
    RegistrationSuffix,
}

/// Errors from [`EngineConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: i64 },

    #[error("daily_cutoff_hour must be 0-23 (got {0})")]
    CutoffHourOutOfRange(u32),
}

/// Configuration for the referral engine's business rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EngineConfig {
    penalty_limit: i32,
    blackout_days: i64,
    bid_rejection_limit: i64,
    bid_rejection_window_months: u32,
    suspension_months: u32,
    short_call_free_days: i64,
    short_call_max_restorations: i32,
    daily_cutoff_hour: u32,
    check_in_deadline_hours: i64,
    renewal_reminder_lead_days: i64,
    exemption_revocation_grace_days: i64,
    wait_estimate_window_days: i64,
    wait_estimate_min_samples: usize,
    ordering_key_policy: OrderingKeyPolicy,
    invert_tier_priority: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            penalty_limit: 3,
            blackout_days: 14,
            bid_rejection_limit: 2,
            bid_rejection_window_months: 12,
            suspension_months: 12,
            short_call_free_days: 3,
            short_call_max_restorations: 2,
            daily_cutoff_hour: 17,
            check_in_deadline_hours: 12,
            renewal_reminder_lead_days: 5,
            exemption_revocation_grace_days: 5,
            wait_estimate_window_days: 30,
            wait_estimate_min_samples: 5,
            ordering_key_policy: OrderingKeyPolicy::DateSequence,
            invert_tier_priority: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration builder with default values.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Attendance misses that trigger an automatic roll-off.
    pub fn penalty_limit(&self) -> i32 {
        self.penalty_limit
    }

    /// Duration of the named-dispatch blackout created by a quit/discharge.
    pub fn blackout_days(&self) -> i64 {
        self.blackout_days
    }

    /// In-window rejections of accepted bids that trigger a suspension.
    pub fn bid_rejection_limit(&self) -> i64 {
        self.bid_rejection_limit
    }

    /// Rolling window over which bid rejections are counted.
    pub fn bid_rejection_window_months(&self) -> u32 {
        self.bid_rejection_window_months
    }

    /// Length of a bidding suspension.
    pub fn suspension_months(&self) -> u32 {
        self.suspension_months
    }

    /// Short jobs at or below this length never count against the
    /// restoration cap.
    pub fn short_call_free_days(&self) -> i64 {
        self.short_call_free_days
    }

    /// Counted short-call restorations allowed per registration cycle.
    pub fn short_call_max_restorations(&self) -> i32 {
        self.short_call_max_restorations
    }

    /// Hour of day (UTC) after which new job requests defer to the next
    /// cycle.
    pub fn daily_cutoff_hour(&self) -> u32 {
        self.daily_cutoff_hour
    }

    /// Hours a bid-sourced dispatch has to record employer check-in.
    pub fn check_in_deadline_hours(&self) -> i64 {
        self.check_in_deadline_hours
    }

    /// Lead time for renewal reminders produced by enforcement.
    pub fn renewal_reminder_lead_days(&self) -> i64 {
        self.renewal_reminder_lead_days
    }

    /// Grace added to the renewal clock when an exemption is revoked.
    pub fn exemption_revocation_grace_days(&self) -> i64 {
        self.exemption_revocation_grace_days
    }

    /// Trailing window used to observe a book's dispatch rate.
    pub fn wait_estimate_window_days(&self) -> i64 {
        self.wait_estimate_window_days
    }

    /// Below this many observed dispatches, wait estimates report low
    /// confidence.
    pub fn wait_estimate_min_samples(&self) -> usize {
        self.wait_estimate_min_samples
    }

    /// How the fractional part of new ordering keys is derived.
    pub fn ordering_key_policy(&self) -> OrderingKeyPolicy {
        self.ordering_key_policy
    }

    /// Legacy convention flag: when set, higher tier numbers dispatch first.
    pub fn invert_tier_priority(&self) -> bool {
        self.invert_tier_priority
    }

    /// Validates threshold sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: i64) -> Result<(), ConfigError> {
            if value > 0 {
                Ok(())
            } else {
                Err(ConfigError::NotPositive { field, value })
            }
        }

        positive("penalty_limit", self.penalty_limit as i64)?;
        positive("blackout_days", self.blackout_days)?;
        positive("bid_rejection_limit", self.bid_rejection_limit)?;
        positive(
            "bid_rejection_window_months",
            self.bid_rejection_window_months as i64,
        )?;
        positive("suspension_months", self.suspension_months as i64)?;
        positive("short_call_free_days", self.short_call_free_days)?;
        positive(
            "short_call_max_restorations",
            self.short_call_max_restorations as i64,
        )?;
        positive("check_in_deadline_hours", self.check_in_deadline_hours)?;
        positive(
            "renewal_reminder_lead_days",
            self.renewal_reminder_lead_days,
        )?;
        if self.daily_cutoff_hour > 23 {
            return Err(ConfigError::CutoffHourOutOfRange(self.daily_cutoff_hour));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn penalty_limit(mut self, value: i32) -> Self {
        self.config.penalty_limit = value;
        self
    }

    pub fn blackout_days(mut self, value: i64) -> Self {
        self.config.blackout_days = value;
        self
    }

    pub fn bid_rejection_limit(mut self, value: i64) -> Self {
        self.config.bid_rejection_limit = value;
        self
    }

    pub fn bid_rejection_window_months(mut self, value: u32) -> Self {
        self.config.bid_rejection_window_months = value;
        self
    }

    pub fn suspension_months(mut self, value: u32) -> Self {
        self.config.suspension_months = value;
        self
    }

    pub fn short_call_free_days(mut self, value: i64) -> Self {
        self.config.short_call_free_days = value;
        self
    }

    pub fn short_call_max_restorations(mut self, value: i32) -> Self {
        self.config.short_call_max_restorations = value;
        self
    }

    pub fn daily_cutoff_hour(mut self, value: u32) -> Self {
        self.config.daily_cutoff_hour = value;
        self
    }

    pub fn check_in_deadline_hours(mut self, value: i64) -> Self {
        self.config.check_in_deadline_hours = value;
        self
    }

    pub fn renewal_reminder_lead_days(mut self, value: i64) -> Self {
        self.config.renewal_reminder_lead_days = value;
        self
    }

    pub fn exemption_revocation_grace_days(mut self, value: i64) -> Self {
        self.config.exemption_revocation_grace_days = value;
        self
    }

    pub fn wait_estimate_window_days(mut self, value: i64) -> Self {
        self.config.wait_estimate_window_days = value;
        self
    }

    pub fn wait_estimate_min_samples(mut self, value: usize) -> Self {
        self.config.wait_estimate_min_samples = value;
        self
    }

    pub fn ordering_key_policy(mut self, value: OrderingKeyPolicy) -> Self {
        self.config.ordering_key_policy = value;
        self
    }

    pub fn invert_tier_priority(mut self, value: bool) -> Self {
        self.config.invert_tier_priority = value;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
