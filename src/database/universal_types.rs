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

//! Universal type wrappers used at the domain/database boundary.
//!
//! Domain code works with `UniversalUuid`, `UniversalTimestamp` and
//! `OrderingKey`; the SQLite models store BLOBs, RFC3339 TEXT and fixed-width
//! decimal TEXT respectively. Conversions happen at the DAL boundary so no
//! Diesel-specific code leaks into business logic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Universal UUID wrapper.
///
/// Stored as a 16-byte BLOB in SQLite; backend models convert to/from this
/// type at the DAL boundary.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UniversalUuid(pub Uuid);

impl UniversalUuid {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Convert to bytes for SQLite BLOB storage.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Create from bytes (SQLite BLOB).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, uuid::Error> {
        Uuid::from_slice(bytes).map(UniversalUuid)
    }

    /// Convert to an owned byte vector for insertion.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Display for UniversalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UniversalUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<UniversalUuid> for Uuid {
    fn from(wrapper: UniversalUuid) -> Self {
        wrapper.0
    }
}

/// Universal timestamp wrapper.
///
/// Stored as RFC3339 TEXT in SQLite. RFC3339 strings in UTC sort lexically in
/// chronological order, so SQL `ORDER BY`/comparisons agree with time order.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniversalTimestamp(pub DateTime<Utc>);

impl UniversalTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Convert to RFC3339 string for SQLite TEXT storage.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Create from RFC3339 string (SQLite TEXT).
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| UniversalTimestamp(dt.with_timezone(&Utc)))
    }
}

impl fmt::Display for UniversalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for UniversalTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<UniversalTimestamp> for DateTime<Utc> {
    fn from(wrapper: UniversalTimestamp) -> Self {
        wrapper.0
    }
}

/// Number of fractional digits carried by every ordering key.
pub const ORDERING_KEY_SCALE: u32 = 4;

/// Width the integer part is zero-padded to in storage.
const ORDERING_KEY_INT_WIDTH: usize = 12;

/// Exact fixed-point ordering key for queue positions.
///
/// The integer part encodes the registration date (YYYYMMDD); the fractional
/// part breaks ties. Floating point is not acceptable here: tie-breaking
/// correctness depends on exact comparison, so the key wraps
/// [`rust_decimal::Decimal`] normalized to four fractional digits.
///
/// Stored as fixed-width TEXT (`000020250830.0002`) so that SQL `MAX()` and
/// `ORDER BY` over the column agree with numeric order.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderingKey(Decimal);

impl OrderingKey {
    /// Creates a key from a decimal, normalizing to the canonical scale.
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(ORDERING_KEY_SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// The smallest increment between distinct keys (0.0001).
    pub fn step() -> Decimal {
        Decimal::new(1, ORDERING_KEY_SCALE)
    }

    /// The integer (date) part of the key.
    pub fn integer_part(&self) -> Decimal {
        self.0.trunc()
    }

    /// The fractional (tie-break) part of the key.
    pub fn fractional_part(&self) -> Decimal {
        self.0 - self.0.trunc()
    }

    /// Fixed-width TEXT form whose lexical order matches numeric order.
    pub fn to_sortable_string(&self) -> String {
        let rendered = format!("{:.prec$}", self.0, prec = ORDERING_KEY_SCALE as usize);
        let (int_part, frac_part) = rendered
            .split_once('.')
            .expect("formatted with a fractional part");
        format!(
            "{:0>width$}.{}",
            int_part,
            frac_part,
            width = ORDERING_KEY_INT_WIDTH
        )
    }

    /// Parses the stored TEXT form. Leading zeros are insignificant.
    pub fn from_sortable_string(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s).map(Self::new)
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.prec$}", self.0, prec = ORDERING_KEY_SCALE as usize)
    }
}

impl From<Decimal> for OrderingKey {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}
