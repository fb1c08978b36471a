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

//! Domain models.
//!
//! These are API-level types; backend-specific models in the DAL handle
//! database storage and convert at the boundary.

pub mod activity;
pub mod bid;
pub mod book;
pub mod dispatch;
pub mod job_request;
pub mod registration;
pub mod restriction;

pub use activity::{ActivityAction, ActivityRecord};
pub use bid::{Bid, BidMethod, BidStatus};
pub use book::{Book, NewBook};
pub use dispatch::{Dispatch, DispatchMethod, DispatchStatus, TerminationReason};
pub use job_request::{
    penalty_eligibility, JobRequest, NewJobRequest, RequestMetadata, RequestStatus,
};
pub use registration::{
    AttendanceMissOutcome, ExemptReason, Registration, RegistrationStatus, RemovalReason,
};
pub use restriction::{Blackout, Suspension};
