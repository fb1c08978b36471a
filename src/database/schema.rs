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

//! Diesel schema for the SQLite backend.
//!
//! UUIDs are BLOBs, timestamps are RFC3339 TEXT, and ordering keys are
//! fixed-width decimal TEXT (lexical order equals numeric order).

diesel::table! {
    books (id) {
        id -> Binary,
        name -> Text,
        classification -> Text,
        region -> Text,
        priority_tier -> Integer,
        max_days_before_expiry -> Nullable<Integer>,
        renewal_window_days -> Integer,
        grace_period_days -> Integer,
        online_bidding -> Bool,
        active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    registrations (id) {
        id -> Binary,
        worker_id -> Binary,
        book_id -> Binary,
        ordering_key -> Text,
        tier -> Integer,
        status -> Text,
        penalty_count -> Integer,
        last_attendance_check_at -> Nullable<Text>,
        registered_at -> Text,
        last_renewal_at -> Text,
        exempt_reason -> Nullable<Text>,
        exempt_from -> Nullable<Text>,
        exempt_until -> Nullable<Text>,
        removal_reason -> Nullable<Text>,
        removed_at -> Nullable<Text>,
        restoration_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    job_requests (id) {
        id -> Binary,
        employer_id -> Binary,
        book_id -> Binary,
        workers_requested -> Integer,
        workers_filled -> Integer,
        target_date -> Text,
        bidding_opens_at -> Nullable<Text>,
        bidding_closes_at -> Nullable<Text>,
        specialty_skill -> Bool,
        irregular_site -> Bool,
        early_start -> Bool,
        below_standard_rate -> Bool,
        short_duration -> Bool,
        employer_initiated_rejection -> Bool,
        penalty_eligible -> Bool,
        status -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    bids (id) {
        id -> Binary,
        worker_id -> Binary,
        job_request_id -> Binary,
        registration_id -> Binary,
        method -> Text,
        status -> Text,
        submitted_at -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    dispatches (id) {
        id -> Binary,
        registration_id -> Binary,
        job_request_id -> Binary,
        bid_id -> Nullable<Binary>,
        employer_id -> Binary,
        worker_id -> Binary,
        book_id -> Binary,
        method -> Text,
        short_duration -> Bool,
        starts_at -> Text,
        check_in_deadline -> Nullable<Text>,
        checked_in_at -> Nullable<Text>,
        status -> Text,
        terminated_at -> Nullable<Text>,
        termination_reason -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    activity_records (id) {
        id -> Binary,
        registration_id -> Nullable<Binary>,
        dispatch_id -> Nullable<Binary>,
        worker_id -> Binary,
        book_id -> Nullable<Binary>,
        action -> Text,
        prior_status -> Nullable<Text>,
        new_status -> Nullable<Text>,
        prior_position -> Nullable<Integer>,
        new_position -> Nullable<Integer>,
        actor -> Text,
        reason -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    audit_outbox (id) {
        id -> Binary,
        table_name -> Text,
        record_id -> Binary,
        action -> Text,
        before_state -> Nullable<Text>,
        after_state -> Nullable<Text>,
        actor -> Text,
        created_at -> Text,
        forwarded_at -> Nullable<Text>,
    }
}

diesel::table! {
    blackouts (id) {
        id -> Binary,
        worker_id -> Binary,
        employer_id -> Binary,
        reason -> Text,
        expires_at -> Text,
        cleared_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    suspensions (id) {
        id -> Binary,
        worker_id -> Binary,
        reason -> Text,
        expires_at -> Text,
        cleared_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    books,
    registrations,
    job_requests,
    bids,
    dispatches,
    activity_records,
    audit_outbox,
    blackouts,
    suspensions,
);
