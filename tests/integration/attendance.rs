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

//! Attendance penalties: the default limit is three misses, a success resets
//! the counter, and exempt registrations are untouched.

use hallbook::models::{
    AttendanceMissOutcome, ExemptReason, RegistrationStatus, RemovalReason,
};

use crate::fixtures::hall;

#[tokio::test]
async fn third_miss_rolls_the_registration_off_in_the_same_operation() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    assert_eq!(
        ledger.record_attendance_miss(registration.id, "test").await.unwrap(),
        AttendanceMissOutcome::Counted(1)
    );
    assert_eq!(
        ledger.record_attendance_miss(registration.id, "test").await.unwrap(),
        AttendanceMissOutcome::Counted(2)
    );
    assert_eq!(
        ledger.record_attendance_miss(registration.id, "test").await.unwrap(),
        AttendanceMissOutcome::RolledOff
    );

    let rolled = ledger.get(registration.id).await.unwrap();
    assert_eq!(rolled.status, RegistrationStatus::RolledOff);
    assert_eq!(rolled.removal_reason, Some(RemovalReason::PenaltyLimit));
    assert!(rolled.removed_at.is_some());
}

#[tokio::test]
async fn success_resets_the_counter_before_the_limit() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    ledger.record_attendance_miss(registration.id, "test").await.unwrap();
    ledger.record_attendance_miss(registration.id, "test").await.unwrap();
    let cleared = ledger
        .record_attendance_success(registration.id, "test")
        .await
        .unwrap();
    assert_eq!(cleared.penalty_count, 0);

    // The slate is clean: two more misses only reach 2.
    ledger.record_attendance_miss(registration.id, "test").await.unwrap();
    assert_eq!(
        ledger.record_attendance_miss(registration.id, "test").await.unwrap(),
        AttendanceMissOutcome::Counted(2)
    );
    assert_eq!(
        ledger.get(registration.id).await.unwrap().status,
        RegistrationStatus::Active
    );
}

#[tokio::test]
async fn exempt_registrations_accumulate_nothing() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(registration.id, ExemptReason::FamilyLeave, None, "test")
        .await
        .unwrap();

    for _ in 0..5 {
        assert_eq!(
            ledger.record_attendance_miss(registration.id, "test").await.unwrap(),
            AttendanceMissOutcome::Exempt
        );
    }
    let unchanged = ledger.get(registration.id).await.unwrap();
    assert_eq!(unchanged.penalty_count, 0);
    assert_eq!(unchanged.status, RegistrationStatus::Exempt);
}
