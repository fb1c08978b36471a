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

//! Renewal windows and exemptions. The test book has a 30-day window with no
//! grace, so day 29 renews and day 31 does not.

use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{ExemptReason, RegistrationStatus};

use crate::fixtures::hall;

#[tokio::test]
async fn renewal_inside_the_window_succeeds_and_keeps_the_key() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    hall.age_registration(registration.id, 29).await;

    let renewed = ledger.renew(registration.id, "test").await.unwrap();
    assert_eq!(renewed.ordering_key, registration.ordering_key);
    assert!(renewed.last_renewal_at > registration.last_renewal_at);
}

#[tokio::test]
async fn renewal_past_window_plus_grace_is_refused() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    hall.age_registration(registration.id, 31).await;

    let err = ledger.renew(registration.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::RenewalOutsideWindow {
            window_days: 30,
            grace_days: 0,
            ..
        })
    ));
}

#[tokio::test]
async fn grace_period_extends_the_renewal_deadline() {
    let hall = hall().await;
    let book = hall.book_with(30, 14).await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    hall.age_registration(registration.id, 40).await;

    // 40 days is past the window but inside the grace.
    ledger.renew(registration.id, "test").await.unwrap();
}

#[tokio::test]
async fn exemption_pauses_then_revocation_rearms_the_clock() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let exempt = ledger
        .grant_exemption(registration.id, ExemptReason::Medical, None, "test")
        .await
        .unwrap();
    assert_eq!(exempt.status, RegistrationStatus::Exempt);
    assert_eq!(exempt.exempt_reason, Some(ExemptReason::Medical));

    let revoked = ledger.revoke_exemption(registration.id, "test").await.unwrap();
    assert_eq!(revoked.status, RegistrationStatus::Active);
    assert!(revoked.last_renewal_at > registration.last_renewal_at);
    // The key never moves.
    assert_eq!(revoked.ordering_key, registration.ordering_key);
}

#[tokio::test]
async fn exempt_registrations_cannot_renew() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(registration.id, ExemptReason::Military, None, "test")
        .await
        .unwrap();

    let err = ledger.renew(registration.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::WrongRegistrationStatus {
            required: "Active",
            ..
        })
    ));
}
