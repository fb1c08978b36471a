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

//! Registration lifecycle: register, resign, roll off, and the activity
//! trail behind each transition.

use hallbook::database::UniversalUuid;
use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{ActivityAction, RegistrationStatus, RemovalReason};

use crate::fixtures::hall;

#[tokio::test]
async fn register_assigns_increasing_keys_and_positions() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let first = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let second = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    assert!(second.ordering_key > first.ordering_key);

    let snapshot = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].position, 1);
    assert_eq!(snapshot[0].registration.id, first.id);
    assert_eq!(snapshot[1].position, 2);
    assert_eq!(snapshot[1].registration.id, second.id);
}

#[tokio::test]
async fn duplicate_open_registration_is_refused() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let worker = hall.worker(1);

    ledger.register(worker.id, book.id, "test").await.unwrap();
    let err = ledger.register(worker.id, book.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::DuplicateRegistration { .. })
    ));
}

#[tokio::test]
async fn unknown_worker_is_refused() {
    let hall = hall().await;
    let book = hall.standard_book().await;

    let err = hall
        .ledger()
        .register(UniversalUuid::new_v4(), book.id, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::WorkerNotFound(_))
    ));
}

#[tokio::test]
async fn inactive_book_refuses_registrations() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    hall.dal
        .book()
        .set_active(book.id, false, "test".to_string())
        .await
        .unwrap();

    let err = hall
        .ledger()
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::BookInactive(_))
    ));
}

#[tokio::test]
async fn resignation_frees_the_slot_for_reregistration() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let worker = hall.worker(1);

    let first = ledger.register(worker.id, book.id, "test").await.unwrap();
    let resigned = ledger
        .resign(first.id, Some("moving away".to_string()), "test")
        .await
        .unwrap();
    assert_eq!(resigned.status, RegistrationStatus::Resigned);

    // Terminal registrations keep their row; a fresh one gets a fresh key.
    let second = ledger.register(worker.id, book.id, "test").await.unwrap();
    assert_ne!(second.id, first.id);
    assert!(second.ordering_key > first.ordering_key);
}

#[tokio::test]
async fn roll_off_is_refused_when_already_terminal() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .roll_off(registration.id, RemovalReason::Administrative, "test")
        .await
        .unwrap();

    let err = ledger
        .roll_off(registration.id, RemovalReason::Administrative, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::AlreadyTerminal { .. })
    ));
}

#[tokio::test]
async fn activity_trail_reconstructs_the_lifecycle() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger.renew(registration.id, "test").await.unwrap();
    ledger
        .roll_off(registration.id, RemovalReason::Administrative, "admin")
        .await
        .unwrap();

    let trail = ledger.history(registration.id).await.unwrap();
    let actions: Vec<_> = trail.iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            ActivityAction::Registered,
            ActivityAction::Renewed,
            ActivityAction::RolledOff,
        ]
    );
    assert_eq!(trail[0].new_position, Some(1));
    assert_eq!(trail[2].actor, "admin");
    assert_eq!(trail[2].prior_position, Some(1));
}
