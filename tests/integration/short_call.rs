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

//! Short-call restoration: jobs at or below the free length never consume a
//! restoration, longer short jobs do, and the cap refuses the transaction
//! whole.

use hallbook::database::UniversalUuid;
use hallbook::engine::TerminationOutcome;
use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{
    Dispatch, DispatchStatus, RegistrationStatus, RequestMetadata, TerminationReason,
};

use crate::fixtures::{hall, TestHall};

fn short_metadata() -> RequestMetadata {
    RequestMetadata {
        short_duration: true,
        ..Default::default()
    }
}

async fn dispatch_short_job(hall: &TestHall, book_id: UniversalUuid) -> Dispatch {
    let request = hall
        .open_request(hall.employer().id, book_id, 1, short_metadata())
        .await;
    hall.engine()
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("short-call dispatch")
}

#[tokio::test]
async fn job_within_the_free_length_restores_without_counting() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    let original = hall
        .ledger()
        .register(worker.id, book.id, "test")
        .await
        .unwrap();

    let dispatch = dispatch_short_job(&hall, book.id).await;
    hall.age_dispatch_start(dispatch.id, 2).await;

    let outcome = hall
        .engine()
        .terminate(dispatch.id, TerminationReason::ShortCallEnd, "test")
        .await
        .unwrap();
    let registration = match outcome {
        TerminationOutcome::Restored { registration, .. } => registration,
        other => panic!("expected restoration, got {:?}", other),
    };
    assert_eq!(registration.status, RegistrationStatus::Active);
    assert_eq!(registration.restoration_count, 0);
    assert_eq!(registration.ordering_key, original.ordering_key);
}

#[tokio::test]
async fn job_past_the_free_length_consumes_a_restoration() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    hall.ledger().register(worker.id, book.id, "test").await.unwrap();

    let dispatch = dispatch_short_job(&hall, book.id).await;
    hall.age_dispatch_start(dispatch.id, 5).await;

    let outcome = hall
        .engine()
        .terminate(dispatch.id, TerminationReason::ShortCallEnd, "test")
        .await
        .unwrap();
    let registration = match outcome {
        TerminationOutcome::Restored { registration, .. } => registration,
        other => panic!("expected restoration, got {:?}", other),
    };
    assert_eq!(registration.restoration_count, 1);
}

#[tokio::test]
async fn the_restoration_past_the_cap_is_refused_atomically() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    let registration = hall
        .ledger()
        .register(worker.id, book.id, "test")
        .await
        .unwrap();

    // Two counted restorations reach the default cap.
    for expected in 1..=2 {
        let dispatch = dispatch_short_job(&hall, book.id).await;
        hall.age_dispatch_start(dispatch.id, 5).await;
        let outcome = hall
            .engine()
            .terminate(dispatch.id, TerminationReason::ShortCallEnd, "test")
            .await
            .unwrap();
        match outcome {
            TerminationOutcome::Restored { registration, .. } => {
                assert_eq!(registration.restoration_count, expected)
            }
            other => panic!("expected restoration, got {:?}", other),
        }
    }

    // The third counted restoration fails, and nothing in the transaction
    // sticks: the dispatch stays open and the registration stays Dispatched.
    let dispatch = dispatch_short_job(&hall, book.id).await;
    hall.age_dispatch_start(dispatch.id, 5).await;
    let err = hall
        .engine()
        .terminate(dispatch.id, TerminationReason::ShortCallEnd, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::RestorationLimitReached { limit: 2 })
    ));

    let untouched = hall.engine().get(dispatch.id).await.unwrap();
    assert_eq!(untouched.status, DispatchStatus::Pending);
    assert_eq!(
        hall.ledger().get(registration.id).await.unwrap().status,
        RegistrationStatus::Dispatched
    );
}

#[tokio::test]
async fn ordinary_jobs_cannot_end_as_short_calls() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    hall.ledger()
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = hall
        .engine()
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");

    let err = hall
        .engine()
        .terminate(dispatch.id, TerminationReason::ShortCallEnd, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::NotShortDuration)
    ));
}
