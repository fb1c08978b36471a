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

//! Dispatch paths and termination cascades.

use hallbook::engine::TerminationOutcome;
use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{
    BidMethod, DispatchStatus, RegistrationStatus, RemovalReason, RequestMetadata, RequestStatus,
    TerminationReason,
};

use crate::fixtures::hall;

#[tokio::test]
async fn queue_dispatch_takes_workers_in_book_order_until_filled() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let engine = hall.engine();

    let first = hall.worker(1);
    let second = hall.worker(1);
    ledger.register(first.id, book.id, "test").await.unwrap();
    ledger.register(second.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 2, RequestMetadata::default())
        .await;

    let d1 = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("first slot");
    assert_eq!(d1.worker_id, first.id);
    let d2 = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("second slot");
    assert_eq!(d2.worker_id, second.id);

    let filled = hall.market().get_request(request.id).await.unwrap();
    assert_eq!(filled.status, RequestStatus::Filled);
    assert_eq!(filled.workers_filled, 2);

    // A filled request refuses further dispatch.
    let err = engine.dispatch_from_queue(request.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::RequestNotOpen { .. })
    ));
}

#[tokio::test]
async fn empty_book_yields_no_dispatch() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    let dispatch = hall
        .engine()
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap();
    assert!(dispatch.is_none());
}

#[tokio::test]
async fn completion_returns_the_registration_with_its_original_key() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let engine = hall.engine();

    let veteran = hall.worker(1);
    let newcomer = hall.worker(1);
    let registration = ledger.register(veteran.id, book.id, "test").await.unwrap();
    ledger.register(newcomer.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");
    assert_eq!(
        ledger.get(registration.id).await.unwrap().status,
        RegistrationStatus::Dispatched
    );

    engine.record_check_in(dispatch.id, "test").await.unwrap();
    engine.begin_work(dispatch.id, "test").await.unwrap();
    let (done, restored) = engine.complete(dispatch.id, "test").await.unwrap();
    assert_eq!(done.status, DispatchStatus::Completed);
    assert_eq!(restored.status, RegistrationStatus::Active);
    assert_eq!(restored.ordering_key, registration.ordering_key);

    // The original key puts the veteran back ahead of the newcomer.
    let snapshot = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(snapshot[0].registration.id, registration.id);
}

#[tokio::test]
async fn quit_rolls_the_worker_off_every_book_and_blacklists_the_pair() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let engine = hall.engine();
    let worker = hall.worker(1);
    let employer = hall.employer();

    let home_book = hall.standard_book().await;
    let second_book = hall.standard_book().await;
    let third_book = hall.standard_book().await;
    ledger.register(worker.id, home_book.id, "test").await.unwrap();
    ledger.register(worker.id, second_book.id, "test").await.unwrap();
    ledger.register(worker.id, third_book.id, "test").await.unwrap();

    let request = hall
        .open_request(employer.id, home_book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");

    let outcome = engine
        .terminate(dispatch.id, TerminationReason::Quit, "test")
        .await
        .unwrap();
    let rolled_off = match outcome {
        TerminationOutcome::Cascade { rolled_off, .. } => rolled_off,
        other => panic!("expected cascade, got {:?}", other),
    };
    assert_eq!(rolled_off.len(), 3);
    for registration in &rolled_off {
        assert_eq!(registration.status, RegistrationStatus::RolledOff);
        assert_eq!(registration.removal_reason, Some(RemovalReason::Quit));
    }

    let blackout = hall
        .dal
        .restriction()
        .active_blackout_for(worker.id, employer.id)
        .await
        .unwrap()
        .expect("blackout imposed");
    assert!(blackout.cleared_at.is_none());
}

#[tokio::test]
async fn queue_dispatch_skips_workers_blacked_out_against_the_employer() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let engine = hall.engine();
    let book = hall.standard_book().await;
    let burned = hall.worker(1);
    let clean = hall.worker(1);
    let employer = hall.employer();

    // Earn the blackout the honest way: dispatch, then quit.
    ledger.register(burned.id, book.id, "test").await.unwrap();
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");
    engine
        .terminate(dispatch.id, TerminationReason::Quit, "test")
        .await
        .unwrap();

    // Both back on the book; the quitter re-registers at the front.
    ledger.register(burned.id, book.id, "test").await.unwrap();
    ledger.register(clean.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("someone eligible");
    assert_eq!(dispatch.worker_id, clean.id);
}

#[tokio::test]
async fn named_dispatch_is_refused_while_a_blackout_is_active() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let engine = hall.engine();
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    let employer = hall.employer();

    ledger.register(worker.id, book.id, "test").await.unwrap();
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");
    engine
        .terminate(dispatch.id, TerminationReason::Discharged, "test")
        .await
        .unwrap();
    ledger.register(worker.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let err = engine
        .dispatch_by_name(request.id, worker.id, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::BlackoutActive { .. })
    ));
}

#[tokio::test]
async fn reduction_in_force_rolls_off_this_book_only() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let engine = hall.engine();
    let worker = hall.worker(1);

    let working_book = hall.standard_book().await;
    let other_book = hall.standard_book().await;
    ledger.register(worker.id, working_book.id, "test").await.unwrap();
    let other = ledger.register(worker.id, other_book.id, "test").await.unwrap();

    let request = hall
        .open_request(
            hall.employer().id,
            working_book.id,
            1,
            RequestMetadata::default(),
        )
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");

    let outcome = engine
        .terminate(dispatch.id, TerminationReason::ReductionInForce, "test")
        .await
        .unwrap();
    let registration = match outcome {
        TerminationOutcome::RolledOff { registration, .. } => registration,
        other => panic!("expected roll-off, got {:?}", other),
    };
    assert_eq!(
        registration.removal_reason,
        Some(RemovalReason::ReductionInForce)
    );

    // No cascade, no blackout.
    assert_eq!(
        ledger.get(other.id).await.unwrap().status,
        RegistrationStatus::Active
    );
    assert!(hall
        .dal
        .restriction()
        .active_blackout_for(worker.id, request.employer_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn bid_dispatch_carries_a_check_in_deadline() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let market = hall.market();
    let engine = hall.engine();
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    ledger.register(worker.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    market.process_bids(request.id, "test").await.unwrap();

    let dispatch = engine.dispatch_from_bid(bid.id, "test").await.unwrap();
    assert_eq!(dispatch.status, DispatchStatus::Pending);
    assert!(dispatch.check_in_deadline.is_some());
    assert_eq!(dispatch.bid_id, Some(bid.id));

    engine.record_check_in(dispatch.id, "test").await.unwrap();
    let active = engine.begin_work(dispatch.id, "test").await.unwrap();
    assert_eq!(active.status, DispatchStatus::Active);
}

#[tokio::test]
async fn check_in_past_the_deadline_is_refused() {
    let hall = hall().await;
    let ledger = hall.ledger();
    let market = hall.market();
    let engine = hall.engine();
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    ledger.register(worker.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    market.process_bids(request.id, "test").await.unwrap();
    let dispatch = engine.dispatch_from_bid(bid.id, "test").await.unwrap();

    hall.lapse_check_in(dispatch.id).await;
    let err = engine.record_check_in(dispatch.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::CheckInDeadlinePassed { .. })
    ));
}
