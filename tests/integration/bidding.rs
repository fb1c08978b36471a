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

//! Online bidding: window checks, book-order acceptance, and the rejection
//! suspension ladder (two rejections in twelve months by default).

use chrono::{Duration, Months, Utc};
use diesel::prelude::*;
use hallbook::database::schema;
use hallbook::database::UniversalTimestamp;
use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{BidMethod, BidStatus, NewJobRequest, RequestMetadata};

use crate::fixtures::hall;

#[tokio::test]
async fn bids_are_accepted_in_book_order_up_to_capacity() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let market = hall.market();

    let early = hall.worker(1);
    let late = hall.worker(1);
    ledger.register(early.id, book.id, "test").await.unwrap();
    ledger.register(late.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    // The later-registered worker bids first; book order still wins.
    market
        .place_bid(late.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    market
        .place_bid(early.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();

    let (accepted, not_selected) = market.process_bids(request.id, "test").await.unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].worker_id, early.id);
    assert_eq!(accepted[0].status, BidStatus::Accepted);
    assert_eq!(not_selected.len(), 1);
    assert_eq!(not_selected[0].worker_id, late.id);
    assert_eq!(not_selected[0].status, BidStatus::NotSelected);
}

#[tokio::test]
async fn bidding_outside_the_window_is_refused() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    hall.ledger().register(worker.id, book.id, "test").await.unwrap();

    // No bidding window configured at all.
    let request = hall
        .market()
        .create_request(
            NewJobRequest {
                employer_id: hall.employer().id,
                book_id: book.id,
                workers_requested: 1,
                target_date: UniversalTimestamp::from(Utc::now() + Duration::days(7)),
                bidding_opens_at: None,
                bidding_closes_at: None,
                metadata: RequestMetadata::default(),
            },
            "test",
        )
        .await
        .unwrap();

    let err = hall
        .market()
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::BiddingClosed)
    ));
}

#[tokio::test]
async fn second_pending_bid_on_the_same_request_is_refused() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    hall.ledger().register(worker.id, book.id, "test").await.unwrap();
    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    let market = hall.market();
    market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    let err = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::DuplicateBid)
    ));
}

#[tokio::test]
async fn bidding_requires_an_active_registration_on_the_book() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let outsider = hall.worker(1);
    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    let err = hall
        .market()
        .place_bid(outsider.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::NotRegisteredOnBook { .. })
    ));
}

#[tokio::test]
async fn second_rejection_in_the_window_imposes_a_year_long_suspension() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let market = hall.market();
    let worker = hall.worker(1);
    let employer = hall.employer();
    ledger.register(worker.id, book.id, "test").await.unwrap();

    // First accepted bid, first rejection: no suspension yet.
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    market.process_bids(request.id, "test").await.unwrap();
    let (rejected, suspension) = market
        .reject_accepted_bid(bid.id, Some("schedule conflict".to_string()), "test")
        .await
        .unwrap();
    assert_eq!(rejected.status, BidStatus::Rejected);
    assert!(suspension.is_none());

    // Second accepted bid, second rejection: suspension for twelve months.
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    market.process_bids(request.id, "test").await.unwrap();
    let (_, suspension) = market
        .reject_accepted_bid(bid.id, None, "test")
        .await
        .unwrap();
    let suspension = suspension.expect("second rejection should suspend");
    let expected_floor = Utc::now() + Months::new(11);
    assert!(*suspension.expires_at.as_datetime() > expected_floor);

    // While suspended, remote bidding is refused outright.
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let err = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::BiddingSuspended { .. })
    ));

    // In-person bidding at the hall is unaffected by a remote suspension.
    market
        .place_bid(worker.id, request.id, BidMethod::Interactive, "test")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejection_while_suspended_is_refused_without_a_second_suspension() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let market = hall.market();
    let worker = hall.worker(1);
    let employer = hall.employer();
    ledger.register(worker.id, book.id, "test").await.unwrap();

    // Two rejections earn the suspension.
    for _ in 0..2 {
        let request = hall
            .open_request(employer.id, book.id, 1, RequestMetadata::default())
            .await;
        let bid = market
            .place_bid(worker.id, request.id, BidMethod::Remote, "test")
            .await
            .unwrap();
        market.process_bids(request.id, "test").await.unwrap();
        market
            .reject_accepted_bid(bid.id, None, "test")
            .await
            .unwrap();
    }

    // A third bid still goes through at the hall and gets accepted.
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Interactive, "test")
        .await
        .unwrap();
    market.process_bids(request.id, "test").await.unwrap();

    // Rejecting it while suspended is refused outright.
    let err = market
        .reject_accepted_bid(bid.id, None, "test")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::BiddingSuspended { .. })
    ));

    // The refusal does not stack a second suspension.
    let worker_id = worker.id;
    let suspensions: i64 = hall
        .with_conn(move |conn| {
            schema::suspensions::table
                .filter(schema::suspensions::worker_id.eq(worker_id.to_vec()))
                .count()
                .get_result(conn)
                .unwrap()
        })
        .await;
    assert_eq!(suspensions, 1);
}

#[tokio::test]
async fn withdrawn_bids_never_count_toward_the_suspension_ladder() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    hall.ledger().register(worker.id, book.id, "test").await.unwrap();
    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    let market = hall.market();
    let bid = market
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    let withdrawn = market.withdraw_bid(bid.id, "test").await.unwrap();
    assert_eq!(withdrawn.status, BidStatus::Withdrawn);

    // With the only bid withdrawn, processing selects nobody.
    let (accepted, not_selected) = market.process_bids(request.id, "test").await.unwrap();
    assert!(accepted.is_empty());
    assert!(not_selected.is_empty());
}
