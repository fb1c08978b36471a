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

//! Read-only queue views: snapshots, depth, previews, wait estimates.

use hallbook::error::{DomainViolation, EngineError};
use hallbook::models::{ExemptReason, RequestMetadata};
use hallbook::queue::Confidence;

use crate::fixtures::hall;

#[tokio::test]
async fn snapshot_hides_exempt_rows_unless_asked() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let active = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let exempt = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(exempt.id, ExemptReason::UnionBusiness, None, "test")
        .await
        .unwrap();

    let visible = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].registration.id, active.id);

    let full = hall.queue().snapshot(book.id, true).await.unwrap();
    assert_eq!(full.len(), 2);
    // The exempt row holds its key slot.
    assert_eq!(full[1].registration.id, exempt.id);
    assert_eq!(full[1].position, 2);
}

#[tokio::test]
async fn depth_counts_by_status_and_tier() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    ledger.register(hall.worker(1).id, book.id, "test").await.unwrap();
    ledger.register(hall.worker(1).id, book.id, "test").await.unwrap();
    ledger.register(hall.worker(2).id, book.id, "test").await.unwrap();
    let exempt = ledger
        .register(hall.worker(3).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(exempt.id, ExemptReason::Training, None, "test")
        .await
        .unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    hall.engine()
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");

    let depth = hall.queue().depth(book.id).await.unwrap();
    assert_eq!(depth.active, 2);
    assert_eq!(depth.dispatched, 1);
    assert_eq!(depth.exempt, 1);
    assert_eq!(depth.active_by_tier.get(&1), Some(&1));
    assert_eq!(depth.active_by_tier.get(&2), Some(&1));
}

#[tokio::test]
async fn next_eligible_skips_excluded_tiers() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let apprentice = hall.worker(1);
    let journeyman = hall.worker(2);
    ledger.register(apprentice.id, book.id, "test").await.unwrap();
    ledger.register(journeyman.id, book.id, "test").await.unwrap();

    let preview = hall
        .queue()
        .next_eligible(book.id, hall.employer().id, &[1], false)
        .await
        .unwrap()
        .expect("tier 2 is eligible");
    assert_eq!(preview.registration.worker_id, journeyman.id);
}

#[tokio::test]
async fn wait_estimate_reports_low_confidence_until_enough_samples() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let front = hall.worker(1);
    let waiting = hall.worker(1);
    ledger.register(front.id, book.id, "test").await.unwrap();
    let registration = ledger.register(waiting.id, book.id, "test").await.unwrap();

    // No dispatch history at all: no rate, no estimate.
    let estimate = hall.queue().estimate_wait(registration.id).await.unwrap();
    assert_eq!(estimate.position, 2);
    assert_eq!(estimate.observed_dispatches, 0);
    assert!(estimate.estimated_days.is_none());
    assert_eq!(estimate.confidence, Confidence::Low);

    // One observed dispatch gives a rate but stays below the sample floor.
    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    hall.engine()
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");

    let estimate = hall.queue().estimate_wait(registration.id).await.unwrap();
    assert_eq!(estimate.position, 1);
    assert_eq!(estimate.observed_dispatches, 1);
    assert!(estimate.estimated_days.is_some());
    assert_eq!(estimate.confidence, Confidence::Low);
}

#[tokio::test]
async fn wait_estimate_requires_an_active_registration() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger.resign(registration.id, None, "test").await.unwrap();

    let err = hall.queue().estimate_wait(registration.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Violation(DomainViolation::WrongRegistrationStatus { .. })
    ));
}
