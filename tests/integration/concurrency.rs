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

//! Concurrent dispatch: IMMEDIATE transactions make selection claims atomic,
//! so two simultaneous dispatchers can never pick the same registration.

use std::collections::HashSet;
use std::sync::Arc;

use hallbook::models::RequestMetadata;
use serial_test::serial;
use tokio::sync::Barrier;

use crate::fixtures::hall;

#[tokio::test]
#[serial]
async fn concurrent_queue_dispatches_never_share_a_registration() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    for _ in 0..4 {
        ledger
            .register(hall.worker(1).id, book.id, "test")
            .await
            .unwrap();
    }

    let employer = hall.employer();
    let mut requests = Vec::new();
    for _ in 0..4 {
        requests.push(
            hall.open_request(employer.id, book.id, 1, RequestMetadata::default())
                .await,
        );
    }

    let barrier = Arc::new(Barrier::new(requests.len()));
    let mut handles = Vec::new();
    for request in requests {
        let engine = hall.engine();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            engine.dispatch_from_queue(request.id, "race").await
        }));
    }

    let mut claimed = HashSet::new();
    for handle in handles {
        let dispatch = handle
            .await
            .expect("task panicked")
            .expect("dispatch failed")
            .expect("book exhausted early");
        // Each dispatch claimed a distinct registration.
        assert!(claimed.insert(dispatch.registration_id));
    }
    assert_eq!(claimed.len(), 4);
}

#[tokio::test]
#[serial]
async fn concurrent_dispatchers_on_one_request_stop_at_capacity() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    for _ in 0..3 {
        ledger
            .register(hall.worker(1).id, book.id, "test")
            .await
            .unwrap();
    }

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;

    let barrier = Arc::new(Barrier::new(3));
    let mut handles = Vec::new();
    for _ in 0..3 {
        let engine = hall.engine();
        let barrier = barrier.clone();
        let request_id = request.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            engine.dispatch_from_queue(request_id, "race").await
        }));
    }

    let mut dispatched = 0;
    for handle in handles {
        if handle.await.expect("task panicked").is_ok() {
            dispatched += 1;
        }
    }
    // One slot, one winner; the rest hit the filled/closed request.
    assert_eq!(dispatched, 1);

    let filled = hall.market().get_request(request.id).await.unwrap();
    assert_eq!(filled.workers_filled, 1);
}
