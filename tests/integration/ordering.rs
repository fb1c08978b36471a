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

//! Ordering-key and position semantics: keys only ever grow, positions are
//! derived, and both fraction policies keep the book strictly ordered.

use hallbook::config::{EngineConfig, OrderingKeyPolicy};
use hallbook::models::RemovalReason;

use crate::fixtures::{hall, hall_with};

#[tokio::test]
async fn date_sequence_keys_are_strictly_increasing() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let mut last = None;
    for _ in 0..5 {
        let registration = ledger
            .register(hall.worker(1).id, book.id, "test")
            .await
            .unwrap();
        if let Some(prev) = last {
            assert!(registration.ordering_key > prev);
        }
        last = Some(registration.ordering_key);
    }
}

#[tokio::test]
async fn registration_suffix_keys_are_strictly_increasing() {
    let config = EngineConfig::builder()
        .ordering_key_policy(OrderingKeyPolicy::RegistrationSuffix)
        .build();
    let hall = hall_with(config).await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let worker = hall.worker(1);

    // Three registration cycles for the same worker: each key encodes one
    // more prior registration and still lands past the book maximum.
    let mut last = None;
    for _ in 0..3 {
        let registration = ledger.register(worker.id, book.id, "test").await.unwrap();
        if let Some(prev) = last {
            assert!(registration.ordering_key > prev);
        }
        last = Some(registration.ordering_key);
        ledger
            .resign(registration.id, None, "test")
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn positions_close_up_after_a_roll_off() {
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
    let third = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    ledger
        .roll_off(first.id, RemovalReason::Administrative, "test")
        .await
        .unwrap();

    let snapshot = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].registration.id, second.id);
    assert_eq!(snapshot[0].position, 1);
    assert_eq!(snapshot[1].registration.id, third.id);
    assert_eq!(snapshot[1].position, 2);
}

#[tokio::test]
async fn lower_tier_dispatches_first_by_default() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    // Tier 2 registers first but tier 1 outranks it.
    let journeyman = ledger
        .register(hall.worker(2).id, book.id, "test")
        .await
        .unwrap();
    let senior = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    let snapshot = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(snapshot[0].registration.id, senior.id);
    assert_eq!(snapshot[1].registration.id, journeyman.id);
}

#[tokio::test]
async fn inverted_tier_priority_reverses_the_tier_rank() {
    let config = EngineConfig::builder().invert_tier_priority(true).build();
    let hall = hall_with(config).await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let low = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let high = ledger
        .register(hall.worker(3).id, book.id, "test")
        .await
        .unwrap();

    let snapshot = hall.queue().snapshot(book.id, false).await.unwrap();
    assert_eq!(snapshot[0].registration.id, high.id);
    assert_eq!(snapshot[1].registration.id, low.id);
}
