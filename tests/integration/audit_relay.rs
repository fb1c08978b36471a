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

//! The audit outbox: every mutation queues a row in its own transaction, and
//! the relay delivers them at-least-once in order.

use std::sync::Arc;

use hallbook::audit::AuditRelay;
use hallbook::models::RemovalReason;

use crate::fixtures::{hall, FlakySink, RecordingSink};

#[tokio::test]
async fn every_mutation_leaves_an_outbox_row() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();

    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger.renew(registration.id, "test").await.unwrap();
    ledger
        .roll_off(registration.id, RemovalReason::Administrative, "test")
        .await
        .unwrap();

    // book create + register + renew + roll_off.
    assert_eq!(hall.dal.audit_outbox().backlog().await.unwrap(), 4);
}

#[tokio::test]
async fn relay_delivers_oldest_first_and_stamps_forwarded() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let registration = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger.renew(registration.id, "test").await.unwrap();

    let sink = Arc::new(RecordingSink::new());
    let relay = AuditRelay::new(hall.dal.clone(), sink.clone());
    let forwarded = relay.drain(10).await.unwrap();
    assert_eq!(forwarded, 3);
    assert_eq!(hall.dal.audit_outbox().backlog().await.unwrap(), 0);

    let delivered = sink.delivered();
    let actions: Vec<_> = delivered.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["create", "register", "renew"]);
    // State-changing updates carry both sides of the transition.
    assert!(delivered[2].before_state.is_some());
    assert!(delivered[2].after_state.is_some());

    // Nothing left: another pass is a no-op.
    assert_eq!(relay.run_once(10).await.unwrap(), 0);
}

#[tokio::test]
async fn sink_failures_keep_events_queued_for_retry() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    hall.ledger()
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();

    let sink = Arc::new(FlakySink::new());
    let relay = AuditRelay::new(hall.dal.clone(), sink.clone());

    // Offline sink: nothing forwarded, nothing lost.
    assert_eq!(relay.run_once(10).await.unwrap(), 0);
    assert_eq!(hall.dal.audit_outbox().backlog().await.unwrap(), 2);

    sink.recover();
    assert_eq!(relay.run_once(10).await.unwrap(), 2);
    assert_eq!(hall.dal.audit_outbox().backlog().await.unwrap(), 0);
    assert_eq!(sink.delivered().len(), 2);
}
