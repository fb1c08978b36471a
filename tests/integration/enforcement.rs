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

//! The daily enforcement batch: dry runs predict exactly what live runs do,
//! and a second live run over unchanged data does nothing.

use chrono::{Duration, Utc};
use hallbook::database::UniversalTimestamp;
use hallbook::models::{
    BidMethod, ExemptReason, RegistrationStatus, RemovalReason, RequestMetadata, RequestStatus,
};
use serial_test::serial;

use crate::fixtures::hall;

#[tokio::test]
#[serial]
async fn missed_renewals_roll_off_but_exempt_registrations_survive() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let lapsed = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let current = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let exempt = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(exempt.id, ExemptReason::Medical, None, "test")
        .await
        .unwrap();

    hall.age_registration(lapsed.id, 45).await;
    hall.age_registration(exempt.id, 45).await;

    let report = hall.scheduler().run_daily(false, "cron").await.unwrap();
    assert_eq!(report.renewals_rolled_off, vec![lapsed.id]);

    let rolled = ledger.get(lapsed.id).await.unwrap();
    assert_eq!(rolled.status, RegistrationStatus::RolledOff);
    assert_eq!(rolled.removal_reason, Some(RemovalReason::MissedRenewal));
    assert_eq!(
        ledger.get(current.id).await.unwrap().status,
        RegistrationStatus::Active
    );
    assert_eq!(
        ledger.get(exempt.id).await.unwrap().status,
        RegistrationStatus::Exempt
    );
}

#[tokio::test]
#[serial]
async fn dry_run_predicts_the_live_run_and_writes_nothing() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let lapsed = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    hall.age_registration(lapsed.id, 45).await;

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    hall.lapse_request(request.id).await;

    let expired_exemption = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    ledger
        .grant_exemption(
            expired_exemption.id,
            ExemptReason::Training,
            Some(UniversalTimestamp::from(Utc::now() + Duration::days(30))),
            "test",
        )
        .await
        .unwrap();
    hall.lapse_exemption(expired_exemption.id).await;

    let scheduler = hall.scheduler();
    let dry = scheduler.run_daily(true, "cron").await.unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.renewals_rolled_off, vec![lapsed.id]);
    assert_eq!(dry.requests_expired, vec![request.id]);
    assert_eq!(dry.exemptions_revoked, vec![expired_exemption.id]);

    // Nothing moved.
    assert_eq!(
        ledger.get(lapsed.id).await.unwrap().status,
        RegistrationStatus::Active
    );
    assert_eq!(
        hall.market().get_request(request.id).await.unwrap().status,
        RequestStatus::Open
    );

    // The live run performs exactly what the dry run promised.
    let live = scheduler.run_daily(false, "cron").await.unwrap();
    assert!(!live.dry_run);
    assert_eq!(live.renewals_rolled_off, dry.renewals_rolled_off);
    assert_eq!(live.requests_expired, dry.requests_expired);
    assert_eq!(live.exemptions_revoked, dry.exemptions_revoked);

    assert_eq!(
        ledger.get(expired_exemption.id).await.unwrap().status,
        RegistrationStatus::Active
    );
    assert_eq!(
        hall.market().get_request(request.id).await.unwrap().status,
        RequestStatus::Expired
    );

    // And a second live run finds nothing left to do.
    let again = scheduler.run_daily(false, "cron").await.unwrap();
    assert_eq!(again.total_actions(), 0);
    assert_eq!(again.failures, 0);
}

#[tokio::test]
#[serial]
async fn lapsed_check_in_deadlines_terminate_as_no_shows() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let worker = hall.worker(1);
    hall.ledger().register(worker.id, book.id, "test").await.unwrap();

    let request = hall
        .open_request(hall.employer().id, book.id, 1, RequestMetadata::default())
        .await;
    let bid = hall
        .market()
        .place_bid(worker.id, request.id, BidMethod::Remote, "test")
        .await
        .unwrap();
    hall.market().process_bids(request.id, "test").await.unwrap();
    let dispatch = hall.engine().dispatch_from_bid(bid.id, "test").await.unwrap();
    hall.lapse_check_in(dispatch.id).await;

    let report = hall.scheduler().run_daily(false, "cron").await.unwrap();
    assert_eq!(report.no_shows_terminated, vec![dispatch.id]);

    let registration = hall
        .ledger()
        .get(dispatch.registration_id)
        .await
        .unwrap();
    assert_eq!(registration.status, RegistrationStatus::RolledOff);
    assert_eq!(registration.removal_reason, Some(RemovalReason::NoShow));
}

#[tokio::test]
#[serial]
async fn expired_restrictions_are_cleared_once() {
    let hall = hall().await;
    let book = hall.standard_book().await;
    let ledger = hall.ledger();
    let market = hall.market();
    let engine = hall.engine();
    let worker = hall.worker(1);
    let employer = hall.employer();
    ledger.register(worker.id, book.id, "test").await.unwrap();

    // A quit earns the blackout.
    let request = hall
        .open_request(employer.id, book.id, 1, RequestMetadata::default())
        .await;
    let dispatch = engine
        .dispatch_from_queue(request.id, "test")
        .await
        .unwrap()
        .expect("dispatch");
    engine
        .terminate(
            dispatch.id,
            hallbook::models::TerminationReason::Quit,
            "test",
        )
        .await
        .unwrap();

    // Two bid rejections earn the suspension.
    ledger.register(worker.id, book.id, "test").await.unwrap();
    for _ in 0..2 {
        let request = hall
            .open_request(employer.id, book.id, 1, RequestMetadata::default())
            .await;
        let bid = market
            .place_bid(worker.id, request.id, BidMethod::Interactive, "test")
            .await
            .unwrap();
        market.process_bids(request.id, "test").await.unwrap();
        market
            .reject_accepted_bid(bid.id, None, "test")
            .await
            .unwrap();
    }

    hall.lapse_blackouts(worker.id).await;
    hall.lapse_suspensions(worker.id).await;

    let report = hall.scheduler().run_daily(false, "cron").await.unwrap();
    assert_eq!(report.blackouts_cleared, 1);
    assert_eq!(report.suspensions_cleared, 1);

    let restriction = hall.dal.restriction();
    assert!(restriction
        .active_blackout_for(worker.id, employer.id)
        .await
        .unwrap()
        .is_none());
    assert!(restriction
        .active_suspension_for(worker.id)
        .await
        .unwrap()
        .is_none());

    // Already cleared: the next run reports zero.
    let again = hall.scheduler().run_daily(false, "cron").await.unwrap();
    assert_eq!(again.blackouts_cleared, 0);
    assert_eq!(again.suspensions_cleared, 0);
}

#[tokio::test]
#[serial]
async fn reminders_flag_renewals_coming_due() {
    let hall = hall().await;
    let book = hall.book_with(30, 0).await;
    let ledger = hall.ledger();

    let due_soon = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    let fresh = ledger
        .register(hall.worker(1).id, book.id, "test")
        .await
        .unwrap();
    hall.age_registration(due_soon.id, 27).await;

    let report = hall.scheduler().run_daily(false, "cron").await.unwrap();
    assert_eq!(report.renewal_reminders, vec![due_soon.id]);
    assert!(!report.renewal_reminders.contains(&fresh.id));
    // A reminder changes nothing on the book.
    assert_eq!(report.total_actions(), 0);
}
