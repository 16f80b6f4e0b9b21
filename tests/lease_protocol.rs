use std::sync::Arc;

use chrono::Duration;
use managedbeat::{
    lease::LeaseProtocol,
    record::LeaderRecord,
    store::{InMemoryStore, LeaseStore},
    test_utils::{FlakyStore, ManualClock},
    time::Clock,
};

const KEY: &str = "managedbeat_status";

fn protocol(store: &Arc<InMemoryStore>, clock: &Arc<ManualClock>) -> LeaseProtocol {
    LeaseProtocol::with_clock(
        Arc::clone(store) as Arc<dyn LeaseStore>,
        KEY,
        Duration::seconds(60),
        Arc::clone(clock) as Arc<dyn Clock>,
    )
}

#[tokio::test]
async fn vacant_slot_reports_no_leader() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);

    assert_eq!(a.current_leader().await, None);
}

#[tokio::test]
async fn claim_is_visible_until_the_lease_expires() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);

    a.claim_leadership().await.unwrap();
    assert_eq!(a.current_leader().await, Some(a.identity()));

    clock.advance(Duration::seconds(59));
    assert_eq!(a.current_leader().await, Some(a.identity()));

    // exactly at the timeout boundary the slot is vacant again
    clock.advance(Duration::seconds(1));
    assert_eq!(a.current_leader().await, None);
}

#[tokio::test]
async fn undecodable_record_reads_as_vacant() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);

    store.set(KEY, b"not a leader record".to_vec()).await.unwrap();
    assert_eq!(a.current_leader().await, None);

    // a vacant-looking slot is claimable as usual
    a.claim_leadership().await.unwrap();
    assert_eq!(a.current_leader().await, Some(a.identity()));
}

#[tokio::test]
async fn failing_store_reads_fail_open_toward_re_election() {
    let store = Arc::new(FlakyStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = LeaseProtocol::with_clock(
        Arc::clone(&store) as Arc<dyn LeaseStore>,
        KEY,
        Duration::seconds(60),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    a.claim_leadership().await.unwrap();
    assert_eq!(a.current_leader().await, Some(a.identity()));

    // a read error reads as a vacant slot, never as a fault
    store.fail_reads(true);
    assert_eq!(a.current_leader().await, None);

    // and the intact record is visible again once the store recovers
    store.fail_reads(false);
    assert_eq!(a.current_leader().await, Some(a.identity()));

    // injected garbage behaves the same way as a read error
    store.return_garbage(true);
    assert_eq!(a.current_leader().await, None);
}

#[tokio::test]
async fn renewal_keeps_identity_and_advances_timestamp() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);

    a.claim_leadership().await.unwrap();
    let first = LeaderRecord::decode(&store.get(KEY).await.unwrap().unwrap()).unwrap();

    clock.advance(Duration::seconds(10));
    a.claim_leadership().await.unwrap();
    let second = LeaderRecord::decode(&store.get(KEY).await.unwrap().unwrap()).unwrap();

    assert_eq!(second.identity, first.identity);
    assert_eq!(
        second.timestamp,
        first.timestamp + Duration::seconds(10)
    );
}

#[tokio::test]
async fn release_is_immediately_visible_to_everyone() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);
    let b = protocol(&store, &clock);

    a.claim_leadership().await.unwrap();
    assert_eq!(b.current_leader().await, Some(a.identity()));

    a.release_leadership().await.unwrap();
    assert_eq!(a.current_leader().await, None);
    assert_eq!(b.current_leader().await, None);
}

#[tokio::test]
async fn dead_leader_expires_and_the_slot_is_reclaimed() {
    // store empty, lease_timeout=60: A claims at t=0 and then crashes
    // (no renewals); B polls at t=30 and t=61.
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let a = protocol(&store, &clock);
    let b = protocol(&store, &clock);

    a.claim_leadership().await.unwrap();

    clock.advance(Duration::seconds(30));
    assert_eq!(b.current_leader().await, Some(a.identity()));

    clock.advance(Duration::seconds(31));
    assert_eq!(b.current_leader().await, None);

    b.claim_leadership().await.unwrap();
    assert_eq!(b.current_leader().await, Some(b.identity()));
}
