// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Arbiter unit tests
//!
//! Transport handles are plain channels here; a receiver plays the role of
//! the connection's writer task.

use super::*;
use tempfile::TempDir;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

fn arbiter() -> (Arbiter, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let resource = SharedResource::create(dir.path().join("resource.txt")).expect("resource");
    (Arbiter::new(resource), dir)
}

fn channel() -> (TransportHandle, UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

fn expect_grant(rx: &mut UnboundedReceiver<Message>) -> Message {
    let message = rx.try_recv().expect("expected a grant");
    assert_eq!(message.kind, MessageKind::Grant);
    message
}

fn assert_no_message(rx: &mut UnboundedReceiver<Message>) {
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

/// Join and immediately request; returns after draining the expected grant.
fn acquire(arbiter: &Arbiter, node_id: &str, conn_id: u64) -> (TransportHandle, UnboundedReceiver<Message>) {
    let (tx, mut rx) = channel();
    arbiter.handle_message(Message::join(node_id, 1), conn_id, &tx);
    arbiter.handle_message(Message::request(node_id, 2), conn_id, &tx);
    expect_grant(&mut rx);
    (tx, rx)
}

#[test]
fn join_registers_session() {
    let (arbiter, _dir) = arbiter();
    let (tx, _rx) = channel();

    arbiter.handle_message(Message::join("A", 1), 1, &tx);

    let status = arbiter.status();
    assert_eq!(status.clients.len(), 1);
    assert_eq!(status.clients[0].node_id, "A");
    assert!(!status.clients[0].in_critical);
    assert_eq!(status.holder, None);
}

#[test]
fn first_request_granted_immediately() {
    let (arbiter, _dir) = arbiter();
    let (tx, mut rx) = channel();

    arbiter.handle_message(Message::join("A", 1), 1, &tx);
    arbiter.handle_message(Message::request("A", 2), 1, &tx);

    let grant = expect_grant(&mut rx);
    assert_eq!(grant.node_id, mx_core::COORDINATOR_ID);

    let status = arbiter.status();
    assert_eq!(status.holder.as_deref(), Some("A"));
    assert!(status.clients[0].in_critical);
    assert!(status.queue.is_empty());
}

#[test]
fn grants_follow_timestamp_order() {
    let (arbiter, _dir) = arbiter();
    let (_x_tx, _x_rx) = acquire(&arbiter, "X", 1);

    let (b_tx, mut b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 2, &b_tx);
    arbiter.handle_message(Message::request("B", 7), 2, &b_tx);

    let (c_tx, mut c_rx) = channel();
    arbiter.handle_message(Message::join("C", 1), 3, &c_tx);
    arbiter.handle_message(Message::request("C", 5), 3, &c_tx);

    // Both queued behind X; the later arrival has the smaller stamp
    assert_no_message(&mut b_rx);
    assert_no_message(&mut c_rx);

    arbiter.handle_message(Message::release("X", 10), 1, &_x_tx);
    expect_grant(&mut c_rx);
    assert_no_message(&mut b_rx);
    assert_eq!(arbiter.status().holder.as_deref(), Some("C"));

    arbiter.handle_message(Message::release("C", 12), 3, &c_tx);
    expect_grant(&mut b_rx);
    assert_eq!(arbiter.status().holder.as_deref(), Some("B"));
}

#[test]
fn equal_timestamps_tie_break_on_node_id() {
    let (arbiter, _dir) = arbiter();
    let (x_tx, _x_rx) = acquire(&arbiter, "X", 1);

    // B enqueues before A; both stamp 10
    let (b_tx, mut b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 2, &b_tx);
    arbiter.handle_message(Message::request("B", 10), 2, &b_tx);

    let (a_tx, mut a_rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 3, &a_tx);
    arbiter.handle_message(Message::request("A", 10), 3, &a_tx);

    arbiter.handle_message(Message::release("X", 12), 1, &x_tx);

    expect_grant(&mut a_rx);
    assert_no_message(&mut b_rx);
    assert_eq!(arbiter.status().holder.as_deref(), Some("A"));
}

#[test]
fn release_from_non_holder_is_ignored() {
    let (arbiter, _dir) = arbiter();
    let (_a_tx, _a_rx) = acquire(&arbiter, "A", 1);

    let (b_tx, _b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 2, &b_tx);
    arbiter.handle_message(Message::release("B", 5), 2, &b_tx);

    assert_eq!(arbiter.status().holder.as_deref(), Some("A"));
}

#[test]
fn write_is_gated_to_the_holder() {
    let (arbiter, _dir) = arbiter();
    let (a_tx, _a_rx) = acquire(&arbiter, "A", 1);

    let (d_tx, _d_rx) = channel();
    arbiter.handle_message(Message::join("D", 1), 2, &d_tx);
    arbiter.handle_message(Message::write("D", 5, "intrusion"), 2, &d_tx);

    // Non-holder write left no trace
    assert_eq!(arbiter.resource_contents().expect("contents"), "");
    let log = arbiter.access_log();
    assert!(!log.iter().any(|entry| entry.contains("intrusion") || entry.starts_with("D wrote")));

    arbiter.handle_message(Message::write("A", 6, "hello"), 1, &a_tx);
    let contents = arbiter.resource_contents().expect("contents");
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.trim_end().ends_with("A: hello"));
    assert!(arbiter.access_log().iter().any(|entry| entry.starts_with("A wrote")));
}

#[test]
fn write_after_release_is_dropped() {
    let (arbiter, _dir) = arbiter();
    let (a_tx, _a_rx) = acquire(&arbiter, "A", 1);

    arbiter.handle_message(Message::write("A", 5, "while holding"), 1, &a_tx);
    arbiter.handle_message(Message::release("A", 6), 1, &a_tx);
    arbiter.handle_message(Message::write("A", 7, "after release"), 1, &a_tx);

    let contents = arbiter.resource_contents().expect("contents");
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("while holding"));
    assert!(!contents.contains("after release"));
}

#[test]
fn session_remove_purges_queue_entries() {
    let (arbiter, _dir) = arbiter();
    let (_a_tx, _a_rx) = acquire(&arbiter, "A", 1);

    let (b_tx, _b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 2, &b_tx);
    arbiter.handle_message(Message::request("B", 5), 2, &b_tx);

    let (c_tx, mut c_rx) = channel();
    arbiter.handle_message(Message::join("C", 1), 3, &c_tx);
    arbiter.handle_message(Message::request("C", 6), 3, &c_tx);

    arbiter.remove_session("B", None);
    let status = arbiter.status();
    assert_eq!(status.queue.len(), 1);
    assert_eq!(status.queue[0].node_id, "C");

    // Removing the holder frees the section for the survivor
    arbiter.remove_session("A", None);
    expect_grant(&mut c_rx);
    assert_eq!(arbiter.status().holder.as_deref(), Some("C"));
}

#[test]
fn holder_death_promotes_next_requester() {
    let (arbiter, _dir) = arbiter();
    let (_a_tx, _a_rx) = acquire(&arbiter, "A", 1);

    let (b_tx, mut b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 2, &b_tx);
    arbiter.handle_message(Message::request("B", 5), 2, &b_tx);
    assert_no_message(&mut b_rx);

    // A's connection dies without a RELEASE
    arbiter.remove_session("A", Some(1));

    expect_grant(&mut b_rx);
    let status = arbiter.status();
    assert_eq!(status.holder.as_deref(), Some("B"));
    assert_eq!(status.clients.len(), 1);
}

#[test]
fn duplicate_requests_coalesce_to_earliest_stamp() {
    let (arbiter, _dir) = arbiter();
    let (x_tx, _x_rx) = acquire(&arbiter, "X", 1);

    let (a_tx, mut a_rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 2, &a_tx);
    arbiter.handle_message(Message::request("A", 9), 2, &a_tx);
    arbiter.handle_message(Message::request("A", 7), 2, &a_tx);

    let status = arbiter.status();
    assert_eq!(status.queue.len(), 1);
    assert_eq!(status.queue[0].lamport_ts, 7);

    arbiter.handle_message(Message::release("X", 12), 1, &x_tx);
    expect_grant(&mut a_rx);

    // One grant only: releasing again must not re-grant A
    arbiter.handle_message(Message::release("A", 14), 2, &a_tx);
    assert_no_message(&mut a_rx);
    assert_eq!(arbiter.status().holder, None);
}

#[test]
fn dead_transport_is_skipped_at_grant_time() {
    let (arbiter, _dir) = arbiter();
    let (x_tx, _x_rx) = acquire(&arbiter, "X", 1);

    let (a_tx, a_rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 2, &a_tx);
    arbiter.handle_message(Message::request("A", 5), 2, &a_tx);
    drop(a_rx); // A's writer task is gone

    let (b_tx, mut b_rx) = channel();
    arbiter.handle_message(Message::join("B", 1), 3, &b_tx);
    arbiter.handle_message(Message::request("B", 6), 3, &b_tx);

    arbiter.handle_message(Message::release("X", 10), 1, &x_tx);

    // A was first by stamp but undeliverable; B holds instead
    expect_grant(&mut b_rx);
    let status = arbiter.status();
    assert_eq!(status.holder.as_deref(), Some("B"));
    assert!(status.queue.is_empty());
}

#[test]
fn rejoin_redirects_a_pending_grant() {
    let (arbiter, _dir) = arbiter();
    let (x_tx, _x_rx) = acquire(&arbiter, "X", 1);

    let (old_tx, mut old_rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 2, &old_tx);
    arbiter.handle_message(Message::request("A", 5), 2, &old_tx);

    // A reconnects while its request is still queued
    let (new_tx, mut new_rx) = channel();
    arbiter.handle_message(Message::join("A", 6), 3, &new_tx);

    arbiter.handle_message(Message::release("X", 10), 1, &x_tx);

    expect_grant(&mut new_rx);
    assert_no_message(&mut old_rx);
}

#[test]
fn stale_teardown_cannot_remove_a_rejoined_session() {
    let (arbiter, _dir) = arbiter();
    let (old_tx, _old_rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 1, &old_tx);

    let (new_tx, _new_rx) = channel();
    arbiter.handle_message(Message::join("A", 2), 2, &new_tx);

    // The old connection closing must not evict the new session
    arbiter.remove_session("A", Some(1));
    assert_eq!(arbiter.status().clients.len(), 1);

    arbiter.remove_session("A", Some(2));
    assert!(arbiter.status().clients.is_empty());
}

#[test]
fn any_inbound_message_refreshes_liveness() {
    let (arbiter, _dir) = arbiter();
    let (tx, _rx) = channel();
    arbiter.handle_message(Message::join("A", 1), 1, &tx);

    assert!(arbiter.expired_sessions(Duration::from_secs(10)).is_empty());

    arbiter.backdate_session("A", Duration::from_secs(60));
    assert_eq!(arbiter.expired_sessions(Duration::from_secs(10)), vec!["A".to_string()]);

    arbiter.handle_message(Message::heartbeat("A", 2), 1, &tx);
    assert!(arbiter.expired_sessions(Duration::from_secs(10)).is_empty());
}

#[test]
fn grant_stamp_is_causally_after_the_request() {
    let (arbiter, _dir) = arbiter();
    let (tx, mut rx) = channel();

    arbiter.handle_message(Message::join("A", 1), 1, &tx);
    arbiter.handle_message(Message::request("A", 100), 1, &tx);

    let grant = expect_grant(&mut rx);
    assert!(grant.timestamp > 100, "grant stamp {} not after request", grant.timestamp);
}

#[test]
fn holder_slot_and_in_critical_flags_stay_consistent() {
    let (arbiter, _dir) = arbiter();
    let (tx, mut rx) = channel();

    arbiter.handle_message(Message::join("A", 1), 1, &tx);
    arbiter.handle_message(Message::request("A", 2), 1, &tx);
    expect_grant(&mut rx);

    let held = arbiter.status();
    assert_eq!(held.holder.as_deref(), Some("A"));
    assert!(held.clients.iter().all(|c| c.in_critical == (c.node_id == "A")));

    arbiter.handle_message(Message::release("A", 5), 1, &tx);
    let released = arbiter.status();
    assert_eq!(released.holder, None);
    assert!(released.clients.iter().all(|c| !c.in_critical));
}

#[test]
fn access_log_records_membership_changes() {
    let (arbiter, _dir) = arbiter();
    let (tx, _rx) = channel();

    arbiter.handle_message(Message::join("A", 1), 1, &tx);
    arbiter.remove_session("A", None);

    let log = arbiter.access_log();
    assert_eq!(
        log,
        vec!["A joined the system".to_string(), "A left the system".to_string()]
    );
}
