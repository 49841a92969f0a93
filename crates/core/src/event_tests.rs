// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::auth::Permission;

#[test]
fn priority_orders_instant_first() {
    assert!(EventPriority::Instant < EventPriority::High);
    assert!(EventPriority::High < EventPriority::Medium);
    assert!(EventPriority::Medium < EventPriority::Low);
}

#[test]
fn catalog_ids_are_unique() {
    let mut ids: Vec<&str> = ALL_EVENTS.iter().map(|d| d.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), ALL_EVENTS.len());
}

#[test]
fn descriptor_lookup_by_id() {
    let stage = descriptor("race_stage").unwrap();
    assert_eq!(stage.priority, EventPriority::Instant);
    assert_eq!(stage.required_permission, Permission::RaceEvents);
    assert!(descriptor("no_such_event").is_none());
}

#[test]
fn race_sequence_events_are_instant() {
    for id in ["race_stage", "race_start", "race_finish", "race_stop"] {
        let d = descriptor(id).unwrap();
        assert_eq!(d.priority, EventPriority::Instant, "{id}");
        assert_eq!(d.required_permission, Permission::RaceEvents, "{id}");
    }
}

#[test]
fn pilot_events_are_medium_priority() {
    for id in ["pilot_add", "pilot_alter", "pilot_delete"] {
        let d = descriptor(id).unwrap();
        assert_eq!(d.priority, EventPriority::Medium, "{id}");
        assert_eq!(d.required_permission, Permission::ReadPilots, "{id}");
    }
}

#[test]
fn heartbeat_is_low_priority_websocket_event() {
    assert_eq!(HEARTBEAT.priority, EventPriority::Low);
    assert_eq!(HEARTBEAT.required_permission, Permission::EventWebsocket);
    assert_eq!(PERMISSIONS_UPDATE.priority, EventPriority::High);
}
