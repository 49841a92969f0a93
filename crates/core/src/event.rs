// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static catalog of event descriptors.
//!
//! Every event the system can publish is declared here, once, with its
//! dispatch priority and the permission a subscriber must hold to receive
//! it. Consumers pass around `&'static EventDescriptor` references; the
//! catalog is immutable after program start.

use crate::auth::Permission;
use serde::Serialize;

/// Dispatch priority. Lower sorts first in the bus queue.
///
/// `Instant` events never enter the queue: their handlers are started
/// synchronously by `publish_instant`, which is what keeps the race
/// sequence causally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Instant,
    High,
    Medium,
    Low,
}

crate::simple_display! {
    EventPriority {
        Instant => "instant",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

/// One entry in the event catalog.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EventDescriptor {
    pub id: &'static str,
    pub priority: EventPriority,
    pub required_permission: Permission,
}

macro_rules! descriptors {
    ($( $name:ident => ($id:literal, $priority:ident, $perm:ident) ),+ $(,)?) => {
        $(
            pub static $name: EventDescriptor = EventDescriptor {
                id: $id,
                priority: EventPriority::$priority,
                required_permission: Permission::$perm,
            };
        )+

        /// Every registered descriptor, in declaration order.
        pub static ALL_EVENTS: &[&EventDescriptor] = &[$( &$name ),+];
    };
}

descriptors! {
    // -- special --
    HEARTBEAT => ("heartbeat", Low, EventWebsocket),
    PERMISSIONS_UPDATE => ("permissions_update", High, EventWebsocket),

    // -- event setup --
    PILOT_ADD => ("pilot_add", Medium, ReadPilots),
    PILOT_ALTER => ("pilot_alter", Medium, ReadPilots),
    PILOT_DELETE => ("pilot_delete", Medium, ReadPilots),

    // -- race sequence --
    RACE_STAGE => ("race_stage", Instant, RaceEvents),
    RACE_START => ("race_start", Instant, RaceEvents),
    RACE_FINISH => ("race_finish", Instant, RaceEvents),
    RACE_STOP => ("race_stop", Instant, RaceEvents),
}

/// Look up a descriptor by its identifier.
pub fn descriptor(id: &str) -> Option<&'static EventDescriptor> {
    ALL_EVENTS.iter().find(|d| d.id == id).copied()
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
