//! Last-known view of the device.
//!
//! The model is written only by the dispatcher running in the connection's
//! read loop. Callers get cloned snapshots.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::messages::{PollReply, ZoneState, ZoneStatus};

pub mod names;

pub use names::{NameTable, NameTableError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub identifier: String,
    pub name: Option<String>,
    pub firmware_version: Option<u16>,
    pub serial: Option<u32>,
    pub state: Option<u8>,
    pub tcp_port: Option<u16>,
    pub form_factor: Option<String>,
    /// Scene index to scene name, from the name-table file.
    pub scenes: BTreeMap<u16, String>,
    /// Zone index to zone name, from the name-table file.
    pub zones: BTreeMap<u16, String>,
    pub zone_states: BTreeMap<u16, ZoneState>,
}

impl DeviceState {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Overwrites the identity fields from a poll reply.
    pub fn apply_poll(&mut self, reply: &PollReply) {
        debug!(name = %reply.name, firmware = reply.firmware_version, serial = reply.serial, "identity updated");
        self.name = Some(reply.name.clone());
        self.firmware_version = Some(reply.firmware_version);
        self.serial = Some(reply.serial);
        self.state = Some(reply.state);
        self.tcp_port = Some(reply.tcp_port);
    }

    /// Replaces the zone's snapshot; the previous one is discarded whole.
    pub fn apply_zone_status(&mut self, status: &ZoneStatus) {
        debug!(zone = status.zone_id, "zone state replaced");
        self.zone_states.insert(status.zone_id, status.state);
    }

    pub fn apply_name_table(&mut self, table: NameTable) {
        self.scenes = table.scenes;
        self.zones = table.zones;
        if table.form_factor.is_some() {
            self.form_factor = table.form_factor;
        }
    }

    pub fn zone(&self, zone_id: u16) -> Option<&ZoneState> {
        self.zone_states.get(&zone_id)
    }

    /// Zones named in the name table plus any that have reported status.
    pub fn known_zones(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .zones
            .keys()
            .chain(self.zone_states.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Rgb;

    #[test]
    fn zone_status_replaces_previous_snapshot() {
        let mut state = DeviceState::new("LUMICTRL");
        state.apply_zone_status(&ZoneStatus {
            timestamp: 1,
            zone_id: 4,
            state: ZoneState {
                running_scene: Some(2),
                dimmer: Some(500),
                color: Some(Rgb::new(1, 2, 3)),
                ..ZoneState::default()
            },
        });
        state.apply_zone_status(&ZoneStatus {
            timestamp: 2,
            zone_id: 4,
            state: ZoneState {
                running_scene: Some(3),
                ..ZoneState::default()
            },
        });
        let zone = state.zone(4).unwrap();
        assert_eq!(zone.running_scene, Some(3));
        assert_eq!(zone.dimmer, None);
        assert_eq!(zone.color, None);
    }

    #[test]
    fn known_zones_merges_names_and_reports() {
        let mut state = DeviceState::new("LUMICTRL");
        state.zones.insert(2, "Bar".into());
        state.zones.insert(1, "Hall".into());
        state.zone_states.insert(2, ZoneState::default());
        state.zone_states.insert(7, ZoneState::default());
        assert_eq!(state.known_zones(), vec![1, 2, 7]);
    }
}
