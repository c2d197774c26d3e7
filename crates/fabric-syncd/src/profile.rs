//! Pure server profile edits.
//!
//! Everything here works on snapshots of a server profile and its hardware;
//! the port reconciler wraps these edits in the power protocol.

use fabric_api::models::{Connection, ServerHardware, ServerProfile};
use fabric_types::{BootPriority, MacAddress};

use crate::tables::connection_name;

/// Picks the boot priority of a new connection.
///
/// Bootable connections take `Primary`, then `Secondary`, if no existing
/// connection holds it. Everything else is `NotBootable`.
pub fn elect_boot_priority(connections: &[Connection], bootable: bool) -> BootPriority {
    if !bootable {
        return BootPriority::NotBootable;
    }
    let taken = |priority: BootPriority| connections.iter().any(|c| c.priority() == priority);
    if !taken(BootPriority::Primary) {
        BootPriority::Primary
    } else if !taken(BootPriority::Secondary) {
        BootPriority::Secondary
    } else {
        BootPriority::NotBootable
    }
}

/// Locates the virtual port carrying `mac` in the hardware port map and
/// formats its id as `"<location> <slot>:<port>-<function>"`.
pub fn derive_port_id(hardware: &ServerHardware, mac: &MacAddress) -> Option<String> {
    hardware.port_map.device_slots.iter().find_map(|slot| {
        slot.physical_ports.iter().find_map(|port| {
            port.virtual_ports
                .iter()
                .find(|vp| vp.mac.as_deref().map(|m| mac.matches_str(m)).unwrap_or(false))
                .map(|vp| {
                    format!(
                        "{} {}:{}-{}",
                        slot.location, slot.slot_number, port.port_number, vp.port_function
                    )
                })
        })
    })
}

/// Makes the profile hold exactly one connection for `port_id`, pointing at
/// `network_uri`. Returns true if the profile changed.
///
/// An up-to-date connection is left alone, priority included. A stale one is
/// replaced and its priority re-elected among the remaining connections.
pub fn upsert_connection(
    profile: &mut ServerProfile,
    mac: &MacAddress,
    port_id: &str,
    network_uri: &str,
    bootable: bool,
) -> bool {
    let matching: Vec<&Connection> = profile
        .connections
        .iter()
        .filter(|c| c.port_id == port_id)
        .collect();
    if let [existing] = matching.as_slice() {
        if existing.network_uri == network_uri && existing.has_mac(mac) {
            return false;
        }
    }

    profile.connections.retain(|c| c.port_id != port_id);
    let priority = elect_boot_priority(&profile.connections, bootable);
    profile.connections.push(Connection::ethernet(
        connection_name(&mac.to_string()),
        mac,
        port_id,
        network_uri,
        priority,
    ));
    true
}

/// Points the connection carrying `mac` at `network_uri`. Returns true if it
/// was rewritten; false if it was already right or does not exist.
pub fn retarget_connection(
    profile: &mut ServerProfile,
    mac: &MacAddress,
    network_uri: &str,
) -> bool {
    match profile.connections.iter_mut().find(|c| c.has_mac(mac)) {
        Some(conn) if conn.network_uri != network_uri => {
            conn.network_uri = network_uri.to_string();
            true
        }
        _ => false,
    }
}

/// Removes the connection carrying `mac`. Returns true if one was removed.
pub fn remove_connection_by_mac(profile: &mut ServerProfile, mac: &MacAddress) -> bool {
    remove_connections(profile, |c| c.has_mac(mac)) > 0
}

/// Removes connections pointing at networks for which `vanished` holds.
/// Returns the number removed.
pub fn strip_connections<F>(profile: &mut ServerProfile, vanished: F) -> usize
where
    F: Fn(&str) -> bool,
{
    remove_connections(profile, |c| vanished(c.network_id()))
}

/// Removes matching connections. When a `Primary` connection goes away, an
/// existing `Secondary` takes its place.
fn remove_connections<F>(profile: &mut ServerProfile, mut remove: F) -> usize
where
    F: FnMut(&Connection) -> bool,
{
    let before = profile.connections.len();
    let mut lost_primary = false;
    profile.connections.retain(|c| {
        if remove(c) {
            lost_primary |= c.priority() == BootPriority::Primary;
            false
        } else {
            true
        }
    });

    if lost_primary && !profile.connections.iter().any(|c| c.priority() == BootPriority::Primary) {
        if let Some(secondary) = profile
            .connections
            .iter_mut()
            .find(|c| c.priority() == BootPriority::Secondary)
        {
            secondary.boot.priority = BootPriority::Primary;
        }
    }
    before - profile.connections.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_api::models::{DeviceSlot, PhysicalPort, PortMap, ProfileState, VirtualPort};
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    fn profile() -> ServerProfile {
        ServerProfile {
            uri: "/rest/server-profiles/sp-1".to_string(),
            name: "sp-1".to_string(),
            state: ProfileState::Normal,
            status: None,
            server_hardware_uri: None,
            connections: Vec::new(),
            extra: Map::new(),
        }
    }

    fn hardware() -> ServerHardware {
        ServerHardware {
            uri: "/rest/server-hardware/sh-1".to_string(),
            uuid: None,
            power_state: Default::default(),
            power_lock: false,
            server_profile_uri: None,
            port_map: PortMap {
                device_slots: vec![DeviceSlot {
                    location: "Mezz".to_string(),
                    slot_number: 3,
                    physical_ports: vec![PhysicalPort {
                        port_number: 2,
                        virtual_ports: vec![
                            VirtualPort {
                                mac: Some("AA:BB:CC:00:00:01".to_string()),
                                port_function: "a".to_string(),
                            },
                            VirtualPort {
                                mac: None,
                                port_function: "b".to_string(),
                            },
                        ],
                    }],
                }],
            },
            extra: Map::new(),
        }
    }

    #[test]
    fn test_derive_port_id() {
        let hw = hardware();
        assert_eq!(
            derive_port_id(&hw, &mac("aa:bb:cc:00:00:01")),
            Some("Mezz 3:2-a".to_string())
        );
        assert_eq!(derive_port_id(&hw, &mac("aa:bb:cc:00:00:09")), None);
    }

    #[test]
    fn test_election_sequence() {
        let mut p = profile();
        let expected = [
            BootPriority::Primary,
            BootPriority::Secondary,
            BootPriority::NotBootable,
        ];
        for (i, priority) in expected.iter().enumerate() {
            let m = mac(&format!("aa:bb:cc:00:00:0{}", i + 1));
            let port_id = format!("Flb 1:{}-a", i + 1);
            assert!(upsert_connection(&mut p, &m, &port_id, "/rest/ethernet-networks/n1", true));
            assert_eq!(p.connections[i].priority(), *priority);
        }
        assert_eq!(
            elect_boot_priority(&p.connections, false),
            BootPriority::NotBootable
        );
    }

    #[test]
    fn test_upsert_is_keyed_by_port_id() {
        let mut p = profile();
        let m = mac("aa:bb:cc:00:00:01");
        assert!(upsert_connection(&mut p, &m, "Flb 1:1-a", "/rest/ethernet-networks/n1", true));
        assert!(!upsert_connection(&mut p, &m, "Flb 1:1-a", "/rest/ethernet-networks/n1", true));
        assert_eq!(p.connections.len(), 1);
        assert_eq!(p.connections[0].priority(), BootPriority::Primary);

        // Stale network: replaced, keeps Primary since it no longer competes with itself.
        assert!(upsert_connection(&mut p, &m, "Flb 1:1-a", "/rest/ethernet-networks/n2", true));
        assert_eq!(p.connections.len(), 1);
        assert_eq!(p.connections[0].network_id(), "n2");
        assert_eq!(p.connections[0].priority(), BootPriority::Primary);
        assert_eq!(p.connections[0].name, "NeutronPort[aa:bb:cc:00:00:01]");
        assert_eq!(p.connections[0].mac.as_deref(), Some("AA:BB:CC:00:00:01"));
    }

    #[test]
    fn test_remove_primary_promotes_secondary() {
        let mut p = profile();
        let first = mac("aa:bb:cc:00:00:01");
        let second = mac("aa:bb:cc:00:00:02");
        upsert_connection(&mut p, &first, "Flb 1:1-a", "/rest/ethernet-networks/n1", true);
        upsert_connection(&mut p, &second, "Flb 1:1-b", "/rest/ethernet-networks/n1", true);

        assert!(remove_connection_by_mac(&mut p, &first));
        assert_eq!(p.connections.len(), 1);
        assert_eq!(p.connections[0].priority(), BootPriority::Primary);
        assert!(!remove_connection_by_mac(&mut p, &first));
    }

    #[test]
    fn test_strip_and_retarget() {
        let mut p = profile();
        let first = mac("aa:bb:cc:00:00:01");
        let second = mac("aa:bb:cc:00:00:02");
        upsert_connection(&mut p, &first, "Flb 1:1-a", "/rest/ethernet-networks/gone", true);
        upsert_connection(&mut p, &second, "Flb 1:1-b", "/rest/ethernet-networks/n1", false);

        assert_eq!(strip_connections(&mut p, |id| id == "gone"), 1);
        assert_eq!(p.connections.len(), 1);

        assert!(retarget_connection(&mut p, &second, "/rest/ethernet-networks/n2"));
        assert!(!retarget_connection(&mut p, &second, "/rest/ethernet-networks/n2"));
        assert!(!retarget_connection(&mut p, &first, "/rest/ethernet-networks/n2"));
    }
}
