//! Test fixtures: fabric topology, SDN networks and ports, servers.

use crate::fake_fabric::FakeFabric;
use fabric_sync_common::{BindingProfile, LocalLinkInformation, LogicalNetwork, SdnPort};
use fabric_types::{EthernetNetworkType, MacAddress, NetworkType, PowerState, VnicType};
use serde_json::{json, Map, Value};

/// Fabric topology fixtures.
///
/// The standard topology has two uplink groups:
///
/// - `lig-1` with a tagged and an untagged uplinkset, deployed as `li-1`
/// - `lig-2` with one tagged uplinkset, deployed as `li-2`
///
/// plus an operator-owned flat network `net-123`.
pub mod topology {
    use super::*;

    pub const GROUP_1: &str = "lig-1";
    pub const GROUP_2: &str = "lig-2";
    pub const INTERCONNECT_1: &str = "li-1";
    pub const INTERCONNECT_2: &str = "li-2";

    pub const TAGGED_UPLINK: &str = "uplink-tagged";
    pub const UNTAGGED_UPLINK: &str = "uplink-untagged";
    pub const GROUP_2_UPLINK: &str = "uplink-g2";

    /// Live uplinkset ids.
    pub const LIVE_TAGGED: &str = "us-tagged-1";
    pub const LIVE_UNTAGGED: &str = "us-untagged-1";
    pub const LIVE_GROUP_2: &str = "us-g2-1";

    pub const FLAT_NETWORK_ID: &str = "net-123";

    /// Uplinkset mappings for the standard topology, legacy string form.
    pub const UPLINKSET_MAPPINGS: &str =
        "physnet2:lig-1:uplink-tagged,physnet2:lig-1:uplink-untagged,physnet2:lig-2:uplink-g2";

    /// Flat mappings for the standard topology, legacy string form.
    pub const FLAT_MAPPINGS: &str = "physnet1:net-123";

    /// Builds a fake fabric with the standard topology.
    pub fn standard() -> FakeFabric {
        let fabric = FakeFabric::new();
        fabric.add_uplink_group(
            GROUP_1,
            &[
                (TAGGED_UPLINK, EthernetNetworkType::Tagged),
                (UNTAGGED_UPLINK, EthernetNetworkType::Untagged),
            ],
        );
        fabric.add_uplink_group(GROUP_2, &[(GROUP_2_UPLINK, EthernetNetworkType::Tagged)]);
        fabric.add_interconnect(INTERCONNECT_1, GROUP_1);
        fabric.add_interconnect(INTERCONNECT_2, GROUP_2);
        fabric.add_uplink_set(
            LIVE_TAGGED,
            TAGGED_UPLINK,
            EthernetNetworkType::Tagged,
            INTERCONNECT_1,
        );
        fabric.add_uplink_set(
            LIVE_UNTAGGED,
            UNTAGGED_UPLINK,
            EthernetNetworkType::Untagged,
            INTERCONNECT_1,
        );
        fabric.add_uplink_set(
            LIVE_GROUP_2,
            GROUP_2_UPLINK,
            EthernetNetworkType::Tagged,
            INTERCONNECT_2,
        );
        fabric.add_network(FLAT_NETWORK_ID, "Operator flat network", None);
        fabric
    }
}

/// SDN plane fixtures.
pub mod sdn {
    use super::*;

    pub fn vlan_network(id: &str, physnet: &str, vlan: u32) -> LogicalNetwork {
        LogicalNetwork::new(id, Some(physnet), NetworkType::Vlan, Some(vlan))
    }

    pub fn flat_network(id: &str, physnet: &str) -> LogicalNetwork {
        LogicalNetwork::new(id, Some(physnet), NetworkType::Flat, None)
    }

    /// Builds a port with a raw binding profile.
    pub fn port_with_profile(
        id: &str,
        network_id: &str,
        mac: &str,
        vnic_type: VnicType,
        profile: Option<Value>,
    ) -> SdnPort {
        SdnPort {
            id: id.to_string(),
            network_id: network_id.to_string(),
            mac_address: mac.parse::<MacAddress>().expect("fixture MAC"),
            vnic_type,
            binding_profile: profile
                .map(|p| serde_json::from_value::<BindingProfile>(p).expect("fixture profile")),
        }
    }

    /// Builds a well-formed baremetal port bound to `hardware_id`.
    pub fn baremetal_port(
        id: &str,
        network_id: &str,
        mac: &str,
        hardware_id: &str,
        bootable: bool,
    ) -> SdnPort {
        let link = LocalLinkInformation {
            switch_info: Some(json!({
                "server_hardware_id": hardware_id,
                "bootable": bootable,
            })),
            extra: Map::new(),
        };
        SdnPort {
            id: id.to_string(),
            network_id: network_id.to_string(),
            mac_address: mac.parse::<MacAddress>().expect("fixture MAC"),
            vnic_type: VnicType::Baremetal,
            binding_profile: Some(BindingProfile {
                local_link_information: vec![link],
                extra: Map::new(),
            }),
        }
    }
}

/// Server fixtures.
pub mod servers {
    use super::*;

    pub const HARDWARE_ID: &str = "sh-1";
    pub const PROFILE_ID: &str = "sp-1";

    /// MACs of the standard server's virtual ports, in port map order.
    pub const MACS: [&str; 4] = [
        "aa:bb:cc:00:00:01",
        "aa:bb:cc:00:00:02",
        "aa:bb:cc:00:00:03",
        "aa:bb:cc:00:00:04",
    ];

    /// Port ids the standard server's MACs resolve to.
    pub const PORT_IDS: [&str; 4] = ["Flb 1:1-a", "Flb 1:1-b", "Flb 1:2-a", "Mezz 3:1-a"];

    /// Adds the standard server (`sh-1` with profile `sp-1`) to `fabric`.
    pub fn add_standard_server(fabric: &FakeFabric, power: PowerState) {
        fabric.add_server(
            HARDWARE_ID,
            PROFILE_ID,
            power,
            &[
                ("Flb", 1, 1, "a", MACS[0]),
                ("Flb", 1, 1, "b", MACS[1]),
                ("Flb", 1, 2, "a", MACS[2]),
                ("Mezz", 3, 1, "a", MACS[3]),
            ],
        );
    }
}
