//! Naming conventions and fixed values shared with the SDN plane.

/// Prefix of fabric networks created for SDN networks: `Neutron [<uuid>]`.
pub const NETWORK_NAME_PREFIX: &str = "Neutron [";

/// Pattern matching fabric networks owned by the engine.
pub const NETWORK_NAME_PATTERN: &str = r"Neutron \[(.*)\]";

/// Prefix of profile connections created for ports: `NeutronPort[<mac>]`.
pub const CONNECTION_NAME_PREFIX: &str = "NeutronPort[";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fabric-syncd/fabric-syncd.toml";

/// Default state store location.
pub const DEFAULT_STORE_PATH: &str = "/var/lib/fabric-syncd/state.json";

/// Version written to the state store file.
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Port binding values returned to the SDN plane.
pub mod binding {
    /// VIF type of bound baremetal ports.
    pub const VIF_TYPE_OTHER: &str = "other";

    /// `vif_details` key carrying the segmentation id.
    pub const VIF_DETAILS_VLAN: &str = "vlan";

    /// Status of a bound segment.
    pub const STATUS_ACTIVE: &str = "ACTIVE";
}

/// Builds the fabric network name for an SDN network.
pub fn network_name(neutron_network_id: &str) -> String {
    format!("{}{}]", NETWORK_NAME_PREFIX, neutron_network_id)
}

/// Builds the profile connection name for a port MAC.
pub fn connection_name(mac: &str) -> String {
    format!("{}{}]", CONNECTION_NAME_PREFIX, mac)
}
