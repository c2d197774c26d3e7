//! Fabric resource URI helpers.
//!
//! Fabric resources are addressed as `/rest/<collection>/<id>`. Callers hold
//! either form; these helpers convert between them.

/// Collection prefix of ethernet networks.
pub const ETHERNET_NETWORKS: &str = "/rest/ethernet-networks";

/// Collection prefix of live uplinksets.
pub const UPLINK_SETS: &str = "/rest/uplink-sets";

/// Collection prefix of uplink-group templates.
pub const UPLINK_GROUPS: &str = "/rest/logical-interconnect-groups";

/// Collection prefix of deployed interconnects.
pub const INTERCONNECTS: &str = "/rest/logical-interconnects";

/// Collection prefix of server hardware.
pub const SERVER_HARDWARE: &str = "/rest/server-hardware";

/// Collection prefix of server profiles.
pub const SERVER_PROFILES: &str = "/rest/server-profiles";

/// Returns the trailing id segment of a resource URI.
///
/// A bare id is returned unchanged.
///
/// ```
/// use fabric_types::uri::id_from_uri;
///
/// assert_eq!(id_from_uri("/rest/ethernet-networks/net-1"), "net-1");
/// assert_eq!(id_from_uri("net-1"), "net-1");
/// ```
pub fn id_from_uri(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

/// Builds `<collection>/<id>`, passing through values that already are URIs.
pub fn resource_uri(collection: &str, id_or_uri: &str) -> String {
    if id_or_uri.starts_with("/rest/") {
        id_or_uri.to_string()
    } else {
        format!("{}/{}", collection, id_or_uri)
    }
}

/// Returns the URI of the ethernet network with the given id.
pub fn network_uri_from_id(network_id: &str) -> String {
    resource_uri(ETHERNET_NETWORKS, network_id)
}
