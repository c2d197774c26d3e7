//! Fabric backend resource models.
//!
//! Only the fields the reconciler reads or writes are modelled. Everything
//! else is kept in `extra` so a read-modify-write of a whole resource sends
//! back what the backend returned.

use fabric_types::uri::id_from_uri;
use fabric_types::{BootPriority, EthernetNetworkType, MacAddress, PowerState, VlanId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Backend field values written by this crate.
pub mod values {
    /// `purpose` of every network created for the SDN plane.
    pub const PURPOSE_GENERAL: &str = "General";
    /// `functionType` of server profile connections.
    pub const FUNCTION_TYPE_ETHERNET: &str = "Ethernet";
    /// `powerControl` used for power state changes.
    pub const POWER_CONTROL_MOMENTARY_PRESS: &str = "MomentaryPress";
}

/// Accepts any ethernet type spelling and maps types this crate does not
/// handle (`Tunnel`, `NotApplicable`, ...) to `None`.
fn lenient_ethernet_type<'de, D>(deserializer: D) -> Result<Option<EthernetNetworkType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// An ethernet network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthernetNetwork {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_ethernet_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub ethernet_network_type: Option<EthernetNetworkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EthernetNetwork {
    /// Returns the network id (last URI segment).
    pub fn id(&self) -> &str {
        id_from_uri(&self.uri)
    }
}

/// Request body for creating an ethernet network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEthernetNetwork {
    pub name: String,
    pub ethernet_network_type: EthernetNetworkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    pub purpose: String,
    pub smart_link: bool,
    pub private_network: bool,
}

impl NewEthernetNetwork {
    /// Builds a general-purpose network, tagged with `vlan` when present.
    pub fn new(name: impl Into<String>, vlan: Option<VlanId>) -> Self {
        let ethernet_network_type = if vlan.is_some() {
            EthernetNetworkType::Tagged
        } else {
            EthernetNetworkType::Untagged
        };
        Self {
            name: name.into(),
            ethernet_network_type,
            vlan_id: vlan.map(|v| v.as_u16()),
            purpose: values::PURPOSE_GENERAL.to_string(),
            smart_link: false,
            private_network: false,
        }
    }
}

/// A live uplinkset deployed on an interconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkSet {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub network_uris: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_ethernet_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub ethernet_network_type: Option<EthernetNetworkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_interconnect_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UplinkSet {
    pub fn id(&self) -> &str {
        id_from_uri(&self.uri)
    }

    /// Returns true if the network (id or URI) is attached.
    pub fn carries(&self, network_id: &str) -> bool {
        let id = id_from_uri(network_id);
        self.network_uris.iter().any(|uri| id_from_uri(uri) == id)
    }
}

/// An uplinkset entry of an uplink-group template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkGroupUplinkSet {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_ethernet_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub ethernet_network_type: Option<EthernetNetworkType>,
    #[serde(default)]
    pub network_uris: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UplinkGroupUplinkSet {
    /// Returns true if the network (id or URI) is attached.
    pub fn carries(&self, network_id: &str) -> bool {
        let id = id_from_uri(network_id);
        self.network_uris.iter().any(|uri| id_from_uri(uri) == id)
    }
}

/// An uplink-group template (logical interconnect group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkGroup {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uplink_sets: Vec<UplinkGroupUplinkSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UplinkGroup {
    pub fn id(&self) -> &str {
        id_from_uri(&self.uri)
    }

    /// Returns the first template uplinkset with the given name.
    pub fn uplink_set(&self, name: &str) -> Option<&UplinkGroupUplinkSet> {
        self.uplink_sets.iter().find(|u| u.name == name)
    }

    pub fn uplink_set_mut(&mut self, name: &str) -> Option<&mut UplinkGroupUplinkSet> {
        self.uplink_sets.iter_mut().find(|u| u.name == name)
    }
}

/// A deployed interconnect (logical interconnect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interconnect {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_interconnect_group_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Interconnect {
    /// Returns the id of the uplink group this interconnect was deployed from.
    pub fn group_id(&self) -> Option<&str> {
        self.logical_interconnect_group_uri.as_deref().map(id_from_uri)
    }
}

/// Physical server hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHardware {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub power_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_profile_uri: Option<String>,
    #[serde(default)]
    pub port_map: PortMap,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerHardware {
    pub fn id(&self) -> &str {
        id_from_uri(&self.uri)
    }
}

/// NIC layout of a server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMap {
    #[serde(default)]
    pub device_slots: Vec<DeviceSlot>,
}

/// One adapter slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSlot {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub slot_number: u32,
    #[serde(default)]
    pub physical_ports: Vec<PhysicalPort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalPort {
    #[serde(default)]
    pub port_number: u32,
    #[serde(default)]
    pub virtual_ports: Vec<VirtualPort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualPort {
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub port_function: String,
}

/// Server profile lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileState {
    Normal,
    Creating,
    Updating,
    Applying,
    Deleting,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ProfileState {
    /// Returns true while the backend is still applying a change.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ProfileState::Creating
                | ProfileState::Updating
                | ProfileState::Applying
                | ProfileState::Deleting
        )
    }
}

/// A server profile: the full I/O and boot configuration of one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: ProfileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_hardware_uri: Option<String>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerProfile {
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }
}

/// Boot settings of a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionBoot {
    #[serde(default)]
    pub priority: BootPriority,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectionBoot {
    pub fn new(priority: BootPriority) -> Self {
        Self {
            priority,
            extra: Map::new(),
        }
    }
}

fn default_function_type() -> String {
    values::FUNCTION_TYPE_ETHERNET.to_string()
}

/// A network connection inside a server profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default)]
    pub port_id: String,
    #[serde(default)]
    pub network_uri: String,
    #[serde(default)]
    pub boot: ConnectionBoot,
    #[serde(default = "default_function_type")]
    pub function_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Connection {
    /// Builds an ethernet connection for a port.
    pub fn ethernet(
        name: impl Into<String>,
        mac: &MacAddress,
        port_id: impl Into<String>,
        network_uri: impl Into<String>,
        priority: BootPriority,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            mac: Some(mac.to_upper_string()),
            port_id: port_id.into(),
            network_uri: network_uri.into(),
            boot: ConnectionBoot::new(priority),
            function_type: default_function_type(),
            extra: Map::new(),
        }
    }

    pub fn priority(&self) -> BootPriority {
        self.boot.priority
    }

    /// Returns true if the connection carries the given MAC, in any case.
    pub fn has_mac(&self, mac: &MacAddress) -> bool {
        self.mac.as_deref().map(|m| mac.matches_str(m)).unwrap_or(false)
    }

    /// Returns the id of the network the connection points at.
    pub fn network_id(&self) -> &str {
        id_from_uri(&self.network_uri)
    }
}

/// Paged collection envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub members: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_uri: Option<String>,
}

/// Body of a server hardware power state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerStateRequest {
    pub power_state: PowerState,
    pub power_control: String,
}

impl PowerStateRequest {
    pub fn momentary_press(power_state: PowerState) -> Self {
        Self {
            power_state,
            power_control: values::POWER_CONTROL_MOMENTARY_PRESS.to_string(),
        }
    }
}

/// Asynchronous backend task returned by mutating requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uri: String,
    #[serde(default)]
    pub task_state: String,
    #[serde(default)]
    pub task_errors: Vec<TaskErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_resource: Option<AssociatedResource>,
}

impl Task {
    const RUNNING: &'static [&'static str] = &[
        "New",
        "Pending",
        "Running",
        "Starting",
        "Stopping",
        "Suspended",
    ];

    pub fn is_running(&self) -> bool {
        Self::RUNNING.contains(&self.task_state.as_str())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.task_state.as_str(), "Error" | "Terminated" | "Killed")
    }

    /// Joins the task error messages.
    pub fn error_message(&self) -> String {
        let messages: Vec<&str> = self.task_errors.iter().map(|e| e.message.as_str()).collect();
        if messages.is_empty() {
            self.task_state.clone()
        } else {
            messages.join("; ")
        }
    }

    pub fn resource_uri(&self) -> Option<&str> {
        self.associated_resource
            .as_ref()
            .and_then(|r| r.resource_uri.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskErrorEntry {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedResource {
    #[serde(default)]
    pub resource_uri: Option<String>,
}

/// Error body returned on non-success responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_new_network_body() {
        let body = NewEthernetNetwork::new("Neutron [abc]", Some(VlanId::new(42).unwrap()));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "name": "Neutron [abc]",
                "ethernetNetworkType": "Tagged",
                "vlanId": 42,
                "purpose": "General",
                "smartLink": false,
                "privateNetwork": false,
            })
        );

        let flat = NewEthernetNetwork::new("Neutron [def]", None);
        assert_eq!(flat.ethernet_network_type, EthernetNetworkType::Untagged);
        assert!(serde_json::to_value(&flat).unwrap().get("vlanId").is_none());
    }

    #[test]
    fn test_uplink_set_lenient_type_and_extra_fields() {
        let us: UplinkSet = serde_json::from_value(json!({
            "uri": "/rest/uplink-sets/us-1",
            "name": "uplink-a",
            "ethernetNetworkType": "Tunnel",
            "networkUris": ["/rest/ethernet-networks/n1"],
            "portConfigInfos": [{"desiredSpeed": "Auto"}],
        }))
        .unwrap();
        assert_eq!(us.ethernet_network_type, None);
        assert!(us.carries("n1"));
        assert!(us.carries("/rest/ethernet-networks/n1"));
        assert!(!us.carries("n2"));

        let round = serde_json::to_value(&us).unwrap();
        assert_eq!(round["portConfigInfos"][0]["desiredSpeed"], "Auto");
    }

    #[test]
    fn test_profile_state_and_connections() {
        let profile: ServerProfile = serde_json::from_value(json!({
            "uri": "/rest/server-profiles/sp-1",
            "state": "Applying",
            "connections": [{
                "id": 1,
                "name": "pxe",
                "mac": "AA:BB:CC:00:00:01",
                "portId": "Flb 1:1-a",
                "networkUri": "/rest/ethernet-networks/n1",
                "boot": {"priority": "Primary"},
                "functionType": "Ethernet",
                "requestedMbps": "2500",
            }],
        }))
        .unwrap();
        assert!(profile.is_busy());
        let conn = &profile.connections[0];
        assert_eq!(conn.priority(), BootPriority::Primary);
        assert!(conn.has_mac(&"aa:bb:cc:00:00:01".parse().unwrap()));
        assert_eq!(conn.network_id(), "n1");
        assert_eq!(conn.extra["requestedMbps"], "2500");

        let odd: ServerProfile =
            serde_json::from_value(json!({"uri": "/rest/server-profiles/sp-2", "state": "Mystery"}))
                .unwrap();
        assert_eq!(odd.state, ProfileState::Unknown);
        assert!(!odd.is_busy());
    }

    #[test]
    fn test_power_request_body() {
        let body = PowerStateRequest::momentary_press(PowerState::Off);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"powerState": "Off", "powerControl": "MomentaryPress"})
        );
    }

    #[test]
    fn test_task_states() {
        let task: Task = serde_json::from_value(json!({
            "uri": "/rest/tasks/t1",
            "taskState": "Error",
            "taskErrors": [{"message": "vlan in use"}],
        }))
        .unwrap();
        assert!(task.is_failed());
        assert!(!task.is_running());
        assert_eq!(task.error_message(), "vlan in use");
    }
}
