//! SDN plane models: logical networks, ports and their binding profiles.

use fabric_types::{MacAddress, NetworkType, VlanId, VnicType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};

/// Provider attributes of a logical network's segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    #[serde(rename = "provider:physical_network", default)]
    pub physical_network: Option<String>,
    #[serde(rename = "provider:network_type")]
    pub network_type: NetworkType,
    #[serde(rename = "provider:segmentation_id", default)]
    pub segmentation_id: Option<u32>,
}

impl NetworkSegment {
    /// Returns the segmentation id as a VLAN, if it is one.
    ///
    /// VXLAN VNIs above 4094 cannot be carried on a fabric VLAN.
    pub fn vlan(&self) -> SyncResult<Option<VlanId>> {
        match self.segmentation_id {
            None => Ok(None),
            Some(id) => u16::try_from(id)
                .ok()
                .and_then(|id| VlanId::new(id).ok())
                .map(Some)
                .ok_or_else(|| {
                    SyncError::configuration(
                        "provider:segmentation_id",
                        format!("{} is not a valid fabric VLAN", id),
                    )
                }),
        }
    }
}

/// A logical network as seen by the SDN plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalNetwork {
    pub id: String,
    #[serde(flatten)]
    pub segment: NetworkSegment,
}

impl LogicalNetwork {
    pub fn new(
        id: impl Into<String>,
        physical_network: Option<&str>,
        network_type: NetworkType,
        segmentation_id: Option<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            segment: NetworkSegment {
                physical_network: physical_network.map(str::to_string),
                network_type,
                segmentation_id,
            },
        }
    }

    pub fn physical_network(&self) -> Option<&str> {
        self.segment.physical_network.as_deref()
    }

    pub fn network_type(&self) -> &NetworkType {
        &self.segment.network_type
    }
}

/// One `local_link_information` entry of a binding profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalLinkInformation {
    /// Object, or an object serialized as a JSON string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_info: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `binding:profile` of a port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingProfile {
    #[serde(default)]
    pub local_link_information: Vec<LocalLinkInformation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_vnic_type() -> VnicType {
    VnicType::Normal
}

/// A port as seen by the SDN plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdnPort {
    pub id: String,
    pub network_id: String,
    pub mac_address: MacAddress,
    #[serde(rename = "binding:vnic_type", default = "default_vnic_type")]
    pub vnic_type: VnicType,
    #[serde(rename = "binding:profile", default, skip_serializing_if = "Option::is_none")]
    pub binding_profile: Option<BindingProfile>,
}

impl SdnPort {
    /// Returns true if the port carries any local link information.
    pub fn has_binding_profile(&self) -> bool {
        self.binding_profile
            .as_ref()
            .map(|p| !p.local_link_information.is_empty())
            .unwrap_or(false)
    }
}

/// Validated `switch_info` of a baremetal port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchInfo {
    pub server_hardware_id: String,
    pub bootable: bool,
}

/// Parses a boolean the way operators tend to write it.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "on" | "y" | "yes" => Some(true),
        "0" | "f" | "false" | "off" | "n" | "no" => Some(false),
        _ => None,
    }
}

impl SwitchInfo {
    /// Extracts and validates the switch info of a port.
    ///
    /// The binding profile must carry exactly one local link information
    /// entry whose `switch_info` holds a non-empty `server_hardware_id` and a
    /// boolean (or boolean string) `bootable`.
    pub fn from_port(port: &SdnPort) -> SyncResult<Self> {
        let malformed = |reason: &str| SyncError::malformed_port(&port.id, reason);

        let links = port
            .binding_profile
            .as_ref()
            .map(|p| p.local_link_information.as_slice())
            .unwrap_or_default();
        let link = match links {
            [] => return Err(malformed("missing local_link_information")),
            [link] => link,
            _ => return Err(malformed("local_link_information must have only one value")),
        };

        let parsed;
        let info = match &link.switch_info {
            None | Some(Value::Null) => {
                return Err(malformed("local_link_information must contain switch_info"))
            }
            Some(Value::String(raw)) => {
                parsed = serde_json::from_str::<Value>(raw)
                    .map_err(|e| malformed(&format!("switch_info is not valid JSON: {}", e)))?;
                &parsed
            }
            Some(value) => value,
        };
        let info = info
            .as_object()
            .ok_or_else(|| malformed("switch_info must be an object"))?;

        let server_hardware_id = info
            .get("server_hardware_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed("switch_info must contain server_hardware_id"))?
            .to_string();

        let bootable = match info.get("bootable") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                parse_bool_str(s).ok_or_else(|| malformed("bootable must be a boolean"))?
            }
            Some(_) => return Err(malformed("bootable must be a boolean")),
            None => return Err(malformed("switch_info must contain bootable")),
        };

        Ok(Self {
            server_hardware_id,
            bootable,
        })
    }
}
