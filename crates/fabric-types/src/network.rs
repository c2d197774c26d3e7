//! Logical (SDN) and physical (fabric) network classifications.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network type of an SDN network segment (`provider:network_type`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkType {
    /// Untagged provider network.
    Flat,
    /// 802.1Q tagged provider network.
    Vlan,
    /// VXLAN overlay network; carried tagged on the fabric.
    Vxlan,
    /// Any other segment type; never mapped onto the fabric.
    Other(String),
}

impl NetworkType {
    /// Returns the SDN-plane name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            NetworkType::Flat => "flat",
            NetworkType::Vlan => "vlan",
            NetworkType::Vxlan => "vxlan",
            NetworkType::Other(s) => s,
        }
    }

    /// Returns the fabric ethernet type used to look this type up in the
    /// uplinkset mappings, or `None` for types that are never mapped.
    pub fn ethernet_type(&self) -> Option<EthernetNetworkType> {
        match self {
            NetworkType::Flat => Some(EthernetNetworkType::Untagged),
            NetworkType::Vlan | NetworkType::Vxlan => Some(EthernetNetworkType::Tagged),
            NetworkType::Other(_) => None,
        }
    }
}

impl From<String> for NetworkType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "flat" => NetworkType::Flat,
            "vlan" => NetworkType::Vlan,
            "vxlan" => NetworkType::Vxlan,
            _ => NetworkType::Other(s),
        }
    }
}

impl From<&str> for NetworkType {
    fn from(s: &str) -> Self {
        NetworkType::from(s.to_string())
    }
}

impl From<NetworkType> for String {
    fn from(t: NetworkType) -> String {
        t.as_str().to_string()
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ethernet type of a fabric network or uplinkset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EthernetNetworkType {
    Tagged,
    Untagged,
}

impl EthernetNetworkType {
    /// Returns the backend spelling (`Tagged` / `Untagged`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            EthernetNetworkType::Tagged => "Tagged",
            EthernetNetworkType::Untagged => "Untagged",
        }
    }
}

impl fmt::Display for EthernetNetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EthernetNetworkType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tagged" => Ok(EthernetNetworkType::Tagged),
            "untagged" => Ok(EthernetNetworkType::Untagged),
            _ => Err(ParseError::InvalidEthernetNetworkType(s.to_string())),
        }
    }
}

/// VNIC type of an SDN port (`binding:vnic_type`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VnicType {
    Normal,
    Baremetal,
    Other(String),
}

impl VnicType {
    /// Returns the SDN-plane name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            VnicType::Normal => "normal",
            VnicType::Baremetal => "baremetal",
            VnicType::Other(s) => s,
        }
    }

    /// Returns true for ports backed by a physical server NIC.
    pub fn is_baremetal(&self) -> bool {
        matches!(self, VnicType::Baremetal)
    }
}

impl From<String> for VnicType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "normal" => VnicType::Normal,
            "baremetal" => VnicType::Baremetal,
            _ => VnicType::Other(s),
        }
    }
}

impl From<&str> for VnicType {
    fn from(s: &str) -> Self {
        VnicType::from(s.to_string())
    }
}

impl From<VnicType> for String {
    fn from(t: VnicType) -> String {
        t.as_str().to_string()
    }
}

impl fmt::Display for VnicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
