//! Common types shared by the fabric synchronization crates.
//!
//! This crate provides type-safe representations of the primitives that
//! cross the boundary between the SDN plane and the fabric backend:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses, compared by value
//! - [`VlanId`]: IEEE 802.1Q segmentation identifiers
//! - [`NetworkType`]: SDN logical network types (flat, vlan, vxlan)
//! - [`EthernetNetworkType`]: fabric ethernet types (tagged, untagged)
//! - [`BootPriority`]: server profile connection boot hints
//! - [`PowerState`]: server hardware power states
//! - [`uri`]: fabric resource URI helpers

mod boot;
mod mac;
mod network;
pub mod uri;
mod vlan;

pub use boot::{BootPriority, PowerState};
pub use mac::MacAddress;
pub use network::{EthernetNetworkType, NetworkType, VnicType};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid ethernet network type: {0}")]
    InvalidEthernetNetworkType(String),

    #[error("invalid boot priority: {0}")]
    InvalidBootPriority(String),
}
