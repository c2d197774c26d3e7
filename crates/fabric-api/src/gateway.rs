//! The fabric gateway contract.

use async_trait::async_trait;
use fabric_types::PowerState;
use std::sync::Arc;

use crate::error::FabricResult;
use crate::models::{
    EthernetNetwork, Interconnect, NewEthernetNetwork, ServerHardware, ServerProfile, UplinkGroup,
    UplinkSet,
};

/// Calls the reconciler makes against the fabric backend.
///
/// Every resource argument accepts either a bare id or a full resource URI.
/// Writes are whole-resource read-modify-write; the backend is the only
/// arbiter of concurrent updates.
#[async_trait]
pub trait FabricGateway: Send + Sync {
    async fn create_ethernet_network(
        &self,
        network: &NewEthernetNetwork,
    ) -> FabricResult<EthernetNetwork>;

    async fn get_ethernet_network(&self, id_or_uri: &str) -> FabricResult<EthernetNetwork>;

    async fn list_ethernet_networks(&self) -> FabricResult<Vec<EthernetNetwork>>;

    async fn delete_ethernet_network(&self, id_or_uri: &str) -> FabricResult<()>;

    /// Returns the URIs of the live uplinksets carrying the network.
    async fn get_associated_uplink_groups(
        &self,
        network_id_or_uri: &str,
    ) -> FabricResult<Vec<String>>;

    async fn get_uplink_set(&self, id_or_uri: &str) -> FabricResult<UplinkSet>;

    /// Returns every live uplinkset with the given name, across interconnects.
    async fn list_uplink_sets_by_name(&self, name: &str) -> FabricResult<Vec<UplinkSet>>;

    /// Attaches a network to a live uplinkset. Attaching twice is a no-op.
    async fn add_network_to_uplink_set(&self, uplink_set: &str, network: &str) -> FabricResult<()>;

    /// Detaches a network from a live uplinkset. Detaching a missing network
    /// is a no-op.
    async fn remove_network_from_uplink_set(
        &self,
        uplink_set: &str,
        network: &str,
    ) -> FabricResult<()>;

    async fn get_uplink_group(&self, id_or_uri: &str) -> FabricResult<UplinkGroup>;

    async fn update_uplink_group(&self, group: &UplinkGroup) -> FabricResult<UplinkGroup>;

    async fn get_interconnect(&self, id_or_uri: &str) -> FabricResult<Interconnect>;

    async fn get_server_hardware(&self, id_or_uri: &str) -> FabricResult<ServerHardware>;

    async fn update_power_state(&self, id_or_uri: &str, state: PowerState) -> FabricResult<()>;

    async fn get_server_profile(&self, id_or_uri: &str) -> FabricResult<ServerProfile>;

    async fn update_server_profile(&self, profile: &ServerProfile) -> FabricResult<ServerProfile>;
}

/// Shared gateway handle used by the reconcilers.
pub type SharedFabricGateway = Arc<dyn FabricGateway>;
