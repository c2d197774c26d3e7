//! In-memory fabric backend.
//!
//! [`FakeFabric`] implements [`FabricGateway`] over plain maps, records every
//! call, and enforces the backend rules the engine depends on:
//!
//! - profile writes are rejected while the hardware is powered on or
//!   power-locked
//! - deleting a network detaches it from every uplinkset
//! - missing resources answer `NotFound`
//!
//! `powerLock` and profile state can be scripted per resource; each read of
//! the resource consumes the next scripted value.

use async_trait::async_trait;
use fabric_api::models::{
    DeviceSlot, EthernetNetwork, Interconnect, NewEthernetNetwork, PhysicalPort,
    PortMap, ProfileState, ServerHardware, ServerProfile, UplinkGroup, UplinkGroupUplinkSet,
    UplinkSet, VirtualPort,
};
use fabric_api::{FabricError, FabricGateway, FabricResult};
use fabric_types::uri::{
    id_from_uri, network_uri_from_id, resource_uri, INTERCONNECTS, SERVER_HARDWARE,
    SERVER_PROFILES, UPLINK_GROUPS, UPLINK_SETS,
};
use fabric_types::{EthernetNetworkType, PowerState};
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// A recorded gateway call. Resource arguments are normalized to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FabricCall {
    CreateNetwork { name: String },
    GetNetwork(String),
    ListNetworks,
    DeleteNetwork(String),
    GetAssociatedUplinkGroups(String),
    GetUplinkSet(String),
    ListUplinkSetsByName(String),
    AddNetworkToUplinkSet { uplink_set: String, network: String },
    RemoveNetworkFromUplinkSet { uplink_set: String, network: String },
    GetUplinkGroup(String),
    UpdateUplinkGroup(String),
    GetInterconnect(String),
    GetServerHardware(String),
    UpdatePowerState { hardware: String, state: PowerState },
    GetServerProfile(String),
    UpdateServerProfile(String),
}

impl FabricCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            FabricCall::CreateNetwork { .. }
                | FabricCall::DeleteNetwork(_)
                | FabricCall::AddNetworkToUplinkSet { .. }
                | FabricCall::RemoveNetworkFromUplinkSet { .. }
                | FabricCall::UpdateUplinkGroup(_)
                | FabricCall::UpdatePowerState { .. }
                | FabricCall::UpdateServerProfile(_)
        )
    }
}

/// Error kinds that can be injected into calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    NotFound,
    Conflict,
    Server,
    BadRequest,
}

impl InjectedFailure {
    fn to_error(self, resource: &str) -> FabricError {
        match self {
            InjectedFailure::NotFound => FabricError::not_found(resource),
            InjectedFailure::Conflict => FabricError::conflict(resource, "injected conflict"),
            InjectedFailure::Server => FabricError::server(resource, 500, "injected failure"),
            InjectedFailure::BadRequest => {
                FabricError::from_status(400, resource, "injected bad request")
            }
        }
    }
}

type CallMatcher = Box<dyn Fn(&FabricCall) -> bool + Send>;

struct FailureRule {
    matches: CallMatcher,
    failure: InjectedFailure,
    /// Remaining triggers; `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Default)]
struct FakeState {
    networks: BTreeMap<String, EthernetNetwork>,
    uplink_sets: BTreeMap<String, UplinkSet>,
    uplink_groups: BTreeMap<String, UplinkGroup>,
    interconnects: BTreeMap<String, Interconnect>,
    hardware: BTreeMap<String, ServerHardware>,
    profiles: BTreeMap<String, ServerProfile>,
    power_lock_script: HashMap<String, VecDeque<bool>>,
    profile_state_script: HashMap<String, VecDeque<ProfileState>>,
    failures: Vec<FailureRule>,
    calls: Vec<FabricCall>,
    next_id: u64,
}

impl FakeState {
    fn record(&mut self, call: FabricCall, resource: &str) -> FabricResult<()> {
        debug!("fake fabric: {:?}", call);
        let mut injected = None;
        for rule in self.failures.iter_mut() {
            if rule.remaining != Some(0) && (rule.matches)(&call) {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                injected = Some(rule.failure);
                break;
            }
        }
        self.calls.push(call);
        match injected {
            Some(failure) => Err(failure.to_error(resource)),
            None => Ok(()),
        }
    }

    fn alloc_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory [`FabricGateway`] double.
#[derive(Default)]
pub struct FakeFabric {
    state: Mutex<FakeState>,
}

impl FakeFabric {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Topology setup ───────────────────────────────────────────────

    /// Adds an uplink-group template with the given uplinksets.
    pub fn add_uplink_group(&self, id: &str, uplink_sets: &[(&str, EthernetNetworkType)]) {
        let group = UplinkGroup {
            uri: resource_uri(UPLINK_GROUPS, id),
            name: id.to_string(),
            uplink_sets: uplink_sets
                .iter()
                .map(|(name, ty)| UplinkGroupUplinkSet {
                    name: name.to_string(),
                    ethernet_network_type: Some(*ty),
                    network_uris: Vec::new(),
                    extra: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        };
        self.state.lock().uplink_groups.insert(id.to_string(), group);
    }

    /// Adds an interconnect deployed from `group_id`.
    pub fn add_interconnect(&self, id: &str, group_id: &str) {
        let ic = Interconnect {
            uri: resource_uri(INTERCONNECTS, id),
            logical_interconnect_group_uri: Some(resource_uri(UPLINK_GROUPS, group_id)),
            extra: Map::new(),
        };
        self.state.lock().interconnects.insert(id.to_string(), ic);
    }

    /// Adds a live uplinkset on an interconnect.
    pub fn add_uplink_set(
        &self,
        id: &str,
        name: &str,
        ty: EthernetNetworkType,
        interconnect_id: &str,
    ) {
        let us = UplinkSet {
            uri: resource_uri(UPLINK_SETS, id),
            name: name.to_string(),
            network_uris: Vec::new(),
            ethernet_network_type: Some(ty),
            logical_interconnect_uri: Some(resource_uri(INTERCONNECTS, interconnect_id)),
            extra: Map::new(),
        };
        self.state.lock().uplink_sets.insert(id.to_string(), us);
    }

    /// Adds an existing ethernet network.
    pub fn add_network(&self, id: &str, name: &str, vlan_id: Option<u16>) {
        let ty = if vlan_id.is_some() {
            EthernetNetworkType::Tagged
        } else {
            EthernetNetworkType::Untagged
        };
        let net = EthernetNetwork {
            uri: network_uri_from_id(id),
            name: name.to_string(),
            ethernet_network_type: Some(ty),
            vlan_id,
            extra: Map::new(),
        };
        self.state.lock().networks.insert(id.to_string(), net);
    }

    /// Attaches a network directly, bypassing call recording.
    pub fn attach_network(&self, uplink_set_id: &str, network_id: &str) {
        if let Some(us) = self.state.lock().uplink_sets.get_mut(uplink_set_id) {
            us.network_uris.push(network_uri_from_id(network_id));
        }
    }

    /// Attaches a network to a template uplinkset, bypassing call recording.
    pub fn attach_network_to_group(&self, group_id: &str, uplink_set_name: &str, network_id: &str) {
        if let Some(group) = self.state.lock().uplink_groups.get_mut(group_id) {
            if let Some(us) = group.uplink_set_mut(uplink_set_name) {
                us.network_uris.push(network_uri_from_id(network_id));
            }
        }
    }

    /// Adds server hardware with an assigned profile.
    ///
    /// `ports` lists `(location, slot, physical port, function, mac)`.
    pub fn add_server(
        &self,
        hardware_id: &str,
        profile_id: &str,
        power_state: PowerState,
        ports: &[(&str, u32, u32, &str, &str)],
    ) {
        let mut slots: Vec<DeviceSlot> = Vec::new();
        for (location, slot_number, port_number, function, mac) in ports {
            let idx = match slots
                .iter()
                .position(|s| s.location == *location && s.slot_number == *slot_number)
            {
                Some(idx) => idx,
                None => {
                    slots.push(DeviceSlot {
                        location: location.to_string(),
                        slot_number: *slot_number,
                        physical_ports: Vec::new(),
                    });
                    slots.len() - 1
                }
            };
            let slot = &mut slots[idx];
            let vport = VirtualPort {
                mac: Some(mac.to_uppercase()),
                port_function: function.to_string(),
            };
            match slot
                .physical_ports
                .iter_mut()
                .find(|p| p.port_number == *port_number)
            {
                Some(port) => port.virtual_ports.push(vport),
                None => slot.physical_ports.push(PhysicalPort {
                    port_number: *port_number,
                    virtual_ports: vec![vport],
                }),
            }
        }

        let hw = ServerHardware {
            uri: resource_uri(SERVER_HARDWARE, hardware_id),
            uuid: Some(hardware_id.to_string()),
            power_state,
            power_lock: false,
            server_profile_uri: Some(resource_uri(SERVER_PROFILES, profile_id)),
            port_map: PortMap { device_slots: slots },
            extra: Map::new(),
        };
        let profile = ServerProfile {
            uri: resource_uri(SERVER_PROFILES, profile_id),
            name: format!("profile {}", hardware_id),
            state: ProfileState::Normal,
            status: Some("OK".to_string()),
            server_hardware_uri: Some(hw.uri.clone()),
            connections: Vec::new(),
            extra: Map::new(),
        };

        let mut state = self.state.lock();
        state.hardware.insert(hardware_id.to_string(), hw);
        state.profiles.insert(profile_id.to_string(), profile);
    }

    pub fn set_power_lock(&self, hardware_id: &str, locked: bool) {
        if let Some(hw) = self.state.lock().hardware.get_mut(hardware_id) {
            hw.power_lock = locked;
        }
    }

    /// Each hardware read consumes one value of `sequence` as `powerLock`.
    pub fn script_power_lock(&self, hardware_id: &str, sequence: &[bool]) {
        self.state
            .lock()
            .power_lock_script
            .insert(hardware_id.to_string(), sequence.iter().copied().collect());
    }

    /// Each profile read consumes one value of `sequence` as `state`.
    pub fn script_profile_state(&self, profile_id: &str, sequence: &[ProfileState]) {
        self.state
            .lock()
            .profile_state_script
            .insert(profile_id.to_string(), sequence.iter().copied().collect());
    }

    /// Fails calls matching `matches` with `failure`, `times` times
    /// (`None` = forever).
    pub fn fail_when<F>(&self, matches: F, failure: InjectedFailure, times: Option<u32>)
    where
        F: Fn(&FabricCall) -> bool + Send + 'static,
    {
        self.state.lock().failures.push(FailureRule {
            matches: Box::new(matches),
            failure,
            remaining: times,
        });
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<FabricCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count_calls<F: Fn(&FabricCall) -> bool>(&self, pred: F) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn network(&self, id: &str) -> Option<EthernetNetwork> {
        self.state.lock().networks.get(id).cloned()
    }

    pub fn networks(&self) -> Vec<EthernetNetwork> {
        self.state.lock().networks.values().cloned().collect()
    }

    pub fn network_by_name(&self, name: &str) -> Option<EthernetNetwork> {
        self.state
            .lock()
            .networks
            .values()
            .find(|n| n.name == name)
            .cloned()
    }

    pub fn uplink_set(&self, id: &str) -> Option<UplinkSet> {
        self.state.lock().uplink_sets.get(id).cloned()
    }

    pub fn uplink_group(&self, id: &str) -> Option<UplinkGroup> {
        self.state.lock().uplink_groups.get(id).cloned()
    }

    pub fn hardware(&self, id: &str) -> Option<ServerHardware> {
        self.state.lock().hardware.get(id).cloned()
    }

    pub fn profile(&self, id: &str) -> Option<ServerProfile> {
        self.state.lock().profiles.get(id).cloned()
    }
}

fn missing(collection: &str, id: &str) -> FabricError {
    FabricError::not_found(resource_uri(collection, id))
}

#[async_trait]
impl FabricGateway for FakeFabric {
    async fn create_ethernet_network(
        &self,
        network: &NewEthernetNetwork,
    ) -> FabricResult<EthernetNetwork> {
        let mut state = self.state.lock();
        state.record(
            FabricCall::CreateNetwork {
                name: network.name.clone(),
            },
            &network.name,
        )?;
        let id = state.alloc_id("eth");
        let created = EthernetNetwork {
            uri: network_uri_from_id(&id),
            name: network.name.clone(),
            ethernet_network_type: Some(network.ethernet_network_type),
            vlan_id: network.vlan_id,
            extra: Map::new(),
        };
        state.networks.insert(id, created.clone());
        Ok(created)
    }

    async fn get_ethernet_network(&self, id_or_uri: &str) -> FabricResult<EthernetNetwork> {
        let id = id_from_uri(id_or_uri);
        let mut state = self.state.lock();
        state.record(FabricCall::GetNetwork(id.to_string()), id_or_uri)?;
        state
            .networks
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::not_found(network_uri_from_id(id)))
    }

    async fn list_ethernet_networks(&self) -> FabricResult<Vec<EthernetNetwork>> {
        let mut state = self.state.lock();
        state.record(FabricCall::ListNetworks, "ethernet-networks")?;
        Ok(state.networks.values().cloned().collect())
    }

    async fn delete_ethernet_network(&self, id_or_uri: &str) -> FabricResult<()> {
        let id = id_from_uri(id_or_uri);
        let mut state = self.state.lock();
        state.record(FabricCall::DeleteNetwork(id.to_string()), id_or_uri)?;
        if state.networks.remove(id).is_none() {
            return Err(FabricError::not_found(network_uri_from_id(id)));
        }
        for us in state.uplink_sets.values_mut() {
            us.network_uris.retain(|u| id_from_uri(u) != id);
        }
        for group in state.uplink_groups.values_mut() {
            for us in group.uplink_sets.iter_mut() {
                us.network_uris.retain(|u| id_from_uri(u) != id);
            }
        }
        Ok(())
    }

    async fn get_associated_uplink_groups(
        &self,
        network_id_or_uri: &str,
    ) -> FabricResult<Vec<String>> {
        let id = id_from_uri(network_id_or_uri);
        let mut state = self.state.lock();
        state.record(
            FabricCall::GetAssociatedUplinkGroups(id.to_string()),
            network_id_or_uri,
        )?;
        if !state.networks.contains_key(id) {
            return Err(FabricError::not_found(network_uri_from_id(id)));
        }
        Ok(state
            .uplink_sets
            .values()
            .filter(|us| us.carries(id))
            .map(|us| us.uri.clone())
            .collect())
    }

    async fn get_uplink_set(&self, id_or_uri: &str) -> FabricResult<UplinkSet> {
        let id = id_from_uri(id_or_uri);
        let mut state = self.state.lock();
        state.record(FabricCall::GetUplinkSet(id.to_string()), id_or_uri)?;
        state
            .uplink_sets
            .get(id)
            .cloned()
            .ok_or_else(|| missing(UPLINK_SETS, id))
    }

    async fn list_uplink_sets_by_name(&self, name: &str) -> FabricResult<Vec<UplinkSet>> {
        let mut state = self.state.lock();
        state.record(FabricCall::ListUplinkSetsByName(name.to_string()), name)?;
        Ok(state
            .uplink_sets
            .values()
            .filter(|us| us.name == name)
            .cloned()
            .collect())
    }

    async fn add_network_to_uplink_set(&self, uplink_set: &str, network: &str) -> FabricResult<()> {
        let us_id = id_from_uri(uplink_set);
        let net_id = id_from_uri(network);
        let mut state = self.state.lock();
        state.record(
            FabricCall::AddNetworkToUplinkSet {
                uplink_set: us_id.to_string(),
                network: net_id.to_string(),
            },
            uplink_set,
        )?;
        if !state.networks.contains_key(net_id) {
            return Err(FabricError::not_found(network_uri_from_id(net_id)));
        }
        let us = state
            .uplink_sets
            .get_mut(us_id)
            .ok_or_else(|| missing(UPLINK_SETS, us_id))?;
        if !us.carries(net_id) {
            us.network_uris.push(network_uri_from_id(net_id));
        }
        Ok(())
    }

    async fn remove_network_from_uplink_set(
        &self,
        uplink_set: &str,
        network: &str,
    ) -> FabricResult<()> {
        let us_id = id_from_uri(uplink_set);
        let net_id = id_from_uri(network);
        let mut state = self.state.lock();
        state.record(
            FabricCall::RemoveNetworkFromUplinkSet {
                uplink_set: us_id.to_string(),
                network: net_id.to_string(),
            },
            uplink_set,
        )?;
        let us = state
            .uplink_sets
            .get_mut(us_id)
            .ok_or_else(|| missing(UPLINK_SETS, us_id))?;
        us.network_uris.retain(|u| id_from_uri(u) != net_id);
        Ok(())
    }

    async fn get_uplink_group(&self, id_or_uri: &str) -> FabricResult<UplinkGroup> {
        let id = id_from_uri(id_or_uri);
        let mut state = self.state.lock();
        state.record(FabricCall::GetUplinkGroup(id.to_string()), id_or_uri)?;
        state
            .uplink_groups
            .get(id)
            .cloned()
            .ok_or_else(|| missing(UPLINK_GROUPS, id))
    }

    async fn update_uplink_group(&self, group: &UplinkGroup) -> FabricResult<UplinkGroup> {
        let id = group.id().to_string();
        let mut state = self.state.lock();
        state.record(FabricCall::UpdateUplinkGroup(id.clone()), &group.uri)?;
        if !state.uplink_groups.contains_key(&id) {
            return Err(missing(UPLINK_GROUPS, &id));
        }
        state.uplink_groups.insert(id, group.clone());
        Ok(group.clone())
    }

    async fn get_interconnect(&self, id_or_uri: &str) -> FabricResult<Interconnect> {
        let id = id_from_uri(id_or_uri);
        let mut state = self.state.lock();
        state.record(FabricCall::GetInterconnect(id.to_string()), id_or_uri)?;
        state
            .interconnects
            .get(id)
            .cloned()
            .ok_or_else(|| missing(INTERCONNECTS, id))
    }

    async fn get_server_hardware(&self, id_or_uri: &str) -> FabricResult<ServerHardware> {
        let id = id_from_uri(id_or_uri).to_string();
        let mut state = self.state.lock();
        state.record(FabricCall::GetServerHardware(id.clone()), id_or_uri)?;
        let next_lock = state
            .power_lock_script
            .get_mut(&id)
            .and_then(|script| script.pop_front());
        let hw = state
            .hardware
            .get_mut(&id)
            .ok_or_else(|| missing(SERVER_HARDWARE, &id))?;
        if let Some(locked) = next_lock {
            hw.power_lock = locked;
        }
        Ok(hw.clone())
    }

    async fn update_power_state(&self, id_or_uri: &str, power: PowerState) -> FabricResult<()> {
        let id = id_from_uri(id_or_uri).to_string();
        let mut state = self.state.lock();
        state.record(
            FabricCall::UpdatePowerState {
                hardware: id.clone(),
                state: power,
            },
            id_or_uri,
        )?;
        let hw = state
            .hardware
            .get_mut(&id)
            .ok_or_else(|| missing(SERVER_HARDWARE, &id))?;
        hw.power_state = power;
        Ok(())
    }

    async fn get_server_profile(&self, id_or_uri: &str) -> FabricResult<ServerProfile> {
        let id = id_from_uri(id_or_uri).to_string();
        let mut state = self.state.lock();
        state.record(FabricCall::GetServerProfile(id.clone()), id_or_uri)?;
        let next_state = state
            .profile_state_script
            .get_mut(&id)
            .and_then(|script| script.pop_front());
        let profile = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| missing(SERVER_PROFILES, &id))?;
        if let Some(s) = next_state {
            profile.state = s;
        }
        Ok(profile.clone())
    }

    async fn update_server_profile(&self, profile: &ServerProfile) -> FabricResult<ServerProfile> {
        let id = id_from_uri(&profile.uri).to_string();
        let mut state = self.state.lock();
        state.record(FabricCall::UpdateServerProfile(id.clone()), &profile.uri)?;

        let stored = state
            .profiles
            .get(&id)
            .ok_or_else(|| missing(SERVER_PROFILES, &id))?;
        if stored.is_busy() {
            return Err(FabricError::conflict(&profile.uri, "profile is being applied"));
        }
        let hw_id = stored
            .server_hardware_uri
            .as_deref()
            .map(|u| id_from_uri(u).to_string());
        if let Some(hw) = hw_id.as_deref().and_then(|id| state.hardware.get(id)) {
            if hw.power_lock {
                return Err(FabricError::conflict(&profile.uri, "server hardware is power locked"));
            }
            if hw.power_state != PowerState::Off {
                return Err(FabricError::from_status(
                    400,
                    &profile.uri,
                    "server hardware must be powered off",
                ));
            }
        }

        let mut updated = profile.clone();
        let mut next_conn_id = updated
            .connections
            .iter()
            .filter_map(|c| c.id)
            .max()
            .unwrap_or(0);
        for conn in updated.connections.iter_mut() {
            if conn.id.is_none() {
                next_conn_id += 1;
                conn.id = Some(next_conn_id);
            }
        }
        state.profiles.insert(id, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn server_fabric() -> FakeFabric {
        let fabric = FakeFabric::new();
        fabric.add_server(
            "sh-1",
            "sp-1",
            PowerState::On,
            &[("Flb", 1, 1, "a", "aa:bb:cc:00:00:01")],
        );
        fabric
    }

    #[tokio::test]
    async fn test_profile_write_rejected_while_powered_on() {
        let fabric = server_fabric();
        let profile = fabric.get_server_profile("sp-1").await.unwrap();
        assert!(fabric.update_server_profile(&profile).await.is_err());

        fabric.update_power_state("sh-1", PowerState::Off).await.unwrap();
        assert!(fabric.update_server_profile(&profile).await.is_ok());
    }

    #[tokio::test]
    async fn test_profile_write_rejected_while_locked() {
        let fabric = server_fabric();
        fabric.update_power_state("sh-1", PowerState::Off).await.unwrap();
        fabric.set_power_lock("sh-1", true);
        let profile = fabric.get_server_profile("sp-1").await.unwrap();
        let err = fabric.update_server_profile(&profile).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_scripted_power_lock() {
        let fabric = server_fabric();
        fabric.script_power_lock("sh-1", &[true, false]);
        assert!(fabric.get_server_hardware("sh-1").await.unwrap().power_lock);
        assert!(!fabric.get_server_hardware("sh-1").await.unwrap().power_lock);
        assert!(!fabric.get_server_hardware("sh-1").await.unwrap().power_lock);
    }

    #[tokio::test]
    async fn test_delete_network_detaches_everywhere() {
        let fabric = FakeFabric::new();
        fabric.add_uplink_group("lig-1", &[("up", EthernetNetworkType::Tagged)]);
        fabric.add_interconnect("li-1", "lig-1");
        fabric.add_uplink_set("us-1", "up", EthernetNetworkType::Tagged, "li-1");
        fabric.add_network("n1", "Neutron [x]", Some(10));
        fabric.attach_network("us-1", "n1");
        fabric.attach_network_to_group("lig-1", "up", "n1");

        assert_eq!(
            fabric.get_associated_uplink_groups("n1").await.unwrap(),
            vec!["/rest/uplink-sets/us-1".to_string()]
        );
        fabric.delete_ethernet_network("n1").await.unwrap();
        assert!(fabric.uplink_set("us-1").unwrap().network_uris.is_empty());
        assert!(fabric.uplink_group("lig-1").unwrap().uplink_sets[0]
            .network_uris
            .is_empty());
        assert!(fabric.delete_ethernet_network("n1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fabric = FakeFabric::new();
        fabric.fail_when(
            |c| matches!(c, FabricCall::ListNetworks),
            InjectedFailure::Server,
            Some(1),
        );
        assert!(fabric.list_ethernet_networks().await.is_err());
        assert!(fabric.list_ethernet_networks().await.is_ok());
        assert_eq!(fabric.count_calls(|c| matches!(c, FabricCall::ListNetworks)), 2);
    }
}
