//! PortReconciler - server profile connections for baremetal ports
//!
//! Every profile write goes through [`PortReconciler::mutate_profile`]:
//! 1. wait until the profile is not being applied
//! 2. wait until the hardware reports no power lock
//! 3. re-read both; if either wait no longer holds, start over
//! 4. snapshot the power state and power the server off
//! 5. write the whole profile
//! 6. restore the snapshotted power state, even if the write failed
//!
//! The backend rejects profile writes on powered hardware.

use fabric_api::models::{ServerHardware, ServerProfile};
use fabric_api::SharedFabricGateway;
use fabric_sync_common::{
    poll_until, NetworkBinding, PollPolicy, SdnPort, StateStore, SwitchInfo, SyncError, SyncResult,
};
use fabric_types::uri::network_uri_from_id;
use fabric_types::PowerState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::mapping::ResolvedMappings;
use crate::profile;

/// Wait policies of the power protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPolicy {
    /// Wait for the profile to leave a transitional state.
    pub profile: PollPolicy,
    /// Wait for the hardware power lock to clear.
    pub power_lock: PollPolicy,
}

impl Default for PowerPolicy {
    fn default() -> Self {
        Self {
            profile: PollPolicy::unbounded(Duration::from_secs(5)),
            power_lock: PollPolicy::unbounded(Duration::from_secs(30)),
        }
    }
}

/// A port that passed the reflection checks.
#[derive(Debug, Clone)]
struct PortTarget {
    switch_info: SwitchInfo,
    binding: NetworkBinding,
}

/// Creates, deletes and repairs server profile connections.
pub struct PortReconciler {
    gateway: SharedFabricGateway,
    store: Arc<dyn StateStore>,
    mappings: Arc<ResolvedMappings>,
    policy: PowerPolicy,
}

impl PortReconciler {
    pub fn new(
        gateway: SharedFabricGateway,
        store: Arc<dyn StateStore>,
        mappings: Arc<ResolvedMappings>,
        policy: PowerPolicy,
    ) -> Self {
        Self {
            gateway,
            store,
            mappings,
            policy,
        }
    }

    /// Whether the port's network still resolves to a mapping. A network
    /// whose physnet was unmapped keeps its binding until the next pass
    /// deletes it; no new connections are made to it meanwhile.
    async fn network_is_mapped(&self, port: &SdnPort) -> SyncResult<bool> {
        let Some(network) = self.store.get_network(&port.network_id).await? else {
            info!("Port {} is on unknown network {}", port.id, port.network_id);
            return Ok(false);
        };
        if !self
            .mappings
            .is_mapped(network.physical_network(), network.network_type())
        {
            info!("Port {} is on unmapped network {}", port.id, network.id);
            return Ok(false);
        }
        Ok(true)
    }

    /// Checks that a port should be reflected on the fabric.
    ///
    /// Non-baremetal ports, ports on unbound networks and ports with
    /// malformed local link information are skipped (`None`); the skip is
    /// logged, not returned as an error.
    async fn target(&self, port: &SdnPort) -> SyncResult<Option<PortTarget>> {
        if !port.vnic_type.is_baremetal() {
            debug!("Port {} is {}, not baremetal", port.id, port.vnic_type.as_str());
            return Ok(None);
        }
        let binding = match self.store.get_network_binding(&port.network_id).await? {
            Some(binding) => binding,
            None => {
                info!("Port {} is on unbound network {}", port.id, port.network_id);
                return Ok(None);
            }
        };
        match Self::switch_info(port) {
            Some(switch_info) => Ok(Some(PortTarget {
                switch_info,
                binding,
            })),
            None => Ok(None),
        }
    }

    fn switch_info(port: &SdnPort) -> Option<SwitchInfo> {
        match SwitchInfo::from_port(port) {
            Ok(info) => Some(info),
            Err(e) => {
                info!("Port not valid to reflect on the fabric: {}", e);
                None
            }
        }
    }

    /// Adds (or refreshes) the port's connection on its server profile.
    #[instrument(skip(self, port), fields(port = %port.id, mac = %port.mac_address))]
    pub async fn create(&self, port: &SdnPort) -> SyncResult<()> {
        let Some(target) = self.target(port).await? else {
            return Ok(());
        };
        if !self.network_is_mapped(port).await? {
            return Ok(());
        }
        let network_uri = network_uri_from_id(&target.binding.fabric_network_id);
        let mac = port.mac_address;
        let bootable = target.switch_info.bootable;

        let changed = self
            .mutate_profile(&target.switch_info.server_hardware_id, |hardware, edited| {
                let port_id = profile::derive_port_id(hardware, &mac).ok_or_else(|| {
                    SyncError::malformed_port(
                        &port.id,
                        format!("MAC {} not found on server hardware {}", mac, hardware.id()),
                    )
                })?;
                Ok(profile::upsert_connection(
                    edited,
                    &mac,
                    &port_id,
                    &network_uri,
                    bootable,
                ))
            })
            .await?;
        if changed {
            info!("Connected port {} to {}", port.id, network_uri);
        } else {
            debug!("Connection for port {} is up to date", port.id);
        }
        Ok(())
    }

    /// Removes the port's connection from its server profile.
    #[instrument(skip(self, port), fields(port = %port.id, mac = %port.mac_address))]
    pub async fn delete(&self, port: &SdnPort) -> SyncResult<()> {
        if self.target(port).await?.is_none() {
            return Ok(());
        }
        self.remove_connection(port).await
    }

    /// Removes the port's connection without checking the network binding.
    /// Used when tearing down a network that is being unbound.
    pub async fn remove_connection(&self, port: &SdnPort) -> SyncResult<()> {
        let Some(switch_info) = Self::switch_info(port) else {
            return Ok(());
        };
        let mac = port.mac_address;
        let removed = self
            .mutate_profile(&switch_info.server_hardware_id, |_, edited| {
                Ok(profile::remove_connection_by_mac(edited, &mac))
            })
            .await?;
        if removed {
            info!("Removed connection of port {}", port.id);
        } else {
            debug!("Port {} had no connection", port.id);
        }
        Ok(())
    }

    /// Repairs the port's server profile in one write: drops connections to
    /// vanished fabric networks, then makes the port's connection exist and
    /// point at its bound network.
    ///
    /// `vanished` caches fabric network existence across calls.
    #[instrument(skip(self, port, vanished), fields(port = %port.id))]
    pub async fn repair(
        &self,
        port: &SdnPort,
        vanished: &mut HashMap<String, bool>,
    ) -> SyncResult<()> {
        let Some(target) = self.target(port).await? else {
            return Ok(());
        };
        let hardware = self
            .gateway
            .get_server_hardware(&target.switch_info.server_hardware_id)
            .await?;
        let profile = self.gateway.get_server_profile(&profile_uri(&hardware)?).await?;

        let mut gone = HashSet::new();
        for conn in &profile.connections {
            let network_id = conn.network_id().to_string();
            if network_id.is_empty() {
                continue;
            }
            let is_gone = match vanished.get(&network_id) {
                Some(is_gone) => *is_gone,
                None => {
                    let is_gone = match self.gateway.get_ethernet_network(&network_id).await {
                        Ok(_) => false,
                        Err(e) if e.is_not_found() => true,
                        Err(e) => return Err(e.into()),
                    };
                    vanished.insert(network_id.clone(), is_gone);
                    is_gone
                }
            };
            if is_gone {
                gone.insert(network_id);
            }
        }

        let network_uri = network_uri_from_id(&target.binding.fabric_network_id);
        let mac = port.mac_address;
        let bootable = target.switch_info.bootable;
        let changed = self
            .mutate_profile(&target.switch_info.server_hardware_id, |hardware, edited| {
                let stripped = profile::strip_connections(edited, |id| gone.contains(id));
                if stripped > 0 {
                    info!("Dropping {} connections to vanished networks", stripped);
                }
                let has_connection = edited.connections.iter().any(|c| c.has_mac(&mac));
                let updated = if has_connection {
                    profile::retarget_connection(edited, &mac, &network_uri)
                } else {
                    let port_id = profile::derive_port_id(hardware, &mac).ok_or_else(|| {
                        SyncError::malformed_port(
                            &port.id,
                            format!("MAC {} not found on server hardware {}", mac, hardware.id()),
                        )
                    })?;
                    profile::upsert_connection(edited, &mac, &port_id, &network_uri, bootable)
                };
                Ok(stripped > 0 || updated)
            })
            .await?;
        if changed {
            info!("Repaired connection of port {}", port.id);
        }
        Ok(())
    }

    /// Applies `edit` to a fresh copy of the server's profile and writes it
    /// back under the power protocol. Returns whether anything was written.
    ///
    /// An edit that changes nothing skips the write and the power cycle.
    pub async fn mutate_profile<F>(&self, hardware_id: &str, edit: F) -> SyncResult<bool>
    where
        F: FnOnce(&ServerHardware, &mut ServerProfile) -> SyncResult<bool> + Send,
    {
        let gateway = &self.gateway;
        let hardware = gateway.get_server_hardware(hardware_id).await?;
        let profile_uri = profile_uri(&hardware)?;
        let (hardware, mut profile) = self.settle(hardware_id, &profile_uri).await?;
        if !edit(&hardware, &mut profile)? {
            return Ok(false);
        }

        let snapshot = hardware.power_state;
        if snapshot != PowerState::Off {
            debug!("Powering off {} (was {})", hardware_id, snapshot.as_str());
            gateway.update_power_state(hardware_id, PowerState::Off).await?;
        }

        let written = gateway.update_server_profile(&profile).await;

        match snapshot.restore_target() {
            Some(PowerState::Off) => {}
            Some(target) => {
                if let Err(e) = gateway.update_power_state(hardware_id, target).await {
                    warn!(
                        "Failed to restore power of {} to {}: {}",
                        hardware_id,
                        target.as_str(),
                        e
                    );
                    if written.is_ok() {
                        return Err(e.into());
                    }
                }
            }
            None => warn!(
                "Power state of {} was unknown; leaving it powered off",
                hardware_id
            ),
        }

        written?;
        Ok(true)
    }

    /// Waits until the profile is idle and the hardware is not power locked,
    /// then returns fresh copies of both. The two waits are redone whenever
    /// the final reads disagree with them.
    async fn settle(
        &self,
        hardware_id: &str,
        profile_uri: &str,
    ) -> SyncResult<(ServerHardware, ServerProfile)> {
        let gateway = &self.gateway;
        let mut rounds: u32 = 0;
        loop {
            poll_until(
                &format!("server profile {} to settle", profile_uri),
                self.policy.profile,
                move || async move {
                    let profile = gateway.get_server_profile(profile_uri).await?;
                    Ok::<_, SyncError>(!profile.is_busy())
                },
            )
            .await?;
            poll_until(
                &format!("power lock on {} to clear", hardware_id),
                self.policy.power_lock,
                move || async move {
                    let hardware = gateway.get_server_hardware(hardware_id).await?;
                    Ok::<_, SyncError>(!hardware.power_lock)
                },
            )
            .await?;

            let hardware = gateway.get_server_hardware(hardware_id).await?;
            let profile = gateway.get_server_profile(profile_uri).await?;
            if !hardware.power_lock && !profile.is_busy() {
                return Ok((hardware, profile));
            }

            rounds = rounds.saturating_add(1);
            debug!(
                "Server {} changed after settling (power lock {}, profile busy {})",
                hardware_id,
                hardware.power_lock,
                profile.is_busy()
            );
            if let Some(max) = self.policy.power_lock.max_attempts {
                if rounds >= max {
                    return Err(SyncError::transient(
                        format!("server {} to settle", hardware_id),
                        format!("still locked or busy after {} rounds", rounds),
                    ));
                }
            }
        }
    }
}

fn profile_uri(hardware: &ServerHardware) -> SyncResult<String> {
    hardware
        .server_profile_uri
        .clone()
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| SyncError::vanished(format!("server profile of {}", hardware.uri)))
}
