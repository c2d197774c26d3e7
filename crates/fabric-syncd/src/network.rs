//! NetworkReconciler - fabric networks and their uplink membership
//!
//! Flow for an SDN network:
//! 1. Unmapped or already bound → nothing to do
//! 2. Flat mapping → bind to the operator's network (never touched)
//! 3. Uplink mapping → create `Neutron [<id>]`, attach it to every mapped
//!    template uplinkset and every deployed instance, bind

use fabric_api::models::NewEthernetNetwork;
use fabric_api::SharedFabricGateway;
use fabric_sync_common::{
    LogicalNetwork, NetworkBinding, StateStore, SyncError, SyncResult, Transaction,
    UplinksetBinding,
};
use fabric_types::uri::network_uri_from_id;
use fabric_types::{EthernetNetworkType, NetworkType};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::mapping::{MappingTarget, ResolvedMappings, UplinkTarget};
use crate::tables::network_name;

/// Creates, deletes and repairs fabric networks for SDN networks.
pub struct NetworkReconciler {
    gateway: SharedFabricGateway,
    store: Arc<dyn StateStore>,
    mappings: Arc<ResolvedMappings>,
}

impl NetworkReconciler {
    pub fn new(
        gateway: SharedFabricGateway,
        store: Arc<dyn StateStore>,
        mappings: Arc<ResolvedMappings>,
    ) -> Self {
        Self {
            gateway,
            store,
            mappings,
        }
    }

    pub fn mappings(&self) -> &ResolvedMappings {
        &self.mappings
    }

    /// Reflects a logical network on the fabric.
    ///
    /// Returns the new binding, or `None` when the network is unmapped or
    /// already bound.
    #[instrument(skip(self, network), fields(network = %network.id))]
    pub async fn create(&self, network: &LogicalNetwork) -> SyncResult<Option<NetworkBinding>> {
        let target = match self
            .mappings
            .target_for(network.physical_network(), network.network_type())
        {
            Some(target) => target,
            None => {
                debug!(
                    "Network {} ({:?}/{}) is not mapped",
                    network.id,
                    network.physical_network(),
                    network.network_type()
                );
                return Ok(None);
            }
        };

        if self.store.get_network_binding(&network.id).await?.is_some() {
            debug!("Network {} is already bound", network.id);
            return Ok(None);
        }

        let (binding, uplinks) = match target {
            MappingTarget::Flat(fabric_network_id) => {
                info!(
                    "Binding network {} to flat fabric network {}",
                    network.id, fabric_network_id
                );
                (NetworkBinding::new(&network.id, fabric_network_id, false), Vec::new())
            }
            MappingTarget::Uplinks {
                ethernet_type,
                targets,
            } => {
                let vlan = match ethernet_type {
                    EthernetNetworkType::Tagged => network.segment.vlan()?,
                    EthernetNetworkType::Untagged => None,
                };
                let body = NewEthernetNetwork::new(network_name(&network.id), vlan);
                let created = self.gateway.create_ethernet_network(&body).await?;
                let fabric_network_id = created.id().to_string();
                info!(
                    "Created fabric network {} for network {} (vlan {:?})",
                    fabric_network_id,
                    network.id,
                    vlan.map(|v| v.as_u16())
                );

                // Attach failures are left to repair_uplinksets.
                for target in targets {
                    if let Err(e) = self
                        .attach(&fabric_network_id, target, ethernet_type)
                        .await
                    {
                        warn!(
                            "Failed to attach {} to {}/{}: {}",
                            fabric_network_id, target.group_id, target.uplinkset_name, e
                        );
                    }
                }
                let uplinks = targets
                    .iter()
                    .map(|t| {
                        UplinksetBinding::new(&fabric_network_id, &t.group_id, &t.uplinkset_name)
                    })
                    .collect();
                (NetworkBinding::new(&network.id, fabric_network_id, true), uplinks)
            }
        };

        self.store
            .commit(
                Transaction::new()
                    .put_network(binding.clone())
                    .put_uplinksets(uplinks),
            )
            .await?;
        Ok(Some(binding))
    }

    /// Removes a logical network's fabric counterpart and bindings.
    #[instrument(skip(self))]
    pub async fn delete(&self, neutron_network_id: &str) -> SyncResult<()> {
        let binding = match self.store.get_network_binding(neutron_network_id).await? {
            Some(binding) => binding,
            None => {
                debug!("Network {} has no binding", neutron_network_id);
                return Ok(());
            }
        };

        if binding.manageable {
            self.delete_fabric_network(&binding.fabric_network_id).await?;
        }

        self.store
            .commit(
                Transaction::new()
                    .delete_network(neutron_network_id)
                    .delete_uplinksets(&binding.fabric_network_id),
            )
            .await?;
        info!(
            "Unbound network {} from fabric network {}",
            neutron_network_id, binding.fabric_network_id
        );
        Ok(())
    }

    /// Deletes a fabric network, treating "already gone" as success.
    pub async fn delete_fabric_network(&self, fabric_network_id: &str) -> SyncResult<()> {
        match self.gateway.delete_ethernet_network(fabric_network_id).await {
            Ok(()) => {
                info!("Deleted fabric network {}", fabric_network_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Fabric network {} already gone", fabric_network_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Converges the uplink membership of a bound network on the mapping.
    ///
    /// Live membership (deployed uplinksets carrying the network) and the
    /// stored bindings are diffed against the mapped uplinksets: the network
    /// is detached from unmapped pairs, attached to mapped ones, and the
    /// stored bindings are rewritten to the mapped set. Operator-owned
    /// networks are left alone.
    #[instrument(skip(self, binding), fields(fabric_network = %binding.fabric_network_id))]
    pub async fn update_uplinksets(
        &self,
        binding: &NetworkBinding,
        physnet: &str,
        network_type: &NetworkType,
    ) -> SyncResult<()> {
        if !binding.manageable {
            return Ok(());
        }
        let fabric_network_id = binding.fabric_network_id.as_str();

        let ethernet_type = network_type.ethernet_type();
        let desired: BTreeSet<UplinkTarget> = ethernet_type
            .map(|t| self.mappings.uplinks_for(physnet, t).iter().cloned().collect())
            .unwrap_or_default();

        let stored: BTreeSet<UplinkTarget> = self
            .store
            .list_uplinkset_bindings(fabric_network_id)
            .await?
            .into_iter()
            .map(|b| UplinkTarget::new(b.group_id, b.uplinkset_name))
            .collect();
        let mut current = self.live_membership(fabric_network_id).await?;
        current.extend(stored.iter().cloned());

        let mut first_error: Option<SyncError> = None;
        for target in current.difference(&desired) {
            debug!(
                "Detaching {} from {}/{}",
                fabric_network_id, target.group_id, target.uplinkset_name
            );
            if let Err(e) = self.detach(fabric_network_id, target).await {
                warn!("Failed to detach {}: {}", fabric_network_id, e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(ethernet_type) = ethernet_type {
            for target in &desired {
                if let Err(e) = self.attach(fabric_network_id, target, ethernet_type).await {
                    warn!("Failed to attach {}: {}", fabric_network_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if stored != desired {
            let tx = Transaction::new()
                .delete_uplinksets(fabric_network_id)
                .put_uplinksets(desired.iter().map(|t| {
                    UplinksetBinding::new(fabric_network_id, &t.group_id, &t.uplinkset_name)
                }));
            self.store.commit(tx).await?;
            info!(
                "Rewrote uplinkset bindings of {}: {} -> {}",
                fabric_network_id,
                stored.len(),
                desired.len()
            );
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// (group, uplinkset name) of every deployed uplinkset carrying the
    /// network.
    async fn live_membership(&self, fabric_network_id: &str) -> SyncResult<BTreeSet<UplinkTarget>> {
        let mut groups: HashMap<String, Option<String>> = HashMap::new();
        let mut membership = BTreeSet::new();
        for uri in self
            .gateway
            .get_associated_uplink_groups(fabric_network_id)
            .await?
        {
            let uplink_set = self.gateway.get_uplink_set(&uri).await?;
            let Some(interconnect_uri) = uplink_set.logical_interconnect_uri.as_deref() else {
                continue;
            };
            let group_id = match groups.get(interconnect_uri) {
                Some(group_id) => group_id.clone(),
                None => {
                    let interconnect = self.gateway.get_interconnect(interconnect_uri).await?;
                    let group_id = interconnect.group_id().map(str::to_string);
                    groups.insert(interconnect_uri.to_string(), group_id.clone());
                    group_id
                }
            };
            if let Some(group_id) = group_id {
                membership.insert(UplinkTarget::new(group_id, uplink_set.name));
            }
        }
        Ok(membership)
    }

    /// Attaches a network to a template uplinkset and its deployed
    /// instances of the given ethernet type.
    async fn attach(
        &self,
        fabric_network_id: &str,
        target: &UplinkTarget,
        ethernet_type: EthernetNetworkType,
    ) -> SyncResult<()> {
        let network_uri = network_uri_from_id(fabric_network_id);

        let mut group = self.gateway.get_uplink_group(&target.group_id).await?;
        let template = group.uplink_set_mut(&target.uplinkset_name).ok_or_else(|| {
            SyncError::vanished(format!(
                "uplinkset {} of {}",
                target.uplinkset_name, target.group_id
            ))
        })?;
        if !template.carries(fabric_network_id) {
            template.network_uris.push(network_uri.clone());
            self.gateway.update_uplink_group(&group).await?;
        }

        for uplink_set in self.deployed_instances(target, Some(ethernet_type)).await? {
            if !uplink_set.carries(fabric_network_id) {
                self.gateway
                    .add_network_to_uplink_set(&uplink_set.uri, &network_uri)
                    .await?;
            }
        }
        Ok(())
    }

    /// Detaches a network from a template uplinkset and all its deployed
    /// instances.
    async fn detach(&self, fabric_network_id: &str, target: &UplinkTarget) -> SyncResult<()> {
        let network_uri = network_uri_from_id(fabric_network_id);

        match self.gateway.get_uplink_group(&target.group_id).await {
            Ok(mut group) => {
                if let Some(template) = group.uplink_set_mut(&target.uplinkset_name) {
                    if template.carries(fabric_network_id) {
                        template
                            .network_uris
                            .retain(|u| fabric_types::uri::id_from_uri(u) != fabric_network_id);
                        self.gateway.update_uplink_group(&group).await?;
                    }
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        for uplink_set in self.deployed_instances(target, None).await? {
            if uplink_set.carries(fabric_network_id) {
                self.gateway
                    .remove_network_from_uplink_set(&uplink_set.uri, &network_uri)
                    .await?;
            }
        }
        Ok(())
    }

    /// Deployed uplinksets named like `target` whose interconnect was
    /// deployed from `target`'s group, optionally of one ethernet type.
    async fn deployed_instances(
        &self,
        target: &UplinkTarget,
        ethernet_type: Option<EthernetNetworkType>,
    ) -> SyncResult<Vec<fabric_api::UplinkSet>> {
        let mut instances = Vec::new();
        for uplink_set in self
            .gateway
            .list_uplink_sets_by_name(&target.uplinkset_name)
            .await?
        {
            if ethernet_type.is_some() && uplink_set.ethernet_network_type != ethernet_type {
                continue;
            }
            let Some(interconnect_uri) = uplink_set.logical_interconnect_uri.as_deref() else {
                continue;
            };
            let interconnect = self.gateway.get_interconnect(interconnect_uri).await?;
            if interconnect.group_id() == Some(target.group_id.as_str()) {
                instances.push(uplink_set);
            }
        }
        Ok(instances)
    }
}
