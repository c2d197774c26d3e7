//! SynchronizationLoop - periodic drift repair and orphan cleanup
//!
//! A pass runs five steps in order. Each step commits on its own; a failing
//! item or step is logged and the pass moves on.
//!
//! 1. delete_outdated_flat_mappings
//! 2. create_missing
//! 3. delete_orphans
//! 4. repair_uplinksets
//! 5. repair_connections

use fabric_api::SharedFabricGateway;
use fabric_sync_common::{
    LogicalNetwork, NetworkBinding, StateStore, StepReport, SyncReport, SyncResult, SyncStep,
    Transaction,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::mapping::MappingTarget;
use crate::network::NetworkReconciler;
use crate::port::PortReconciler;
use crate::tables::NETWORK_NAME_PATTERN;

static NETWORK_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(NETWORK_NAME_PATTERN).expect("Invalid network name regex"));

/// Extracts the SDN network id from an engine-owned fabric network name.
///
/// The pattern may match anywhere in the name, so renamed copies such as
/// `Neutron [x] (copy)` still count as owned by `x`.
pub fn owner_of(fabric_network_name: &str) -> Option<&str> {
    NETWORK_NAME_RE
        .captures(fabric_network_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Runs synchronization passes.
pub struct SynchronizationLoop {
    gateway: SharedFabricGateway,
    store: Arc<dyn StateStore>,
    networks: Arc<NetworkReconciler>,
    ports: Arc<PortReconciler>,
    interval: Duration,
}

impl SynchronizationLoop {
    pub fn new(
        gateway: SharedFabricGateway,
        store: Arc<dyn StateStore>,
        networks: Arc<NetworkReconciler>,
        ports: Arc<PortReconciler>,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            networks,
            ports,
            interval,
        }
    }

    /// Runs one pass immediately, then one per interval until `cancel` fires.
    ///
    /// Cancellation is only observed between passes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Synchronization loop started (interval {:?})", self.interval);
        loop {
            let report = self.run_pass().await;
            if !report.is_clean() {
                warn!(
                    "Synchronization pass left {} items for the next run",
                    report.total_failed()
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Synchronization loop stopped");
    }

    /// Runs every step once.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> SyncReport {
        info!("Starting synchronization pass");
        let mut report = SyncReport::default();
        for step in SyncStep::ALL {
            let mut step_report = StepReport::new(step);
            let result = match step {
                SyncStep::DeleteOutdatedFlatMappings => {
                    self.delete_outdated_flat_mappings(&mut step_report).await
                }
                SyncStep::CreateMissing => self.create_missing(&mut step_report).await,
                SyncStep::DeleteOrphans => self.delete_orphans(&mut step_report).await,
                SyncStep::RepairUplinksets => self.repair_uplinksets(&mut step_report).await,
                SyncStep::RepairConnections => self.repair_connections(&mut step_report).await,
            };
            if let Err(e) = result {
                error!("Step {} failed: {}", step, e);
                step_report.abort(&e);
            }
            debug!(
                "Step {}: {:?} ({} ok, {} failed)",
                step,
                step_report.status(),
                step_report.processed,
                step_report.failed
            );
            report.push(step_report);
        }
        info!(
            "Synchronization pass finished ({} failures)",
            report.total_failed()
        );
        report
    }

    /// Drops flat bindings whose fabric network is no longer configured.
    async fn delete_outdated_flat_mappings(&self, report: &mut StepReport) -> SyncResult<()> {
        let configured = self.networks.mappings().flat_network_ids();
        for binding in self.store.list_network_bindings().await? {
            if binding.manageable || configured.contains(binding.fabric_network_id.as_str()) {
                continue;
            }
            info!(
                "Flat network {} is no longer mapped; dropping its bindings",
                binding.fabric_network_id
            );
            let result = self
                .store
                .commit(Transaction::new().delete_networks_by_fabric_id(&binding.fabric_network_id))
                .await;
            log_item(&result, &binding.neutron_network_id);
            report.record(&result);
        }
        Ok(())
    }

    /// Creates fabric networks for mapped SDN networks that have none.
    async fn create_missing(&self, report: &mut StepReport) -> SyncResult<()> {
        for network in self.store.list_networks_with_physnet().await? {
            let result = self.create_one(&network).await;
            log_item(&result, &network.id);
            report.record(&result);
        }
        Ok(())
    }

    async fn create_one(&self, network: &LogicalNetwork) -> SyncResult<()> {
        if let Some(binding) = self.store.get_network_binding(&network.id).await? {
            if !self.is_vanished(&binding).await? {
                return Ok(());
            }
            warn!(
                "Fabric network {} of {} vanished; recreating",
                binding.fabric_network_id, network.id
            );
            self.store
                .commit(
                    Transaction::new()
                        .delete_network(&network.id)
                        .delete_uplinksets(&binding.fabric_network_id),
                )
                .await?;
        }
        self.networks.create(network).await?;
        Ok(())
    }

    async fn is_vanished(&self, binding: &NetworkBinding) -> SyncResult<bool> {
        if !binding.manageable {
            return Ok(false);
        }
        match self
            .gateway
            .get_ethernet_network(&binding.fabric_network_id)
            .await
        {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes engine-owned fabric networks whose SDN network is gone,
    /// no longer mapped to uplinks, or bound to another fabric network.
    async fn delete_orphans(&self, report: &mut StepReport) -> SyncResult<()> {
        for fabric_network in self.gateway.list_ethernet_networks().await? {
            let Some(owner) = owner_of(&fabric_network.name) else {
                continue;
            };
            let result = self.delete_orphan(owner, fabric_network.id()).await;
            log_item(&result, fabric_network.id());
            report.record(&result);
        }
        Ok(())
    }

    async fn delete_orphan(&self, owner: &str, fabric_network_id: &str) -> SyncResult<()> {
        let Some(network) = self.store.get_network(owner).await? else {
            info!(
                "Network {} no longer exists; deleting {}",
                owner, fabric_network_id
            );
            self.networks.delete_fabric_network(fabric_network_id).await?;
            return self
                .store
                .commit(
                    Transaction::new()
                        .delete_networks_by_fabric_id(fabric_network_id)
                        .delete_uplinksets(fabric_network_id),
                )
                .await;
        };

        if let Some(binding) = self.store.get_network_binding(owner).await? {
            if binding.fabric_network_id != fabric_network_id {
                info!(
                    "Deleting stray {} (network {} is bound to {})",
                    fabric_network_id, owner, binding.fabric_network_id
                );
                return self.networks.delete_fabric_network(fabric_network_id).await;
            }
        }

        let uplink_mapped = matches!(
            self.networks
                .mappings()
                .target_for(network.physical_network(), network.network_type()),
            Some(MappingTarget::Uplinks { .. })
        );
        if uplink_mapped {
            return Ok(());
        }

        info!(
            "Network {} is no longer mapped; tearing down {}",
            owner, fabric_network_id
        );
        for port in self
            .store
            .list_ports_with_binding_profile_by_network(owner)
            .await?
        {
            self.ports.remove_connection(&port).await?;
        }
        self.networks.delete_fabric_network(fabric_network_id).await?;
        self.store
            .commit(
                Transaction::new()
                    .delete_network(owner)
                    .delete_networks_by_fabric_id(fabric_network_id)
                    .delete_uplinksets(fabric_network_id),
            )
            .await
    }

    /// Converges uplink membership of every engine-owned bound network.
    async fn repair_uplinksets(&self, report: &mut StepReport) -> SyncResult<()> {
        for binding in self.store.list_network_bindings().await? {
            if !binding.manageable {
                continue;
            }
            let result = self.repair_binding(&binding).await;
            log_item(&result, &binding.neutron_network_id);
            report.record(&result);
        }
        Ok(())
    }

    async fn repair_binding(&self, binding: &NetworkBinding) -> SyncResult<()> {
        let Some(network) = self.store.get_network(&binding.neutron_network_id).await? else {
            return Ok(());
        };
        let Some(physnet) = network.physical_network() else {
            return Ok(());
        };
        self.networks
            .update_uplinksets(binding, physnet, network.network_type())
            .await
    }

    /// Repairs the server profile connection of every port with a binding
    /// profile.
    async fn repair_connections(&self, report: &mut StepReport) -> SyncResult<()> {
        let mut vanished = HashMap::new();
        for port in self.store.list_ports_with_binding_profile().await? {
            let result = self.ports.repair(&port, &mut vanished).await;
            log_item(&result, &port.id);
            report.record(&result);
        }
        Ok(())
    }
}

fn log_item<T>(result: &SyncResult<T>, item: &str) {
    if let Err(e) = result {
        error!("Failed to synchronize {}: {}", item, e);
    }
}
