//! Inbound driver callbacks.
//!
//! The host invokes these on SDN events. They never fail: errors are logged
//! and left for the synchronization loop to converge.

use fabric_api::SharedFabricGateway;
use fabric_sync_common::{LogicalNetwork, SdnPort, StateStore, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::mapping::{ResolvedMappings, UplinkTopology};
use crate::network::NetworkReconciler;
use crate::port::{PortReconciler, PowerPolicy};
use crate::sync::SynchronizationLoop;
use crate::tables::binding;
use crate::validator;

/// A segment the host asks the driver to bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindSegment {
    pub id: String,
    #[serde(default)]
    pub segmentation_id: Option<u32>,
}

/// Port binding request.
#[derive(Debug, Clone)]
pub struct PortContext {
    pub port: SdnPort,
    pub segments_to_bind: Vec<BindSegment>,
}

/// Binding result for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentBinding {
    pub segment_id: String,
    pub vif_type: String,
    pub vif_details: BTreeMap<String, String>,
    pub status: String,
}

/// Wires mappings, reconcilers and the synchronization loop together.
pub struct FabricDriver {
    networks: Arc<NetworkReconciler>,
    ports: Arc<PortReconciler>,
    sync: Arc<SynchronizationLoop>,
    developer_mode: bool,
}

impl FabricDriver {
    /// Parses and validates the mappings against the live topology and builds
    /// the reconcilers.
    ///
    /// Configuration errors are returned; the caller must not start.
    pub async fn initialize(
        config: &Config,
        gateway: SharedFabricGateway,
        store: Arc<dyn StateStore>,
    ) -> SyncResult<Self> {
        let table = config.mapping_table()?;
        if table.is_empty() {
            warn!("No physical network mappings configured; nothing will be reconciled");
        }
        let topology = UplinkTopology::discover(gateway.as_ref(), &table).await?;
        validator::validate(&table, &topology)?;
        let mappings = Arc::new(ResolvedMappings::resolve(&table, &topology));
        info!(
            "Loaded mappings for {} uplink and {} flat physical networks",
            table.uplink_mappings().len(),
            table.flat_mappings().len()
        );

        let networks = Arc::new(NetworkReconciler::new(
            gateway.clone(),
            store.clone(),
            mappings.clone(),
        ));
        let policy = PowerPolicy {
            profile: config.profile_policy(),
            power_lock: config.power_lock_policy(),
        };
        let ports = Arc::new(PortReconciler::new(
            gateway.clone(),
            store.clone(),
            mappings,
            policy,
        ));
        let sync = Arc::new(SynchronizationLoop::new(
            gateway,
            store,
            networks.clone(),
            ports.clone(),
            config.interval(),
        ));

        Ok(Self {
            networks,
            ports,
            sync,
            developer_mode: config.sync.developer_mode,
        })
    }

    pub fn sync_loop(&self) -> Arc<SynchronizationLoop> {
        self.sync.clone()
    }

    /// Spawns the synchronization loop unless developer mode is on.
    pub fn start_sync(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if self.developer_mode {
            info!("Developer mode: synchronization loop disabled");
            return None;
        }
        let sync = self.sync.clone();
        Some(tokio::spawn(async move { sync.run(cancel).await }))
    }

    pub async fn create_network_postcommit(&self, network: &LogicalNetwork) {
        if let Err(e) = self.networks.create(network).await {
            error!("Failed to create network {}: {}", network.id, e);
        }
    }

    pub async fn delete_network_postcommit(&self, network: &LogicalNetwork) {
        if let Err(e) = self.networks.delete(&network.id).await {
            error!("Failed to delete network {}: {}", network.id, e);
        }
    }

    /// Reflects the port on the fabric and, for baremetal ports, returns one
    /// binding per requested segment.
    pub async fn bind_port(&self, context: &PortContext) -> Vec<SegmentBinding> {
        let port = &context.port;
        if let Err(e) = self.ports.create(port).await {
            error!("Failed to reflect port {}: {}", port.id, e);
        }
        if !port.vnic_type.is_baremetal() {
            return Vec::new();
        }

        context
            .segments_to_bind
            .iter()
            .map(|segment| {
                let mut vif_details = BTreeMap::new();
                if let Some(vlan) = segment.segmentation_id {
                    vif_details.insert(binding::VIF_DETAILS_VLAN.to_string(), vlan.to_string());
                }
                debug!(
                    "Bound port {} on network {} (segment {})",
                    port.id, port.network_id, segment.id
                );
                SegmentBinding {
                    segment_id: segment.id.clone(),
                    vif_type: binding::VIF_TYPE_OTHER.to_string(),
                    vif_details,
                    status: binding::STATUS_ACTIVE.to_string(),
                }
            })
            .collect()
    }

    pub async fn create_port_postcommit(&self, port: &SdnPort) {
        debug!("Port {} created; connection is made at bind time", port.id);
    }

    pub async fn delete_port_postcommit(&self, port: &SdnPort) {
        if let Err(e) = self.ports.delete(port).await {
            error!("Failed to remove connection of port {}: {}", port.id, e);
        }
    }
}
