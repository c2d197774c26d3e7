//! Binding tables and the state store contract.
//!
//! The store answers SDN-plane queries (networks, ports) and persists the two
//! binding tables. Binding changes are grouped in a [`Transaction`] that is
//! applied atomically: either every operation lands or none does.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::sdn::{LogicalNetwork, SdnPort};

/// Links a logical network to the fabric network carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkBinding {
    pub neutron_network_id: String,
    pub fabric_network_id: String,
    /// False for operator-owned flat networks, which are never deleted or
    /// mutated.
    pub manageable: bool,
}

impl NetworkBinding {
    pub fn new(
        neutron_network_id: impl Into<String>,
        fabric_network_id: impl Into<String>,
        manageable: bool,
    ) -> Self {
        Self {
            neutron_network_id: neutron_network_id.into(),
            fabric_network_id: fabric_network_id.into(),
            manageable,
        }
    }
}

/// Records that an uplinkset of an uplink group carries a fabric network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UplinksetBinding {
    pub fabric_network_id: String,
    pub group_id: String,
    pub uplinkset_name: String,
}

impl UplinksetBinding {
    pub fn new(
        fabric_network_id: impl Into<String>,
        group_id: impl Into<String>,
        uplinkset_name: impl Into<String>,
    ) -> Self {
        Self {
            fabric_network_id: fabric_network_id.into(),
            group_id: group_id.into(),
            uplinkset_name: uplinkset_name.into(),
        }
    }
}

/// A single binding table change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOp {
    /// Inserts a network binding; fails if one exists for the network.
    PutNetwork(NetworkBinding),
    DeleteNetwork { neutron_network_id: String },
    /// Deletes every network binding pointing at the fabric network.
    DeleteNetworksByFabricId { fabric_network_id: String },
    /// Inserts an uplinkset binding; inserting an existing one is a no-op.
    PutUplinkset(UplinksetBinding),
    /// Deletes the uplinkset bindings of a fabric network, optionally only
    /// the one for a given (group, uplinkset) pair.
    DeleteUplinksets {
        fabric_network_id: String,
        pair: Option<(String, String)>,
    },
}

/// An ordered list of binding changes applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<BindingOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_network(mut self, binding: NetworkBinding) -> Self {
        self.ops.push(BindingOp::PutNetwork(binding));
        self
    }

    pub fn delete_network(mut self, neutron_network_id: impl Into<String>) -> Self {
        self.ops.push(BindingOp::DeleteNetwork {
            neutron_network_id: neutron_network_id.into(),
        });
        self
    }

    pub fn delete_networks_by_fabric_id(mut self, fabric_network_id: impl Into<String>) -> Self {
        self.ops.push(BindingOp::DeleteNetworksByFabricId {
            fabric_network_id: fabric_network_id.into(),
        });
        self
    }

    pub fn put_uplinkset(mut self, binding: UplinksetBinding) -> Self {
        self.ops.push(BindingOp::PutUplinkset(binding));
        self
    }

    pub fn put_uplinksets(mut self, bindings: impl IntoIterator<Item = UplinksetBinding>) -> Self {
        self.ops
            .extend(bindings.into_iter().map(BindingOp::PutUplinkset));
        self
    }

    /// Deletes every uplinkset binding of the fabric network.
    pub fn delete_uplinksets(mut self, fabric_network_id: impl Into<String>) -> Self {
        self.ops.push(BindingOp::DeleteUplinksets {
            fabric_network_id: fabric_network_id.into(),
            pair: None,
        });
        self
    }

    pub fn delete_uplinkset(mut self, binding: &UplinksetBinding) -> Self {
        self.ops.push(BindingOp::DeleteUplinksets {
            fabric_network_id: binding.fabric_network_id.clone(),
            pair: Some((binding.group_id.clone(), binding.uplinkset_name.clone())),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BindingOp] {
        &self.ops
    }
}

/// SDN-plane queries and binding persistence.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Logical networks whose segment names a physical network.
    async fn list_networks_with_physnet(&self) -> SyncResult<Vec<LogicalNetwork>>;

    async fn get_network(&self, network_id: &str) -> SyncResult<Option<LogicalNetwork>>;

    /// Ports carrying local link information.
    async fn list_ports_with_binding_profile(&self) -> SyncResult<Vec<SdnPort>>;

    async fn list_ports_with_binding_profile_by_network(
        &self,
        network_id: &str,
    ) -> SyncResult<Vec<SdnPort>>;

    async fn get_network_binding(
        &self,
        neutron_network_id: &str,
    ) -> SyncResult<Option<NetworkBinding>>;

    async fn list_network_bindings(&self) -> SyncResult<Vec<NetworkBinding>>;

    async fn list_uplinkset_bindings(
        &self,
        fabric_network_id: &str,
    ) -> SyncResult<Vec<UplinksetBinding>>;

    /// Applies a transaction atomically.
    async fn commit(&self, tx: Transaction) -> SyncResult<()>;
}

/// Serializable content of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub networks: BTreeMap<String, LogicalNetwork>,
    #[serde(default)]
    pub ports: BTreeMap<String, SdnPort>,
    #[serde(default)]
    pub network_bindings: BTreeMap<String, NetworkBinding>,
    #[serde(default)]
    pub uplinkset_bindings: BTreeSet<UplinksetBinding>,
}

impl StoreSnapshot {
    /// Applies `tx` to the binding tables, leaving them untouched on error.
    pub fn apply(&mut self, tx: &Transaction) -> SyncResult<()> {
        let mut networks = self.network_bindings.clone();
        let mut uplinksets = self.uplinkset_bindings.clone();

        for op in tx.ops() {
            match op {
                BindingOp::PutNetwork(binding) => {
                    if networks.contains_key(&binding.neutron_network_id) {
                        return Err(SyncError::store(
                            "commit",
                            format!(
                                "network binding for {} already exists",
                                binding.neutron_network_id
                            ),
                        ));
                    }
                    networks.insert(binding.neutron_network_id.clone(), binding.clone());
                }
                BindingOp::DeleteNetwork { neutron_network_id } => {
                    networks.remove(neutron_network_id);
                }
                BindingOp::DeleteNetworksByFabricId { fabric_network_id } => {
                    networks.retain(|_, b| &b.fabric_network_id != fabric_network_id);
                }
                BindingOp::PutUplinkset(binding) => {
                    uplinksets.insert(binding.clone());
                }
                BindingOp::DeleteUplinksets {
                    fabric_network_id,
                    pair,
                } => {
                    uplinksets.retain(|b| {
                        if &b.fabric_network_id != fabric_network_id {
                            return true;
                        }
                        match pair {
                            Some((group, name)) => {
                                &b.group_id != group || &b.uplinkset_name != name
                            }
                            None => false,
                        }
                    });
                }
            }
        }

        self.network_bindings = networks;
        self.uplinkset_bindings = uplinksets;
        Ok(())
    }
}

/// In-memory [`StateStore`].
///
/// Also exposes mutators for the SDN side so tests and the standalone
/// binary can populate networks and ports.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().clone()
    }

    pub fn upsert_network(&self, network: LogicalNetwork) {
        self.state.write().networks.insert(network.id.clone(), network);
    }

    pub fn remove_network(&self, network_id: &str) -> Option<LogicalNetwork> {
        self.state.write().networks.remove(network_id)
    }

    pub fn upsert_port(&self, port: SdnPort) {
        self.state.write().ports.insert(port.id.clone(), port);
    }

    pub fn remove_port(&self, port_id: &str) -> Option<SdnPort> {
        self.state.write().ports.remove(port_id)
    }

    /// Applies a transaction without the async wrapper.
    pub fn apply(&self, tx: &Transaction) -> SyncResult<()> {
        self.state.write().apply(tx)
    }

    pub fn all_uplinkset_bindings(&self) -> Vec<UplinksetBinding> {
        self.state.read().uplinkset_bindings.iter().cloned().collect()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn list_networks_with_physnet(&self) -> SyncResult<Vec<LogicalNetwork>> {
        Ok(self
            .state
            .read()
            .networks
            .values()
            .filter(|n| n.physical_network().is_some())
            .cloned()
            .collect())
    }

    async fn get_network(&self, network_id: &str) -> SyncResult<Option<LogicalNetwork>> {
        Ok(self.state.read().networks.get(network_id).cloned())
    }

    async fn list_ports_with_binding_profile(&self) -> SyncResult<Vec<SdnPort>> {
        Ok(self
            .state
            .read()
            .ports
            .values()
            .filter(|p| p.has_binding_profile())
            .cloned()
            .collect())
    }

    async fn list_ports_with_binding_profile_by_network(
        &self,
        network_id: &str,
    ) -> SyncResult<Vec<SdnPort>> {
        Ok(self
            .state
            .read()
            .ports
            .values()
            .filter(|p| p.network_id == network_id && p.has_binding_profile())
            .cloned()
            .collect())
    }

    async fn get_network_binding(
        &self,
        neutron_network_id: &str,
    ) -> SyncResult<Option<NetworkBinding>> {
        Ok(self
            .state
            .read()
            .network_bindings
            .get(neutron_network_id)
            .cloned())
    }

    async fn list_network_bindings(&self) -> SyncResult<Vec<NetworkBinding>> {
        Ok(self.state.read().network_bindings.values().cloned().collect())
    }

    async fn list_uplinkset_bindings(
        &self,
        fabric_network_id: &str,
    ) -> SyncResult<Vec<UplinksetBinding>> {
        Ok(self
            .state
            .read()
            .uplinkset_bindings
            .iter()
            .filter(|b| b.fabric_network_id == fabric_network_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, tx: Transaction) -> SyncResult<()> {
        if tx.is_empty() {
            return Ok(());
        }
        debug!("Committing {} binding operations", tx.ops().len());
        self.apply(&tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdn::BindingProfile;
    use fabric_types::{NetworkType, VnicType};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_commit_and_query() {
        let store = MemoryStore::new();
        let tx = Transaction::new()
            .put_network(NetworkBinding::new("n1", "f1", true))
            .put_uplinkset(UplinksetBinding::new("f1", "lig-1", "uplink-a"))
            .put_uplinkset(UplinksetBinding::new("f1", "lig-2", "uplink-b"));
        store.commit(tx).await.unwrap();

        assert_eq!(
            store.get_network_binding("n1").await.unwrap(),
            Some(NetworkBinding::new("n1", "f1", true))
        );
        assert_eq!(store.list_uplinkset_bindings("f1").await.unwrap().len(), 2);
        assert!(store.list_uplinkset_bindings("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_network_rejects_whole_transaction() {
        let store = MemoryStore::new();
        store
            .commit(Transaction::new().put_network(NetworkBinding::new("n1", "f1", true)))
            .await
            .unwrap();

        let tx = Transaction::new()
            .put_uplinkset(UplinksetBinding::new("f2", "lig-1", "uplink-a"))
            .put_network(NetworkBinding::new("n1", "f2", true));
        let err = store.commit(tx).await.unwrap_err();
        assert!(matches!(err, SyncError::Store { .. }));

        assert!(store.list_uplinkset_bindings("f2").await.unwrap().is_empty());
        assert_eq!(
            store.get_network_binding("n1").await.unwrap().unwrap().fabric_network_id,
            "f1"
        );
    }

    #[tokio::test]
    async fn test_delete_operations() {
        let store = MemoryStore::new();
        store
            .commit(
                Transaction::new()
                    .put_network(NetworkBinding::new("n1", "flat-1", false))
                    .put_network(NetworkBinding::new("n2", "flat-1", false))
                    .put_network(NetworkBinding::new("n3", "f3", true))
                    .put_uplinkset(UplinksetBinding::new("f3", "lig-1", "a"))
                    .put_uplinkset(UplinksetBinding::new("f3", "lig-2", "b")),
            )
            .await
            .unwrap();

        store
            .commit(
                Transaction::new()
                    .delete_networks_by_fabric_id("flat-1")
                    .delete_uplinkset(&UplinksetBinding::new("f3", "lig-1", "a")),
            )
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_network_bindings()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.neutron_network_id)
            .collect();
        assert_eq!(ids, vec!["n3".to_string()]);
        assert_eq!(
            store.list_uplinkset_bindings("f3").await.unwrap(),
            vec![UplinksetBinding::new("f3", "lig-2", "b")]
        );

        store
            .commit(Transaction::new().delete_network("n3").delete_uplinksets("f3"))
            .await
            .unwrap();
        assert!(store.list_network_bindings().await.unwrap().is_empty());
        assert!(store.all_uplinkset_bindings().is_empty());
    }

    #[tokio::test]
    async fn test_sdn_queries() {
        let store = MemoryStore::new();
        store.upsert_network(LogicalNetwork::new("n1", Some("physnet1"), NetworkType::Flat, None));
        store.upsert_network(LogicalNetwork::new("n2", None, NetworkType::Vxlan, Some(5000)));

        let nets = store.list_networks_with_physnet().await.unwrap();
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].id, "n1");
        assert!(store.get_network("n2").await.unwrap().is_some());
        assert!(store.remove_network("n2").is_some());
        assert!(store.get_network("n2").await.unwrap().is_none());

        let port = |id: &str, profile: Option<BindingProfile>| SdnPort {
            id: id.to_string(),
            network_id: "n1".to_string(),
            mac_address: "aa:bb:cc:00:11:22".parse().unwrap(),
            vnic_type: VnicType::Baremetal,
            binding_profile: profile,
        };
        let profile: BindingProfile = serde_json::from_value(serde_json::json!({
            "local_link_information": [{"switch_info": {"server_hardware_id": "sh-1"}}]
        }))
        .unwrap();
        store.upsert_port(port("p1", Some(profile)));
        store.upsert_port(port("p2", None));
        let bound = store.list_ports_with_binding_profile_by_network("n1").await.unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].id, "p1");

        assert!(store.remove_port("p1").is_some());
        assert!(store.remove_port("p1").is_none());
        assert!(store.list_ports_with_binding_profile().await.unwrap().is_empty());
    }
}
