//! JSON file backed state store for the standalone daemon.
//!
//! The file holds the SDN networks and ports the daemon reconciles plus the
//! binding tables, under a `schema_version` field. Every commit rewrites the
//! file (write to a temporary sibling, then rename).

use async_trait::async_trait;
use fabric_sync_common::{
    LogicalNetwork, MemoryStore, NetworkBinding, SdnPort, StateStore, StoreSnapshot, SyncError,
    SyncResult, Transaction, UplinksetBinding,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::tables::STORE_SCHEMA_VERSION;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    schema_version: u32,
    #[serde(flatten)]
    snapshot: StoreSnapshot,
}

/// [`StateStore`] persisted to a JSON file.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: StoreFile = serde_json::from_slice(&bytes)
                    .map_err(|e| SyncError::store("open", format!("{}: {}", path.display(), e)))?;
                if file.schema_version > STORE_SCHEMA_VERSION {
                    return Err(SyncError::store(
                        "open",
                        format!(
                            "{} has schema version {}, newer than supported {}",
                            path.display(),
                            file.schema_version,
                            STORE_SCHEMA_VERSION
                        ),
                    ));
                }
                info!(
                    "Loaded state store {} ({} networks, {} bindings)",
                    path.display(),
                    file.snapshot.networks.len(),
                    file.snapshot.network_bindings.len()
                );
                file.snapshot
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("State store {} not found, starting empty", path.display());
                StoreSnapshot::default()
            }
            Err(e) => {
                return Err(SyncError::store(
                    "open",
                    format!("{}: {}", path.display(), e),
                ))
            }
        };
        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    async fn persist(&self, snapshot: StoreSnapshot) -> SyncResult<()> {
        let file = StoreFile {
            schema_version: STORE_SCHEMA_VERSION,
            snapshot,
        };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|e| SyncError::store("persist", e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    SyncError::store("persist", format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| SyncError::store("persist", format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::store("persist", format!("{}: {}", self.path.display(), e)))?;
        debug!("Persisted state store to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn list_networks_with_physnet(&self) -> SyncResult<Vec<LogicalNetwork>> {
        self.inner.list_networks_with_physnet().await
    }

    async fn get_network(&self, network_id: &str) -> SyncResult<Option<LogicalNetwork>> {
        self.inner.get_network(network_id).await
    }

    async fn list_ports_with_binding_profile(&self) -> SyncResult<Vec<SdnPort>> {
        self.inner.list_ports_with_binding_profile().await
    }

    async fn list_ports_with_binding_profile_by_network(
        &self,
        network_id: &str,
    ) -> SyncResult<Vec<SdnPort>> {
        self.inner
            .list_ports_with_binding_profile_by_network(network_id)
            .await
    }

    async fn get_network_binding(
        &self,
        neutron_network_id: &str,
    ) -> SyncResult<Option<NetworkBinding>> {
        self.inner.get_network_binding(neutron_network_id).await
    }

    async fn list_network_bindings(&self) -> SyncResult<Vec<NetworkBinding>> {
        self.inner.list_network_bindings().await
    }

    async fn list_uplinkset_bindings(
        &self,
        fabric_network_id: &str,
    ) -> SyncResult<Vec<UplinksetBinding>> {
        self.inner.list_uplinkset_bindings(fabric_network_id).await
    }

    async fn commit(&self, tx: Transaction) -> SyncResult<()> {
        if tx.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot();
        next.apply(&tx)?;
        self.persist(next).await?;
        self.inner.apply(&tx)
    }
}
