//! Shared setup for fabric-syncd integration tests.

#![allow(dead_code)]

use fabric_sync_common::MemoryStore;
use fabric_sync_test::{servers, topology, FakeFabric};
use fabric_syncd::{Config, FabricDriver, MappingSource};
use fabric_types::PowerState;
use std::sync::Arc;

/// Standard topology, one standard server, an empty store and a driver.
pub struct TestSetup {
    pub fabric: Arc<FakeFabric>,
    pub store: Arc<MemoryStore>,
    pub driver: FabricDriver,
}

/// Configuration mapping the standard topology.
pub fn config() -> Config {
    let mut config = Config::default();
    config.fabric.url = "https://fabric.test".to_string();
    config.mappings.uplinkset_mappings =
        MappingSource::Legacy(topology::UPLINKSET_MAPPINGS.to_string());
    config.mappings.flat_net_mappings =
        MappingSource::Legacy(topology::FLAT_MAPPINGS.to_string());
    config.sync.power_lock_poll_secs = 1;
    config.sync.profile_poll_secs = 1;
    config
}

impl TestSetup {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let fabric = Arc::new(topology::standard());
        servers::add_standard_server(&fabric, PowerState::On);
        let store = Arc::new(MemoryStore::new());
        let driver = FabricDriver::initialize(&config, fabric.clone(), store.clone())
            .await
            .expect("driver initialization");
        fabric.clear_calls();
        Self {
            fabric,
            store,
            driver,
        }
    }
}
