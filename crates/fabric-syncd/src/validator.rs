//! Startup checks of the mapping table against the uplink topology.
//!
//! Both checks are fatal: an ambiguous table cannot be repaired at runtime,
//! so the engine refuses to start.

use fabric_sync_common::{SyncError, SyncResult};
use std::collections::BTreeMap;
use tracing::error;

use crate::mapping::{MappingTable, UplinkTarget, UplinkTopology};

const FIELD: &str = "uplinkset_mappings";

/// Runs every constraint check.
pub fn validate(table: &MappingTable, topology: &UplinkTopology) -> SyncResult<()> {
    check_unique_uplinkset_per_provider(table)?;
    check_uplinkset_types(table, topology)?;
    Ok(())
}

/// No (group, uplinkset) pair may be claimed by two physical networks.
pub fn check_unique_uplinkset_per_provider(table: &MappingTable) -> SyncResult<()> {
    let mut owners: BTreeMap<&UplinkTarget, &str> = BTreeMap::new();
    for (physnet, targets) in table.uplink_mappings() {
        for target in targets {
            if let Some(other) = owners.insert(target, physnet.as_str()) {
                if other != physnet {
                    let err = SyncError::configuration(
                        FIELD,
                        format!(
                            "physical networks {} and {} are both mapped to uplinkset {} of {}",
                            other, physnet, target.uplinkset_name, target.group_id
                        ),
                    );
                    error!("{}", err);
                    return Err(err);
                }
            }
        }
    }
    Ok(())
}

/// A physical network may map at most one uplinkset of each ethernet type
/// within one group.
pub fn check_uplinkset_types(table: &MappingTable, topology: &UplinkTopology) -> SyncResult<()> {
    for (physnet, targets) in table.uplink_mappings() {
        let mut seen = BTreeMap::new();
        for target in targets {
            let Some(ethernet_type) = topology.ethernet_type(target) else {
                continue;
            };
            if let Some(first) = seen.insert((target.group_id.as_str(), ethernet_type), target) {
                let err = SyncError::configuration(
                    FIELD,
                    format!(
                        "physical network {} maps two {} uplinksets ({}, {}) in uplink group {}",
                        physnet,
                        ethernet_type.as_str().to_lowercase(),
                        first.uplinkset_name,
                        target.uplinkset_name,
                        target.group_id
                    ),
                );
                error!("{}", err);
                return Err(err);
            }
        }
    }
    Ok(())
}
