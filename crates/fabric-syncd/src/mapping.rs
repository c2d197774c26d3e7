//! Physical network mappings.
//!
//! Operators map each physical network either to uplinksets of uplink-group
//! templates or to one pre-existing flat fabric network. The raw
//! [`MappingTable`] is parsed once from configuration. At startup it is
//! resolved against the live templates into [`ResolvedMappings`], which
//! splits uplinkset mappings by ethernet type and answers "where does this
//! network go" for the reconcilers.

use fabric_api::FabricGateway;
use fabric_sync_common::{SyncError, SyncResult};
use fabric_types::{EthernetNetworkType, NetworkType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One uplinkset of an uplink-group template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UplinkTarget {
    pub group_id: String,
    pub uplinkset_name: String,
}

impl UplinkTarget {
    pub fn new(group_id: impl Into<String>, uplinkset_name: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            uplinkset_name: uplinkset_name.into(),
        }
    }
}

/// A mapping option as written in the configuration file.
///
/// Either the legacy comma-separated string or a table keyed by physical
/// network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingSource {
    Legacy(String),
    Table(BTreeMap<String, MappingValue>),
}

impl Default for MappingSource {
    fn default() -> Self {
        MappingSource::Legacy(String::new())
    }
}

/// Value of a table-form mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingValue {
    One(String),
    Many(Vec<String>),
}

impl MappingValue {
    fn items(&self) -> Vec<&str> {
        match self {
            MappingValue::One(s) => vec![s.as_str()],
            MappingValue::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

const UPLINKSET_MAPPINGS: &str = "uplinkset_mappings";
const FLAT_NET_MAPPINGS: &str = "flat_net_mappings";

/// Operator mapping of physical networks, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    uplinks: BTreeMap<String, Vec<UplinkTarget>>,
    flat: BTreeMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the legacy string forms:
    /// `"<physnet>:<group>:<uplinkset>[:<group>:<uplinkset>...],..."` and
    /// `"<physnet>:<fabric_network_id>,..."`.
    pub fn parse(uplinkset_mappings: &str, flat_net_mappings: &str) -> SyncResult<Self> {
        Self::from_sources(
            &MappingSource::Legacy(uplinkset_mappings.to_string()),
            &MappingSource::Legacy(flat_net_mappings.to_string()),
        )
    }

    /// Normalizes both configuration shapes into one table.
    pub fn from_sources(uplinks: &MappingSource, flat: &MappingSource) -> SyncResult<Self> {
        let mut table = Self::new();

        match uplinks {
            MappingSource::Legacy(raw) => {
                for entry in split_entries(raw) {
                    let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
                    if parts.len() < 3
                        || parts.len() % 2 == 0
                        || parts.iter().any(|p| p.is_empty())
                    {
                        return Err(SyncError::configuration(
                            UPLINKSET_MAPPINGS,
                            format!("'{}' is not <physnet>:<group_id>:<uplinkset_name>", entry),
                        ));
                    }
                    for pair in parts[1..].chunks(2) {
                        table.add_uplink(parts[0], pair[0], pair[1]);
                    }
                }
            }
            MappingSource::Table(entries) => {
                for (physnet, value) in entries {
                    for item in value.items() {
                        let (group, uplinkset) = item
                            .split_once(':')
                            .map(|(g, u)| (g.trim(), u.trim()))
                            .filter(|(g, u)| !g.is_empty() && !u.is_empty() && !u.contains(':'))
                            .ok_or_else(|| {
                                SyncError::configuration(
                                    UPLINKSET_MAPPINGS,
                                    format!(
                                        "'{}' for {} is not <group_id>:<uplinkset_name>",
                                        item, physnet
                                    ),
                                )
                            })?;
                        table.add_uplink(physnet, group, uplinkset);
                    }
                }
            }
        }

        match flat {
            MappingSource::Legacy(raw) => {
                for entry in split_entries(raw) {
                    match entry.split(':').map(str::trim).collect::<Vec<_>>().as_slice() {
                        [physnet, network] if !physnet.is_empty() && !network.is_empty() => {
                            table.add_flat(physnet, network)?
                        }
                        _ => {
                            return Err(SyncError::configuration(
                                FLAT_NET_MAPPINGS,
                                format!("'{}' is not <physnet>:<fabric_network_id>", entry),
                            ))
                        }
                    }
                }
            }
            MappingSource::Table(entries) => {
                for (physnet, value) in entries {
                    match value.items().as_slice() {
                        [network] if !network.trim().is_empty() => {
                            table.add_flat(physnet, network.trim())?
                        }
                        _ => {
                            return Err(SyncError::configuration(
                                FLAT_NET_MAPPINGS,
                                format!("{} must map to exactly one fabric network", physnet),
                            ))
                        }
                    }
                }
            }
        }

        debug!(
            "Loaded mappings: {} uplink physnets, {} flat physnets",
            table.uplinks.len(),
            table.flat.len()
        );
        Ok(table)
    }

    /// Adds an uplinkset mapping. Repeated pairs are kept once.
    pub fn add_uplink(&mut self, physnet: &str, group_id: &str, uplinkset_name: &str) {
        let target = UplinkTarget::new(group_id, uplinkset_name);
        let targets = self.uplinks.entry(physnet.to_string()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Adds a flat mapping. A physical network maps to one fabric network.
    pub fn add_flat(&mut self, physnet: &str, fabric_network_id: &str) -> SyncResult<()> {
        match self.flat.get(physnet) {
            Some(existing) if existing != fabric_network_id => Err(SyncError::configuration(
                FLAT_NET_MAPPINGS,
                format!(
                    "{} is mapped to both {} and {}",
                    physnet, existing, fabric_network_id
                ),
            )),
            _ => {
                self.flat
                    .insert(physnet.to_string(), fabric_network_id.to_string());
                Ok(())
            }
        }
    }

    pub fn uplink_mappings(&self) -> &BTreeMap<String, Vec<UplinkTarget>> {
        &self.uplinks
    }

    pub fn flat_mappings(&self) -> &BTreeMap<String, String> {
        &self.flat
    }

    /// Every uplink group named by the uplinkset mappings.
    pub fn group_ids(&self) -> BTreeSet<&str> {
        self.uplinks
            .values()
            .flatten()
            .map(|t| t.group_id.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.uplinks.is_empty() && self.flat.is_empty()
    }
}

fn split_entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|e| !e.is_empty())
}

/// Ethernet types of the mapped template uplinksets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UplinkTopology {
    types: BTreeMap<UplinkTarget, Option<EthernetNetworkType>>,
}

impl UplinkTopology {
    /// Reads the templates of every mapped group.
    ///
    /// A missing group or a mapped uplinkset absent from its template is a
    /// configuration error.
    pub async fn discover(gateway: &dyn FabricGateway, table: &MappingTable) -> SyncResult<Self> {
        let mut topology = Self::default();
        for group_id in table.group_ids() {
            let group = gateway.get_uplink_group(group_id).await.map_err(|e| {
                if e.is_not_found() {
                    SyncError::configuration(
                        UPLINKSET_MAPPINGS,
                        format!("uplink group {} not found", group_id),
                    )
                } else {
                    SyncError::from(e)
                }
            })?;

            for target in table.uplinks.values().flatten().filter(|t| t.group_id == group_id) {
                let uplinkset = group.uplink_set(&target.uplinkset_name).ok_or_else(|| {
                    SyncError::configuration(
                        UPLINKSET_MAPPINGS,
                        format!(
                            "uplinkset {} not found in uplink group {}",
                            target.uplinkset_name, group_id
                        ),
                    )
                })?;
                if uplinkset.ethernet_network_type.is_none() {
                    warn!(
                        "Uplinkset {} of {} is neither tagged nor untagged; ignoring it",
                        target.uplinkset_name, group_id
                    );
                }
                topology.insert(target.clone(), uplinkset.ethernet_network_type);
            }
        }
        Ok(topology)
    }

    pub fn insert(&mut self, target: UplinkTarget, ethernet_type: Option<EthernetNetworkType>) {
        self.types.insert(target, ethernet_type);
    }

    pub fn ethernet_type(&self, target: &UplinkTarget) -> Option<EthernetNetworkType> {
        self.types.get(target).copied().flatten()
    }
}

impl FromIterator<(UplinkTarget, Option<EthernetNetworkType>)> for UplinkTopology {
    fn from_iter<I: IntoIterator<Item = (UplinkTarget, Option<EthernetNetworkType>)>>(
        iter: I,
    ) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// Where a logical network lands on the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTarget<'a> {
    /// Create an engine-owned network carried by these uplinksets.
    Uplinks {
        ethernet_type: EthernetNetworkType,
        targets: &'a [UplinkTarget],
    },
    /// Reuse an operator-owned fabric network.
    Flat(&'a str),
}

/// Mapping table split per ethernet type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMappings {
    tagged: BTreeMap<String, Vec<UplinkTarget>>,
    untagged: BTreeMap<String, Vec<UplinkTarget>>,
    flat: BTreeMap<String, String>,
}

impl ResolvedMappings {
    /// Files each uplinkset mapping under its template's ethernet type.
    pub fn resolve(table: &MappingTable, topology: &UplinkTopology) -> Self {
        let mut resolved = Self {
            flat: table.flat.clone(),
            ..Self::default()
        };
        for (physnet, targets) in &table.uplinks {
            for target in targets {
                let by_type = match topology.ethernet_type(target) {
                    Some(EthernetNetworkType::Tagged) => &mut resolved.tagged,
                    Some(EthernetNetworkType::Untagged) => &mut resolved.untagged,
                    None => continue,
                };
                by_type.entry(physnet.clone()).or_default().push(target.clone());
            }
        }
        resolved
    }

    /// Uplinksets mapped for a physical network and ethernet type.
    pub fn uplinks_for(
        &self,
        physnet: &str,
        ethernet_type: EthernetNetworkType,
    ) -> &[UplinkTarget] {
        let by_type = match ethernet_type {
            EthernetNetworkType::Tagged => &self.tagged,
            EthernetNetworkType::Untagged => &self.untagged,
        };
        by_type.get(physnet).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn flat_network(&self, physnet: &str) -> Option<&str> {
        self.flat.get(physnet).map(String::as_str)
    }

    /// Decides where a network goes. Uplink mappings win over flat ones.
    pub fn target_for(
        &self,
        physnet: Option<&str>,
        network_type: &NetworkType,
    ) -> Option<MappingTarget<'_>> {
        let physnet = physnet?;
        if let Some(ethernet_type) = network_type.ethernet_type() {
            let targets = self.uplinks_for(physnet, ethernet_type);
            if !targets.is_empty() {
                return Some(MappingTarget::Uplinks {
                    ethernet_type,
                    targets,
                });
            }
        }
        self.flat_network(physnet).map(MappingTarget::Flat)
    }

    pub fn is_mapped(&self, physnet: Option<&str>, network_type: &NetworkType) -> bool {
        self.target_for(physnet, network_type).is_some()
    }

    /// Fabric networks named by flat mappings.
    pub fn flat_network_ids(&self) -> BTreeSet<&str> {
        self.flat.values().map(String::as_str).collect()
    }
}
