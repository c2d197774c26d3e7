//! Integration tests for network and port reconciliation and the
//! synchronization pass, against the in-memory fabric.

mod common;

use common::{config, TestSetup};
use fabric_api::FabricGateway;
use fabric_sync_common::{
    NetworkBinding, StateStore, SyncError, SyncStep, Transaction, UplinksetBinding,
};
use fabric_sync_test::{
    assert_boot_priorities, assert_group_uplink_carries, assert_uplink_set_carries,
    assert_writes_bracketed_by_power_off, find_connection, profile_writes, sdn, servers, topology,
    FabricCall, FakeFabric,
};
use fabric_syncd::{FabricDriver, MappingSource, PortContext};
use fabric_types::uri::network_uri_from_id;
use fabric_types::{BootPriority, NetworkType, PowerState};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn creates(fabric: &FakeFabric) -> usize {
    fabric.count_calls(|c| matches!(c, FabricCall::CreateNetwork { .. }))
}

async fn bind(setup: &TestSetup, port: fabric_sync_common::SdnPort) {
    setup.store.upsert_port(port.clone());
    setup
        .driver
        .bind_port(&PortContext {
            port,
            segments_to_bind: Vec::new(),
        })
        .await;
}

// ── Networks ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_network_create_is_idempotent() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());

    setup.driver.create_network_postcommit(&net).await;
    setup.driver.create_network_postcommit(&net).await;

    assert_eq!(setup.store.list_network_bindings().await.unwrap().len(), 1);
    assert_eq!(creates(&setup.fabric), 1);
    assert!(setup.fabric.network_by_name("Neutron [n1]").is_some());
}

#[tokio::test]
async fn test_flat_mapping_scenario() {
    let setup = TestSetup::new().await;
    let net = sdn::flat_network("n-flat", "physnet1");
    setup.store.upsert_network(net.clone());

    setup.driver.create_network_postcommit(&net).await;

    assert_eq!(
        setup.store.get_network_binding("n-flat").await.unwrap(),
        Some(NetworkBinding::new("n-flat", topology::FLAT_NETWORK_ID, false))
    );
    assert_eq!(creates(&setup.fabric), 0);

    // Deleting the SDN network never deletes the operator's network.
    setup.driver.delete_network_postcommit(&net).await;
    assert!(setup.fabric.network(topology::FLAT_NETWORK_ID).is_some());
    assert_eq!(setup.store.get_network_binding("n-flat").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_network_removes_fabric_network_and_bindings() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    let fabric_id = setup
        .store
        .get_network_binding("n1")
        .await
        .unwrap()
        .unwrap()
        .fabric_network_id;

    setup.driver.delete_network_postcommit(&net).await;

    assert!(setup.fabric.network(&fabric_id).is_none());
    assert!(setup.store.list_network_bindings().await.unwrap().is_empty());
    assert!(setup.store.list_uplinkset_bindings(&fabric_id).await.unwrap().is_empty());
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_TAGGED, &[]).unwrap();
}

// ── Ports ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_boot_priority_election_across_ports() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;

    for (i, mac) in servers::MACS.iter().take(3).enumerate() {
        let port = sdn::baremetal_port(&format!("p{}", i), "n1", mac, servers::HARDWARE_ID, true);
        bind(&setup, port).await;
        let profile = setup.fabric.profile(servers::PROFILE_ID).unwrap();
        assert_boot_priorities(&profile).unwrap();
    }

    let profile = setup.fabric.profile(servers::PROFILE_ID).unwrap();
    let priorities: Vec<BootPriority> = servers::MACS
        .iter()
        .take(3)
        .map(|mac| find_connection(&profile, mac).unwrap().priority())
        .collect();
    assert_eq!(
        priorities,
        vec![
            BootPriority::Primary,
            BootPriority::Secondary,
            BootPriority::NotBootable
        ]
    );
    assert_eq!(
        find_connection(&profile, servers::MACS[2]).unwrap().port_id,
        servers::PORT_IDS[2]
    );
    assert_writes_bracketed_by_power_off(
        &setup.fabric.calls(),
        servers::PROFILE_ID,
        servers::HARDWARE_ID,
    )
    .unwrap();
    assert_eq!(
        setup.fabric.hardware(servers::HARDWARE_ID).unwrap().power_state,
        PowerState::On
    );
}

#[tokio::test]
async fn test_rebinding_port_is_noop() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    let port = sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true);

    bind(&setup, port.clone()).await;
    bind(&setup, port).await;

    let profile = setup.fabric.profile(servers::PROFILE_ID).unwrap();
    assert_eq!(profile.connections.len(), 1);
    assert_eq!(profile_writes(&setup.fabric.calls(), servers::PROFILE_ID), 1);
}

#[tokio::test]
async fn test_binding_on_unmapped_network_makes_no_connection() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    // physnet2 loses its mapping; the binding waits for the next pass.
    setup.store.upsert_network(sdn::vlan_network("n1", "physnet9", 100));
    setup.fabric.clear_calls();

    bind(
        &setup,
        sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true),
    )
    .await;

    assert_eq!(profile_writes(&setup.fabric.calls(), servers::PROFILE_ID), 0);
    assert!(setup
        .fabric
        .profile(servers::PROFILE_ID)
        .unwrap()
        .connections
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_profile_write_waits_for_power_lock() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    setup.fabric.clear_calls();

    // Reads: hardware lookup, first poll (locked), second poll (clear).
    setup
        .fabric
        .script_power_lock(servers::HARDWARE_ID, &[true, true, false]);
    let started = tokio::time::Instant::now();
    bind(
        &setup,
        sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true),
    )
    .await;
    assert!(started.elapsed() >= Duration::from_secs(1));

    let calls = setup.fabric.calls();
    let first_write = calls
        .iter()
        .position(|c| matches!(c, FabricCall::UpdateServerProfile(_)))
        .expect("profile written");
    let hardware_reads = calls[..first_write]
        .iter()
        .filter(|c| matches!(c, FabricCall::GetServerHardware(_)))
        .count();
    // lookup, locked poll, clear poll, re-read before editing
    assert_eq!(hardware_reads, 4);
    assert_eq!(profile_writes(&calls, servers::PROFILE_ID), 1);
    assert_writes_bracketed_by_power_off(&calls, servers::PROFILE_ID, servers::HARDWARE_ID)
        .unwrap();
}

#[tokio::test]
async fn test_delete_port_promotes_secondary() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    let first = sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true);
    let second = sdn::baremetal_port("p2", "n1", servers::MACS[1], servers::HARDWARE_ID, true);
    bind(&setup, first.clone()).await;
    bind(&setup, second).await;

    setup.driver.delete_port_postcommit(&first).await;

    let profile = setup.fabric.profile(servers::PROFILE_ID).unwrap();
    assert_eq!(profile.connections.len(), 1);
    assert_eq!(
        find_connection(&profile, servers::MACS[1]).unwrap().priority(),
        BootPriority::Primary
    );
}

// ── Startup validation ───────────────────────────────────────────────

#[tokio::test]
async fn test_constraint_rejection_before_reconciliation() {
    let fabric = Arc::new(topology::standard());
    let store = Arc::new(fabric_sync_common::MemoryStore::new());
    let mut config = config();
    config.mappings.uplinkset_mappings = MappingSource::Legacy(
        "physnet1:lig-1:uplink-tagged,physnet2:lig-1:uplink-tagged".to_string(),
    );

    let err = FabricDriver::initialize(&config, fabric.clone(), store.clone())
        .await
        .err()
        .expect("ambiguous mapping rejected");
    assert!(matches!(err, SyncError::Configuration { .. }));
    assert!(err.is_fatal());
    assert_eq!(fabric.count_calls(|c| c.is_write()), 0);
    assert!(store.list_network_bindings().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_uplinkset_is_rejected() {
    let fabric = Arc::new(topology::standard());
    let mut config = config();
    config.mappings.uplinkset_mappings = MappingSource::Legacy("physnet2:lig-1:nope".to_string());
    let store = Arc::new(fabric_sync_common::MemoryStore::new());
    let result = FabricDriver::initialize(&config, fabric, store).await;
    assert!(matches!(result, Err(SyncError::Configuration { .. })));
}

// ── Synchronization pass ─────────────────────────────────────────────

#[tokio::test]
async fn test_clean_pass_reports_every_step() {
    let setup = TestSetup::new().await;
    let report = setup.driver.sync_loop().run_pass().await;
    let steps: Vec<SyncStep> = report.steps.iter().map(|r| r.step).collect();
    assert_eq!(steps, SyncStep::ALL.to_vec());
    assert!(report.is_clean());
    assert_eq!(setup.fabric.count_calls(|c| c.is_write()), 0);
}

#[tokio::test]
async fn test_pass_creates_missing_networks() {
    let setup = TestSetup::new().await;
    setup.store.upsert_network(sdn::vlan_network("n1", "physnet2", 100));
    setup.store.upsert_network(sdn::vlan_network("n-unmapped", "physnet9", 101));

    let report = setup.driver.sync_loop().run_pass().await;

    assert!(report.is_clean());
    assert_eq!(report.step(SyncStep::CreateMissing).unwrap().processed, 2);
    assert_eq!(creates(&setup.fabric), 1);
    assert!(setup.store.get_network_binding("n1").await.unwrap().is_some());
    assert_eq!(setup.store.get_network_binding("n-unmapped").await.unwrap(), None);
}

#[tokio::test]
async fn test_pass_recreates_vanished_network() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    let old = setup.store.get_network_binding("n1").await.unwrap().unwrap();
    setup
        .fabric
        .delete_ethernet_network(&old.fabric_network_id)
        .await
        .unwrap();

    setup.driver.sync_loop().run_pass().await;

    let new = setup.store.get_network_binding("n1").await.unwrap().unwrap();
    assert_ne!(new.fabric_network_id, old.fabric_network_id);
    assert!(setup.fabric.network(&new.fabric_network_id).is_some());
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_TAGGED, &[&new.fabric_network_id])
        .unwrap();
}

#[tokio::test]
async fn test_pass_deletes_orphaned_network() {
    let setup = TestSetup::new().await;
    setup.fabric.add_network("orphan-1", "Neutron [gone]", Some(55));
    setup.fabric.attach_network(topology::LIVE_TAGGED, "orphan-1");
    setup
        .store
        .commit(
            Transaction::new()
                .put_network(NetworkBinding::new("gone", "orphan-1", true))
                .put_uplinkset(UplinksetBinding::new(
                    "orphan-1",
                    topology::GROUP_1,
                    topology::TAGGED_UPLINK,
                )),
        )
        .await
        .unwrap();

    let report = setup.driver.sync_loop().run_pass().await;

    assert!(setup.fabric.network("orphan-1").is_none());
    assert_eq!(setup.store.get_network_binding("gone").await.unwrap(), None);
    assert!(setup.store.list_uplinkset_bindings("orphan-1").await.unwrap().is_empty());
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_TAGGED, &[]).unwrap();
    assert_eq!(report.step(SyncStep::DeleteOrphans).unwrap().processed, 1);
    // Operator networks are never touched.
    assert!(setup.fabric.network(topology::FLAT_NETWORK_ID).is_some());
}

#[tokio::test]
async fn test_pass_tears_down_unmapped_network_with_connections() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    bind(
        &setup,
        sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true),
    )
    .await;
    let fabric_id = setup
        .store
        .get_network_binding("n1")
        .await
        .unwrap()
        .unwrap()
        .fabric_network_id;

    // The network moves to a physical network without a mapping.
    setup.store.upsert_network(sdn::vlan_network("n1", "physnet9", 100));
    setup.driver.sync_loop().run_pass().await;

    assert!(setup.fabric.network(&fabric_id).is_none());
    assert_eq!(setup.store.get_network_binding("n1").await.unwrap(), None);
    assert!(setup
        .fabric
        .profile(servers::PROFILE_ID)
        .unwrap()
        .connections
        .is_empty());
}

#[tokio::test]
async fn test_pass_deletes_stray_network_of_bound_network() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    setup.fabric.add_network("stray-1", "Neutron [n1]", Some(100));

    setup.driver.sync_loop().run_pass().await;

    assert!(setup.fabric.network("stray-1").is_none());
    let binding = setup.store.get_network_binding("n1").await.unwrap().unwrap();
    assert!(setup.fabric.network(&binding.fabric_network_id).is_some());
}

#[tokio::test]
async fn test_pass_drops_outdated_flat_binding() {
    let setup = TestSetup::new().await;
    setup
        .store
        .commit(Transaction::new().put_network(NetworkBinding::new("n-old", "net-retired", false)))
        .await
        .unwrap();

    let report = setup.driver.sync_loop().run_pass().await;

    assert_eq!(setup.store.get_network_binding("n-old").await.unwrap(), None);
    assert_eq!(
        report.step(SyncStep::DeleteOutdatedFlatMappings).unwrap().processed,
        1
    );
}

#[tokio::test]
async fn test_pass_converges_uplink_membership() {
    let setup = TestSetup::new().await;
    let net = sdn::vlan_network("n1", "physnet2", 100);
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;
    let id = setup
        .store
        .get_network_binding("n1")
        .await
        .unwrap()
        .unwrap()
        .fabric_network_id;

    // Drift: missing from one mapped uplinkset, present on an unmapped one.
    setup
        .fabric
        .remove_network_from_uplink_set(topology::LIVE_GROUP_2, &network_uri_from_id(&id))
        .await
        .unwrap();
    setup.fabric.attach_network(topology::LIVE_UNTAGGED, &id);

    setup.driver.sync_loop().run_pass().await;

    assert_uplink_set_carries(&setup.fabric, topology::LIVE_TAGGED, &[&id]).unwrap();
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_GROUP_2, &[&id]).unwrap();
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_UNTAGGED, &[]).unwrap();
    assert_group_uplink_carries(
        &setup.fabric,
        topology::GROUP_1,
        topology::TAGGED_UPLINK,
        &[&id],
    )
    .unwrap();
    assert_eq!(setup.store.list_uplinkset_bindings(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pass_repairs_connections() {
    let setup = TestSetup::new().await;
    let n1 = sdn::vlan_network("n1", "physnet2", 100);
    let n2 = sdn::vlan_network("n2", "physnet2", 200);
    for net in [&n1, &n2] {
        setup.store.upsert_network(net.clone());
        setup.driver.create_network_postcommit(net).await;
    }
    let p1 = sdn::baremetal_port("p1", "n1", servers::MACS[0], servers::HARDWARE_ID, true);
    let p2 = sdn::baremetal_port("p2", "n2", servers::MACS[1], servers::HARDWARE_ID, true);
    bind(&setup, p1.clone()).await;
    bind(&setup, p2).await;

    // p1 moves to n2 and n1's fabric network disappears behind our back.
    let n1_fabric = setup.store.get_network_binding("n1").await.unwrap().unwrap().fabric_network_id;
    let n2_fabric = setup.store.get_network_binding("n2").await.unwrap().unwrap().fabric_network_id;
    let mut moved = p1.clone();
    moved.network_id = "n2".to_string();
    setup.store.upsert_port(moved);
    setup.fabric.delete_ethernet_network(&n1_fabric).await.unwrap();
    setup.fabric.clear_calls();

    let report = setup.driver.sync_loop().run_pass().await;

    assert_eq!(report.step(SyncStep::RepairConnections).unwrap().failed, 0);
    let profile = setup.fabric.profile(servers::PROFILE_ID).unwrap();
    assert_eq!(profile.connections.len(), 2);
    for mac in &servers::MACS[..2] {
        assert_eq!(find_connection(&profile, mac).unwrap().network_id(), n2_fabric);
    }
    assert_boot_priorities(&profile).unwrap();
    assert_writes_bracketed_by_power_off(
        &setup.fabric.calls(),
        servers::PROFILE_ID,
        servers::HARDWARE_ID,
    )
    .unwrap();

    // Nothing left to repair.
    setup.fabric.clear_calls();
    setup.driver.sync_loop().run_pass().await;
    assert_eq!(profile_writes(&setup.fabric.calls(), servers::PROFILE_ID), 0);
}

#[tokio::test]
async fn test_network_type_lookup_for_flat_on_uplink_physnet() {
    let setup = TestSetup::new().await;
    let net = fabric_sync_common::LogicalNetwork::new(
        "n-untagged",
        Some("physnet2"),
        NetworkType::Flat,
        None,
    );
    setup.store.upsert_network(net.clone());
    setup.driver.create_network_postcommit(&net).await;

    let binding = setup.store.get_network_binding("n-untagged").await.unwrap().unwrap();
    assert!(binding.manageable);
    assert_uplink_set_carries(
        &setup.fabric,
        topology::LIVE_UNTAGGED,
        &[&binding.fabric_network_id],
    )
    .unwrap();
    assert_uplink_set_carries(&setup.fabric, topology::LIVE_TAGGED, &[]).unwrap();
    assert_eq!(setup.fabric.network(&binding.fabric_network_id).unwrap().vlan_id, None);
}
