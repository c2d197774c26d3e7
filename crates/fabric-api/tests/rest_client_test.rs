// Integration tests for `RestFabricClient` using wiremock.

use fabric_api::models::NewEthernetNetwork;
use fabric_api::{FabricError, FabricGateway, RestFabricClient};
use fabric_types::{BootPriority, EthernetNetworkType, PowerState, VlanId};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestFabricClient) {
    let server = MockServer::start().await;
    let client = RestFabricClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .unwrap()
        .with_session_token("token-1");
    (server, client)
}

fn uplink_set_body(id: &str, name: &str, networks: &[&str]) -> serde_json::Value {
    json!({
        "uri": format!("/rest/uplink-sets/{}", id),
        "name": name,
        "ethernetNetworkType": "Tagged",
        "logicalInterconnectUri": "/rest/logical-interconnects/li-1",
        "networkUris": networks,
        "portConfigInfos": [],
    })
}

// ── Networks ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_network_sends_headers_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/ethernet-networks"))
        .and(header("Auth", "token-1"))
        .and(header("X-API-Version", "300"))
        .and(body_json(json!({
            "name": "Neutron [n-1]",
            "ethernetNetworkType": "Tagged",
            "vlanId": 100,
            "purpose": "General",
            "smartLink": false,
            "privateNetwork": false,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uri": "/rest/ethernet-networks/net-9",
            "name": "Neutron [n-1]",
            "ethernetNetworkType": "Tagged",
            "vlanId": 100,
        })))
        .mount(&server)
        .await;

    let body = NewEthernetNetwork::new("Neutron [n-1]", Some(VlanId::new(100).unwrap()));
    let net = client.create_ethernet_network(&body).await.unwrap();

    assert_eq!(net.id(), "net-9");
    assert_eq!(net.ethernet_network_type, Some(EthernetNetworkType::Tagged));
}

#[tokio::test]
async fn test_create_network_follows_async_task() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/ethernet-networks"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "uri": "/rest/tasks/t-1",
            "taskState": "Running",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/tasks/t-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/rest/tasks/t-1",
            "taskState": "Completed",
            "associatedResource": {"resourceUri": "/rest/ethernet-networks/net-7"},
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/ethernet-networks/net-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/rest/ethernet-networks/net-7",
            "name": "Neutron [n-2]",
        })))
        .mount(&server)
        .await;

    let net = client
        .create_ethernet_network(&NewEthernetNetwork::new("Neutron [n-2]", None))
        .await
        .unwrap();
    assert_eq!(net.id(), "net-7");
}

#[tokio::test]
async fn test_failed_task_surfaces_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/ethernet-networks"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "uri": "/rest/tasks/t-2",
            "taskState": "Error",
            "taskErrors": [{"message": "VLAN 100 already in use"}],
        })))
        .mount(&server)
        .await;

    let err = client
        .create_ethernet_network(&NewEthernetNetwork::new("Neutron [n-3]", None))
        .await
        .unwrap_err();
    match err {
        FabricError::TaskFailed { task, message } => {
            assert_eq!(task, "/rest/tasks/t-2");
            assert_eq!(message, "VLAN 100 already in use");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_networks_follows_pages() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ethernet-networks"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [{"uri": "/rest/ethernet-networks/b", "name": "Neutron [y]"}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/ethernet-networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [{"uri": "/rest/ethernet-networks/a", "name": "Neutron [x]"}],
            "nextPageUri": "/rest/ethernet-networks?start=1",
        })))
        .mount(&server)
        .await;

    let nets = client.list_ethernet_networks().await.unwrap();
    let ids: Vec<&str> = nets.iter().map(|n| n.id()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/ethernet-networks/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": "RESOURCE_NOT_FOUND",
            "message": "The resource was not found.",
        })))
        .mount(&server)
        .await;

    let err = client.delete_ethernet_network("gone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_conflict_is_retryable() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/server-profiles/sp-1"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "profile is being updated",
        })))
        .mount(&server)
        .await;

    let err = client.get_server_profile("sp-1").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        err.to_string(),
        "Conflict on /rest/server-profiles/sp-1: profile is being updated"
    );
}

// ── Uplinksets ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_network_to_uplink_set_puts_whole_resource() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/uplink-sets/us-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(uplink_set_body(
            "us-1",
            "uplink-a",
            &["/rest/ethernet-networks/old"],
        )))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/rest/uplink-sets/us-1"))
        .and(body_json(uplink_set_body(
            "us-1",
            "uplink-a",
            &["/rest/ethernet-networks/old", "/rest/ethernet-networks/new"],
        )))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .add_network_to_uplink_set("/rest/uplink-sets/us-1", "new")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remove_absent_network_is_noop() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/uplink-sets/us-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(uplink_set_body("us-2", "uplink-b", &[])),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/rest/uplink-sets/us-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client.remove_network_from_uplink_set("us-2", "net-1").await.unwrap();
}

#[tokio::test]
async fn test_list_uplink_sets_by_name_filters() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/uplink-sets"))
        .and(query_param("filter", "name='uplink-a'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                uplink_set_body("us-1", "uplink-a", &[]),
                uplink_set_body("us-9", "uplink-a-copy", &[]),
            ],
        })))
        .mount(&server)
        .await;

    let found = client.list_uplink_sets_by_name("uplink-a").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), "us-1");
}

#[tokio::test]
async fn test_associated_uplink_groups() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/ethernet-networks/net-1/associatedUplinkGroups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["/rest/uplink-sets/us-1"])))
        .mount(&server)
        .await;

    let uris = client.get_associated_uplink_groups("net-1").await.unwrap();
    assert_eq!(uris, vec!["/rest/uplink-sets/us-1".to_string()]);
}

// ── Servers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_power_state_request() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/rest/server-hardware/sh-1/powerState"))
        .and(body_json(json!({"powerState": "Off", "powerControl": "MomentaryPress"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.update_power_state("sh-1", PowerState::Off).await.unwrap();
    assert!(client.update_power_state("sh-1", PowerState::Unknown).await.is_err());
}

#[tokio::test]
async fn test_server_hardware_and_profile_round_trip() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/server-hardware/sh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "/rest/server-hardware/sh-1",
            "powerState": "On",
            "powerLock": false,
            "serverProfileUri": "/rest/server-profiles/sp-1",
            "portMap": {"deviceSlots": [{
                "location": "Flb",
                "slotNumber": 1,
                "physicalPorts": [{"portNumber": 1, "virtualPorts": [
                    {"mac": "AA:BB:CC:00:00:01", "portFunction": "a"}
                ]}],
            }]},
        })))
        .mount(&server)
        .await;

    let profile_body = json!({
        "uri": "/rest/server-profiles/sp-1",
        "name": "server-1",
        "state": "Normal",
        "connections": [{
            "id": 1,
            "name": "NeutronPort[aa:bb:cc:00:00:01]",
            "mac": "AA:BB:CC:00:00:01",
            "portId": "Flb 1:1-a",
            "networkUri": "/rest/ethernet-networks/net-1",
            "boot": {"priority": "Primary"},
            "functionType": "Ethernet",
        }],
    });

    Mock::given(method("PUT"))
        .and(path("/rest/server-profiles/sp-1"))
        .and(body_json(profile_body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let hw = client.get_server_hardware("sh-1").await.unwrap();
    assert_eq!(hw.power_state, PowerState::On);
    assert_eq!(hw.port_map.device_slots[0].location, "Flb");

    let profile: fabric_api::ServerProfile = serde_json::from_value(profile_body.clone()).unwrap();
    let updated = client.update_server_profile(&profile).await.unwrap();
    assert_eq!(updated.connections[0].priority(), BootPriority::Primary);
}
