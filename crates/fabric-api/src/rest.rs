//! REST implementation of [`FabricGateway`].
//!
//! Wraps `reqwest::Client` with backend-specific URL construction, the
//! `Auth`/`X-API-Version` headers, collection paging and asynchronous task
//! tracking. Mutating requests may answer `202 Accepted` with a task
//! resource; those are polled until the task settles.

use async_trait::async_trait;
use fabric_types::uri::{
    id_from_uri, network_uri_from_id, resource_uri, ETHERNET_NETWORKS, INTERCONNECTS,
    SERVER_HARDWARE, SERVER_PROFILES, UPLINK_GROUPS, UPLINK_SETS,
};
use fabric_types::PowerState;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FabricError, FabricResult};
use crate::gateway::FabricGateway;
use crate::models::{
    Collection, ErrorBody, EthernetNetwork, Interconnect, NewEthernetNetwork, PowerStateRequest,
    ServerHardware, ServerProfile, Task, UplinkGroup, UplinkSet,
};

/// Header carrying the session token.
pub const AUTH_HEADER: &str = "Auth";

/// Header selecting the REST API version.
pub const API_VERSION_HEADER: &str = "X-API-Version";

/// Default REST API version.
pub const DEFAULT_API_VERSION: u32 = 300;

const TASKS_PREFIX: &str = "/rest/tasks/";

/// Connection options for [`RestFabricClient`].
#[derive(Debug, Clone)]
pub struct RestClientOptions {
    pub api_version: u32,
    /// Pre-provisioned session token. Session management happens elsewhere.
    pub session_token: Option<String>,
    pub request_timeout: Duration,
    /// Additional PEM trust root for the backend's TLS certificate.
    pub ca_cert_pem: Option<Vec<u8>>,
    pub task_poll_interval: Duration,
}

impl Default for RestClientOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION,
            session_token: None,
            request_timeout: Duration::from_secs(60),
            ca_cert_pem: None,
            task_poll_interval: Duration::from_secs(1),
        }
    }
}

/// What a mutating request answered with.
enum Outcome {
    Body(String),
    Task(Task),
    Empty,
}

/// HTTP client for the fabric backend.
pub struct RestFabricClient {
    http: reqwest::Client,
    base_url: Url,
    api_version: u32,
    session_token: Option<String>,
    task_poll_interval: Duration,
}

impl RestFabricClient {
    /// Creates a client for the backend at `base_url`.
    pub fn new(base_url: &str, options: RestClientOptions) -> FabricResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(options.request_timeout);
        if let Some(pem) = &options.ca_cert_pem {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            api_version: options.api_version,
            session_token: options.session_token,
            task_poll_interval: options.task_poll_interval,
        })
    }

    /// Creates a client with a pre-built `reqwest::Client` and default options.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> FabricResult<Self> {
        let defaults = RestClientOptions::default();
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            api_version: defaults.api_version,
            session_token: None,
            task_poll_interval: Duration::from_millis(10),
        })
    }

    /// Sets the session token sent with every request.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> FabricResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self
            .http
            .request(method, url)
            .header(API_VERSION_HEADER, self.api_version.to_string());
        match &self.session_token {
            Some(token) => req.header(AUTH_HEADER, token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> FabricResult<T> {
        let url = self.url(path)?;
        self.get_url(path, url).await
    }

    async fn get_url<T: DeserializeOwned>(&self, resource: &str, url: Url) -> FabricResult<T> {
        debug!("GET {}", url);
        let resp = self.request(Method::GET, url).send().await?;
        let (_, body) = Self::checked_body(resource, resp).await?;
        Self::decode(resource, &body)
    }

    /// Follows `nextPageUri` until the collection is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        first: Url,
    ) -> FabricResult<Vec<T>> {
        let mut members = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: Collection<T> = self.get_url(resource, url).await?;
            members.extend(page.members);
            if let Some(path) = page.next_page_uri {
                next = Some(self.url(&path)?);
            }
        }
        Ok(members)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> FabricResult<Outcome> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let mut req = self.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let (status, body) = Self::checked_body(path, resp).await?;

        if body.trim().is_empty() {
            return Ok(Outcome::Empty);
        }
        if status == StatusCode::ACCEPTED {
            if let Ok(task) = serde_json::from_str::<Task>(&body) {
                if task.uri.starts_with(TASKS_PREFIX) {
                    return Ok(Outcome::Task(self.wait_for_task(task).await?));
                }
            }
        }
        Ok(Outcome::Body(body))
    }

    async fn wait_for_task(&self, mut task: Task) -> FabricResult<Task> {
        while task.is_running() {
            tokio::time::sleep(self.task_poll_interval).await;
            let uri = task.uri.clone();
            task = self.get(&uri).await?;
        }
        if task.is_failed() {
            warn!("Backend task {} ended in state {}", task.uri, task.task_state);
            return Err(FabricError::TaskFailed {
                task: task.uri.clone(),
                message: task.error_message(),
            });
        }
        Ok(task)
    }

    /// Resolves a mutation outcome to the resource it produced, re-reading
    /// `fallback` when the backend did not return one.
    async fn resolve<T: DeserializeOwned>(
        &self,
        outcome: Outcome,
        fallback: &str,
    ) -> FabricResult<T> {
        match outcome {
            Outcome::Body(body) => Self::decode(fallback, &body),
            Outcome::Task(task) => {
                let uri = task.resource_uri().unwrap_or(fallback).to_string();
                self.get(&uri).await
            }
            Outcome::Empty => self.get(fallback).await,
        }
    }

    async fn checked_body(resource: &str, resp: Response) -> FabricResult<(StatusCode, String)> {
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok((status, body));
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error_code))
            .unwrap_or(body);
        Err(FabricError::from_status(status.as_u16(), resource, message))
    }

    fn decode<T: DeserializeOwned>(resource: &str, body: &str) -> FabricResult<T> {
        serde_json::from_str(body).map_err(|e| FabricError::decode(resource, e.to_string()))
    }

    async fn set_uplink_set_membership(
        &self,
        uplink_set: &str,
        network: &str,
        attach: bool,
    ) -> FabricResult<()> {
        let mut us = self.get_uplink_set(uplink_set).await?;
        let network_id = id_from_uri(network);
        if us.carries(network_id) == attach {
            return Ok(());
        }

        if attach {
            us.network_uris.push(network_uri_from_id(network_id));
        } else {
            us.network_uris.retain(|uri| id_from_uri(uri) != network_id);
        }
        let uri = us.uri.clone();
        self.send(Method::PUT, &uri, Some(&us)).await?;
        Ok(())
    }
}

/// Accepts either a bare URI array or a `{"members": [...]}` envelope.
fn uri_list(resource: &str, value: Value) -> FabricResult<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("members") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Null => Vec::new(),
        other => {
            return Err(FabricError::decode(resource, format!("unexpected body: {}", other)));
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Object(o) => o.get("uri").and_then(|u| u.as_str()).map(str::to_string),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl FabricGateway for RestFabricClient {
    async fn create_ethernet_network(
        &self,
        network: &NewEthernetNetwork,
    ) -> FabricResult<EthernetNetwork> {
        let outcome = self.send(Method::POST, ETHERNET_NETWORKS, Some(network)).await?;
        match outcome {
            Outcome::Body(body) => Self::decode(ETHERNET_NETWORKS, &body),
            Outcome::Task(task) => match task.resource_uri() {
                Some(uri) => self.get(&uri.to_string()).await,
                None => Err(FabricError::internal(format!(
                    "task {} created no network for {}",
                    task.uri, network.name
                ))),
            },
            Outcome::Empty => Err(FabricError::internal(format!(
                "backend returned no network for {}",
                network.name
            ))),
        }
    }

    async fn get_ethernet_network(&self, id_or_uri: &str) -> FabricResult<EthernetNetwork> {
        self.get(&resource_uri(ETHERNET_NETWORKS, id_or_uri)).await
    }

    async fn list_ethernet_networks(&self) -> FabricResult<Vec<EthernetNetwork>> {
        let url = self.url(ETHERNET_NETWORKS)?;
        self.list_all(ETHERNET_NETWORKS, url).await
    }

    async fn delete_ethernet_network(&self, id_or_uri: &str) -> FabricResult<()> {
        let uri = resource_uri(ETHERNET_NETWORKS, id_or_uri);
        self.send::<Value>(Method::DELETE, &uri, None).await?;
        Ok(())
    }

    async fn get_associated_uplink_groups(
        &self,
        network_id_or_uri: &str,
    ) -> FabricResult<Vec<String>> {
        let path = format!(
            "{}/associatedUplinkGroups",
            resource_uri(ETHERNET_NETWORKS, network_id_or_uri)
        );
        let value: Value = self.get(&path).await?;
        uri_list(&path, value)
    }

    async fn get_uplink_set(&self, id_or_uri: &str) -> FabricResult<UplinkSet> {
        self.get(&resource_uri(UPLINK_SETS, id_or_uri)).await
    }

    async fn list_uplink_sets_by_name(&self, name: &str) -> FabricResult<Vec<UplinkSet>> {
        let mut url = self.url(UPLINK_SETS)?;
        url.query_pairs_mut()
            .append_pair("filter", &format!("name='{}'", name));
        let all: Vec<UplinkSet> = self.list_all(UPLINK_SETS, url).await?;
        Ok(all.into_iter().filter(|us| us.name == name).collect())
    }

    async fn add_network_to_uplink_set(&self, uplink_set: &str, network: &str) -> FabricResult<()> {
        self.set_uplink_set_membership(uplink_set, network, true).await
    }

    async fn remove_network_from_uplink_set(
        &self,
        uplink_set: &str,
        network: &str,
    ) -> FabricResult<()> {
        self.set_uplink_set_membership(uplink_set, network, false).await
    }

    async fn get_uplink_group(&self, id_or_uri: &str) -> FabricResult<UplinkGroup> {
        self.get(&resource_uri(UPLINK_GROUPS, id_or_uri)).await
    }

    async fn update_uplink_group(&self, group: &UplinkGroup) -> FabricResult<UplinkGroup> {
        let outcome = self.send(Method::PUT, &group.uri, Some(group)).await?;
        self.resolve(outcome, &group.uri).await
    }

    async fn get_interconnect(&self, id_or_uri: &str) -> FabricResult<Interconnect> {
        self.get(&resource_uri(INTERCONNECTS, id_or_uri)).await
    }

    async fn get_server_hardware(&self, id_or_uri: &str) -> FabricResult<ServerHardware> {
        self.get(&resource_uri(SERVER_HARDWARE, id_or_uri)).await
    }

    async fn update_power_state(&self, id_or_uri: &str, state: PowerState) -> FabricResult<()> {
        if state == PowerState::Unknown {
            return Err(FabricError::invalid_parameter(
                "powerState",
                "cannot request Unknown power state",
            ));
        }
        let path = format!("{}/powerState", resource_uri(SERVER_HARDWARE, id_or_uri));
        let body = PowerStateRequest::momentary_press(state);
        self.send(Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    async fn get_server_profile(&self, id_or_uri: &str) -> FabricResult<ServerProfile> {
        self.get(&resource_uri(SERVER_PROFILES, id_or_uri)).await
    }

    async fn update_server_profile(&self, profile: &ServerProfile) -> FabricResult<ServerProfile> {
        let outcome = self.send(Method::PUT, &profile.uri, Some(profile)).await?;
        self.resolve(outcome, &profile.uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_uri_list_shapes() {
        let arr = json!(["/rest/uplink-sets/a", "/rest/uplink-sets/b"]);
        assert_eq!(
            uri_list("x", arr).unwrap(),
            vec!["/rest/uplink-sets/a".to_string(), "/rest/uplink-sets/b".to_string()]
        );

        let env = json!({"members": [{"uri": "/rest/uplink-sets/c"}]});
        assert_eq!(uri_list("x", env).unwrap(), vec!["/rest/uplink-sets/c".to_string()]);

        assert!(uri_list("x", Value::Null).unwrap().is_empty());
        assert!(uri_list("x", json!(3)).is_err());
    }

    #[test]
    fn test_default_options() {
        let opts = RestClientOptions::default();
        assert_eq!(opts.api_version, 300);
        assert!(opts.session_token.is_none());
    }
}
