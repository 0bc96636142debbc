//! Consul agent HTTP API transport

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::client::RegistryClient;
use super::error::{DiscoveryError, DiscoveryResult, RegistryOperation};
use super::types::{InstanceHealth, ServiceInstance, ServiceRegistration};
use crate::config::DiscoveryConfig;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul 注册中心客户端
#[derive(Debug, Clone)]
pub struct ConsulRegistryClient {
    base_url: Url,
    request_timeout: Duration,
    datacenter: Option<String>,
    token: Option<String>,
    check_timeout: Duration,
    deregister_critical_after: Duration,
    http: reqwest::Client,
}

impl ConsulRegistryClient {
    pub fn new(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let base_url = Url::parse(&config.registry_address).map_err(|e| DiscoveryError::InvalidAddress {
            address: config.registry_address.clone(),
            message: e.to_string(),
        })?;

        // 单次调用的超时由 ServiceRegistry 负责，这里只是兜底，必须更长
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout() * 2)
            .build()
            .map_err(|e| DiscoveryError::Transport {
                operation: RegistryOperation::Query,
                target: config.registry_address.clone(),
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url,
            request_timeout: config.request_timeout(),
            datacenter: config.datacenter.clone().filter(|dc| !dc.is_empty()),
            token: config.token.clone().filter(|t| !t.is_empty()),
            check_timeout: config.check_timeout(),
            deregister_critical_after: config.deregister_critical_after(),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 在基础地址后追加路径段；ID 和服务名中的 `/`、`?`、`#` 会被转义
    fn endpoint(&self, segments: &[&str]) -> DiscoveryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::InvalidAddress {
                address: self.base_url.to_string(),
                message: "registry address cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    fn with_datacenter(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.datacenter {
            Some(dc) => request.query(&[("dc", dc)]),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: RegistryOperation,
        target: &str,
    ) -> DiscoveryResult<reqwest::Response> {
        self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    operation,
                    target: target.to_string(),
                    timeout: self.request_timeout,
                }
            } else {
                DiscoveryError::Transport {
                    operation,
                    target: target.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    pub(crate) fn registration_body(&self, registration: &ServiceRegistration) -> AgentServiceRegistration {
        AgentServiceRegistration {
            id: registration.service_id().to_string(),
            name: registration.service_name().to_string(),
            address: registration.address().to_string(),
            port: registration.port(),
            tags: registration.tags().to_vec(),
            check: AgentServiceCheck {
                http: registration.health_check_url().to_string(),
                interval: go_duration(registration.health_check_interval()),
                timeout: go_duration(self.check_timeout),
                deregister_critical_service_after: go_duration(self.deregister_critical_after),
            },
        }
    }
}

#[async_trait]
impl RegistryClient for ConsulRegistryClient {
    async fn register(&self, registration: &ServiceRegistration) -> DiscoveryResult<()> {
        let url = self.endpoint(&["v1", "agent", "service", "register"])?;
        let body = self.registration_body(registration);
        let request = self.http.put(url).json(&body);

        let response = self
            .send(request, RegistryOperation::Register, registration.service_id())
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::RegistrationRejected {
                service_id: registration.service_id().to_string(),
                status,
            });
        }

        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> DiscoveryResult<()> {
        let url = self.endpoint(&["v1", "agent", "service", "deregister", service_id])?;
        let response = self
            .send(self.http.put(url), RegistryOperation::Deregister, service_id)
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // 未知 ID：已经不存在
            StatusCode::NOT_FOUND => {
                tracing::debug!(service_id = %service_id, "Service already absent from registry");
                Ok(())
            }
            status => Err(DiscoveryError::UnexpectedStatus {
                operation: RegistryOperation::Deregister,
                target: service_id.to_string(),
                status,
            }),
        }
    }

    async fn query_healthy_instances(
        &self,
        service_name: &str,
    ) -> DiscoveryResult<Vec<ServiceInstance>> {
        let url = self.endpoint(&["v1", "health", "service", service_name])?;
        let request = self.with_datacenter(self.http.get(url).query(&[("passing", "true")]));

        let response = self
            .send(request, RegistryOperation::Query, service_name)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::UnexpectedStatus {
                operation: RegistryOperation::Query,
                target: service_name.to_string(),
                status,
            });
        }

        let entries: Vec<HealthServiceEntry> = response
            .json()
            .await
            .map_err(|e| DiscoveryError::InvalidResponse {
                target: service_name.to_string(),
                message: e.to_string(),
            })?;

        Ok(entries.into_iter().map(ServiceInstance::from).collect())
    }
}

/// `PUT /v1/agent/service/register` 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: AgentServiceCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AgentServiceCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub timeout: String,
    pub deregister_critical_service_after: String,
}

/// `GET /v1/health/service/{name}` 返回的单个条目
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HealthServiceEntry {
    #[serde(default)]
    pub node: HealthNode,
    pub service: HealthService,
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HealthNode {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HealthService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HealthCheck {
    pub status: String,
}

impl From<HealthServiceEntry> for ServiceInstance {
    fn from(entry: HealthServiceEntry) -> Self {
        let health = InstanceHealth::from_check_statuses(
            entry.checks.iter().map(|check| check.status.as_str()),
        );
        // 服务地址为空时回退到节点地址
        let address = if entry.service.address.is_empty() {
            entry.node.address
        } else {
            entry.service.address
        };

        ServiceInstance {
            service_id: entry.service.id,
            service_name: entry.service.service,
            address,
            port: entry.service.port,
            tags: entry.service.tags.unwrap_or_default(),
            health,
        }
    }
}

/// 以 Go duration 字符串表示时长，例如 `30s`、`1500ms`
fn go_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ConsulRegistryClient {
        ConsulRegistryClient::new(&DiscoveryConfig::default()).expect("client")
    }

    #[test]
    fn registration_body_matches_agent_api() {
        let reg = ServiceRegistration::with_id("svc-1", "product-service", "10.0.0.5", 5001)
            .with_tags(["api", "product", "v1"]);
        let body = serde_json::to_value(client().registration_body(&reg)).unwrap();

        assert_eq!(body["ID"], "svc-1");
        assert_eq!(body["Name"], "product-service");
        assert_eq!(body["Address"], "10.0.0.5");
        assert_eq!(body["Port"], 5001);
        assert_eq!(body["Tags"], serde_json::json!(["api", "product", "v1"]));
        assert_eq!(body["Check"]["HTTP"], "http://10.0.0.5:5001/api/health");
        assert_eq!(body["Check"]["Interval"], "30s");
        assert_eq!(body["Check"]["Timeout"], "10s");
        assert_eq!(body["Check"]["DeregisterCriticalServiceAfter"], "300s");
    }

    #[test]
    fn health_entry_falls_back_to_node_address() {
        let raw = serde_json::json!([{
            "Node": { "Address": "192.168.1.7" },
            "Service": { "ID": "svc-2", "Service": "inventory-service", "Address": "", "Port": 5003, "Tags": null },
            "Checks": [{ "Status": "passing" }, { "Status": "passing" }]
        }]);
        let entries: Vec<HealthServiceEntry> = serde_json::from_value(raw).unwrap();
        let instance = ServiceInstance::from(entries[0].clone());

        assert_eq!(instance.address, "192.168.1.7");
        assert_eq!(instance.port, 5003);
        assert!(instance.tags.is_empty());
        assert!(instance.is_healthy());
    }

    #[test]
    fn go_duration_renders_seconds_and_millis() {
        assert_eq!(go_duration(Duration::from_secs(30)), "30s");
        assert_eq!(go_duration(Duration::from_millis(1500)), "1500ms");
    }

    #[test]
    fn blank_token_and_datacenter_are_ignored() {
        let config = DiscoveryConfig {
            registry_address: "http://consul:8500/".into(),
            datacenter: Some(String::new()),
            token: Some(String::new()),
            ..DiscoveryConfig::default()
        };
        let client = ConsulRegistryClient::new(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "http://consul:8500/");
        assert!(client.token.is_none());
        assert!(client.datacenter.is_none());
    }

    #[test]
    fn endpoint_escapes_reserved_characters() {
        let url = client()
            .endpoint(&["v1", "agent", "service", "deregister", "odd/id?x#y"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8500/v1/agent/service/deregister/odd%2Fid%3Fx%23y"
        );
    }

    #[test]
    fn endpoint_keeps_registry_path_prefix() {
        let config = DiscoveryConfig {
            registry_address: "http://gateway:8080/consul/".into(),
            ..DiscoveryConfig::default()
        };
        let url = ConsulRegistryClient::new(&config)
            .unwrap()
            .endpoint(&["v1", "health", "service", "product-service"])
            .unwrap();
        assert_eq!(url.as_str(), "http://gateway:8080/consul/v1/health/service/product-service");
    }

    #[test]
    fn custom_health_check_url_is_sent() {
        let reg = ServiceRegistration::with_id("svc-1", "product-service", "10.0.0.5", 5001)
            .with_health_check_url("http://10.0.0.5:9000/healthz");
        let body = client().registration_body(&reg);
        assert_eq!(body.check.http, "http://10.0.0.5:9000/healthz");
    }
}
