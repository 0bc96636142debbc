use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::client::RegistryClient;
use super::consul::ConsulRegistryClient;
use super::error::{DiscoveryError, DiscoveryResult, RegistryOperation};
use super::types::{ServiceInstance, ServiceRegistration};
use crate::config::DiscoveryConfig;

/// 服务注册与发现的对外入口
///
/// 内部不持有可变状态，克隆后可在任意任务间并发使用。
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    client: Arc<dyn RegistryClient>,
    request_timeout: Duration,
}

impl ServiceRegistry {
    pub fn new(client: Arc<dyn RegistryClient>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// 基于配置创建指向 Consul 的注册表
    pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let client = ConsulRegistryClient::new(config)?;
        tracing::info!(
            registry = %client.base_url(),
            datacenter = ?config.datacenter,
            "Using Consul service registry"
        );
        Ok(Self::new(Arc::new(client), config.request_timeout()))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 注册实例；失败即致命，调用方不应继续对外提供服务
    pub async fn register(&self, registration: &ServiceRegistration) -> DiscoveryResult<()> {
        let result = self
            .bounded(
                RegistryOperation::Register,
                registration.service_id(),
                self.client.register(registration),
            )
            .await;

        match &result {
            Ok(()) => tracing::info!(
                service_name = %registration.service_name(),
                service_id = %registration.service_id(),
                address = %registration.address(),
                port = registration.port(),
                "Successfully registered service"
            ),
            Err(e) => tracing::error!(
                service_name = %registration.service_name(),
                service_id = %registration.service_id(),
                status = ?e.status(),
                error = %e,
                "Failed to register service"
            ),
        }

        result
    }

    /// 注销实例；失败只记录日志，返回是否成功
    pub async fn deregister(&self, service_id: &str) -> bool {
        let result = self
            .bounded(
                RegistryOperation::Deregister,
                service_id,
                self.client.deregister(service_id),
            )
            .await;

        match result {
            Ok(()) => {
                tracing::info!(service_id = %service_id, "Successfully deregistered service");
                true
            }
            Err(e) => {
                tracing::warn!(
                    service_id = %service_id,
                    status = ?e.status(),
                    error = %e,
                    "Failed to deregister service"
                );
                false
            }
        }
    }

    /// 返回所有健康实例；没有实例时返回空列表
    pub async fn discover_all(&self, service_name: &str) -> DiscoveryResult<Vec<ServiceInstance>> {
        let result = self
            .bounded(
                RegistryOperation::Query,
                service_name,
                self.client.query_healthy_instances(service_name),
            )
            .await;

        match &result {
            Ok(instances) => tracing::debug!(
                service_name = %service_name,
                count = instances.len(),
                "Discovered service instances"
            ),
            Err(e) => tracing::error!(
                service_name = %service_name,
                status = ?e.status(),
                error = %e,
                "Failed to query service registry"
            ),
        }

        result
    }

    /// 在健康实例中均匀随机选择一个
    ///
    /// 选择是无状态的：不维护按服务名共享的轮询计数器，调用方之间无需协调。
    /// 连续两次调用可能选中同一实例。
    ///
    /// 返回 `Ok(None)` 表示当前没有可用实例（包括本次查询超时），
    /// `Err` 表示注册中心本身不可用。
    pub async fn discover_one(&self, service_name: &str) -> DiscoveryResult<Option<ServiceInstance>> {
        let candidates = match self.discover_all(service_name).await {
            Ok(candidates) => candidates,
            Err(DiscoveryError::Timeout { .. }) => {
                tracing::warn!(service_name = %service_name, "Discovery timed out, treating service as unavailable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(selected) = pick_random(candidates) else {
            tracing::warn!(service_name = %service_name, "No healthy instances found for service");
            return Ok(None);
        };

        tracing::debug!(
            service_name = %service_name,
            service_id = %selected.service_id,
            "Selected service instance"
        );
        Ok(Some(selected))
    }

    async fn bounded<T>(
        &self,
        operation: RegistryOperation,
        target: &str,
        call: impl Future<Output = DiscoveryResult<T>>,
    ) -> DiscoveryResult<T> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout {
                operation,
                target: target.to_string(),
                timeout: self.request_timeout,
            }),
        }
    }
}

fn pick_random(mut candidates: Vec<ServiceInstance>) -> Option<ServiceInstance> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    Some(candidates.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::discovery::types::InstanceHealth;

    fn instance(id: &str) -> ServiceInstance {
        ServiceInstance {
            service_id: id.to_string(),
            service_name: "inventory-service".to_string(),
            address: "localhost".to_string(),
            port: 5003,
            tags: vec![],
            health: InstanceHealth::Healthy,
        }
    }

    #[test]
    fn pick_random_on_empty_is_none() {
        assert!(pick_random(Vec::new()).is_none());
    }

    #[test]
    fn pick_random_single_candidate() {
        let picked = pick_random(vec![instance("only")]).unwrap();
        assert_eq!(picked.service_id, "only");
    }

    #[test]
    fn pick_random_reaches_every_candidate() {
        let ids = ["a", "b", "c"];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let candidates = ids.iter().map(|id| instance(id)).collect();
            seen.insert(pick_random(candidates).unwrap().service_id);
        }
        assert_eq!(seen.len(), ids.len());
    }
}
