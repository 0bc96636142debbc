use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::client::RegistryClient;
use super::error::{DiscoveryError, DiscoveryResult, RegistryOperation};
use super::types::{InstanceHealth, ServiceInstance, ServiceRegistration};

/// 进程内注册中心（实例 ID -> 实例）
pub type InstanceTable = Arc<DashMap<String, ServiceInstance>>;

/// 内存注册中心客户端
///
/// 与 [`ConsulRegistryClient`](super::consul::ConsulRegistryClient) 遵循同一契约，
/// 注册后立即可被发现。可以模拟注册中心不可达、响应延迟和实例健康变化。
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryClient {
    instances: InstanceTable,
    unreachable: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl InMemoryRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟注册中心不可达
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// 每次调用前的人为延迟
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// 手动更新实例健康状态，返回实例是否存在
    pub fn set_health(&self, service_id: &str, health: InstanceHealth) -> bool {
        if let Some(mut entry) = self.instances.get_mut(service_id) {
            tracing::info!(service_id = %service_id, new_status = %health, "Updated health status for instance");
            entry.health = health;
            true
        } else {
            false
        }
    }

    /// 已注册的实例数量（不区分健康状态）
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    async fn simulate(&self, operation: RegistryOperation, target: &str) -> DiscoveryResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Transport {
                operation,
                target: target.to_string(),
                message: "connection refused".to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistryClient {
    async fn register(&self, registration: &ServiceRegistration) -> DiscoveryResult<()> {
        self.simulate(RegistryOperation::Register, registration.service_id())
            .await?;

        self.instances.insert(
            registration.service_id().to_string(),
            ServiceInstance::from(registration),
        );
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> DiscoveryResult<()> {
        self.simulate(RegistryOperation::Deregister, service_id)
            .await?;

        self.instances.remove(service_id);
        Ok(())
    }

    async fn query_healthy_instances(
        &self,
        service_name: &str,
    ) -> DiscoveryResult<Vec<ServiceInstance>> {
        self.simulate(RegistryOperation::Query, service_name).await?;

        let mut instances: Vec<ServiceInstance> = self
            .instances
            .iter()
            .filter(|entry| {
                let instance = entry.value();
                instance.service_name == service_name && instance.is_healthy()
            })
            .map(|entry| entry.value().clone())
            .collect();
        instances.sort_by(|a, b| a.service_id.cmp(&b.service_id));

        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_latency_saturates() {
        let client = InMemoryRegistryClient::new();
        client.set_latency(Duration::MAX);
        assert_eq!(client.latency_ms.load(Ordering::SeqCst), u64::MAX);

        client.set_latency(Duration::from_millis(250));
        assert_eq!(client.latency_ms.load(Ordering::SeqCst), 250);
    }
}
