use async_trait::async_trait;

use super::error::DiscoveryResult;
use super::types::{ServiceInstance, ServiceRegistration};

/// 注册中心传输层
///
/// 实现不在调用之间保留任何本地状态，每次调用独立发起请求。
#[async_trait]
pub trait RegistryClient: Send + Sync + std::fmt::Debug {
    /// 以 `service_id` 为键的幂等注册（upsert）
    async fn register(&self, registration: &ServiceRegistration) -> DiscoveryResult<()>;

    /// 注销实例；注销未知 ID 视为已不存在，不算错误
    async fn deregister(&self, service_id: &str) -> DiscoveryResult<()>;

    /// 查询当前通过健康检查的实例；空列表是合法结果
    async fn query_healthy_instances(
        &self,
        service_name: &str,
    ) -> DiscoveryResult<Vec<ServiceInstance>>;
}
