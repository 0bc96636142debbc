use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::{DiscoveryError, DiscoveryResult, RegistryOperation};
use super::registry::ServiceRegistry;
use super::types::ServiceRegistration;

/// 把一个注册信息绑定到宿主进程的启动/停止生命周期（未注册状态）
///
/// 状态以类型表示：`start` 消耗 `RegistrationLifecycle` 并返回
/// [`RegisteredLifecycle`]，`stop` 再消耗后者，重复启动或停止无法通过编译。
#[derive(Debug)]
pub struct RegistrationLifecycle {
    registry: ServiceRegistry,
    registration: Arc<ServiceRegistration>,
}

/// 已注册状态
#[derive(Debug)]
#[must_use = "a registered instance must be stopped to deregister it"]
pub struct RegisteredLifecycle {
    registry: ServiceRegistry,
    registration: Arc<ServiceRegistration>,
}

impl RegistrationLifecycle {
    pub fn new(registry: ServiceRegistry, registration: ServiceRegistration) -> Self {
        Self {
            registry,
            registration: Arc::new(registration),
        }
    }

    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// 进程启动时注册；失败（含超时、取消）向上传播，进程不应继续提供服务
    pub async fn start(self, cancel: &CancellationToken) -> DiscoveryResult<RegisteredLifecycle> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DiscoveryError::Cancelled {
                operation: RegistryOperation::Register,
            }),
            result = self.registry.register(&self.registration) => result,
        };

        if let Err(e) = result {
            tracing::error!(
                service_name = %self.registration.service_name(),
                error = %e,
                "Service registration failed, refusing to start"
            );
            // 注册请求可能已被注册中心接受，尽力撤销
            if matches!(e, DiscoveryError::Cancelled { .. } | DiscoveryError::Timeout { .. }) {
                self.registry.deregister(self.registration.service_id()).await;
            }
            return Err(e);
        }

        tracing::info!(
            service_name = %self.registration.service_name(),
            "Service registration completed"
        );

        Ok(RegisteredLifecycle {
            registry: self.registry,
            registration: self.registration,
        })
    }
}

impl RegisteredLifecycle {
    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// 进程停止时注销；失败只记录，不会阻止关闭
    pub async fn stop(self) {
        if self.registry.deregister(self.registration.service_id()).await {
            tracing::info!(
                service_name = %self.registration.service_name(),
                "Service deregistration completed"
            );
        } else {
            tracing::error!(
                service_name = %self.registration.service_name(),
                service_id = %self.registration.service_id(),
                "Service deregistration failed, continuing shutdown"
            );
        }
    }
}
