use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 健康检查端点的默认路径
pub const DEFAULT_HEALTH_PATH: &str = "/api/health";

/// 默认健康检查间隔
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// 实例在注册中心观察到的健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceHealth {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl InstanceHealth {
    /// 由注册中心返回的各项检查状态汇总出实例健康状态
    pub fn from_check_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        let mut seen_any = false;
        let mut has_warning = false;
        let mut all_passing = true;

        for status in statuses {
            seen_any = true;
            match status {
                "critical" => return InstanceHealth::Critical,
                "warning" => has_warning = true,
                "passing" => {}
                _ => all_passing = false,
            }
        }

        if has_warning {
            InstanceHealth::Warning
        } else if seen_any && all_passing {
            InstanceHealth::Healthy
        } else {
            InstanceHealth::Unknown
        }
    }
}

impl fmt::Display for InstanceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceHealth::Healthy => write!(f, "healthy"),
            InstanceHealth::Warning => write!(f, "warning"),
            InstanceHealth::Critical => write!(f, "critical"),
            InstanceHealth::Unknown => write!(f, "unknown"),
        }
    }
}

/// 进程启动时构造一次的服务注册信息，构造后不可变
///
/// 多个任务可以共享同一个 `ServiceRegistration` 而无需同步。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    service_id: String,
    service_name: String,
    address: String,
    port: u16,
    tags: Vec<String>,
    health_check_url: String,
    health_check_interval: Duration,
}

impl ServiceRegistration {
    /// 以 `{服务名}-{主机名}-{pid}` 作为实例 ID 创建注册信息
    pub fn new(service_name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        let service_name = service_name.into();
        let service_id = format!(
            "{}-{}-{}",
            service_name,
            local_hostname(),
            std::process::id()
        );
        Self::with_id(service_id, service_name, address, port)
    }

    /// 使用显式的实例 ID 创建注册信息
    pub fn with_id(
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        let address = address.into();
        let health_check_url = format!("http://{address}:{port}{DEFAULT_HEALTH_PATH}");
        Self {
            service_id: service_id.into(),
            service_name: service_name.into(),
            address,
            port,
            tags: Vec::new(),
            health_check_url,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }

    /// 添加标签，重复的标签会被忽略
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter().fold(self, |reg, tag| reg.with_tag(tag))
    }

    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = url.into();
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn health_check_url(&self) -> &str {
        &self.health_check_url
    }

    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }
}

/// 一次发现调用返回的实例快照，不在调用之间缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    pub health: InstanceHealth,
}

impl ServiceInstance {
    /// 实例的基础地址，形如 `http://10.0.0.5:5001`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    /// 拼接服务路径，不做任何改写
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn is_healthy(&self) -> bool {
        self.health == InstanceHealth::Healthy
    }
}

impl From<&ServiceRegistration> for ServiceInstance {
    fn from(registration: &ServiceRegistration) -> Self {
        Self {
            service_id: registration.service_id.clone(),
            service_name: registration.service_name.clone(),
            address: registration.address.clone(),
            port: registration.port,
            tags: registration.tags.clone(),
            health: InstanceHealth::Healthy,
        }
    }
}

pub(crate) fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_defaults_health_url_from_location() {
        let reg = ServiceRegistration::with_id("svc-1", "product-service", "10.0.0.5", 5001);
        assert_eq!(reg.health_check_url(), "http://10.0.0.5:5001/api/health");
        assert_eq!(reg.health_check_interval(), Duration::from_secs(30));
    }

    #[test]
    fn generated_id_disambiguates_by_pid() {
        let reg = ServiceRegistration::new("customer-service", "localhost", 5002);
        assert!(reg.service_id().starts_with("customer-service-"));
        assert!(reg.service_id().ends_with(&format!("-{}", std::process::id())));
    }

    #[test]
    fn duplicate_tags_are_collapsed() {
        let reg = ServiceRegistration::with_id("a", "b", "localhost", 1)
            .with_tags(["api", "v1", "api"]);
        assert_eq!(reg.tags(), ["api".to_string(), "v1".to_string()]);
    }

    #[test]
    fn health_is_derived_from_checks() {
        assert_eq!(
            InstanceHealth::from_check_statuses(["passing", "passing"]),
            InstanceHealth::Healthy
        );
        assert_eq!(
            InstanceHealth::from_check_statuses(["passing", "warning"]),
            InstanceHealth::Warning
        );
        assert_eq!(
            InstanceHealth::from_check_statuses(["warning", "critical"]),
            InstanceHealth::Critical
        );
        assert_eq!(
            InstanceHealth::from_check_statuses(std::iter::empty()),
            InstanceHealth::Unknown
        );
    }

    #[test]
    fn instance_url_appends_path_verbatim() {
        let instance = ServiceInstance {
            service_id: "svc-1".into(),
            service_name: "product-service".into(),
            address: "10.0.0.5".into(),
            port: 5001,
            tags: vec![],
            health: InstanceHealth::Healthy,
        };
        assert_eq!(instance.url("/api/products/1"), "http://10.0.0.5:5001/api/products/1");
    }
}
