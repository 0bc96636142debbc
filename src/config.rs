use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::discovery::ServiceRegistration;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "SHOP_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// 注册中心连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_registry_address")]
    pub registry_address: String,
    #[serde(default = "default_datacenter")]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    // 注册中心轮询健康检查端点的超时
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,
    // 持续 critical 超过该时长后由注册中心移除实例
    #[serde(default = "default_deregister_critical_after")]
    pub deregister_critical_after_secs: u64,
}

fn default_registry_address() -> String {
    "http://localhost:8500".to_string()
}

fn default_datacenter() -> Option<String> {
    Some("dc1".to_string())
}

fn default_request_timeout() -> u64 {
    10
}

fn default_check_timeout() -> u64 {
    10
}

fn default_deregister_critical_after() -> u64 {
    300
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            registry_address: default_registry_address(),
            datacenter: default_datacenter(),
            token: None,
            request_timeout_secs: default_request_timeout(),
            check_timeout_secs: default_check_timeout(),
            deregister_critical_after_secs: default_deregister_critical_after(),
        }
    }
}

impl DiscoveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn deregister_critical_after(&self) -> Duration {
        Duration::from_secs(self.deregister_critical_after_secs)
    }
}

/// 本实例的对外身份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    // 未设置时使用 `{name}-{hostname}-{pid}`
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_tags() -> Vec<String> {
    vec!["api".to_string(), "v1".to_string()]
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_environment() -> String {
    "Development".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            address: default_address(),
            port: 0,
            id: None,
            tags: default_tags(),
            version: default_version(),
            health_check_interval_secs: default_health_check_interval(),
            environment: default_environment(),
        }
    }
}

impl ServiceConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// 进程启动时构造一次的注册信息
    pub fn registration(&self) -> ServiceRegistration {
        let registration = match &self.id {
            Some(id) => ServiceRegistration::with_id(id, &self.name, &self.address, self.port),
            None => ServiceRegistration::new(&self.name, &self.address, self.port),
        };
        registration
            .with_tags(self.tags.iter().cloned())
            .with_health_check_interval(self.health_check_interval())
    }
}

/// `SHOP_` 前缀的环境变量覆盖项
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    registry_address: Option<String>,
    datacenter: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
    service_name: Option<String>,
    service_address: Option<String>,
    service_port: Option<u16>,
    service_id: Option<String>,
    service_tags: Option<Vec<String>>,
    service_version: Option<String>,
    health_check_interval_secs: Option<u64>,
    environment: Option<String>,
}

impl Config {
    /// 依次读取 config.toml、.env 和 `SHOP_*` 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var("SHOP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            let config_str = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            Self::from_toml_str(&config_str)?
        } else {
            tracing::debug!(path = %path, "Config file not found, using defaults");
            Self::default()
        };

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    fn apply(&mut self, env: EnvOverrides) {
        let discovery = &mut self.discovery;
        if let Some(v) = env.registry_address {
            discovery.registry_address = v;
        }
        if env.datacenter.is_some() {
            discovery.datacenter = env.datacenter;
        }
        if env.token.is_some() {
            discovery.token = env.token;
        }
        if let Some(v) = env.request_timeout_secs {
            discovery.request_timeout_secs = v;
        }

        let service = &mut self.service;
        if let Some(v) = env.service_name {
            service.name = v;
        }
        if let Some(v) = env.service_address {
            service.address = v;
        }
        if let Some(v) = env.service_port {
            service.port = v;
        }
        if env.service_id.is_some() {
            service.id = env.service_id;
        }
        if let Some(v) = env.service_tags {
            service.tags = v;
        }
        if let Some(v) = env.service_version {
            service.version = v;
        }
        if let Some(v) = env.health_check_interval_secs {
            service.health_check_interval_secs = v;
        }
        if let Some(v) = env.environment {
            service.environment = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::Invalid("service.name must not be empty".into()));
        }
        if self.service.port == 0 {
            return Err(ConfigError::Invalid("service.port must be non-zero".into()));
        }
        let address = &self.discovery.registry_address;
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "discovery.registry_address must be an http(s) URL, got {address}"
            )));
        }
        if self.discovery.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "discovery.request_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
