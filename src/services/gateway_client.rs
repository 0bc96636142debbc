use std::time::Duration;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::services::discovery::{DiscoveryError, ServiceInstance, ServiceRegistry};
pub use crate::services::response::ApiResponse;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// 网关客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum GatewayClientError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {service}: {body}")]
    Http {
        service: String,
        status: StatusCode,
        body: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// 网关客户端配置
#[derive(Debug, Clone)]
pub struct GatewayClientConfig {
    /// 单次请求超时
    pub default_timeout: Duration,
    /// 连接超时
    pub connect_timeout: Duration,
}

impl Default for GatewayClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// 跨服务调用客户端
///
/// 每次调用都重新解析服务名，不缓存地址，不做重试。
#[derive(Debug, Clone)]
pub struct ApiGatewayClient {
    registry: ServiceRegistry,
    http: reqwest::Client,
}

impl ApiGatewayClient {
    pub fn new(registry: ServiceRegistry, config: GatewayClientConfig) -> Result<Self, GatewayClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.default_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GatewayClientError::Build)?;

        Ok(Self { registry, http })
    }

    /// 解析服务名为一个健康实例
    pub async fn resolve(&self, service_name: &str) -> Result<ServiceInstance, GatewayClientError> {
        self.registry
            .discover_one(service_name)
            .await?
            .ok_or_else(|| GatewayClientError::ServiceUnavailable(service_name.to_string()))
    }

    pub async fn get<T>(&self, service_name: &str, path: &str) -> Result<ApiResponse<T>, GatewayClientError>
    where
        T: DeserializeOwned,
    {
        let instance = self.resolve(service_name).await?;
        let url = instance.url(path);
        let request = self.http.get(&url);
        self.execute(service_name, url, request).await
    }

    pub async fn post<T, B>(
        &self,
        service_name: &str,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, GatewayClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let instance = self.resolve(service_name).await?;
        let url = instance.url(path);
        let request = self.http.post(&url).json(body);
        self.execute(service_name, url, request).await
    }

    pub async fn put<T, B>(
        &self,
        service_name: &str,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, GatewayClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let instance = self.resolve(service_name).await?;
        let url = instance.url(path);
        let request = self.http.put(&url).json(body);
        self.execute(service_name, url, request).await
    }

    pub async fn delete<T>(&self, service_name: &str, path: &str) -> Result<ApiResponse<T>, GatewayClientError>
    where
        T: DeserializeOwned,
    {
        let instance = self.resolve(service_name).await?;
        let url = instance.url(path);
        let request = self.http.delete(&url);
        self.execute(service_name, url, request).await
    }

    /// 并发解析一组服务名，返回每个服务当前选中的实例（不可用为 `None`）
    pub async fn available_services(
        &self,
        service_names: &[&str],
    ) -> Vec<(String, Result<Option<ServiceInstance>, DiscoveryError>)> {
        let lookups = service_names.iter().map(|name| async move {
            (name.to_string(), self.registry.discover_one(name).await)
        });
        futures::future::join_all(lookups).await
    }

    async fn execute<T>(
        &self,
        service_name: &str,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, GatewayClientError>
    where
        T: DeserializeOwned,
    {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(
            request_id = %request_id,
            service_name = %service_name,
            url = %url,
            "Forwarding request to service instance"
        );

        let response = match request.header(REQUEST_ID_HEADER, &request_id).send().await {
            Ok(response) => response,
            Err(source) => {
                tracing::error!(service_name = %service_name, url = %url, error = %source, "Request failed");
                return Err(GatewayClientError::Transport { url, source });
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| GatewayClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            tracing::warn!(service_name = %service_name, status = %status, "Service returned error status");
            return Err(GatewayClientError::Http {
                service: service_name.to_string(),
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayClientError::Serialization(e.to_string()))
    }
}
