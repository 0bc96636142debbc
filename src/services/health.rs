use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::services::discovery::types::{DEFAULT_HEALTH_PATH, local_hostname};

/// 健康检查响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub service_name: String,
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub additional_info: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct HealthState {
    service_name: String,
    version: String,
    environment: String,
    machine_name: String,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>, version: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
            environment: environment.into(),
            machine_name: local_hostname(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.name, &config.version, &config.environment)
    }

    fn report(&self) -> ServiceHealth {
        let mut additional_info = HashMap::new();
        additional_info.insert("Environment".to_string(), self.environment.clone().into());
        additional_info.insert("MachineName".to_string(), self.machine_name.clone().into());

        ServiceHealth {
            service_name: self.service_name.clone(),
            status: "Healthy".to_string(),
            version: self.version.clone(),
            timestamp: Utc::now(),
            additional_info,
        }
    }
}

/// 注册中心轮询的 `GET /api/health` 路由
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route(DEFAULT_HEALTH_PATH, get(get_health))
        .with_state(Arc::new(state))
}

async fn get_health(State(state): State<Arc<HealthState>>) -> Json<ServiceHealth> {
    tracing::trace!(service_name = %state.service_name, "Health check polled");
    Json(state.report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_reports_healthy() {
        let app = router(HealthState::new("product-service", "1.0.0", "Testing"));

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["serviceName"], "product-service");
        assert_eq!(json["status"], "Healthy");
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["additionalInfo"]["Environment"], "Testing");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = router(HealthState::new("product-service", "1.0.0", "Testing"));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
