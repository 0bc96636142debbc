use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::discovery::{RegistrationLifecycle, ServiceRegistry};
use crate::services::health::{self, HealthState};
use crate::services::shop::ShopService;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub async fn start(config: Config) -> ServerResult<()> {
    let registry = ServiceRegistry::from_config(&config.discovery)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    run(config, registry, shutdown).await
}

/// 绑定端口、注册、提供服务直到 `shutdown` 被取消，然后注销
///
/// 注册失败时直接返回错误，不会开始接收请求。
pub async fn run(config: Config, registry: ServiceRegistry, shutdown: CancellationToken) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.service.port));
    let listener = TcpListener::bind(addr).await?;
    let app = app_router(&config);

    let lifecycle = RegistrationLifecycle::new(registry, config.service.registration());
    tracing::info!(
        service_name = %lifecycle.registration().service_name(),
        service_id = %lifecycle.registration().service_id(),
        addr = %listener.local_addr()?,
        "Starting service"
    );

    let registered = lifecycle.start(&shutdown).await?;

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // 无论服务如何退出都要尝试注销
    registered.stop().await;
    serve_result?;

    tracing::info!("Service stopped");
    Ok(())
}

/// 健康检查路由加上按服务名挂载的业务路由
pub fn app_router(config: &Config) -> axum::Router {
    let health = health::router(HealthState::from_config(&config.service));
    match ShopService::from_service_name(&config.service.name) {
        Some(service) => health.merge(service.router()),
        None => {
            tracing::warn!(
                service_name = %config.service.name,
                "No business endpoints for this service name, serving health only"
            );
            health
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
