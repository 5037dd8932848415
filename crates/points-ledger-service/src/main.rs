//! 订单状态对账 Worker
//!
//! 独立运行的对账进程。API 服务也可以在进程内启动同样的 Worker
//! （`reconciler.enabled`），多实例并行时由 SKIP LOCKED 认领互不相交的批次。

use std::sync::Arc;

use anyhow::Result;
use points_shared::{config::AppConfig, observability};
use tokio::signal;
use tracing::{error, info, warn};

use points_ledger::{HttpAccrualOracle, StatusReconciler, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("points-reconciler").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting points-reconciler...");
    info!(
        environment = %config.environment,
        accrual = %config.accrual.base_url,
        "Configuration loaded"
    );

    // 3. 存储与积分计算系统客户端
    let storage = Storage::connect(&config).await?;
    if storage.database.is_none() {
        warn!("Standalone reconciler with in-memory storage cannot see orders of other processes");
    }
    let oracle = Arc::new(HttpAccrualOracle::new(&config.accrual)?);

    // 4. 运行对账循环直到收到关闭信号
    let reconciler = StatusReconciler::new(storage.orders.clone(), oracle, &config.reconciler);
    tokio::select! {
        _ = reconciler.run() => {}
        _ = shutdown_signal() => {}
    }

    storage.close().await;
    info!("Reconciler shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号，用于 Kubernetes 优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
