//! 积分 API 服务
//!
//! 提供订单上传、余额查询与提现 REST API，可在进程内运行订单状态对账 Worker。

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use clap::Parser;
use points_api::{
    auth::{AllowAllSessions, JwtManager, RedisSessionLookup, SessionLookup},
    routes,
    state::AppState,
};
use points_ledger::{HttpAccrualOracle, StatusReconciler, Storage};
use points_shared::{
    cache::Cache,
    config::{AppConfig, AuthConfig},
    observability,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// 命令行参数，优先级高于配置文件与环境变量
#[derive(Debug, Parser)]
#[command(name = "points-api", version, about = "积分 API 服务")]
struct Cli {
    /// 服务监听地址，如 localhost:8080
    #[arg(short = 'a', long = "run-address")]
    run_address: Option<String>,

    /// PostgreSQL 连接串
    #[arg(short = 'd', long = "database-uri")]
    database_uri: Option<String>,

    /// 积分计算系统地址
    #[arg(short = 'r', long = "accrual-address")]
    accrual_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("points-api").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    config.apply_overrides(
        cli.run_address.as_deref(),
        cli.database_uri.as_deref(),
        cli.accrual_address.as_deref(),
    )?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting points-api on {}", config.server_addr());

    if config.auth.jwt_secret == AuthConfig::default().jwt_secret {
        if config.is_production() {
            anyhow::bail!("auth.jwt_secret must be set in production environment");
        }
        warn!("Using default JWT secret - set POINTS_AUTH__JWT_SECRET for production");
    }

    // 初始化基础设施
    let storage = Storage::connect(&config).await?;
    let jwt = JwtManager::new(&config.auth.jwt_secret);

    let state = if config.auth.require_session {
        let cache = Cache::new(&config.redis)?;
        let sessions: Arc<dyn SessionLookup> = Arc::new(RedisSessionLookup::new(
            cache.clone(),
            config.auth.session_key_prefix.clone(),
        ));
        AppState::new(storage.clone(), jwt, sessions).with_cache(cache)
    } else {
        warn!("Session check disabled, only JWT signatures are verified");
        AppState::new(storage.clone(), jwt, Arc::new(AllowAllSessions))
    };

    // 进程内对账 Worker
    let reconciler_handle = if config.reconciler.enabled {
        let oracle = Arc::new(HttpAccrualOracle::new(&config.accrual)?);
        let reconciler =
            StatusReconciler::new(storage.orders.clone(), oracle, &config.reconciler);
        info!(accrual = %config.accrual.base_url, "Embedded reconciler started");
        Some(tokio::spawn(async move { reconciler.run().await }))
    } else {
        info!("Embedded reconciler disabled");
        None
    };

    let app = routes::api_routes(state)
        .layer(axum::middleware::from_fn(security_headers))
        .layer(cors_layer(&config.server.cors_origins));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = reconciler_handle {
        handle.abort();
    }
    storage.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 按配置构建 CORS 策略
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins.trim() == "*" {
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 为所有响应注入基础安全头
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

/// 监听关闭信号
///
/// 收到 Ctrl+C 或 SIGTERM 后返回，触发 axum 的优雅关闭流程
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
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
