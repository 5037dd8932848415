//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册积分服务的指标描述（出现在 /metrics 的 HELP 注释中）
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "order_submissions_total",
        "Total number of order submissions by outcome"
    );
    metrics::describe_counter!(
        "accrual_oracle_polls_total",
        "Total number of accrual oracle queries by outcome"
    );
    metrics::describe_histogram!(
        "accrual_oracle_poll_duration_seconds",
        "Accrual oracle query duration in seconds"
    );
    metrics::describe_counter!(
        "accrual_credits_total",
        "Total number of orders credited to a balance"
    );
    metrics::describe_counter!("withdrawals_total", "Total number of withdrawals by outcome");
    metrics::describe_counter!(
        "accrual_rate_limited_total",
        "Total number of rate limit signals from the accrual oracle"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last completed worker tick"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单提交结果
#[inline]
pub fn record_order_submission(outcome: &str) {
    metrics::counter!(
        "order_submissions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录一次预言机查询
#[inline]
pub fn record_oracle_poll(outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "accrual_oracle_polls_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!("accrual_oracle_poll_duration_seconds").record(duration_secs);
}

/// 记录一次入账
#[inline]
pub fn record_accrual_credit() {
    metrics::counter!("accrual_credits_total").increment(1);
}

/// 记录预言机限流
#[inline]
pub fn record_rate_limited(retry_after_secs: u64) {
    metrics::counter!("accrual_rate_limited_total").increment(1);
    metrics::gauge!("accrual_rate_limit_retry_after_seconds").set(retry_after_secs as f64);
}

/// 记录提现结果
#[inline]
pub fn record_withdrawal(outcome: &str) {
    metrics::counter!(
        "withdrawals_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 更新 Worker 最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!(
        "worker_last_run_timestamp",
        "worker" => worker.to_string()
    )
    .set(chrono::Utc::now().timestamp() as f64);
}
