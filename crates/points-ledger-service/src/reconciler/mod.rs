//! 订单状态对账 Worker
//!
//! 以固定间隔轮询积分计算系统，把未终结的订单推进到终态，并在订单
//! 变为 PROCESSED 时为归属用户入账（每个订单恰好一次）：
//!
//! 1. 退避闸门关闭时跳过整轮
//! 2. 认领一批 NEW / PROCESSING 订单（最久未轮询的优先）
//! 3. 以有限并发逐个查询，每次查询前重新检查闸门
//! 4. 状态变更全部是带前置条件的更新，入账与状态变更在同一事务中完成
//!
//! 单个订单的失败只记录日志，不影响同批次其他订单，Worker 永不退出。

mod backoff;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use rust_decimal::RoundingStrategy;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use points_shared::config::ReconcilerConfig;
use points_shared::observability::metrics;

use crate::error::Result;
use crate::models::{Order, OrderStatus};
use crate::oracle::{AccrualOracle, OracleReply, OracleStatus};
use crate::repository::OrderRepositoryTrait;

pub use backoff::BackoffGate;

/// 入账金额保留的小数位
const ACCRUAL_SCALE: u32 = 2;

/// 单个订单的对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// NEW → PROCESSING
    Advanced,
    /// 已入账并进入 PROCESSED
    Credited,
    /// 进入 INVALID
    Invalidated,
    /// 状态未变化（未登记、仍在计算或已被其他 Worker 推进）
    Unchanged,
    /// 查询或更新失败，下一轮重试
    Failed,
    /// 闸门已关闭，本轮未查询
    Skipped,
    /// 被积分计算系统限流
    RateLimited,
}

/// 一轮对账的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 闸门关闭，整轮跳过
    pub gate_closed: bool,
    pub claimed: usize,
    /// 实际发出的查询数
    pub polled: usize,
    pub advanced: usize,
    pub credited: usize,
    pub invalidated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rate_limited: usize,
}

impl TickReport {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Advanced => self.advanced += 1,
            ReconcileOutcome::Credited => self.credited += 1,
            ReconcileOutcome::Invalidated => self.invalidated += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Failed => self.failed += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
            ReconcileOutcome::RateLimited => self.rate_limited += 1,
        }
        if outcome != ReconcileOutcome::Skipped {
            self.polled += 1;
        }
    }

    /// 本轮是否有订单状态发生变化
    pub fn has_changes(&self) -> bool {
        self.advanced + self.credited + self.invalidated > 0
    }
}

/// 订单状态对账 Worker
pub struct StatusReconciler {
    orders: Arc<dyn OrderRepositoryTrait>,
    oracle: Arc<dyn AccrualOracle>,
    gate: BackoffGate,
    poll_interval: Duration,
    batch_size: i64,
    workers: usize,
}

impl StatusReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepositoryTrait>,
        oracle: Arc<dyn AccrualOracle>,
        config: &ReconcilerConfig,
    ) -> Self {
        Self {
            orders,
            oracle,
            gate: BackoffGate::new(),
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size.max(1),
            workers: config.workers.max(1),
        }
    }

    /// 退避闸门
    pub fn gate(&self) -> &BackoffGate {
        &self.gate
    }

    /// 主循环：按固定间隔执行对账，直到任务被取消
    pub async fn run(&self) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            workers = self.workers,
            "StatusReconciler 已启动"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let report = self.run_once().await;
            if report.has_changes() || report.failed > 0 || report.rate_limited > 0 {
                info!(?report, "对账完成");
            } else {
                debug!(?report, "对账完成");
            }

            metrics::set_worker_last_run("status_reconciler");
        }
    }

    /// 执行一轮对账
    pub async fn run_once(&self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(remaining) = self.gate.remaining() {
            debug!(?remaining, "积分计算系统限流中，跳过本轮");
            report.gate_closed = true;
            return report;
        }

        let orders = match self.orders.claim_pending(self.batch_size).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "认领待对账订单失败");
                return report;
            }
        };
        report.claimed = orders.len();

        let outcomes: Vec<ReconcileOutcome> = stream::iter(orders)
            .map(|order| self.reconcile_order(order))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// 对账单个订单
    ///
    /// 错误只记录日志并计为 Failed，订单保持原状态等待下一轮
    pub async fn reconcile_order(&self, order: Order) -> ReconcileOutcome {
        if !self.gate.is_open() {
            return ReconcileOutcome::Skipped;
        }

        let started = Instant::now();
        let reply = match self.oracle.query(&order.number).await {
            Ok(reply) => reply,
            Err(e) => {
                metrics::record_oracle_poll("error", started.elapsed().as_secs_f64());
                warn!(
                    order = %order.number,
                    error = %e,
                    code = e.error_code(),
                    "查询积分计算系统失败，下一轮重试"
                );
                return ReconcileOutcome::Failed;
            }
        };
        metrics::record_oracle_poll(reply.label(), started.elapsed().as_secs_f64());

        match self.apply(&order, reply).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order = %order.number, error = %e, "更新订单状态失败，下一轮重试");
                ReconcileOutcome::Failed
            }
        }
    }

    async fn apply(&self, order: &Order, reply: OracleReply) -> Result<ReconcileOutcome> {
        let number = order.number.as_str();

        let outcome = match reply {
            OracleReply::Status(OracleStatus::Registered | OracleStatus::Processing) => {
                if order.status == OrderStatus::New && self.orders.mark_processing(number).await? {
                    ReconcileOutcome::Advanced
                } else {
                    ReconcileOutcome::Unchanged
                }
            }
            OracleReply::Status(OracleStatus::Invalid) => {
                if self.orders.mark_invalid(number).await? {
                    info!(order = number, "订单被积分计算系统判定无效");
                    ReconcileOutcome::Invalidated
                } else {
                    ReconcileOutcome::Unchanged
                }
            }
            OracleReply::Status(OracleStatus::Processed(accrual)) => {
                let accrual = accrual
                    .round_dp_with_strategy(ACCRUAL_SCALE, RoundingStrategy::MidpointAwayFromZero);
                if self.orders.complete_with_accrual(number, accrual).await? {
                    metrics::record_accrual_credit();
                    info!(
                        order = number,
                        owner = %order.owner_id,
                        %accrual,
                        "订单积分已入账"
                    );
                    ReconcileOutcome::Credited
                } else {
                    ReconcileOutcome::Unchanged
                }
            }
            OracleReply::NotRegistered => ReconcileOutcome::Unchanged,
            OracleReply::RateLimited { retry_after } => {
                self.gate.close_for(retry_after);
                metrics::record_rate_limited(retry_after.as_secs());
                warn!(?retry_after, "积分计算系统限流，暂停查询");
                ReconcileOutcome::RateLimited
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::oracle::{MockAccrualOracle, OracleError};
    use crate::repository::MockOrderRepositoryTrait;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            batch_size: 10,
            workers: 4,
            ..Default::default()
        }
    }

    fn reconciler(repo: MockOrderRepositoryTrait, oracle: MockAccrualOracle) -> StatusReconciler {
        StatusReconciler::new(Arc::new(repo), Arc::new(oracle), &config())
    }

    fn order(number: &str, status: OrderStatus) -> Order {
        let mut order = Order::new(number, "alice");
        order.status = status;
        order
    }

    #[tokio::test]
    async fn test_registered_advances_new_order() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_mark_processing().times(1).returning(|_| Ok(true));
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .returning(|_| Ok(OracleReply::Status(OracleStatus::Registered)));

        let outcome = reconciler(repo, oracle)
            .reconcile_order(order("12345678903", OrderStatus::New))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Advanced);
    }

    #[tokio::test]
    async fn test_processing_order_stays_processing() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_mark_processing().never();
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .returning(|_| Ok(OracleReply::Status(OracleStatus::Processing)));

        let outcome = reconciler(repo, oracle)
            .reconcile_order(order("12345678903", OrderStatus::Processing))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_processed_credits_rounded_amount() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_complete_with_accrual()
            .times(1)
            .returning(|number, amount| {
                assert_eq!(number, "12345678903");
                assert_eq!(amount, "10.13".parse::<Decimal>().unwrap());
                Ok(true)
            });
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .returning(|_| Ok(OracleReply::Status(OracleStatus::Processed(d("10.125")))));

        let outcome = reconciler(repo, oracle)
            .reconcile_order(order("12345678903", OrderStatus::Processing))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Credited);
    }

    #[tokio::test]
    async fn test_lost_compare_and_swap_is_unchanged() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_complete_with_accrual().returning(|_, _| Ok(false));
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .returning(|_| Ok(OracleReply::Status(OracleStatus::Processed(d("5")))));

        let outcome = reconciler(repo, oracle)
            .reconcile_order(order("12345678903", OrderStatus::New))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_oracle_error_is_isolated() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_claim_pending().returning(|_| {
            Ok(vec![
                order("12345678903", OrderStatus::New),
                order("79927398713", OrderStatus::New),
            ])
        });
        repo.expect_mark_invalid().returning(|_| Ok(true));
        let mut oracle = MockAccrualOracle::new();
        oracle.expect_query().returning(|number| {
            if number == "12345678903" {
                Err(OracleError::Timeout)
            } else {
                Ok(OracleReply::Status(OracleStatus::Invalid))
            }
        });

        let report = reconciler(repo, oracle).run_once().await;
        assert_eq!(report.claimed, 2);
        assert_eq!(report.polled, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.invalidated, 1);
    }

    #[tokio::test]
    async fn test_storage_error_is_isolated() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_mark_processing()
            .returning(|_| Err(LedgerError::Database(sqlx::Error::PoolTimedOut)));
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .returning(|_| Ok(OracleReply::Status(OracleStatus::Registered)));

        let outcome = reconciler(repo, oracle)
            .reconcile_order(order("12345678903", OrderStatus::New))
            .await;
        assert_eq!(outcome, ReconcileOutcome::Failed);
    }

    #[tokio::test]
    async fn test_claim_failure_yields_empty_report() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_claim_pending()
            .returning(|_| Err(LedgerError::Database(sqlx::Error::PoolTimedOut)));
        let mut oracle = MockAccrualOracle::new();
        oracle.expect_query().never();

        let report = reconciler(repo, oracle).run_once().await;
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_closes_gate_for_rest_of_batch() {
        let mut repo = MockOrderRepositoryTrait::new();
        repo.expect_claim_pending().times(1).returning(|_| {
            Ok(vec![
                order("12345678903", OrderStatus::New),
                order("79927398713", OrderStatus::New),
                order("2377225624", OrderStatus::New),
            ])
        });
        let mut oracle = MockAccrualOracle::new();
        oracle.expect_query().times(1).returning(|_| {
            Ok(OracleReply::RateLimited {
                retry_after: Duration::from_secs(60),
            })
        });

        // 单并发保证第一笔查询返回后再处理后续订单
        let reconciler = StatusReconciler::new(
            Arc::new(repo),
            Arc::new(oracle),
            &ReconcilerConfig {
                workers: 1,
                ..config()
            },
        );

        let report = reconciler.run_once().await;
        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.polled, 1);

        let next = reconciler.run_once().await;
        assert!(next.gate_closed);
        assert_eq!(next.claimed, 0);
    }
}
