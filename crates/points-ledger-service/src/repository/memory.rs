//! 内存存储
//!
//! 进程内的订单与账本存储，适用于测试和本地开发。
//! 所有操作在同一把锁内完成读-改-写，语义与 PostgreSQL 实现的事务一致。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::traits::{BalanceLedgerRepositoryTrait, OrderRepositoryTrait};
use crate::error::Result;
use crate::models::{
    EntryType, InsertOutcome, LedgerEntry, Order, OrderStatus, UserBalance, Withdrawal,
    WithdrawalResult,
};

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    polled_at: Option<DateTime<Utc>>,
    /// 插入序号，上传时间相同时保证排序稳定
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    orders: HashMap<String, StoredOrder>,
    ledger: Vec<LedgerEntry>,
    next_seq: u64,
    next_entry_id: i64,
}

impl State {
    fn append(
        &mut self,
        user_id: &str,
        entry_type: EntryType,
        amount: Decimal,
        order_number: &str,
    ) {
        self.next_entry_id += 1;
        self.ledger.push(LedgerEntry {
            id: self.next_entry_id,
            user_id: user_id.to_string(),
            entry_type,
            amount,
            order_number: order_number.to_string(),
            created_at: Utc::now(),
        });
    }

    fn has_entry(&self, entry_type: EntryType, order_number: &str) -> bool {
        self.ledger
            .iter()
            .any(|e| e.entry_type == entry_type && e.order_number == order_number)
    }

    fn balance(&self, user_id: &str) -> UserBalance {
        UserBalance::from_amounts(
            self.ledger
                .iter()
                .filter(|e| e.user_id == user_id)
                .map(|e| &e.amount),
        )
    }

    /// 带前置状态条件的状态推进
    fn transition(
        &mut self,
        number: &str,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Option<&mut Order> {
        let stored = self.orders.get_mut(number)?;
        if !from.contains(&stored.order.status) {
            return None;
        }
        stored.order.status = to;
        stored.order.updated_at = Utc::now();
        Some(&mut stored.order)
    }
}

const PENDING: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

/// 内存存储
///
/// 同时实现订单仓储与账本仓储，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// 创建新的内存存储实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 订单总数
    pub fn order_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    /// 全部账本流水（按追加顺序）
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().ledger.clone()
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryStore {
    async fn insert_if_absent(&self, number: &str, owner_id: &str) -> Result<InsertOutcome> {
        let mut state = self.state.lock();

        if let Some(existing) = state.orders.get(number) {
            return Ok(InsertOutcome::Existing {
                owner_id: existing.order.owner_id.clone(),
            });
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        state.orders.insert(
            number.to_string(),
            StoredOrder {
                order: Order::new(number, owner_id),
                polled_at: None,
                seq,
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, number: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .orders
            .get(number)
            .map(|s| s.order.clone()))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>> {
        let state = self.state.lock();
        let mut stored: Vec<&StoredOrder> = state
            .orders
            .values()
            .filter(|s| s.order.owner_id == owner_id)
            .collect();
        stored.sort_by(|a, b| {
            b.order
                .uploaded_at
                .cmp(&a.order.uploaded_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(stored.into_iter().map(|s| s.order.clone()).collect())
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<Order>> {
        let mut state = self.state.lock();
        let limit = usize::try_from(limit).unwrap_or(0);

        // 从未轮询过的优先，其次按轮询时间、上传顺序
        let mut pending: Vec<(Option<DateTime<Utc>>, u64, String)> = state
            .orders
            .values()
            .filter(|s| s.order.is_pending())
            .map(|s| (s.polled_at, s.seq, s.order.number.clone()))
            .collect();
        pending.sort_by(|a, b| match (a.0, b.0) {
            (None, None) => a.1.cmp(&b.1),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y).then(a.1.cmp(&b.1)),
        });

        let now = Utc::now();
        let mut claimed = Vec::with_capacity(limit.min(pending.len()));
        for (_, _, number) in pending.into_iter().take(limit) {
            if let Some(stored) = state.orders.get_mut(&number) {
                stored.polled_at = Some(now);
                claimed.push(stored.order.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_processing(&self, number: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .transition(number, &[OrderStatus::New], OrderStatus::Processing)
            .is_some())
    }

    async fn mark_invalid(&self, number: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .transition(number, &PENDING, OrderStatus::Invalid)
            .is_some())
    }

    async fn complete_with_accrual(&self, number: &str, accrual: Decimal) -> Result<bool> {
        let mut state = self.state.lock();

        let owner_id = match state.transition(number, &PENDING, OrderStatus::Processed) {
            Some(order) => {
                order.accrual = Some(accrual);
                order.owner_id.clone()
            }
            None => return Ok(false),
        };

        state.append(&owner_id, EntryType::Accrual, accrual, number);
        Ok(true)
    }
}

#[async_trait]
impl BalanceLedgerRepositoryTrait for MemoryStore {
    async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        Ok(self.state.lock().balance(user_id))
    }

    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        sum: Decimal,
    ) -> Result<WithdrawalResult> {
        let mut state = self.state.lock();

        if state.has_entry(EntryType::Withdrawal, order_number) {
            return Ok(WithdrawalResult::DuplicateOrder);
        }
        if state.balance(user_id).current < sum {
            return Ok(WithdrawalResult::InsufficientFunds);
        }

        state.append(user_id, EntryType::Withdrawal, -sum, order_number);
        Ok(WithdrawalResult::Applied)
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        let state = self.state.lock();
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && e.entry_type == EntryType::Withdrawal)
            .map(Withdrawal::from)
            .collect())
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock();
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}
