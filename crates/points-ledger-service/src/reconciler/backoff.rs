//! 全局限流退避闸门
//!
//! 积分计算系统返回 429 时关闭闸门，直到 Retry-After 到期前所有查询都暂停。
//! 闸门只在进程内生效，重启后重新打开。

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

/// 单次关闭的最长时长
const MAX_CLOSE: Duration = Duration::from_secs(24 * 60 * 60);

/// 退避闸门
#[derive(Debug, Default)]
pub struct BackoffGate {
    closed_until: Mutex<Option<Instant>>,
}

impl BackoffGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 闸门是否打开（允许查询）
    pub fn is_open(&self) -> bool {
        self.remaining().is_none()
    }

    /// 距离闸门重新打开的剩余时间
    pub fn remaining(&self) -> Option<Duration> {
        let mut closed_until = self.closed_until.lock();
        match *closed_until {
            Some(until) => {
                let now = Instant::now();
                if now >= until {
                    *closed_until = None;
                    None
                } else {
                    Some(until - now)
                }
            }
            None => None,
        }
    }

    /// 关闭闸门 `retry_after` 时长
    ///
    /// 已有更晚的截止时间时保持不变；时长超过一天时按一天处理
    pub fn close_for(&self, retry_after: Duration) {
        let now = Instant::now();
        let Some(until) = now
            .checked_add(retry_after.min(MAX_CLOSE))
            .or_else(|| now.checked_add(MAX_CLOSE))
        else {
            warn!(?retry_after, "退避截止时间溢出，忽略本次关闭");
            return;
        };
        let mut closed_until = self.closed_until.lock();
        if closed_until.is_none_or(|current| current < until) {
            *closed_until = Some(until);
        }
    }
}
