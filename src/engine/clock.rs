// ==========================================
// 物料安全数据审批系统 - 时钟抽象
// ==========================================
// 所有时间戳与超期评估统一从 Clock 取 now()，测试中可固定
// ==========================================

use chrono::{Duration, NaiveDateTime, Utc};
use std::sync::Mutex;

/// 时钟 Trait（UTC 时间）
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// 可手动拨动的固定时钟（测试用）
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// 设置当前时间
    pub fn set(&self, ts: NaiveDateTime) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = ts;
    }

    /// 时间前进
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
