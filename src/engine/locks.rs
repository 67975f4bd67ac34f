// ==========================================
// 物料安全数据审批系统 - 流程级互斥锁
// ==========================================
// 同一流程的读-改-写全程串行；不同流程互不阻塞
// 红线: 持锁期间不得调用通知 hook
// ==========================================

use crate::repository::error::RepositoryError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 流程锁登记表
#[derive(Debug, Default)]
pub struct WorkflowLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（或创建）指定流程的锁槽
    ///
    /// 登记表本身只在查找期间持有，不与流程锁嵌套
    pub fn slot(&self, workflow_id: &str) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(slots
            .entry(workflow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 清理无人持有的锁槽，返回清理数量
    pub fn prune_idle(&self) -> usize {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    /// 当前登记的锁槽数量
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 锁定锁槽
///
/// 锁中毒只说明之前持锁线程 panic；流程数据每次都从存储重新读取，因此继续使用
pub fn lock_slot(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
