// ==========================================
// 物料安全数据审批系统 - 引擎运行上下文
// ==========================================
// 职责: 聚合状态机/问询管理/超期评估共用的协作者
// 目标: 减少构造函数参数数量，测试时可整体替换
// ==========================================

use std::sync::Arc;

use crate::engine::clock::Clock;
use crate::engine::hooks::HookDispatcher;
use crate::engine::locks::WorkflowLocks;
use crate::repository::RecordStore;

/// 引擎协作者集合
///
/// # 包含
/// - `store`: 流程/问询持久化
/// - `locks`: 流程级互斥锁（同一上下文的所有组件共享）
/// - `clock`: 时间来源
/// - `hooks`: 通知派发
#[derive(Clone)]
pub struct WorkflowContext {
    pub store: Arc<dyn RecordStore>,
    pub locks: Arc<WorkflowLocks>,
    pub clock: Arc<dyn Clock>,
    pub hooks: Arc<HookDispatcher>,
}

impl WorkflowContext {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        hooks: Arc<HookDispatcher>,
    ) -> Self {
        Self {
            store,
            locks: Arc::new(WorkflowLocks::new()),
            clock,
            hooks,
        }
    }
}
