// ==========================================
// 物料安全数据审批系统 - 引擎层
// ==========================================
// 职责: 流程状态机、问询生命周期、超期评估
// 红线: Engine 不拼 SQL，持久化一律经由 RecordStore
// 红线: 通知 hook 只在流程锁释放后调用
// ==========================================

pub mod audit_hook;
pub mod clock;
pub mod context;
pub mod error;
pub mod hooks;
pub mod locks;
pub mod query_lifecycle;
pub mod sla;
pub mod sla_sweeper;
pub mod state_machine;
pub mod transitions;

// 重导出核心引擎
pub use audit_hook::AuditTrailHook;
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::WorkflowContext;
pub use error::{WorkflowError, WorkflowResult};
pub use hooks::{
    HookDispatcher, HookResult, NotificationHook, WorkflowMetricsHook,
    WorkflowMetricsSnapshot, WorkflowNotification,
};
pub use locks::WorkflowLocks;
pub use query_lifecycle::{OpenQuerySummary, QueryLifecycleManager};
pub use sla::{OverdueEntry, OverdueEvaluator, OverdueReport};
pub use sla_sweeper::OverdueSweeper;
pub use state_machine::WorkflowStateMachine;
