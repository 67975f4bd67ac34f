// ==========================================
// 物料安全数据审批系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod query;
pub mod types;
pub mod workflow;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use query::Query;
pub use types::{QueryPriority, QueryStatus, ReviewTeam, WorkflowState};
pub use workflow::{NaturalKey, Workflow};
