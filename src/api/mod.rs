// ==========================================
// 物料安全数据审批系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供传输层调用
// ==========================================

pub mod error;
pub mod workflow_api;

// 重导出核心类型
pub use error::ApiErrorBody;
pub use workflow_api::{WorkflowApi, WorkflowDetail};
