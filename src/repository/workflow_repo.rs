// ==========================================
// 物料安全数据审批系统 - 审批流程数据仓储
// ==========================================
// 对齐: workflow / workflow_query 表
// 红线: Repository 不含业务逻辑（状态转换规则在 engine 层）
// ==========================================

mod core;
mod mapping;
mod queries;


pub use core::WorkflowRepository;
