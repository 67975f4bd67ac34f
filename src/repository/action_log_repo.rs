// ==========================================
// 物料安全数据审批系统 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 审计写入失败不得回滚已提交的状态变更（由 hook 层吞掉并告警）
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
