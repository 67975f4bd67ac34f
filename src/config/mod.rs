// ==========================================
// 物料安全数据审批系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod sla_config_trait;
pub mod sla_thresholds;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use sla_config_trait::SlaConfigReader;
pub use sla_thresholds::{SlaThresholds, DEFAULT_SLA_HOURS, MAX_SLA_HOURS};
