// ==========================================
// 物料安全数据审批系统 - 超期配置读取 Trait
// ==========================================
// 职责: 定义超期评估/巡检所需的配置读取接口（不包含实现）
// 实现者: ConfigManager（从 config_kv 表读取）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::sla_thresholds::SlaThresholds;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// SlaConfigReader Trait
// ==========================================
#[async_trait]
pub trait SlaConfigReader: Send + Sync {
    /// 获取各状态超期阈值
    ///
    /// # 默认值
    /// - 每个非终态 72 小时
    async fn get_sla_thresholds(&self) -> Result<SlaThresholds, Box<dyn Error + Send + Sync>>;

    /// 获取超期巡检间隔（秒）
    ///
    /// # 默认值
    /// - 3600
    async fn get_sweep_interval_secs(&self) -> Result<u64, Box<dyn Error + Send + Sync>>;
}
