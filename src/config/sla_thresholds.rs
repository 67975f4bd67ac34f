use crate::domain::WorkflowState;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// 默认超期阈值（小时）= 3 天
pub const DEFAULT_SLA_HOURS: i64 = 72;

/// 阈值上限（小时）= 100 年
pub const MAX_SLA_HOURS: i64 = 24 * 365 * 100;

/// 各状态的超期阈值（小时）
///
/// 存储位置：config_kv（scope_id='global'，key 见 `config_keys::SLA_*_HOURS`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaThresholds {
    #[serde(default = "default_hours")]
    pub origin_pending_hours: i64,

    #[serde(default = "default_hours")]
    pub plant_pending_hours: i64,

    #[serde(default = "default_hours")]
    pub review_a_pending_hours: i64,

    #[serde(default = "default_hours")]
    pub review_b_pending_hours: i64,
}

fn default_hours() -> i64 {
    DEFAULT_SLA_HOURS
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self::uniform(DEFAULT_SLA_HOURS)
    }
}

impl SlaThresholds {
    /// 所有状态使用同一阈值
    pub fn uniform(hours: i64) -> Self {
        Self {
            origin_pending_hours: hours,
            plant_pending_hours: hours,
            review_a_pending_hours: hours,
            review_b_pending_hours: hours,
        }
    }

    /// 第一个超出 `1..=MAX_SLA_HOURS` 的字段及其取值
    pub fn first_invalid(&self) -> Option<(&'static str, i64)> {
        [
            ("origin_pending_hours", self.origin_pending_hours),
            ("plant_pending_hours", self.plant_pending_hours),
            ("review_a_pending_hours", self.review_a_pending_hours),
            ("review_b_pending_hours", self.review_b_pending_hours),
        ]
        .into_iter()
        .find(|(_, hours)| !(1..=MAX_SLA_HOURS).contains(hours))
    }

    /// 指定状态的阈值；终态无阈值
    ///
    /// 越界取值按 `1..=MAX_SLA_HOURS` 截断
    pub fn threshold_for(&self, state: WorkflowState) -> Option<Duration> {
        let hours = match state {
            WorkflowState::OriginPending => self.origin_pending_hours,
            WorkflowState::PlantPending => self.plant_pending_hours,
            WorkflowState::ReviewAPending => self.review_a_pending_hours,
            WorkflowState::ReviewBPending => self.review_b_pending_hours,
            WorkflowState::Completed => return None,
        };
        Duration::try_hours(hours.clamp(1, MAX_SLA_HOURS))
    }
}
