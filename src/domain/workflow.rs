// ==========================================
// 物料安全数据审批系统 - 审批流程领域模型
// ==========================================
// 一个 Workflow 对应一个 项目/物料/工厂/区块 组合
// 红线: 状态只能经由状态机修改
// ==========================================

use crate::domain::types::WorkflowState;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// NaturalKey - 业务主键
// ==========================================
// 四个字段联合唯一 (对齐 workflow 表 UNIQUE 约束)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub project_code: String,  // 项目代码
    pub material_code: String, // 物料代码
    pub plant_code: String,    // 工厂代码
    pub block_id: String,      // 区块ID
}

impl NaturalKey {
    pub fn new(
        project_code: impl Into<String>,
        material_code: impl Into<String>,
        plant_code: impl Into<String>,
        block_id: impl Into<String>,
    ) -> Self {
        Self {
            project_code: project_code.into(),
            material_code: material_code.into(),
            plant_code: plant_code.into(),
            block_id: block_id.into(),
        }
    }

    /// 去除首尾空白后的副本
    pub fn normalized(&self) -> Self {
        Self {
            project_code: self.project_code.trim().to_string(),
            material_code: self.material_code.trim().to_string(),
            plant_code: self.plant_code.trim().to_string(),
            block_id: self.block_id.trim().to_string(),
        }
    }

    /// 返回第一个为空的字段名
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("project_code", &self.project_code),
            ("material_code", &self.material_code),
            ("plant_code", &self.plant_code),
            ("block_id", &self.block_id),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.project_code, self.material_code, self.plant_code, self.block_id
        )
    }
}

// ==========================================
// Workflow - 审批流程
// ==========================================
// 不变式:
// - COMPLETED ⇒ completed_at 已设置，且无 OPEN 问询
// - REVIEW_X_PENDING ⇒ 至少一条分配给 X 的 OPEN 问询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    // ===== 主键 =====
    pub workflow_id: String,
    pub natural_key: NaturalKey,

    // ===== 状态 =====
    pub state: WorkflowState,

    // ===== 时间戳 (UTC) =====
    pub created_at: NaiveDateTime,
    pub last_modified_at: NaiveDateTime,
    pub extended_at: Option<NaiveDateTime>, // 首次进入 PLANT_PENDING
    pub completed_at: Option<NaiveDateTime>,

    // ===== 操作人 =====
    pub initiated_by: String, // 创建后不可变
    pub last_modified_by: String,

    // ===== 并发控制 =====
    pub revision: i32, // 每次保存 +1
}

impl Workflow {
    /// 创建新的审批流程（初始状态 ORIGIN_PENDING）
    pub fn new(
        workflow_id: String,
        natural_key: NaturalKey,
        initiated_by: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            workflow_id,
            natural_key,
            state: WorkflowState::OriginPending,
            created_at: now,
            last_modified_at: now,
            extended_at: None,
            completed_at: None,
            last_modified_by: initiated_by.clone(),
            initiated_by,
            revision: 0,
        }
    }

    /// 记录一次修改
    pub fn touch(&mut self, actor: &str, now: NaiveDateTime) {
        self.last_modified_at = now;
        self.last_modified_by = actor.to_string();
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }
}
