// ==========================================
// 物料安全数据审批系统 - 问询领域模型
// ==========================================
// 问询仅通过 workflow_id 反向引用所属流程，不持有流程对象
// 红线: RESOLVED 后 resolved_at / resolved_by 不可再变
// ==========================================

use crate::domain::types::{QueryPriority, QueryStatus, ReviewTeam};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Query - 澄清问询
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    // ===== 主键 =====
    pub query_id: String,
    pub workflow_id: String, // 所属流程 (仅ID引用)

    // ===== 内容 =====
    pub assigned_team: ReviewTeam,
    pub status: QueryStatus,
    pub question: String,
    pub response: Option<String>,
    pub priority: QueryPriority, // 仅展示用

    // ===== 审计字段 =====
    pub raised_by: String,
    pub created_at: NaiveDateTime,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
}

impl Query {
    /// 创建新的 OPEN 问询
    pub fn open(
        query_id: String,
        workflow_id: String,
        assigned_team: ReviewTeam,
        question: String,
        priority: QueryPriority,
        raised_by: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            query_id,
            workflow_id,
            assigned_team,
            status: QueryStatus::Open,
            question,
            response: None,
            priority,
            raised_by,
            created_at: now,
            resolved_by: None,
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == QueryStatus::Open
    }
}
