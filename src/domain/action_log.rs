// ==========================================
// 物料安全数据审批系统 - 操作日志领域模型
// ==========================================
// 用途: 审计追踪 (由 AuditTrailHook 在状态变更成功后写入)
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,           // 日志ID
    pub workflow_id: Option<String>, // 关联流程 (系统级操作可为None)
    pub query_id: Option<String>,    // 关联问询
    pub action_type: String,         // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,    // 操作时间戳
    pub actor: String,               // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    WorkflowCreated, // 创建流程
    StateChanged,    // 状态变更
    QueryRaised,     // 提出问询
    QueryResolved,   // 答复问询
    QueryReassigned, // 问询改派
    Overdue,         // 超期标记
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::WorkflowCreated => "WorkflowCreated",
            ActionType::StateChanged => "StateChanged",
            ActionType::QueryRaised => "QueryRaised",
            ActionType::QueryResolved => "QueryResolved",
            ActionType::QueryReassigned => "QueryReassigned",
            ActionType::Overdue => "Overdue",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "WorkflowCreated" => Some(ActionType::WorkflowCreated),
            "StateChanged" => Some(ActionType::StateChanged),
            "QueryRaised" => Some(ActionType::QueryRaised),
            "QueryResolved" => Some(ActionType::QueryResolved),
            "QueryReassigned" => Some(ActionType::QueryReassigned),
            "Overdue" => Some(ActionType::Overdue),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(
        action_id: String,
        workflow_id: Option<String>,
        action_type: ActionType,
        actor: String,
        action_ts: NaiveDateTime,
    ) -> Self {
        Self {
            action_id,
            workflow_id,
            query_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor,
            payload_json: None,
            detail: None,
        }
    }

    /// 设置关联问询
    pub fn with_query_id(mut self, query_id: &str) -> Self {
        self.query_id = Some(query_id.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
