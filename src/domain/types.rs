// ==========================================
// 物料安全数据审批系统 - 领域类型定义
// ==========================================
// 状态集合固定为五个，转换表见 engine::transitions
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 审批流程状态 (Workflow State)
// ==========================================
// 红线: COMPLETED 为终态，任何操作不得再修改
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    OriginPending,  // 发起方待处理
    PlantPending,   // 工厂待处理
    ReviewAPending, // 化学/质量评审待处理
    ReviewBPending, // 技术评审待处理
    Completed,      // 已完成
}

impl WorkflowState {
    /// 全部状态（按流程顺序）
    pub const ALL: [WorkflowState; 5] = [
        WorkflowState::OriginPending,
        WorkflowState::PlantPending,
        WorkflowState::ReviewAPending,
        WorkflowState::ReviewBPending,
        WorkflowState::Completed,
    ];

    /// 转换为数据库字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::OriginPending => "ORIGIN_PENDING",
            WorkflowState::PlantPending => "PLANT_PENDING",
            WorkflowState::ReviewAPending => "REVIEW_A_PENDING",
            WorkflowState::ReviewBPending => "REVIEW_B_PENDING",
            WorkflowState::Completed => "COMPLETED",
        }
    }

    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ORIGIN_PENDING" => Some(WorkflowState::OriginPending),
            "PLANT_PENDING" => Some(WorkflowState::PlantPending),
            "REVIEW_A_PENDING" => Some(WorkflowState::ReviewAPending),
            "REVIEW_B_PENDING" => Some(WorkflowState::ReviewBPending),
            "COMPLETED" => Some(WorkflowState::Completed),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed)
    }

    /// 是否为评审待处理状态
    pub fn is_review(&self) -> bool {
        self.review_team().is_some()
    }

    /// 评审状态对应的评审团队
    pub fn review_team(&self) -> Option<ReviewTeam> {
        match self {
            WorkflowState::ReviewAPending => Some(ReviewTeam::A),
            WorkflowState::ReviewBPending => Some(ReviewTeam::B),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 评审团队 (Review Team)
// ==========================================
// A: 化学/质量评审  B: 技术评审
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewTeam {
    A,
    B,
}

impl ReviewTeam {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewTeam::A => "A",
            ReviewTeam::B => "B",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "A" => Some(ReviewTeam::A),
            "B" => Some(ReviewTeam::B),
            _ => None,
        }
    }

    /// 该团队对应的评审待处理状态
    pub fn review_state(&self) -> WorkflowState {
        match self {
            ReviewTeam::A => WorkflowState::ReviewAPending,
            ReviewTeam::B => WorkflowState::ReviewBPending,
        }
    }
}

impl fmt::Display for ReviewTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 问询状态 (Query Status)
// ==========================================
// RESOLVED 为终态，不可重新打开
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Open,     // 待答复
    Resolved, // 已答复
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Open => "OPEN",
            QueryStatus::Resolved => "RESOLVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(QueryStatus::Open),
            "RESOLVED" => Some(QueryStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 问询优先级 (Query Priority)
// ==========================================
// 仅用于展示分类，不影响阻断语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl QueryPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPriority::Low => "LOW",
            QueryPriority::Normal => "NORMAL",
            QueryPriority::High => "HIGH",
            QueryPriority::Urgent => "URGENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(QueryPriority::Low),
            "NORMAL" => Some(QueryPriority::Normal),
            "HIGH" => Some(QueryPriority::High),
            "URGENT" => Some(QueryPriority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for QueryPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
