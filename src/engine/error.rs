// ==========================================
// 物料安全数据审批系统 - 引擎层错误类型
// ==========================================
// 职责: 状态机/问询管理的错误分类
// 红线: 校验类错误原样返回调用方，不在内部重试
// ==========================================

use crate::domain::{ReviewTeam, WorkflowState};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 审批流程错误类型
#[derive(Error, Debug)]
pub enum WorkflowError {
    // ===== 业务校验错误 =====
    #[error("业务主键已存在: {natural_key} (workflow_id={existing_id})")]
    DuplicateRecord {
        natural_key: String,
        existing_id: String,
    },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition {
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("流程已完成，不允许修改: workflow_id={workflow_id}")]
    WorkflowTerminal { workflow_id: String },

    #[error("流程存在未答复问询: workflow_id={workflow_id}, open_queries={open_queries}")]
    WorkflowBlocked {
        workflow_id: String,
        open_queries: usize,
    },

    #[error("当前流程状态不允许该操作: workflow_id={workflow_id}, state={state}, operation={operation}")]
    InvalidWorkflowState {
        workflow_id: String,
        state: WorkflowState,
        operation: &'static str,
    },

    #[error("缺少分配给团队{team}的未答复问询: workflow_id={workflow_id}")]
    MissingOpenQuery {
        workflow_id: String,
        team: ReviewTeam,
    },

    #[error("问询已答复: query_id={query_id}")]
    QueryAlreadyResolved { query_id: String },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("无效输入 (field={field}): {message}")]
    InvalidInput { field: &'static str, message: String },

    // ===== 存储错误 =====
    #[error("存储失败: {0}")]
    Storage(#[from] RepositoryError),
}

impl WorkflowError {
    /// 错误码（供传输层映射）
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            WorkflowError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            WorkflowError::WorkflowTerminal { .. } => "WORKFLOW_TERMINAL",
            WorkflowError::WorkflowBlocked { .. } => "WORKFLOW_BLOCKED",
            WorkflowError::InvalidWorkflowState { .. } => "INVALID_WORKFLOW_STATE",
            // 转换表的前置条件不满足，对外归入非法转换
            WorkflowError::MissingOpenQuery { .. } => "INVALID_STATE_TRANSITION",
            WorkflowError::QueryAlreadyResolved { .. } => "QUERY_ALREADY_RESOLVED",
            WorkflowError::NotFound { .. } => "NOT_FOUND",
            WorkflowError::InvalidInput { .. } => "INVALID_INPUT",
            WorkflowError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub(crate) fn workflow_not_found(id: &str) -> Self {
        WorkflowError::NotFound {
            entity: "Workflow",
            id: id.to_string(),
        }
    }

    pub(crate) fn query_not_found(id: &str) -> Self {
        WorkflowError::NotFound {
            entity: "Query",
            id: id.to_string(),
        }
    }
}

/// Result 类型别名
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// 校验非空文本参数
pub(crate) fn require_text(field: &'static str, value: &str) -> WorkflowResult<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::InvalidInput {
            field,
            message: "不能为空".to_string(),
        });
    }
    Ok(())
}
