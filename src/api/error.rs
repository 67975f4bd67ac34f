// ==========================================
// 物料安全数据审批系统 - API层错误响应
// ==========================================
// 职责: 把引擎错误转换为传输层可直接序列化的响应体
// 红线: 校验类错误原样透出，错误码保持稳定
// ==========================================

use serde::{Deserialize, Serialize};

use crate::engine::WorkflowError;
use crate::repository::RepositoryError;

/// 错误响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// 稳定错误码（见 `WorkflowError::code`）
    pub code: String,
    /// 错误描述
    pub message: String,
    /// 调用方重新加载后是否可以重试
    pub retryable: bool,
}

impl From<&WorkflowError> for ApiErrorBody {
    fn from(err: &WorkflowError) -> Self {
        let retryable = matches!(
            err,
            WorkflowError::Storage(
                RepositoryError::OptimisticLockFailure { .. }
                    | RepositoryError::LockError(_)
                    | RepositoryError::DatabaseConnectionError(_)
            )
        );

        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable,
        }
    }
}

impl From<WorkflowError> for ApiErrorBody {
    fn from(err: WorkflowError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowState;

    #[test]
    fn test_validation_error_is_not_retryable() {
        let body = ApiErrorBody::from(WorkflowError::InvalidStateTransition {
            from: WorkflowState::OriginPending,
            to: WorkflowState::Completed,
        });
        assert_eq!(body.code, "INVALID_STATE_TRANSITION");
        assert!(body.message.contains("ORIGIN_PENDING"));
        assert!(!body.retryable);
    }

    #[test]
    fn test_stale_revision_is_retryable() {
        let body = ApiErrorBody::from(WorkflowError::Storage(
            RepositoryError::OptimisticLockFailure {
                workflow_id: "wf1".to_string(),
                expected: 1,
                actual: 2,
            },
        ));
        assert_eq!(body.code, "STORAGE_ERROR");
        assert!(body.retryable);
    }
}
