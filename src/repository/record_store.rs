// ==========================================
// 物料安全数据审批系统 - 记录存储接口
// ==========================================
// 职责: 定义状态机/问询管理所需的持久化接口（不包含实现）
// 实现者: WorkflowRepository（SQLite）
// 红线: 一个 WorkflowChangeSet = 一个事务边界
// ==========================================

use crate::domain::{NaturalKey, Query, Workflow};
use crate::repository::error::RepositoryResult;

// ==========================================
// WorkflowChangeSet - 单个工作单元的变更集合
// ==========================================
// 流程更新与问询写入在同一事务内提交，要么全部生效要么全部回滚
#[derive(Debug, Clone, Default)]
pub struct WorkflowChangeSet {
    /// 需更新的流程（带 revision 乐观锁检查）
    pub workflow: Option<Workflow>,
    /// 需写入的问询（upsert）
    pub queries: Vec<Query>,
}

impl WorkflowChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.workflow.is_none() && self.queries.is_empty()
    }
}

// ==========================================
// RecordStore Trait
// ==========================================
pub trait RecordStore: Send + Sync {
    // ===== 流程读取 =====

    /// 按ID读取流程
    fn find_workflow(&self, workflow_id: &str) -> RepositoryResult<Option<Workflow>>;

    /// 按业务主键读取流程
    fn find_workflow_by_key(&self, key: &NaturalKey) -> RepositoryResult<Option<Workflow>>;

    /// 列出所有非终态流程（供超期评估使用）
    fn list_active_workflows(&self) -> RepositoryResult<Vec<Workflow>>;

    // ===== 问询读取 =====

    /// 按ID读取问询
    fn find_query(&self, query_id: &str) -> RepositoryResult<Option<Query>>;

    /// 读取流程下的全部问询（按创建时间升序）
    fn find_queries_for_workflow(&self, workflow_id: &str) -> RepositoryResult<Vec<Query>>;

    // ===== 写入 =====

    /// 插入新流程
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: 业务主键已存在
    fn insert_workflow(&self, workflow: &Workflow) -> RepositoryResult<()>;

    /// 在单个事务内提交变更集合
    ///
    /// 流程写入成功后 `revision` 递增；调用方持有的副本需自行同步。
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: 流程 revision 不匹配
    /// - `NotFound`: 流程不存在
    fn commit(&self, changes: &WorkflowChangeSet) -> RepositoryResult<()>;
}
